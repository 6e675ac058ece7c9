use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::ClientError;
use crate::objects::{ClientMessage, MatchRef, ServerMessage};

/// A real-time connection to a relay's `GET /ws` endpoint.
///
/// ```ignore
/// let mut stream = MatchStream::connect("ws://127.0.0.1:8080/ws").await?;
/// stream.subscribe("1").await?;
/// while let Some(msg) = stream.next_message().await? {
///     println!("{}", msg.event_name());
/// }
/// ```
pub struct MatchStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl MatchStream {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _) = connect_async(url).await?;
        Ok(Self { socket })
    }

    pub async fn subscribe(&mut self, match_id: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::SubscribeToMatch(MatchRef {
            match_id: match_id.to_owned(),
        }))
        .await
    }

    pub async fn unsubscribe(&mut self, match_id: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::UnsubscribeFromMatch(MatchRef {
            match_id: match_id.to_owned(),
        }))
        .await
    }

    /// Next server message, or `None` once the server closed the stream.
    ///
    /// Non-text frames are skipped.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let json = serde_json::to_string(msg)?;
        self.socket.send(Message::Text(json)).await?;
        Ok(())
    }
}
