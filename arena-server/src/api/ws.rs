use arena_core::fanout::{ConnectionId, FanoutGateway};
use arena_sdk::objects::{ClientMessage, ServerMessage};
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(match_stream_ws))
}

/// `GET /ws`: real-time match stream.
///
/// Clients subscribe to matches by id and receive trade and lifecycle pushes
/// for those matches only.
async fn match_stream_ws(state: State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let app_state = state.0.clone();
    ws.on_upgrade(move |socket| handle_match_ws(socket, app_state))
}

/// Background task that drives a single WebSocket connection.
///
/// Relays gateway pushes out and subscription requests in, until the client
/// goes away or the server shuts down. The connection's subscriptions are
/// always released on exit.
async fn handle_match_ws(mut socket: WebSocket, state: AppState) {
    let gateway = state.gateway;
    let mut shutdown_rx = state.shutdown_rx;
    let (id, mut outbound) = gateway.connect().await;
    tracing::debug!(connection = %id, "WS: connection opened");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }

            Some(message) = outbound.recv() => {
                if send_json(&mut socket, &message).await.is_err() {
                    break;
                }
            }

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(&gateway, id, text.as_str()).await;
                        if send_json(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(connection = %id, error = %e, "WS: receive failed");
                        break;
                    }
                }
            }
        }
    }

    gateway.disconnect(id).await;
    tracing::debug!(connection = %id, "WS: connection closed");
}

/// Apply one client frame and build the reply.
async fn handle_client_message(
    gateway: &FanoutGateway,
    id: ConnectionId,
    text: &str,
) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::SubscribeToMatch(target)) => {
            ServerMessage::Subscribed(gateway.subscribe(id, &target.match_id).await)
        }
        Ok(ClientMessage::UnsubscribeFromMatch(target)) => {
            ServerMessage::Unsubscribed(gateway.unsubscribe(id, &target.match_id).await)
        }
        Err(e) => ServerMessage::Error {
            reason: format!("invalid message: {e}"),
        },
    }
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
async fn send_json(socket: &mut WebSocket, value: &ServerMessage) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "WS: failed to serialize message");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribe_and_unsubscribe_are_acknowledged() {
        let gateway = FanoutGateway::new();
        let (id, _rx) = gateway.connect().await;

        let reply = handle_client_message(
            &gateway,
            id,
            &json!({ "event": "subscribeToMatch", "data": { "matchId": "1" } }).to_string(),
        )
        .await;
        let ServerMessage::Subscribed(ack) = reply else {
            panic!("expected a subscribe ack");
        };
        assert!(ack.success);
        assert_eq!(ack.match_id, "1");
        assert_eq!(ack.subscribers, 1);

        let reply = handle_client_message(
            &gateway,
            id,
            &json!({ "event": "unsubscribeFromMatch", "data": { "matchId": "1" } }).to_string(),
        )
        .await;
        let ServerMessage::Unsubscribed(ack) = reply else {
            panic!("expected an unsubscribe ack");
        };
        assert_eq!(ack.subscribers, 0);
        assert_eq!(gateway.registry().topic_count().await, 0);
    }

    #[tokio::test]
    async fn malformed_frames_get_an_error_reply() {
        let gateway = FanoutGateway::new();
        let (id, _rx) = gateway.connect().await;

        for frame in ["not json", r#"{"event":"dance","data":{}}"#] {
            let reply = handle_client_message(&gateway, id, frame).await;
            assert_eq!(reply.event_name(), "error");
        }
        assert_eq!(gateway.registry().topic_count().await, 0);
    }
}
