//! Axum server setup and router configuration.

use crate::api;
use crate::config::runtime::ServerConfig;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
///
/// Indexer and control-plane routes are only mounted when their side is
/// enabled.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let mut router = Router::new()
        // Health check endpoint
        .route("/health", get(health_check));

    if server.indexer_enabled {
        router = router.merge(api::ingest::router());
    }
    if server.gateway_enabled {
        router = router
            .merge(api::webhook::router())
            .merge(api::ws::router());
    }

    router.with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server until `shutdown` completes, then drain in-flight requests.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::runtime::{
        DispatcherConfig, GatewayConfig, IndexerConfig, SharedConfig, StoreBackend,
    };
    use arena_core::enrichment::EventEnricher;
    use arena_core::events::{
        ChainEventReceiver, PipelineBusReceiver, PipelineEvent, chain_event_channel,
        dispatch_channel, pipeline_bus,
    };
    use arena_core::fanout::FanoutGateway;
    use arena_core::processors::{DispatchQueue, WebhookDispatcher};
    use arena_core::store::MemoryStore;
    use arena_sdk::client::{IngestClient, MatchStream};
    use arena_sdk::objects::{ChainEventWire, ServerMessage, WebhookEnvelope, WebhookEventType};
    use arena_sdk::signature::{SIGNATURE_HEADER, now_millis, sign};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::watch;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        chain_rx: ChainEventReceiver,
        bus_rx: PipelineBusReceiver,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn server_config(indexer_enabled: bool, gateway_enabled: bool) -> ServerConfig {
        ServerConfig {
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
            store: StoreBackend::Memory,
            max_connections: 1,
            indexer_enabled,
            gateway_enabled,
        }
    }

    fn harness(indexer: IndexerConfig, gateway: GatewayConfig, server: ServerConfig) -> Harness {
        let dispatcher =
            DispatcherConfig::new("http://127.0.0.1:1/webhooks/indexer".parse().unwrap());
        let dedupe_capacity = gateway.dedupe_capacity;
        let config = SharedConfig::new(indexer, dispatcher, gateway);
        let (chain_tx, chain_rx) = chain_event_channel();
        let bus = pipeline_bus();
        let bus_rx = bus.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::new(
            config,
            Some(chain_tx),
            FanoutGateway::new(),
            bus,
            dedupe_capacity,
            shutdown_rx,
        );
        Harness {
            router: build_router(state, &server),
            chain_rx,
            bus_rx,
            _shutdown_tx: shutdown_tx,
        }
    }

    fn default_harness() -> Harness {
        harness(
            IndexerConfig::default(),
            GatewayConfig::default(),
            server_config(true, true),
        )
    }

    fn post(uri: &str, body: String, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn match_started_wire(block: u64, log_index: u64) -> Value {
        json!({
            "chainId": 10143,
            "block": {
                "number": block,
                "timestamp": 1_700_000_000u64 + block,
                "hash": format!("0x{}", "ab".repeat(32)),
            },
            "logIndex": log_index,
            "transaction": { "hash": format!("0x{}", "cd".repeat(32)) },
            "srcAddress": "0x00000000000000000000000000000000000000ee",
            "eventName": "MatchStarted",
            "params": { "matchId": "1", "startTime": "1700000000" }
        })
    }

    fn envelope(event_id: &str, timestamp: i64) -> String {
        WebhookEnvelope::new(
            WebhookEventType::MatchStarted,
            timestamp,
            json!({ "eventId": event_id, "matchId": "1", "startTime": "1700000000" }),
        )
        .canonical_json()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let h = default_harness();
        let response = h
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn ingest_queues_events_in_chain_order() {
        let mut h = default_harness();
        let batch = json!([match_started_wire(12, 0), match_started_wire(11, 4)]);

        let response = h
            .router
            .oneshot(post("/events", batch.to_string(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await, json!({ "accepted": 2 }));

        let first = h.chain_rx.recv().await.unwrap();
        let second = h.chain_rx.recv().await.unwrap();
        assert_eq!(first.event_id(), "10143_11_4");
        assert_eq!(second.event_id(), "10143_12_0");
    }

    #[tokio::test]
    async fn ingest_rejects_unknown_events_and_bad_params() {
        let mut unknown = match_started_wire(1, 0);
        unknown["eventName"] = json!("Transfer");
        let mut bad_params = match_started_wire(1, 0);
        bad_params["params"] = json!({ "matchId": "not a number" });

        for wire in [unknown, bad_params] {
            let h = default_harness();
            let response = h
                .router
                .oneshot(post("/events", json!([wire]).to_string(), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }

        let h = default_harness();
        let response = h
            .router
            .oneshot(post("/events", "[{".into(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ingest_checks_signature_when_configured() {
        let indexer = IndexerConfig {
            ingest_secret: Some(b"ingest".to_vec().into_boxed_slice()),
            ..IndexerConfig::default()
        };
        let body = json!([match_started_wire(1, 0)]).to_string();

        let cases = [
            (None, StatusCode::UNAUTHORIZED),
            (Some(sign(body.as_bytes(), b"other")), StatusCode::FORBIDDEN),
            (Some(sign(body.as_bytes(), b"ingest")), StatusCode::ACCEPTED),
        ];
        for (signature, expected) in cases {
            let h = harness(
                indexer.clone(),
                GatewayConfig::default(),
                server_config(true, true),
            );
            let response = h
                .router
                .oneshot(post("/events", body.clone(), signature))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn webhook_is_published_once() {
        let gateway = GatewayConfig {
            webhook_secret: Some(b"shared".to_vec().into_boxed_slice()),
            ..GatewayConfig::default()
        };
        let mut h = harness(IndexerConfig::default(), gateway, server_config(true, true));
        let body = envelope("10143_11_4", now_millis());
        let signature = sign(body.as_bytes(), b"shared");

        let response = h
            .router
            .clone()
            .oneshot(post("/webhooks/indexer", body.clone(), Some(signature.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "duplicate": false }));

        let PipelineEvent::MatchUpdated { match_id, fields } = h.bus_rx.recv().await.unwrap()
        else {
            panic!("expected a match update");
        };
        assert_eq!(match_id, "1");
        assert_eq!(fields["eventType"], "match_started");

        let response = h
            .router
            .oneshot(post("/webhooks/indexer", body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "duplicate": true }));
        assert!(h.bus_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signatures_and_stale_envelopes() {
        let gateway = GatewayConfig {
            webhook_secret: Some(b"shared".to_vec().into_boxed_slice()),
            max_webhook_age: Some(Duration::from_secs(60)),
            ..GatewayConfig::default()
        };
        let fresh = envelope("1", now_millis());
        let stale = envelope("2", now_millis() - 120_000);

        let cases = [
            (fresh.clone(), None, StatusCode::UNAUTHORIZED),
            (
                fresh.clone(),
                Some(sign(fresh.as_bytes(), b"other")),
                StatusCode::FORBIDDEN,
            ),
            (
                stale.clone(),
                Some(sign(stale.as_bytes(), b"shared")),
                StatusCode::UNAUTHORIZED,
            ),
        ];
        for (body, signature, expected) in cases {
            let mut h = harness(
                IndexerConfig::default(),
                gateway.clone(),
                server_config(true, true),
            );
            let response = h
                .router
                .oneshot(post("/webhooks/indexer", body, signature))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
            assert!(h.bus_rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn disabled_sides_are_not_routed() {
        let h = harness(
            IndexerConfig::default(),
            GatewayConfig::default(),
            server_config(true, false),
        );
        let response = h
            .router
            .oneshot(post("/webhooks/indexer", envelope("1", now_millis()), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let h = harness(
            IndexerConfig::default(),
            GatewayConfig::default(),
            server_config(false, true),
        );
        let response = h
            .router
            .oneshot(post("/events", "[]".into(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chain_event_reaches_realtime_subscriber() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut dispatcher =
            DispatcherConfig::new(format!("http://{addr}/webhooks/indexer").parse().unwrap());
        dispatcher.secret = Some(b"shared".to_vec().into_boxed_slice());
        let gateway_config = GatewayConfig {
            webhook_secret: Some(b"shared".to_vec().into_boxed_slice()),
            ..GatewayConfig::default()
        };
        let config = SharedConfig::new(IndexerConfig::default(), dispatcher, gateway_config);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (chain_tx, chain_rx) = chain_event_channel();
        let (dispatch_tx, dispatch_rx) = dispatch_channel();
        let enricher = EventEnricher::new(MemoryStore::shared(), config.indexer.clone());
        tokio::spawn(enricher.run(chain_rx, dispatch_tx, shutdown_rx.clone()));
        let queue = DispatchQueue::new(
            WebhookDispatcher::new(config.dispatcher.clone()),
            dispatch_rx,
            shutdown_rx.clone(),
        );
        tokio::spawn(queue.run());

        let gateway = FanoutGateway::new();
        let bus = pipeline_bus();
        tokio::spawn(gateway.clone().run(bus.subscribe(), shutdown_rx.clone()));

        let state = AppState::new(config, Some(chain_tx), gateway, bus, 16, shutdown_rx);
        let router = build_router(state, &server_config(true, true));
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let mut stream = MatchStream::connect(&format!("ws://{addr}/ws"))
            .await
            .unwrap();
        stream.subscribe("1").await.unwrap();
        let ack = stream.next_message().await.unwrap().unwrap();
        assert_eq!(ack.event_name(), "subscribed");

        let wire: ChainEventWire = serde_json::from_value(match_started_wire(5, 0)).unwrap();
        let client = IngestClient::new(format!("http://{addr}").parse().unwrap(), None);
        assert_eq!(client.submit(&[wire]).await.unwrap().accepted, 1);

        let pushed = tokio::time::timeout(Duration::from_secs(5), stream.next_message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let ServerMessage::MatchUpdated(update) = pushed else {
            panic!("expected a match update");
        };
        assert_eq!(update.match_id, "1");
        assert_eq!(update.fields["eventType"], "match_started");
        assert_eq!(update.fields["eventId"], "10143_5_0");

        shutdown_tx.send(true).unwrap();
    }
}
