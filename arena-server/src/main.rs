//! Arena Relay Server
//!
//! Turns on-chain copy-trading events into signed webhooks and fans the
//! resulting match updates out to real-time subscribers.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use arena_core::enrichment::EventEnricher;
use arena_core::events::{chain_event_channel, dispatch_channel, pipeline_bus};
use arena_core::fanout::FanoutGateway;
use arena_core::framework::DatabaseProcessor;
use arena_core::processors::{DispatchQueue, WebhookDispatcher};
use arena_core::store::{MemoryStore, SharedStore};
use clap::Parser;
use config::runtime::{ServerConfig, StoreBackend};
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::{shutdown_and_notify, spawn_config_reload_handler};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Arena Relay - copy-trading event enrichment and real-time fan-out
#[derive(Parser, Debug)]
#[command(name = "arena-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./arena-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "ARENA_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_json);

    tracing::info!("Starting arena-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let dedupe_capacity = loaded_config.gateway.dedupe_capacity;
    let (server_config, shared_config) = loaded_config.into_shared();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    // The dispatch queue stops only after the enricher has drained
    let (queue_shutdown_tx, queue_shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();
    let mut enricher_task = None;
    let mut db_pool = None;

    // Indexer side: ingestion -> enricher -> dispatch queue
    let chain_tx = if server_config.indexer_enabled {
        let (store, pool) = open_store(&server_config, args.migrate).await?;
        db_pool = pool;

        let (chain_tx, chain_rx) = chain_event_channel();
        let (dispatch_tx, dispatch_rx) = dispatch_channel();

        let enricher = EventEnricher::new(store, shared_config.indexer.clone());
        enricher_task = Some(tokio::spawn(enricher.run(
            chain_rx,
            dispatch_tx,
            shutdown_rx.clone(),
        )));

        let dispatcher = WebhookDispatcher::new(shared_config.dispatcher.clone());
        let queue = DispatchQueue::new(dispatcher, dispatch_rx, queue_shutdown_rx);
        tasks.push(tokio::spawn(queue.run()));

        Some(chain_tx)
    } else {
        tracing::info!("Indexer side disabled");
        None
    };

    // Control plane: webhook receiver -> bus -> fan-out gateway
    let gateway = FanoutGateway::new();
    let bus = pipeline_bus();
    if server_config.gateway_enabled {
        tasks.push(tokio::spawn(
            gateway.clone().run(bus.subscribe(), shutdown_rx.clone()),
        ));
    } else {
        tracing::info!("Control plane disabled");
    }

    // Create application state
    let state = AppState::new(
        shared_config,
        chain_tx,
        gateway,
        bus,
        dedupe_capacity,
        shutdown_rx,
    );

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify =
        spawn_config_reload_handler(state.clone(), config_loader, server_config.clone());

    // Build the router
    let router = build_router(state, &server_config);

    // Run the server
    tracing::info!("Starting HTTP server on {}", server_config.listen);
    let result = run_server(
        router,
        server_config.listen,
        shutdown_and_notify(shutdown_tx.clone()),
    )
    .await;

    // Stop background tasks even if the server failed to start
    let _ = shutdown_tx.send(true);
    reload_notify.notify_one();
    if let Some(task) = enricher_task
        && let Err(e) = task.await
    {
        tracing::error!("Event enricher failed: {}", e);
    }
    let _ = queue_shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Background task failed: {}", e);
        }
    }

    // Close database connections gracefully
    if let Some(pool) = db_pool {
        tracing::info!("Closing database connections...");
        pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Open the configured entity store, connecting and migrating PostgreSQL if
/// that is the backend.
async fn open_store(
    server: &ServerConfig,
    migrate: bool,
) -> anyhow::Result<(SharedStore, Option<PgPool>)> {
    match server.store {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory entity store; records do not survive a restart");
            Ok((MemoryStore::shared(), None))
        }
        StoreBackend::Postgres => {
            // Get database URL from environment
            let database_url = get_database_url().map_err(|e| {
                tracing::error!("DATABASE_URL environment variable not set");
                e
            })?;

            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(server.max_connections)
                .connect(&database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            if migrate {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("../migrations")
                    .run(&db_pool)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to run migrations: {}", e);
                        e
                    })?;
                tracing::info!("Migrations completed successfully");
            }

            let store: SharedStore = Arc::new(DatabaseProcessor::new(db_pool.clone()));
            Ok((store, Some(db_pool)))
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
