//! Signal handling for graceful shutdown and config reload.

use crate::config::ConfigLoader;
use crate::config::runtime::ServerConfig;
use crate::state::AppState;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Notify, watch};

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Wait for a shutdown signal, then tell every background task about it.
pub async fn shutdown_and_notify(shutdown_tx: Arc<watch::Sender<bool>>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

/// Spawns a task that listens for SIGHUP and reloads the configuration.
///
/// Only the reloadable sections (`[indexer]` secrets and DEXes,
/// `[dispatcher]`, `[gateway]`) are applied; `[server]` and `[store]` need a
/// restart. Returns a Notify that stops the handler.
pub fn spawn_config_reload_handler(
    state: AppState,
    config_loader: Arc<ConfigLoader>,
    running: ServerConfig,
) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(loaded_config) => {
                            if loaded_config.server != running {
                                tracing::warn!(
                                    "[server] and [store] changes take effect on restart only"
                                );
                            }
                            let dedupe_capacity = loaded_config.gateway.dedupe_capacity;
                            loaded_config.apply_to(&state.config).await;
                            state.recent.lock().await.resize(dedupe_capacity);

                            tracing::info!("Configuration reloaded successfully");
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Config reload handler shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}
