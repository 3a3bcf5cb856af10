//! Management HTTP surface for the taskforge pipeline engine.
//!
//! A thin pass-through onto [`taskforge_scheduler::RunManager`]: every
//! route here maps a request onto a run-manager call and translates
//! its `Result` into the `(message, statusCode)` contract. No
//! pipeline-graph logic lives in this crate.

pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use taskforge_scheduler::RunManager;
use taskforge_store::{DefinitionStore, RunStore};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Hydrate a [`RunManager`] from `data_store_dir` and serve the
/// management router on `port` until the process is killed or the
/// listener errors. Shared by the `taskforge-server` binary and the
/// CLI's `serve` subcommand so the two entry points never drift.
pub async fn serve(data_store_dir: &str, log_dir: &str, port: u16) -> anyhow::Result<()> {
    let definitions = DefinitionStore::new(data_store_dir);
    let runs = RunStore::new(data_store_dir);
    let manager = Arc::new(RunManager::new(definitions, runs, log_dir));
    manager.hydrate().await;

    let app = routes::router(AppState::new(manager)).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "starting management server");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
