//! API routes.

pub mod health;
pub mod pipelines;

use crate::AppState;
use axum::Router;

/// Build the management router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/pipelines", pipelines::router())
        .merge(health::router())
        .with_state(state)
}
