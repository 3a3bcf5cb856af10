//! Application state: a handle to the shared [`RunManager`].

use std::sync::Arc;

use taskforge_scheduler::RunManager;

/// Shared application state, cheap to clone (one `Arc` field).
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RunManager>,
}

impl AppState {
    pub fn new(manager: Arc<RunManager>) -> Self {
        Self { manager }
    }
}
