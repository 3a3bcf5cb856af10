//! Error kinds shared across the pipeline engine.

use thiserror::Error;

/// The error kinds a caller of the engine can observe. Validation
/// errors are accumulated and returned as a `Vec<String>` rather than
/// surfaced through this type (see `taskforge_config::validate`), but
/// everything else funnels through one of these variants.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("corrupted data: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, Error>;
