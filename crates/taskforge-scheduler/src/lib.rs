//! Stage-graph scheduling and pipeline run management for taskforge.
//!
//! [`orchestrator::run`] drives one pipeline's stages to completion.
//! [`manager::RunManager`] is the process-wide registry that the CLI
//! and management HTTP surface launch pipelines through.

pub mod manager;
pub mod orchestrator;

pub use manager::RunManager;
pub use orchestrator::run;
