//! `taskforge run --definition <path>`: validate then execute one
//! pipeline definition, mirroring the original engine's headless `run`
//! subcommand.

use anyhow::{Context, Result};

use taskforge_store::RunStore;

/// Load, validate, and execute the pipeline definition at
/// `definition_path`. Returns `Ok(true)` on full success, `Ok(false)`
/// if any stage failed — the caller translates that into the process
/// exit status per the base spec's §7 "User-visible behavior".
pub async fn run_definition(definition_path: &str, log_dir: &std::path::Path) -> Result<bool> {
    let contents = std::fs::read_to_string(definition_path)
        .with_context(|| format!("reading pipeline definition: {definition_path}"))?;
    let mut pipeline: taskforge_core::pipeline::Pipeline = serde_json::from_str(&contents)
        .with_context(|| format!("parsing pipeline definition: {definition_path}"))?;

    let errors = taskforge_config::validate(&mut pipeline, None);
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!(%error, "pipeline validation failed");
        }
        return Ok(false);
    }

    let run_store = RunStore::new(".");
    let (success, _run) = taskforge_scheduler::run(&pipeline, log_dir, &run_store, None).await;
    Ok(success)
}
