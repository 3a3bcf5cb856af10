//! Pipeline, stage, and run data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A single unit of execution within a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name; must be non-empty and unique within its pipeline.
    pub name: String,
    /// Executable name or path, non-empty after interpolation.
    pub task: String,
    /// Ordered argument list; may be empty.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; empty string means inherit the parent's.
    #[serde(default)]
    pub pwd: String,
    /// `KEY=VALUE` entries; empty means inherit the parent's full
    /// environment. A non-empty list replaces it entirely.
    #[serde(default)]
    pub env: Vec<String>,
    /// Stage names that must reach a terminal state before this one
    /// may start. May not contain this stage's own name.
    #[serde(default, rename = "depends_on")]
    pub depends_on: Vec<String>,
    /// If true, the stage is recorded as successful-skipped without
    /// being executed.
    #[serde(default)]
    pub skip: bool,
}

/// An ordered sequence of stages plus pipeline-wide execution options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub parallel: bool,
    /// Path to a `KEY=VALUE` variable file, consulted by the validator
    /// when no override variable map is supplied.
    #[serde(default, rename = "variable_file")]
    pub variable_file: Option<String>,
}

impl Pipeline {
    /// Names of every stage that depends (directly) on the given stage.
    pub fn dependents_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.stages.iter().filter_map(move |s| {
            if s.depends_on.iter().any(|d| d == name) {
                Some(s.name.as_str())
            } else {
                None
            }
        })
    }

    /// Collect the set of declared stage names, in declared order.
    pub fn stage_names(&self) -> HashSet<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A record registered with the definition store / run manager,
/// pointing at where a pipeline's definition and variables live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredPipeline {
    pub name: String,
    #[serde(rename = "definitionPath")]
    pub definition_path: String,
    #[serde(rename = "variablesPath")]
    pub variables_path: Option<String>,
}

/// Outcome of one stage's attempted (or skipped) execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskStatusResponse {
    #[serde(rename = "taskName")]
    pub task_name: String,
    pub successful: bool,
    pub skipped: bool,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "endedAt")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TaskStatusResponse {
    /// A stage that never ran because a dependency failed.
    pub fn skipped_by_dependency_failure(name: &str) -> Self {
        Self {
            task_name: name.to_string(),
            successful: false,
            skipped: true,
            started_at: None,
            ended_at: None,
        }
    }

    /// A stage that never ran because a (non-failing) dependency was
    /// itself a clean skip.
    pub fn skipped_by_dependency_skip(name: &str) -> Self {
        Self {
            task_name: name.to_string(),
            successful: true,
            skipped: true,
            started_at: None,
            ended_at: None,
        }
    }

    /// A stage that never ran because `skip: true` was set on it.
    pub fn skipped_by_config(name: &str) -> Self {
        Self {
            task_name: name.to_string(),
            successful: true,
            skipped: true,
            started_at: None,
            ended_at: None,
        }
    }

    /// A provisional record written the moment a stage starts running.
    pub fn running(name: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            task_name: name.to_string(),
            successful: false,
            skipped: false,
            started_at: Some(started_at),
            ended_at: None,
        }
    }
}

/// One end-to-end execution of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub name: String,
    pub stages: Vec<TaskStatusResponse>,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "endedAt")]
    pub ended_at: DateTime<Utc>,
    pub successful: bool,
}

impl PipelineRun {
    /// Begin a new run record for `pipeline`, pre-sized for its stages.
    pub fn start(pipeline: &Pipeline, started_at: DateTime<Utc>) -> Self {
        Self {
            name: pipeline.name.clone(),
            stages: Vec::with_capacity(pipeline.stages.len()),
            started_at,
            ended_at: started_at,
            successful: true,
        }
    }

    /// Insert or replace the terminal (or provisional) record for a
    /// stage, keyed by task name.
    pub fn upsert_stage(&mut self, status: TaskStatusResponse) {
        if let Some(existing) = self
            .stages
            .iter_mut()
            .find(|s| s.task_name == status.task_name)
        {
            *existing = status;
        } else {
            self.stages.push(status);
        }
    }
}

/// Live status of a registered pipeline, tracked by the run manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineStatus {
    Idle,
    Running,
}

/// Runtime-only bookkeeping the run manager keeps per registered
/// pipeline: live status, last-run pointer, and a bounded run history.
#[derive(Debug, Clone)]
pub struct PipelineItem {
    pub name: String,
    pub status: PipelineStatus,
    /// Epoch milliseconds of the most recent run's end time.
    pub last_run: i64,
    /// Most recent runs, newest first, capped at a configured length.
    pub runs: Vec<PipelineRun>,
}

/// Uniform error body for the management HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(rename = "msg")]
    pub message: String,
}

/// Body for "register a pipeline from a file path".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterFilePath {
    #[serde(rename = "filepath")]
    pub definition_file_path: String,
    #[serde(default, rename = "variable_file")]
    pub variable_file_path: Option<String>,
}

/// Body for "register a pipeline from an embedded JSON definition",
/// optionally carrying an inline variable map in place of a variable
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPipelineRequest {
    #[serde(rename = "pipeline")]
    pub pipeline_definition: Pipeline,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// List-view projection of a [`PipelineItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredPipelineResponse {
    pub name: String,
    #[serde(rename = "last_run")]
    pub last_run: i64,
    pub status: PipelineStatus,
}

/// Single-pipeline detail view: the stored definition, its resolved
/// variables, and live status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredPipelineDetails {
    pub name: String,
    pub stages: Vec<Stage>,
    pub parallel: bool,
    pub variables: HashMap<String, String>,
    #[serde(rename = "last_run")]
    pub last_run: i64,
    pub status: PipelineStatus,
}

/// Body for editing a registered pipeline's definition and/or
/// variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPipelineRequest {
    pub name: String,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub parallel: bool,
    /// `None` means "leave variables as they are"; `Some` (even an
    /// empty map) replaces them. See DESIGN.md for why edit does not
    /// treat an absent field as "clear the variables".
    #[serde(default)]
    pub variables: Option<HashMap<String, String>>,
}

impl PipelineItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: PipelineStatus::Idle,
            last_run: 0,
            runs: Vec::new(),
        }
    }

    /// Record a completed run: bump `last_run` (monotonically), and
    /// push the run to the front of the bounded history.
    pub fn record_run(&mut self, run: PipelineRun, history_cap: usize) {
        let ended_ms = run.ended_at.timestamp_millis();
        self.last_run = self.last_run.max(ended_ms);
        self.runs.insert(0, run);
        self.runs.truncate(history_cap);
    }
}
