//! Run manager: the process-wide registry of pipelines the management
//! surface talks to. Keeps a `name -> PipelineItem` map with live
//! status, a last-run pointer, and a bounded run history, hydrated at
//! startup from the definition store and run store. All mutation goes
//! through the methods here; nothing else is allowed to touch the map.

use std::collections::HashMap;
use std::path::PathBuf;

use taskforge_core::id::generate_id;
use taskforge_core::pipeline::{
    EditPipelineRequest, Pipeline, PipelineItem, PipelineRun, PipelineStatus, RegisteredPipeline,
    RegisteredPipelineDetails, RegisteredPipelineResponse,
};
use taskforge_core::{Error, Result};
use taskforge_store::{DefinitionStore, RunStore};
use tokio::sync::Mutex;

use crate::orchestrator;

/// Default number of most-recent runs kept in memory per pipeline.
pub const DEFAULT_HISTORY_CAP: usize = 10;

/// In-memory registry of pipelines, backed by the definition and run
/// stores. One instance is shared (behind an `Arc`) by the CLI's
/// `serve` command and the management HTTP surface.
pub struct RunManager {
    definitions: DefinitionStore,
    runs: RunStore,
    log_dir: PathBuf,
    history_cap: usize,
    items: Mutex<HashMap<String, PipelineItem>>,
}

impl RunManager {
    pub fn new(definitions: DefinitionStore, runs: RunStore, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            definitions,
            runs,
            log_dir: log_dir.into(),
            history_cap: DEFAULT_HISTORY_CAP,
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Populate the in-memory map from the definition index and the
    /// newest `history_cap` runs per definition. Call once at startup.
    pub async fn hydrate(&self) {
        let index = self.definitions.load_index();
        let mut items = self.items.lock().await;
        for name in index.into_keys() {
            let mut item = PipelineItem::new(name.clone());
            let runs = self.runs.list_runs(&name, self.history_cap as i64);
            if let Some(latest) = runs.first() {
                item.last_run = latest.ended_at.timestamp_millis();
            }
            item.runs = runs;
            items.insert(name, item);
        }
    }

    /// List-view projection of every registered pipeline.
    pub async fn list(&self) -> Vec<RegisteredPipelineResponse> {
        let items = self.items.lock().await;
        let mut out: Vec<_> = items
            .values()
            .map(|item| RegisteredPipelineResponse {
                name: item.name.clone(),
                last_run: item.last_run,
                status: item.status,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Combine the stored definition, resolved variables, and live
    /// status for one pipeline.
    pub async fn details(&self, name: &str) -> Result<RegisteredPipelineDetails> {
        let registered = self.lookup(name)?;
        let pipeline = self.definitions.load_definition(&registered.definition_path)?;
        let variables = registered
            .variables_path
            .as_deref()
            .map(|p| taskforge_config::variables::load(self.definitions.resolve(p)))
            .unwrap_or_default();

        let items = self.items.lock().await;
        let item = items.get(name);
        Ok(RegisteredPipelineDetails {
            name: pipeline.name,
            stages: pipeline.stages,
            parallel: pipeline.parallel,
            variables,
            last_run: item.map(|i| i.last_run).unwrap_or(0),
            status: item.map(|i| i.status).unwrap_or(PipelineStatus::Idle),
        })
    }

    fn lookup(&self, name: &str) -> Result<RegisteredPipeline> {
        self.definitions
            .load_index()
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("unknown pipeline: {name}")))
    }

    /// Register a pipeline from an embedded definition plus an
    /// optional inline variable map, bypassing a variable file.
    pub async fn register(
        &self,
        mut pipeline: Pipeline,
        variables: Option<HashMap<String, String>>,
    ) -> Result<()> {
        let errors = taskforge_config::validate(&mut pipeline, variables.as_ref());
        if !errors.is_empty() {
            return Err(Error::InputInvalid(errors.join("; ")));
        }

        let mut items = self.items.lock().await;
        if items.contains_key(&pipeline.name) {
            return Err(Error::Conflict(format!(
                "pipeline already registered: {}",
                pipeline.name
            )));
        }

        let definition_path = format!("{}.json", pipeline.name);
        self.definitions.save_definition(&pipeline, &definition_path)?;

        let variables_path = self.save_variables_if_any(variables)?;

        let mut index = self.definitions.load_index();
        index.insert(
            pipeline.name.clone(),
            RegisteredPipeline {
                name: pipeline.name.clone(),
                definition_path,
                variables_path,
            },
        );
        self.definitions.save_index(&index)?;

        items.insert(pipeline.name.clone(), PipelineItem::new(pipeline.name));
        Ok(())
    }

    /// Register a pipeline whose definition (and optional variable
    /// file) already live at a path outside the store; the index
    /// points at those paths directly rather than copying them in.
    pub async fn register_from_path(
        &self,
        definition_path: &str,
        variable_file_path: Option<&str>,
    ) -> Result<()> {
        let mut pipeline = self.definitions.load_definition(definition_path)?;
        let override_vars = None;
        if let Some(vf) = variable_file_path {
            pipeline.variable_file = Some(vf.to_string());
        }
        let errors = taskforge_config::validate(&mut pipeline, override_vars);
        if !errors.is_empty() {
            return Err(Error::InputInvalid(errors.join("; ")));
        }

        let mut items = self.items.lock().await;
        if items.contains_key(&pipeline.name) {
            return Err(Error::Conflict(format!(
                "pipeline already registered: {}",
                pipeline.name
            )));
        }

        let mut index = self.definitions.load_index();
        index.insert(
            pipeline.name.clone(),
            RegisteredPipeline {
                name: pipeline.name.clone(),
                definition_path: definition_path.to_string(),
                variables_path: variable_file_path.map(str::to_string),
            },
        );
        self.definitions.save_index(&index)?;

        items.insert(pipeline.name.clone(), PipelineItem::new(pipeline.name));
        Ok(())
    }

    /// Edit a registered pipeline's stages, parallel flag, and
    /// (optionally) its variables. `old_name` identifies the existing
    /// registration; `request.name` is the name to rename it to (equal
    /// to `old_name` when not renaming).
    ///
    /// Per the open question in the base spec's design notes: when
    /// `request.variables` is `None`, any existing variable file is
    /// left untouched rather than cleared. Passing `Some(HashMap::new())`
    /// is how a caller explicitly empties it.
    pub async fn edit(&self, old_name: &str, request: EditPipelineRequest) -> Result<()> {
        {
            let items = self.items.lock().await;
            let item = items
                .get(old_name)
                .ok_or_else(|| Error::NotFound(format!("unknown pipeline: {old_name}")))?;
            if item.status == PipelineStatus::Running {
                return Err(Error::Conflict(format!("{old_name} is currently running")));
            }
        }

        let mut index = self.definitions.load_index();
        let registered = index
            .get(old_name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("unknown pipeline: {old_name}")))?;

        let variables = match &request.variables {
            Some(vars) => Some(vars.clone()),
            None => registered
                .variables_path
                .as_deref()
                .map(|p| taskforge_config::variables::load(self.definitions.resolve(p))),
        };

        let mut pipeline = Pipeline {
            name: request.name.clone(),
            stages: request.stages,
            parallel: request.parallel,
            variable_file: None,
        };
        let errors = taskforge_config::validate(&mut pipeline, variables.as_ref());
        if !errors.is_empty() {
            return Err(Error::InputInvalid(errors.join("; ")));
        }

        let new_definition_path = format!("{}.json", pipeline.name);
        self.definitions.save_definition(&pipeline, &new_definition_path)?;
        if new_definition_path != registered.definition_path {
            let _ = self.definitions.delete_file(&registered.definition_path);
        }

        let variables_path = if request.variables.is_some() {
            let path = registered
                .variables_path
                .clone()
                .unwrap_or_else(|| format!("pipeline-variables-{}.properties", generate_id()));
            taskforge_config::variables::save(
                variables.as_ref().unwrap(),
                self.definitions.resolve(&path),
            )
            .map_err(|err| Error::Persistence(err.to_string()))?;
            Some(path)
        } else {
            registered.variables_path.clone()
        };

        index.remove(old_name);
        index.insert(
            pipeline.name.clone(),
            RegisteredPipeline {
                name: pipeline.name.clone(),
                definition_path: new_definition_path,
                variables_path,
            },
        );
        self.definitions.save_index(&index)?;

        let mut items = self.items.lock().await;
        if old_name != pipeline.name {
            if let Some(mut item) = items.remove(old_name) {
                item.name = pipeline.name.clone();
                items.insert(pipeline.name, item);
            }
        }
        Ok(())
    }

    /// Delete a registered pipeline's index entry, definition file,
    /// and variable file (if any).
    pub async fn delete(&self, name: &str) -> Result<()> {
        {
            let items = self.items.lock().await;
            let item = items
                .get(name)
                .ok_or_else(|| Error::NotFound(format!("unknown pipeline: {name}")))?;
            if item.status == PipelineStatus::Running {
                return Err(Error::Conflict(format!("{name} is currently running")));
            }
        }

        let mut index = self.definitions.load_index();
        let registered = index
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("unknown pipeline: {name}")))?;
        self.definitions.delete_file(&registered.definition_path)?;
        if let Some(variables_path) = &registered.variables_path {
            self.definitions.delete_file(variables_path)?;
        }
        self.definitions.save_index(&index)?;

        self.items.lock().await.remove(name);
        Ok(())
    }

    /// Launch a registered pipeline: load its definition, validate and
    /// interpolate it, run it to completion via the scheduler, then
    /// fold the result back into the pipeline's status and history.
    pub async fn launch(&self, name: &str) -> Result<PipelineRun> {
        {
            let mut items = self.items.lock().await;
            let item = items
                .get_mut(name)
                .ok_or_else(|| Error::NotFound(format!("unknown pipeline: {name}")))?;
            if item.status == PipelineStatus::Running {
                return Err(Error::Conflict(format!("{name} is already running")));
            }
            item.status = PipelineStatus::Running;
        }

        let result = self.launch_inner(name).await;

        let mut items = self.items.lock().await;
        if let Some(item) = items.get_mut(name) {
            item.status = PipelineStatus::Idle;
            if let Ok(run) = &result {
                item.record_run(run.clone(), self.history_cap);
            }
        }
        result
    }

    async fn launch_inner(&self, name: &str) -> Result<PipelineRun> {
        let registered = self.lookup(name)?;
        let mut pipeline = self.definitions.load_definition(&registered.definition_path)?;
        let variables = registered
            .variables_path
            .as_deref()
            .map(|p| taskforge_config::variables::load(self.definitions.resolve(p)));
        let errors = taskforge_config::validate(&mut pipeline, variables.as_ref());
        if !errors.is_empty() {
            return Err(Error::InputInvalid(errors.join("; ")));
        }

        let (_, run) = orchestrator::run(&pipeline, &self.log_dir, &self.runs, None).await;
        Ok(run)
    }

    /// Report cancellation intent for a running pipeline. The core
    /// keeps no handle to in-flight child processes, so this cannot
    /// actually terminate the run (see the base spec's cancellation
    /// gap note); it only checks the pipeline exists.
    pub async fn cancel(&self, name: &str) -> Result<()> {
        let items = self.items.lock().await;
        items
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("unknown pipeline: {name}")))?;
        tracing::warn!(pipeline = name, "cancel requested; run will continue to completion");
        Ok(())
    }

    pub fn list_runs(&self, name: &str, limit: i64) -> Vec<PipelineRun> {
        self.runs.list_runs(name, limit)
    }

    fn save_variables_if_any(
        &self,
        variables: Option<HashMap<String, String>>,
    ) -> Result<Option<String>> {
        match variables {
            Some(vars) if !vars.is_empty() => {
                let path = format!("pipeline-variables-{}.properties", generate_id());
                taskforge_config::variables::save(&vars, self.definitions.resolve(&path))
                    .map_err(|err| Error::Persistence(err.to_string()))?;
                Ok(Some(path))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::pipeline::Stage;

    fn stage(name: &str, task: &str) -> Stage {
        Stage {
            name: name.to_string(),
            task: task.to_string(),
            args: vec![],
            pwd: String::new(),
            env: vec![],
            depends_on: vec![],
            skip: false,
        }
    }

    fn manager() -> (tempfile::TempDir, RunManager) {
        let dir = tempfile::tempdir().unwrap();
        let definitions = DefinitionStore::new(dir.path());
        let runs = RunStore::new(dir.path());
        let manager = RunManager::new(definitions, runs, dir.path().join("logs"));
        (dir, manager)
    }

    fn pipeline(name: &str) -> Pipeline {
        Pipeline {
            name: name.to_string(),
            stages: vec![stage("a", "true")],
            parallel: false,
            variable_file: None,
        }
    }

    #[tokio::test]
    async fn register_then_list_shows_idle_pipeline() {
        let (_dir, manager) = manager();
        manager.register(pipeline("p"), None).await.unwrap();
        let list = manager.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "p");
        assert_eq!(list[0].status, PipelineStatus::Idle);
    }

    #[tokio::test]
    async fn register_duplicate_name_is_a_conflict() {
        let (_dir, manager) = manager();
        manager.register(pipeline("p"), None).await.unwrap();
        let err = manager.register(pipeline("p"), None).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn register_invalid_pipeline_is_rejected() {
        let (_dir, manager) = manager();
        let mut p = pipeline("p");
        p.stages[0].name = String::new();
        let err = manager.register(p, None).await.unwrap_err();
        assert!(matches!(err, Error::InputInvalid(_)));
    }

    #[tokio::test]
    async fn launch_runs_pipeline_and_records_history() {
        let (_dir, manager) = manager();
        manager.register(pipeline("p"), None).await.unwrap();
        let run = manager.launch("p").await.unwrap();
        assert!(run.successful);

        let list = manager.list().await;
        assert_eq!(list[0].status, PipelineStatus::Idle);
        assert!(list[0].last_run > 0);
        assert_eq!(manager.list_runs("p", -1).len(), 1);
    }

    #[tokio::test]
    async fn launch_unknown_pipeline_is_not_found() {
        let (_dir, manager) = manager();
        let err = manager.launch("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_definition_and_index_entry() {
        let (_dir, manager) = manager();
        manager.register(pipeline("p"), None).await.unwrap();
        manager.delete("p").await.unwrap();
        assert!(manager.list().await.is_empty());
        assert!(manager.details("p").await.is_err());
    }

    #[tokio::test]
    async fn edit_renames_pipeline_and_updates_index() {
        let (_dir, manager) = manager();
        manager.register(pipeline("old"), None).await.unwrap();
        manager
            .edit(
                "old",
                EditPipelineRequest {
                    name: "new".to_string(),
                    stages: vec![stage("a", "true")],
                    parallel: false,
                    variables: None,
                },
            )
            .await
            .unwrap();

        assert!(manager.details("old").await.is_err());
        assert!(manager.details("new").await.is_ok());
    }

    #[tokio::test]
    async fn edit_without_variables_field_keeps_existing_file() {
        let (_dir, manager) = manager();
        let mut vars = HashMap::new();
        vars.insert("X".to_string(), "1".to_string());
        manager.register(pipeline("p"), Some(vars)).await.unwrap();

        manager
            .edit(
                "p",
                EditPipelineRequest {
                    name: "p".to_string(),
                    stages: vec![stage("a", "true")],
                    parallel: false,
                    variables: None,
                },
            )
            .await
            .unwrap();

        let details = manager.details("p").await.unwrap();
        assert_eq!(details.variables.get("X").unwrap(), "1");
    }

    #[tokio::test]
    async fn hydrate_restores_items_from_disk() {
        let (dir, manager) = manager();
        manager.register(pipeline("p"), None).await.unwrap();
        manager.launch("p").await.unwrap();

        let definitions = DefinitionStore::new(dir.path());
        let runs = RunStore::new(dir.path());
        let fresh = RunManager::new(definitions, runs, dir.path().join("logs"));
        fresh.hydrate().await;

        let list = fresh.list().await;
        assert_eq!(list.len(), 1);
        assert!(list[0].last_run > 0);
    }
}
