//! Run store: one JSON file per completed pipeline run.

use std::cmp::Ordering;
use std::path::PathBuf;

use taskforge_core::id::{current_timestamp, parse_run_timestamp};
use taskforge_core::pipeline::PipelineRun;
use taskforge_core::{Error, Result};

/// File-based store of run history, one JSON file per run under
/// `<root>/pipeline_runs/<pipelineName>/`.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir_for(&self, pipeline_name: &str) -> PathBuf {
        self.root.join("pipeline_runs").join(pipeline_name)
    }

    /// Persist a completed run, creating its directory lazily.
    pub fn save_run(&self, pipeline_name: &str, run: &PipelineRun) -> Result<PathBuf> {
        let dir = self.dir_for(pipeline_name);
        std::fs::create_dir_all(&dir)
            .map_err(|err| Error::Persistence(format!("creating {}: {err}", dir.display())))?;

        let path = dir.join(format!("{}.json", current_timestamp(true)));
        let json = serde_json::to_string_pretty(run)
            .map_err(|err| Error::Persistence(format!("encoding run: {err}")))?;
        std::fs::write(&path, json)
            .map_err(|err| Error::Persistence(format!("writing {}: {err}", path.display())))?;
        Ok(path)
    }

    /// List runs for a pipeline, newest-first by the timestamp encoded
    /// in each file's name. `limit < 0` means unlimited. Entries whose
    /// name doesn't parse as a timestamp sort as equal to their
    /// neighbors (stable order, not filtered out). Files that fail to
    /// decode are logged and skipped; the rest are still returned.
    pub fn list_runs(&self, pipeline_name: &str, limit: i64) -> Vec<PipelineRun> {
        let dir = self.dir_for(pipeline_name);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::error!(path = %dir.display(), error = %err, "error reading run directory");
                return Vec::new();
            }
        };

        let mut files: Vec<(Option<chrono::NaiveDateTime>, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .map(|path| {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default();
                (parse_run_timestamp(stem), path)
            })
            .collect();

        files.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            _ => Ordering::Equal,
        });

        let take = if limit < 0 { files.len() } else { limit as usize };

        files
            .into_iter()
            .take(take)
            .filter_map(|(_, path)| match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<PipelineRun>(&contents) {
                    Ok(run) => Some(run),
                    Err(err) => {
                        tracing::error!(path = %path.display(), error = %err, "failed to decode run file, skipping");
                        None
                    }
                },
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "failed to read run file, skipping");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn run(name: &str) -> PipelineRun {
        let now = Utc::now();
        PipelineRun {
            name: name.to_string(),
            stages: vec![],
            started_at: now,
            ended_at: now,
            successful: true,
        }
    }

    #[test]
    fn list_runs_on_missing_directory_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path());
        assert!(store.list_runs("p", -1).is_empty());
    }

    #[test]
    fn save_then_list_returns_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path());
        store.save_run("p", &run("p")).unwrap();
        let runs = store.list_runs("p", -1);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "p");
    }

    #[test]
    fn list_runs_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let pdir = dir.path().join("pipeline_runs").join("p");
        std::fs::create_dir_all(&pdir).unwrap();

        let r = run("p");
        std::fs::write(
            pdir.join("2026-01-01 10_00_00.json"),
            serde_json::to_string(&r).unwrap(),
        )
        .unwrap();
        std::fs::write(
            pdir.join("2026-01-02 10_00_00.json"),
            serde_json::to_string(&r).unwrap(),
        )
        .unwrap();

        let store = RunStore::new(dir.path());
        let runs = store.list_runs("p", -1);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn list_runs_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path());
        for _ in 0..3 {
            store.save_run("p", &run("p")).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(1100));
        }
        let runs = store.list_runs("p", 2);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn corrupt_run_file_is_skipped_not_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let pdir = dir.path().join("pipeline_runs").join("p");
        std::fs::create_dir_all(&pdir).unwrap();
        std::fs::write(pdir.join("2026-01-01 10_00_00.json"), "not json").unwrap();

        let store = RunStore::new(dir.path());
        assert!(store.list_runs("p", -1).is_empty());
    }

    #[test]
    fn unparsable_name_is_not_filtered_out() {
        let dir = tempfile::tempdir().unwrap();
        let pdir = dir.path().join("pipeline_runs").join("p");
        std::fs::create_dir_all(&pdir).unwrap();
        std::fs::write(
            pdir.join("not-a-timestamp.json"),
            serde_json::to_string(&run("p")).unwrap(),
        )
        .unwrap();

        let store = RunStore::new(dir.path());
        assert_eq!(store.list_runs("p", -1).len(), 1);
    }
}
