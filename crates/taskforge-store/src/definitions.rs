//! Definition store: the registered-pipelines index and per-pipeline
//! definition / variable files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use taskforge_core::pipeline::{Pipeline, RegisteredPipeline};
use taskforge_core::{Error, Result};

const INDEX_SUBPATH: &str = "pipelines/registered_pipelines.json";

/// File-based store rooted at a configured data directory.
#[derive(Debug, Clone)]
pub struct DefinitionStore {
    root: PathBuf,
}

impl DefinitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_SUBPATH)
    }

    /// Resolve a definition or variables path against the store root.
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Load the registered-pipelines index. A missing file returns an
    /// empty mapping with a warning; a corrupt file returns an empty
    /// mapping with an error log. Never panics.
    pub fn load_index(&self) -> HashMap<String, RegisteredPipeline> {
        let path = self.index_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no registered pipelines, returning empty map");
                return HashMap::new();
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "error reading registered pipelines file");
                return HashMap::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(map) => map,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "registered pipelines file is corrupted, unable to parse JSON");
                HashMap::new()
            }
        }
    }

    /// Persist the registered-pipelines index, creating the containing
    /// directory if needed.
    pub fn save_index(&self, pipelines: &HashMap<String, RegisteredPipeline>) -> Result<()> {
        let path = self.index_path();
        write_json(&path, pipelines)
    }

    /// Load a pipeline definition from an absolute or root-relative path.
    pub fn load_definition(&self, path: &str) -> Result<Pipeline> {
        let resolved = self.resolve(path);
        let contents = std::fs::read_to_string(&resolved)
            .map_err(|err| Error::Persistence(format!("reading {}: {err}", resolved.display())))?;
        serde_json::from_str(&contents)
            .map_err(|err| Error::Corruption(format!("parsing {}: {err}", resolved.display())))
    }

    /// Save a pipeline definition to an absolute or root-relative path,
    /// creating the containing directory if needed.
    pub fn save_definition(&self, pipeline: &Pipeline, path: &str) -> Result<()> {
        write_json(&self.resolve(path), pipeline)
    }

    /// Delete a file by absolute or root-relative path. A no-op if
    /// `path` is empty. Missing files are not treated as an error.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        let resolved = self.resolve(path);
        match std::fs::remove_file(&resolved) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Persistence(format!(
                "deleting {}: {err}",
                resolved.display()
            ))),
        }
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| Error::Persistence(format!("creating {}: {err}", parent.display())))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| Error::Persistence(format!("encoding {}: {err}", path.display())))?;
    std::fs::write(path, json)
        .map_err(|err| Error::Persistence(format!("writing {}: {err}", path.display())))
}
