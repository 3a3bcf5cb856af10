//! Stage executor: spawns one child process per stage, redirects its
//! stdout and stderr to a single log file, and reports success/failure.
//!
//! Mirrors the original pipeline engine's `runTask`: two concurrent
//! readers drain the child's stdout/stderr pipes into the same log
//! file line-by-line; interleaving between the two streams is not
//! preserved exactly (documented best-effort, see the module docs on
//! [`execute`]).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use taskforge_core::id::current_timestamp;
use taskforge_core::pipeline::Stage;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Build the log file path for a stage's output: `<log_dir>/<pipeline_name>/<timestamp> <stage_name>-stdout.txt`.
///
/// An empty `pipeline_name` is replaced with the literal `"pipeline"`,
/// matching the original engine's fallback for ad-hoc/unregistered runs.
pub fn log_path(log_dir: &Path, pipeline_name: &str, stage_name: &str) -> PathBuf {
    let pipeline_name = if pipeline_name.is_empty() {
        "pipeline"
    } else {
        pipeline_name
    };
    let file_name = format!("{} {stage_name}-stdout.txt", current_timestamp(true));
    log_dir.join(pipeline_name).join(file_name)
}

/// Spawn `stage.task` with `stage.args`, wait for it to exit, and
/// report `(ok, message)`.
///
/// `stage.pwd` sets the child's working directory (empty inherits the
/// parent's). `stage.env` replaces the parent's environment entirely
/// when non-empty (no merge); when empty the child inherits the
/// parent's full environment. Stdout and stderr are piped and appended
/// line-by-line to one log file under `log_dir`, created lazily along
/// with its parent directories. Any pre-spawn error (bad env entry,
/// pipe/spawn failure) is reported as a failure and does not create a
/// log file.
pub async fn execute(stage: &Stage, pipeline_name: &str, log_dir: &Path) -> (bool, String) {
    let mut command = Command::new(&stage.task);
    command.args(&stage.args);

    if !stage.pwd.is_empty() {
        command.current_dir(&stage.pwd);
    }

    if !stage.env.is_empty() {
        command.env_clear();
        for entry in &stage.env {
            match entry.split_once('=') {
                Some((key, value)) => {
                    command.env(key, value);
                }
                None => return (false, format!("invalid env format: '{entry}'")),
            }
        }
    }

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => return (false, err.to_string()),
    };

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let path = log_path(log_dir, pipeline_name, &stage.name);
    if let Some(parent) = path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            return (false, err.to_string());
        }
    }
    let log_file = match tokio::fs::File::create(&path).await {
        Ok(file) => file,
        Err(err) => return (false, err.to_string()),
    };
    let log_file = tokio::sync::Mutex::new(log_file);

    let stdout_reader = drain_lines(stdout, &log_file);
    let stderr_reader = drain_lines(stderr, &log_file);
    let (_, _) = tokio::join!(stdout_reader, stderr_reader);

    match child.wait().await {
        Ok(status) if status.success() => (true, String::new()),
        Ok(status) => (false, status.to_string()),
        Err(err) => (false, err.to_string()),
    }
}

async fn drain_lines<R: tokio::io::AsyncRead + Unpin>(
    pipe: R,
    log_file: &tokio::sync::Mutex<tokio::fs::File>,
) {
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let mut file = log_file.lock().await;
                let _ = file.write_all(line.as_bytes()).await;
                let _ = file.write_all(b"\n").await;
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "error reading stage output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(task: &str, args: &[&str]) -> Stage {
        Stage {
            name: "s".to_string(),
            task: task.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            pwd: String::new(),
            env: vec![],
            depends_on: vec![],
            skip: false,
        }
    }

    #[tokio::test]
    async fn successful_command_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (ok, message) = execute(&stage("true", &[]), "p", dir.path()).await;
        assert!(ok, "{message}");
    }

    #[tokio::test]
    async fn failing_command_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (ok, _) = execute(&stage("false", &[]), "p", dir.path()).await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn missing_binary_reports_failure_without_panic() {
        let dir = tempfile::tempdir().unwrap();
        let (ok, message) = execute(&stage("/no/such/binary", &[]), "p", dir.path()).await;
        assert!(!ok);
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn stdout_is_captured_to_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = stage("sh", &["-c", "echo hello"]);
        let (ok, _) = execute(&s, "p", dir.path()).await;
        assert!(ok);

        let pipeline_dir = dir.path().join("p");
        let mut entries: Vec<_> = std::fs::read_dir(&pipeline_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        let contents = std::fs::read_to_string(entries.remove(0)).unwrap();
        assert!(contents.contains("hello"));
    }

    #[tokio::test]
    async fn invalid_env_entry_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = stage("true", &[]);
        s.env = vec!["NOVALUE".to_string()];
        let (ok, message) = execute(&s, "p", dir.path()).await;
        assert!(!ok);
        assert!(message.contains("invalid env format"));
    }

    #[tokio::test]
    async fn empty_pipeline_name_falls_back_to_literal() {
        let dir = tempfile::tempdir().unwrap();
        execute(&stage("true", &[]), "", dir.path()).await;
        assert!(dir.path().join("pipeline").exists());
    }
}
