//! Logger setup, mirroring the original engine's `SetupLogger`: plain
//! text to stdout always, plus a rotated file sink outside test mode.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use taskforge_core::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

const LOG_FILE_NAME: &str = "combined.log";

/// Initialize the global tracing subscriber for `env`.
///
/// `env == "test"` installs an INFO-level stdout-only subscriber and
/// returns `Ok(None)` without touching the filesystem, matching the
/// original's early return for test mode. Otherwise the level is
/// DEBUG unless `env` is `prod`/`production` (then INFO); output goes
/// to stdout and, if `log_dir` is writable, additionally to
/// `<log_dir>/combined.log`. An existing `combined.log` is archived to
/// `combined.log.<n>` (smallest unused `n`) first. Failures to create
/// the directory or file are logged to stderr and logging falls back
/// to stdout alone; this never returns an error and never panics.
pub fn init_logging(log_dir: &Path, env: &str) -> Result<Option<File>> {
    if env == "test" {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("info"))
            .with_test_writer()
            .try_init();
        return Ok(None);
    }

    let level = if env == "prod" || env == "production" {
        "info"
    } else {
        "debug"
    };

    if let Err(err) = std::fs::create_dir_all(log_dir) {
        eprintln!("error creating log directory {}: {err}", log_dir.display());
    }

    let log_path = log_dir.join(LOG_FILE_NAME);
    if log_path.exists() {
        let archived = archive_path(&log_path, next_archive_number(&log_path));
        if let Err(err) = std::fs::rename(&log_path, &archived) {
            eprintln!("error archiving existing log file {}: {err}", log_path.display());
        }
    }

    let opened = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);

    match opened {
        Ok(file) => {
            let for_writer = file.try_clone().ok();
            match for_writer {
                Some(handle) => {
                    let shared = SharedFile(Arc::new(Mutex::new(handle)));
                    let _ = tracing_subscriber::fmt()
                        .with_env_filter(EnvFilter::new(level))
                        .with_writer(io::stdout.and(shared))
                        .try_init();
                    Ok(Some(file))
                }
                None => {
                    let _ = tracing_subscriber::fmt()
                        .with_env_filter(EnvFilter::new(level))
                        .try_init();
                    Ok(None)
                }
            }
        }
        Err(err) => {
            eprintln!("unable to open log file {}: {err}", log_path.display());
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(level))
                .try_init();
            Ok(None)
        }
    }
}

fn archive_path(path: &Path, n: u32) -> PathBuf {
    let mut os_string = path.as_os_str().to_os_string();
    os_string.push(format!(".{n}"));
    PathBuf::from(os_string)
}

fn next_archive_number(path: &Path) -> u32 {
    let mut n = 1;
    while archive_path(path, n).exists() {
        n += 1;
    }
    n
}

#[derive(Clone)]
struct SharedFile(Arc<Mutex<File>>);

impl<'a> MakeWriter<'a> for SharedFile {
    type Writer = SharedFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileWriter(self.0.clone())
    }
}

struct SharedFileWriter(Arc<Mutex<File>>);

impl io::Write for SharedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log file mutex poisoned").write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().expect("log file mutex poisoned").flush()
    }
}
