//! `.env` loading and environment-variable defaults, mirroring the
//! original engine's `loadEnvVars` (backed by `godotenv`).

use crate::variables;

const DOTENV_FILE: &str = ".env";

/// Load `.env` from the current directory, if present, and set any
/// key it defines that isn't already present in the process
/// environment — real environment variables always win over the file,
/// matching `godotenv`'s default non-override behavior. A missing
/// `.env` file is not an error.
///
/// # Safety
///
/// Calling this before spawning any other threads (as `main` does,
/// before the async runtime starts) avoids the data race `set_var`
/// can otherwise introduce.
pub fn load_dotenv() {
    let Ok(contents) = std::fs::read_to_string(DOTENV_FILE) else {
        return;
    };
    for (key, value) in variables::parse(&contents) {
        if std::env::var_os(&key).is_none() {
            // SAFETY: invoked once at process startup before any other
            // thread (including the async runtime) is spawned.
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Environment variables consumed by the process, with their default
/// or `None` when the original has no sane default.
#[derive(Debug, Clone)]
pub struct EnvDefaults {
    pub log_dir: String,
    pub server_port: Option<String>,
    pub env: Option<String>,
    pub data_store_dir: Option<String>,
}

/// Fill `LOG_DIR` with its default (`logs`) and warn (without failing)
/// if `SERVER_PORT`, `ENV`, or `DATA_STORE_DIR` are unset.
/// `DATA_STORE_DIR` is only required once a store is actually opened,
/// not at process start.
pub fn resolve_env_defaults() -> EnvDefaults {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

    let server_port = std::env::var("SERVER_PORT").ok();
    if server_port.is_none() {
        tracing::warn!("SERVER_PORT is not set, the management server will default to 8080");
    }

    let env = std::env::var("ENV").ok();
    if env.is_none() {
        tracing::warn!("ENV is not set, defaulting logger verbosity to dev level");
    }

    let data_store_dir = std::env::var("DATA_STORE_DIR").ok();
    if data_store_dir.is_none() {
        tracing::warn!("DATA_STORE_DIR is not set, it will be required when a store is opened");
    }

    EnvDefaults {
        log_dir,
        server_port,
        env,
        data_store_dir,
    }
}
