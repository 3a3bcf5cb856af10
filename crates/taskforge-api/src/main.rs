//! Standalone management server binary. Equivalent to `taskforge
//! serve`, provided as its own process for deployments that want the
//! server split from the CLI.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    taskforge_config::env::load_dotenv();
    let env_defaults = taskforge_config::env::resolve_env_defaults();

    taskforge_config::logging::init_logging(
        std::path::Path::new(&env_defaults.log_dir),
        env_defaults.env.as_deref().unwrap_or("dev"),
    )?;

    let data_store_dir = env_defaults
        .data_store_dir
        .clone()
        .unwrap_or_else(|| "data".to_string());
    let port: u16 = env_defaults
        .server_port
        .as_deref()
        .unwrap_or("8080")
        .parse()
        .unwrap_or(8080);

    taskforge_api::serve(&data_store_dir, &env_defaults.log_dir, port).await
}
