//! Taskforge CLI: `run`, `serve`, `version` — matching the base
//! spec's §6 "CLI surface" exactly. `help` is provided for free by
//! `clap`.

use clap::{Parser, Subcommand};

mod commands;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "taskforge")]
#[command(about = "Local pipeline execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate then execute a single pipeline definition
    Run {
        /// Path to the pipeline definition JSON file
        #[arg(long)]
        definition: String,
    },
    /// Start the management HTTP server
    Serve,
    /// Print the engine version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    taskforge_config::env::load_dotenv();
    let env_defaults = taskforge_config::env::resolve_env_defaults();
    taskforge_config::logging::init_logging(
        std::path::Path::new(&env_defaults.log_dir),
        env_defaults.env.as_deref().unwrap_or("dev"),
    )?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { definition } => {
            let success = commands::run_definition(
                &definition,
                std::path::Path::new(&env_defaults.log_dir),
            )
            .await?;
            if success {
                tracing::info!("pipeline completed successfully");
            } else {
                tracing::error!("pipeline run failed");
                std::process::exit(1);
            }
        }
        Commands::Serve => {
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
            commands::serve(&data_store_dir, &env_defaults.log_dir, port).await?;
        }
        Commands::Version => {
            println!("taskforge {VERSION}");
        }
    }

    Ok(())
}
