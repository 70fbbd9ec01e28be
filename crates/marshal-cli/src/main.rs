// ABOUTME: CLI entry point for the marshal agent runtime.
// ABOUTME: Dispatches to the interactive session, config wizard, and worker listing.

mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use marshal_core::{create_backend, Config, Registry, Session};
use tracing::info;

#[derive(Parser)]
#[command(name = "marshal")]
#[command(about = "Terminal agent runtime with worker-hosted tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive agent session (default)
    Serve {
        /// Controller provider: ollama, gemini, or manual
        #[arg(short, long)]
        provider: Option<String>,

        /// Model name override for the selected provider
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Run the interactive configuration wizard
    Config,

    /// List configured workers and their state
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    marshal_log::init_file("marshal");

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve {
        provider: None,
        model: None,
    }) {
        Commands::Serve { provider, model } => serve(provider, model).await,
        Commands::Config => {
            Config::interactive_setup()?;
            Ok(())
        }
        Commands::List => {
            let config = Config::load()?;
            if config.workers.is_empty() {
                println!("No workers configured.");
            }
            for worker in &config.workers {
                let state = if worker.enabled { "enabled" } else { "disabled" };
                println!("{:<24} {:<9} {}", worker.name, state, worker.command.join(" "));
            }
            Ok(())
        }
    }
}

async fn serve(provider: Option<String>, model: Option<String>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(provider) = provider {
        config.default_provider = provider;
    }
    if let Some(model) = model {
        match config.default_provider.as_str() {
            "gemini" => config.gemini_model = model,
            _ => config.ollama_model = model,
        }
    }
    info!(provider = %config.default_provider, "Starting session");

    let mut registry = Registry::new(create_backend(&config));
    connect_workers(&mut registry, &config).await;

    let session = Session::new(registry, config.human_in_loop, config.turn_limit);
    repl::run(session, config).await
}

/// Connect the built-in toolhost plus every enabled configured worker.
/// A worker that fails to start is reported and skipped.
async fn connect_workers(registry: &mut Registry, config: &Config) {
    registry
        .add_worker("os-assistant", &toolhost_command())
        .await;

    for worker in &config.workers {
        if !worker.enabled {
            continue;
        }
        if !registry.add_worker(&worker.name, &worker.command).await {
            println!("✗ Worker failed to start: {}", worker.name);
        }
    }
}

/// The bundled toolhost lives beside this binary when installed together;
/// otherwise fall back to PATH lookup.
fn toolhost_command() -> Vec<String> {
    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name("marshal-toolhost");
        if sibling.exists() {
            return vec![sibling.to_string_lossy().into_owned()];
        }
    }
    vec!["marshal-toolhost".to_string()]
}
