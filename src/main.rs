//! Ferry CLI - process job requests against a graph execution engine

use std::io::Read;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use ferry::engine::EngineClient;
use ferry::error::{FerryError, FixSuggestion};
use ferry::workflow::{normalize, WorkflowSource};
use ferry::{handle, Config};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Ferry - synchronous job adapter for graph execution engines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one job request and print the result envelope
    Run {
        /// Path to a request JSON file, or "-" for stdin
        request: String,
    },

    /// Validate a workflow without submitting it
    Validate {
        /// Workflow file name (resolved against FERRY_WORKFLOWS_DIR)
        workflow: String,
    },

    /// Probe engine readiness
    Probe,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { request } => run_request(&request).await,
        Commands::Validate { workflow } => validate_workflow(&workflow).await,
        Commands::Probe => probe_engine().await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run_request(request: &str) -> Result<(), FerryError> {
    let config = Config::from_env()?;

    let raw = if request == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        tokio::fs::read_to_string(request).await?
    };
    let value: Value = serde_json::from_str(&raw)?;

    let envelope = handle(value, &config).await;
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    // The envelope is the contract; the exit code just mirrors it.
    if envelope.status.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

async fn validate_workflow(workflow: &str) -> Result<(), FerryError> {
    let config = Config::from_env()?;

    let source = WorkflowSource::from_request(&Value::String(workflow.to_string()))?;
    let raw = source.load(&config.workflows_dir).await?;
    let graph = normalize(&raw)?;

    println!("{} Workflow '{}' is valid", "✓".green(), workflow);
    println!("  Nodes: {}", graph.len());
    Ok(())
}

async fn probe_engine() -> Result<(), FerryError> {
    let config = Config::from_env()?;
    let client = EngineClient::new(&config)?;

    println!("{} Probing {}", "→".cyan(), config.http_base());
    if client.readiness(config.ready_timeout).await {
        println!("{} Engine is ready", "✓".green());
        Ok(())
    } else {
        Err(FerryError::Transport {
            detail: format!(
                "engine did not answer within {}s",
                config.ready_timeout.as_secs()
            ),
        })
    }
}
