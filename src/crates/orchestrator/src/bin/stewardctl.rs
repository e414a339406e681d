//! Admin CLI: health probe and checkpoint replay for debugging.

use clap::{Parser, Subcommand};
use orchestrator::config::ServerConfig;
use orchestrator::db::{DatabaseConnection, SqliteCheckpointStore};
use steward_checkpoint::CheckpointStore;
use steward_core::WorkflowState;

#[derive(Parser)]
#[command(name = "stewardctl", about = "Steward admin tooling", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe a running server's health endpoint
    Health {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,
    },

    /// Inspect a thread's checkpoint history and replay its state
    Replay {
        /// Thread to inspect
        #[arg(long)]
        thread: String,

        /// Checkpoint to load; defaults to the latest
        #[arg(long)]
        checkpoint: Option<u64>,

        /// Dump the full workflow state as JSON
        #[arg(long)]
        full: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Health { url } => health(&url).await,
        Commands::Replay {
            thread,
            checkpoint,
            full,
        } => replay(&thread, checkpoint, full).await,
    }
}

async fn health(base_url: &str) -> anyhow::Result<()> {
    let response = reqwest::Client::new()
        .get(format!("{}/health", base_url.trim_end_matches('/')))
        .send()
        .await?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        anyhow::bail!("server reported {status}");
    }
    Ok(())
}

async fn replay(thread: &str, checkpoint: Option<u64>, full: bool) -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    let db =
        DatabaseConnection::connect(&config.database.url(), config.database.max_connections).await?;
    let store = SqliteCheckpointStore::new(db);

    let history = store.list(thread).await?;
    if history.is_empty() {
        anyhow::bail!("no checkpoints recorded for thread '{thread}'");
    }

    println!("checkpoint history for thread '{thread}':");
    for cp in &history {
        println!(
            "  #{:<4} node={:<16} at={}",
            cp.checkpoint_id, cp.node, cp.created_at
        );
    }

    let target = match checkpoint {
        Some(seq) => store
            .get(thread, seq)
            .await?
            .ok_or_else(|| anyhow::anyhow!("checkpoint {seq} not found"))?,
        None => history.last().cloned().expect("history is non-empty"),
    };

    let state: WorkflowState = serde_json::from_value(target.state.clone())?;
    println!();
    println!("state at checkpoint #{}:", target.checkpoint_id);
    println!("  workflow_id:     {}", state.workflow_id);
    println!("  current_agent:   {}", state.current_agent);
    println!("  next_agent:      {}", state.next_agent);
    println!("  approval_status: {}", state.approval_status.as_str());
    println!("  risk_level:      {}", state.risk_level.as_str());
    println!("  messages:        {}", state.messages.len());

    if full {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }
    Ok(())
}
