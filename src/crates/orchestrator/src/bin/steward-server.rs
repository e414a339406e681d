//! Steward server binary.
//!
//! Wires the engine, agents, approval manager and API together and serves
//! the streaming endpoints.

use orchestrator::agents::{AgentRegistry, AgentRuntime, ToolExecutorRegistry};
use orchestrator::api::{create_router, AppState};
use orchestrator::approval::{background, ApprovalManager, HttpTracker, IssueTracker};
use orchestrator::config::ServerConfig;
use orchestrator::db::{ApprovalRepository, DatabaseConnection, SqliteCheckpointStore};
use orchestrator::graph::build_graph;
use orchestrator::metrics::Metrics;
use orchestrator::risk::RiskAssessor;
use orchestrator::router::IntentRouter;
use orchestrator::tools::{StaticToolDiscovery, ToolCatalog, ToolStrategy};
use llm::{OpenAiCompatClient, RemoteLlmConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use steward_core::llm::ChatModel;
use steward_core::{Engine, EngineConfig};
use steward_checkpoint::CheckpointStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    tracing::info!("loading server configuration");
    let config = ServerConfig::load()?;

    tracing::info!(url = %config.database.url(), "connecting to database");
    let db = DatabaseConnection::connect(&config.database.url(), config.database.max_connections)
        .await?;
    tracing::info!("running database migrations");
    db.run_migrations().await?;
    db.health_check().await?;

    let metrics = Arc::new(Metrics::new());

    // Tool catalog: file-declared when configured, built-in otherwise.
    let discovery = match &config.tools.catalog_path {
        Some(path) => StaticToolDiscovery::from_file(path)?,
        None => StaticToolDiscovery::builtin(),
    };
    let catalog = Arc::new(ToolCatalog::new(
        Arc::new(discovery),
        Duration::from_secs(config.tools.catalog_ttl_seconds),
    ));

    let risk = match &config.risk.rules_path {
        Some(path) => Arc::new(RiskAssessor::from_yaml_file(path)?),
        None => Arc::new(RiskAssessor::builtin()),
    };

    let api_key = config.llm_api_key().unwrap_or_else(|| {
        tracing::warn!(env = %config.llm.api_key_env, "LLM API key not set");
        String::new()
    });
    let llm_config = RemoteLlmConfig::new(
        config.llm.endpoint.clone(),
        api_key,
        config.llm.default_model.clone(),
    )
    .with_timeout_secs(config.llm.timeout_seconds);
    let model: Arc<dyn ChatModel> = Arc::new(OpenAiCompatClient::new(llm_config)?);

    let tracker_token = config.tracker_token().unwrap_or_else(|| {
        tracing::warn!(env = %config.tracker.api_token_env, "tracker token not set");
        String::new()
    });
    let tracker: Arc<dyn IssueTracker> = Arc::new(HttpTracker::new(
        config.tracker.base_url.clone(),
        tracker_token,
        Duration::from_secs(config.tracker.timeout_seconds),
    )?);

    let per_agent_strategy: HashMap<String, ToolStrategy> = config
        .tools
        .per_agent_strategy
        .iter()
        .filter_map(|(agent, name)| match name.parse() {
            Ok(strategy) => Some((agent.clone(), strategy)),
            Err(err) => {
                tracing::warn!(agent = %agent, %err, "ignoring invalid tool strategy");
                None
            }
        })
        .collect();

    let runtime = Arc::new(AgentRuntime::new(
        Arc::new(AgentRegistry::defaults()),
        catalog,
        model.clone(),
        Arc::new(ToolExecutorRegistry::new()),
        metrics.clone(),
        config.llm.per_agent_models.clone(),
        per_agent_strategy,
        config.tools.max_tools_per_invocation,
        config.engine.per_node_hop_limit,
        config.llm.default_model.clone(),
    ));

    let repo = ApprovalRepository::new(db.clone());
    let manager = Arc::new(ApprovalManager::new(repo, tracker.clone(), metrics.clone()));

    let store: Arc<dyn CheckpointStore> = Arc::new(SqliteCheckpointStore::new(db.clone()));
    let graph = build_graph(runtime.clone(), manager.clone(), risk)?;
    let engine = Arc::new(Engine::new(
        graph,
        store.clone(),
        EngineConfig {
            per_run_hop_limit: config.engine.per_run_hop_limit,
            ..Default::default()
        },
    ));

    // Background maintenance: approval expiry, missed-webhook poll,
    // checkpoint pruning.
    background::spawn_expiry_sweep(
        manager.clone(),
        chrono::Duration::seconds(config.approval.timeout_seconds as i64),
        Duration::from_secs(config.approval.sweep_interval_seconds),
    );
    background::spawn_tracker_poll(
        manager.clone(),
        tracker.clone(),
        engine.clone(),
        config.tracker.approved_states.clone(),
        config.tracker.rejected_states.clone(),
        Duration::from_secs(config.approval.poll_interval_seconds),
        metrics.clone(),
    );
    background::spawn_checkpoint_pruner(
        store,
        chrono::Duration::seconds(config.engine.checkpoint_ttl_seconds as i64),
        Duration::from_secs(3600),
    );

    let state = AppState {
        engine,
        runtime,
        intent: Arc::new(IntentRouter::new()),
        manager,
        tracker,
        metrics,
        db,
        model,
        webhook_secret: config.webhook_secret(),
        approved_states: Arc::new(config.tracker.approved_states.clone()),
        rejected_states: Arc::new(config.tracker.rejected_states.clone()),
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    tracing::info!(%addr, "steward server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
