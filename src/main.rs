//! Research assistant - a capability-routed conversational agent
//!
//! Each chat turn is routed to zero or more operations, executed
//! concurrently, and answered by the language model from their results.

mod api;
mod capability;
mod config;
mod db;
mod llm;
mod runtime;
mod session;
mod skills;
mod state_machine;
mod system_prompt;

use api::{create_router, AppState};
use capability::CapabilityContext;
use config::{data_dir, Config, RuntimeConfig};
use db::Database;
use runtime::{DatabaseStore, InMemorySessionStore, Orchestrator, SessionStore};
use skills::{ProfileStore, BUILTIN_CAPABILITIES};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "research_assistant=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env()?;
    let settings = RuntimeConfig::from_env()?;
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        topology = ?settings.topology,
        timeout_secs = settings.turn_timeout.as_secs(),
        compaction = settings.compaction.is_some(),
        memory_agent = settings.memory_agent,
        "Configuration loaded"
    );

    // Capabilities
    let profiles = Arc::new(ProfileStore::new(config.profile_path.clone()));
    let ctx = CapabilityContext {
        profiles: Arc::clone(&profiles),
    };
    let registry = capability::load(BUILTIN_CAPABILITIES, config.capabilities.as_deref(), &ctx);
    tracing::info!(
        capabilities = ?registry.capability_index(&config).iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        "Capabilities loaded"
    );

    let llm = llm::from_config(&config.llm)?;
    let store = open_store()?;

    let orchestrator = Orchestrator::new(
        llm,
        Arc::new(registry),
        config.shared(),
        settings,
        store,
        profiles,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(orchestrator))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Research assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn open_store() -> Result<Arc<dyn SessionStore>, Box<dyn std::error::Error>> {
    if std::env::var("SESSION_STORE").is_ok_and(|v| v.eq_ignore_ascii_case("memory")) {
        tracing::warn!("Using in-memory session store; sessions are lost on restart");
        return Ok(Arc::new(InMemorySessionStore::new()));
    }

    let db_path = std::env::var("SESSION_DB_PATH")
        .map_or_else(|_| data_dir().join("sessions.db"), PathBuf::from);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %db_path.display(), "Opening session database");
    Ok(Arc::new(DatabaseStore::new(Database::open(&db_path)?)))
}
