use std::sync::Arc;
use std::time::Duration;

use sendmoney_agent::llm::{build_client, LlmError};
use sendmoney_agent::{AgentRuntime, RuntimeSettings};
use sendmoney_core::config::{AppConfig, ConfigError, LoadOptions, SessionBackend};
use sendmoney_core::errors::ApplicationError;
use sendmoney_db::{
    connect_with_settings, migrations, InMemorySessionRepository, SessionRepository,
    SqlSessionRepository,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<dyn SessionRepository>,
    pub agent_runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("model client could not be built: {0}")]
    Model(#[source] LlmError),
    #[error("agent runtime could not be initialized: {0}")]
    Runtime(#[source] ApplicationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        session_backend = ?config.session.backend,
        llm_provider = ?config.llm.provider,
        "starting application bootstrap"
    );

    let store = build_store(&config).await?;

    let llm = build_client(&config.llm).map_err(BootstrapError::Model)?;
    info!(
        event_name = "system.bootstrap.model_ready",
        correlation_id = "bootstrap",
        model = llm.model(),
        "model client initialized"
    );

    let runtime = AgentRuntime::new(store.clone(), llm, RuntimeSettings::from_config(&config))
        .map_err(BootstrapError::Runtime)?;

    Ok(Application { config, store, agent_runtime: Arc::new(runtime) })
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn SessionRepository>, BootstrapError> {
    let ttl = Duration::from_secs(config.session.ttl_secs);

    match config.session.backend {
        SessionBackend::Memory => {
            info!(
                event_name = "system.bootstrap.session_store",
                correlation_id = "bootstrap",
                backend = "memory",
                ttl_secs = config.session.ttl_secs,
                "in-memory session store selected"
            );
            Ok(Arc::new(InMemorySessionRepository::with_ttl(ttl)))
        }
        SessionBackend::Sqlite => {
            let pool = connect_with_settings(
                &config.database.url,
                config.database.max_connections,
                config.database.timeout_secs,
            )
            .await
            .map_err(BootstrapError::DatabaseConnect)?;
            info!(
                event_name = "system.bootstrap.database_connected",
                correlation_id = "bootstrap",
                "database connection established"
            );

            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            info!(
                event_name = "system.bootstrap.migrations_applied",
                correlation_id = "bootstrap",
                ttl_secs = config.session.ttl_secs,
                "database migrations applied"
            );

            Ok(Arc::new(SqlSessionRepository::with_ttl(pool, ttl)))
        }
    }
}
