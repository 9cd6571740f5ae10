use std::sync::Arc;
use std::time::Duration;

use sendmoney_agent::llm::build_client;
use sendmoney_agent::{AgentRuntime, RuntimeSettings};
use sendmoney_core::config::{AppConfig, LoadOptions, SessionBackend};
use sendmoney_core::domain::chat::ChatRequest;
use sendmoney_db::{
    connect_with_settings, migrations, InMemorySessionRepository, SessionRepository,
    SqlSessionRepository,
};

use crate::commands::{current_thread_runtime, CommandResult};

type Failure = (String, String, u8);

/// Runs one conversational turn against the configured model and session store.
///
/// With the `memory` backend every invocation starts a fresh session; use the
/// `sqlite` backend to continue a conversation across invocations with `--session`.
pub fn run(session_id: Option<String>, message: String) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let store = open_store(&config).await?;
        let llm = build_client(&config.llm)
            .map_err(|error| ("model_client".to_string(), error.to_string(), 6u8))?;
        let agent = AgentRuntime::new(store, llm, RuntimeSettings::from_config(&config))
            .map_err(|error| (error.error_class().to_string(), error.to_string(), 6u8))?;

        agent
            .handle_turn(&ChatRequest::new(message), session_id)
            .await
            .map_err(|error| (error.error_class().to_string(), error.to_string(), 7u8))
    });

    match result {
        Ok(outcome) => {
            let reply = outcome.response.agent_response.clone();
            let data = serde_json::json!({
                "session_id": outcome.session_id,
                "response": outcome.response,
            });
            CommandResult::success_with_data("chat", reply, Some(data))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", &error_class, message, exit_code)
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn SessionRepository>, Failure> {
    let ttl = Duration::from_secs(config.session.ttl_secs);
    match config.session.backend {
        SessionBackend::Memory => Ok(Arc::new(InMemorySessionRepository::with_ttl(ttl))),
        SessionBackend::Sqlite => {
            let pool = connect_with_settings(
                &config.database.url,
                config.database.max_connections,
                config.database.timeout_secs,
            )
            .await
            .map_err(|error| ("db_connectivity".to_string(), error.to_string(), 4u8))?;
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration".to_string(), error.to_string(), 5u8))?;
            Ok(Arc::new(SqlSessionRepository::with_ttl(pool, ttl)))
        }
    }
}
