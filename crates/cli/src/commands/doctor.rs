use secrecy::ExposeSecret;
use sendmoney_agent::llm::build_client;
use sendmoney_core::config::{AppConfig, LlmProvider, LoadOptions, SessionBackend};
use sendmoney_db::{connect_with_settings, migrations, SessionRepository, SqlSessionRepository};
use serde::Serialize;

use crate::commands::current_thread_runtime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_model_client(&config));
            checks.push(check_session_store(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["model_client", "session_store"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Builds the client without calling the model; doctor never spends tokens.
fn check_model_client(config: &AppConfig) -> DoctorCheck {
    let credentials = match config.llm.provider {
        LlmProvider::Ollama => "no api key required",
        LlmProvider::Gemini | LlmProvider::OpenAi => {
            match config.llm.api_key.as_ref().map(|key| key.expose_secret().trim().is_empty()) {
                Some(false) => "api key present",
                _ => "api key missing",
            }
        }
    };

    match build_client(&config.llm) {
        Ok(client) => DoctorCheck {
            name: "model_client",
            status: CheckStatus::Pass,
            details: format!(
                "{:?} client for `{}` at {} ({credentials})",
                config.llm.provider,
                client.model(),
                config.llm.effective_base_url()
            ),
        },
        Err(error) => DoctorCheck {
            name: "model_client",
            status: CheckStatus::Fail,
            details: format!("failed to build model client: {error}"),
        },
    }
}

fn check_session_store(config: &AppConfig) -> DoctorCheck {
    if config.session.backend == SessionBackend::Memory {
        return DoctorCheck {
            name: "session_store",
            status: CheckStatus::Pass,
            details: "in-memory session store; sessions do not survive restarts".to_string(),
        };
    }

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "session_store",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let pending = pending_migrations(&pool).await;
        let store = SqlSessionRepository::new(pool.clone());
        let ping = store.ping().await.map_err(|error| format!("session store ping failed: {error}"));
        pool.close().await;
        ping.map(|()| pending)
    });

    match result {
        Ok(0) => DoctorCheck {
            name: "session_store",
            status: CheckStatus::Pass,
            details: format!("sqlite session store reachable at `{}`", config.database.url),
        },
        Ok(pending) => DoctorCheck {
            name: "session_store",
            status: CheckStatus::Fail,
            details: format!("{pending} pending migration(s); run `sendmoney migrate`"),
        },
        Err(error) => DoctorCheck { name: "session_store", status: CheckStatus::Fail, details: error },
    }
}

async fn pending_migrations(pool: &sendmoney_db::DbPool) -> usize {
    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
        .fetch_all(pool)
        .await
        .unwrap_or_default();
    migrations::MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .filter(|migration| !applied.contains(&migration.version))
        .count()
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
