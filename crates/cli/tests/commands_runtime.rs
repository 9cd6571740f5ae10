use std::env;
use std::sync::{Mutex, OnceLock};

use sendmoney_cli::commands::{chat, config, doctor, migrate};
use serde_json::Value;

const OLLAMA_MEMORY: &[(&str, &str)] = &[
    ("SENDMONEY_LLM_PROVIDER", "ollama"),
    ("SENDMONEY_SESSION_BACKEND", "memory"),
    ("SENDMONEY_DATABASE_URL", "sqlite::memory:"),
];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(OLLAMA_MEMORY, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_api_key() {
    with_env(&[], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_passes_with_memory_store_and_local_model() {
    with_env(OLLAMA_MEMORY, || {
        let report: Value =
            serde_json::from_str(&doctor::run(true)).expect("doctor output should be JSON");

        assert_eq!(report["overall_status"], "pass");
        let names: Vec<&str> = report["checks"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(names, ["config_validation", "model_client", "session_store"]);
    });
}

#[test]
fn doctor_reports_pending_migrations_for_fresh_sqlite_store() {
    with_env(
        &[
            ("SENDMONEY_LLM_PROVIDER", "ollama"),
            ("SENDMONEY_SESSION_BACKEND", "sqlite"),
            ("SENDMONEY_DATABASE_URL", "sqlite::memory:"),
        ],
        || {
            let report: Value =
                serde_json::from_str(&doctor::run(true)).expect("doctor output should be JSON");

            assert_eq!(report["overall_status"], "fail");
            let store = &report["checks"][2];
            assert_eq!(store["name"], "session_store");
            assert_eq!(store["status"], "fail");
            assert!(store["details"].as_str().unwrap_or_default().contains("sendmoney migrate"));
        },
    );
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[], || {
        let human = doctor::run(false);

        assert!(human.starts_with("doctor: one or more readiness checks failed"));
        assert!(human.contains("- [fail] config_validation:"));
        assert!(human.contains("- [skip] model_client:"));
        assert!(human.contains("- [skip] session_store:"));
    });
}

#[test]
fn config_attributes_env_sources() {
    with_env(OLLAMA_MEMORY, || {
        let output = config::run();

        assert!(output.contains("- llm.provider = Ollama (source: env (SENDMONEY_LLM_PROVIDER))"));
        assert!(output.contains("- llm.api_key = <unset> (source: default)"));
        assert!(output.contains("- server.port = 8000 (source: default)"));
    });
}

#[test]
fn chat_rejects_blank_message_before_calling_the_model() {
    with_env(OLLAMA_MEMORY, || {
        let result = chat::run(Some("cli-1".to_string()), "   ".to_string());
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "request_validation");
    });
}

#[test]
fn chat_reports_unreachable_model() {
    with_env(
        &[
            ("SENDMONEY_LLM_PROVIDER", "ollama"),
            ("SENDMONEY_LLM_BASE_URL", "http://127.0.0.1:9"),
            ("SENDMONEY_LLM_TIMEOUT_SECS", "5"),
            ("SENDMONEY_SESSION_BACKEND", "memory"),
        ],
        || {
            let result = chat::run(None, "Send money to Brazil".to_string());
            assert_eq!(result.exit_code, 7);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            let error_class = payload["error_class"].as_str().unwrap_or_default();
            assert!(
                error_class == "model_unavailable" || error_class == "model_timeout",
                "unexpected error class {error_class}"
            );
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SENDMONEY_LLM_PROVIDER",
        "SENDMONEY_LLM_API_KEY",
        "SENDMONEY_LLM_BASE_URL",
        "SENDMONEY_LLM_MODEL",
        "SENDMONEY_LLM_TEMPERATURE",
        "SENDMONEY_LLM_TIMEOUT_SECS",
        "GEMINI_API_KEY",
        "GOOGLE_API_KEY",
        "OPENAI_API_KEY",
        "SENDMONEY_SERVER_BIND_ADDRESS",
        "SENDMONEY_SERVER_PORT",
        "SENDMONEY_SERVER_ALLOWED_ORIGINS",
        "ALLOWED_ORIGINS",
        "SENDMONEY_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SENDMONEY_SESSION_BACKEND",
        "SENDMONEY_SESSION_TTL_SECS",
        "SENDMONEY_DATABASE_URL",
        "SENDMONEY_DATABASE_MAX_CONNECTIONS",
        "SENDMONEY_DATABASE_TIMEOUT_SECS",
        "SENDMONEY_AGENT_HISTORY_LIMIT",
        "SENDMONEY_AGENT_FALLBACK_ON_MALFORMED_REPLY",
        "SENDMONEY_LOGGING_LEVEL",
        "SENDMONEY_LOGGING_FORMAT",
        "SENDMONEY_LOG_LEVEL",
        "SENDMONEY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
