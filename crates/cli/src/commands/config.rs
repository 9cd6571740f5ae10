use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use sendmoney_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: String, env_keys: &[&str]| {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    };

    push("llm.provider", format!("{:?}", config.llm.provider), &["SENDMONEY_LLM_PROVIDER"]);
    push("llm.model", config.llm.model.clone(), &["SENDMONEY_LLM_MODEL"]);
    push("llm.base_url", config.llm.effective_base_url().to_string(), &["SENDMONEY_LLM_BASE_URL"]);
    push(
        "llm.api_key",
        redact_key(config.llm.api_key.as_ref()),
        &["SENDMONEY_LLM_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY", "OPENAI_API_KEY"],
    );
    push("llm.temperature", config.llm.temperature.to_string(), &["SENDMONEY_LLM_TEMPERATURE"]);
    push("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["SENDMONEY_LLM_TIMEOUT_SECS"]);
    push(
        "server.bind_address",
        config.server.bind_address.clone(),
        &["SENDMONEY_SERVER_BIND_ADDRESS"],
    );
    push("server.port", config.server.port.to_string(), &["SENDMONEY_SERVER_PORT"]);
    push(
        "server.allowed_origins",
        config.server.allowed_origins.join(","),
        &["SENDMONEY_SERVER_ALLOWED_ORIGINS", "ALLOWED_ORIGINS"],
    );
    push(
        "server.graceful_shutdown_secs",
        config.server.graceful_shutdown_secs.to_string(),
        &["SENDMONEY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    );
    push(
        "session.backend",
        format!("{:?}", config.session.backend),
        &["SENDMONEY_SESSION_BACKEND"],
    );
    push("session.ttl_secs", config.session.ttl_secs.to_string(), &["SENDMONEY_SESSION_TTL_SECS"]);
    push("database.url", config.database.url.clone(), &["SENDMONEY_DATABASE_URL"]);
    push(
        "database.max_connections",
        config.database.max_connections.to_string(),
        &["SENDMONEY_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "database.timeout_secs",
        config.database.timeout_secs.to_string(),
        &["SENDMONEY_DATABASE_TIMEOUT_SECS"],
    );
    push(
        "agent.history_limit",
        config.agent.history_limit.to_string(),
        &["SENDMONEY_AGENT_HISTORY_LIMIT"],
    );
    push(
        "agent.fallback_on_malformed_reply",
        config.agent.fallback_on_malformed_reply.to_string(),
        &["SENDMONEY_AGENT_FALLBACK_ON_MALFORMED_REPLY"],
    );
    push(
        "logging.level",
        config.logging.level.clone(),
        &["SENDMONEY_LOGGING_LEVEL", "SENDMONEY_LOG_LEVEL"],
    );
    push(
        "logging.format",
        format!("{:?}", config.logging.format),
        &["SENDMONEY_LOGGING_FORMAT", "SENDMONEY_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["sendmoney.toml", "config/sendmoney.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: Option<&SecretString>) -> String {
    let Some(key) = key else {
        return "<unset>".to_string();
    };
    let exposed = key.expose_secret().trim();
    if exposed.is_empty() {
        return "<empty>".to_string();
    }
    match exposed.get(..4) {
        Some(prefix) if exposed.len() > 8 => format!("{prefix}***"),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{contains_path, redact_key};

    #[test]
    fn api_keys_never_print_in_full() {
        let long = SecretString::from("AIzaSyExampleKey123".to_string());
        let short = SecretString::from("abc".to_string());

        assert_eq!(redact_key(Some(&long)), "AIza***");
        assert_eq!(redact_key(Some(&short)), "<redacted>");
        assert_eq!(redact_key(None), "<unset>");
    }

    #[test]
    fn nested_file_keys_are_detected() {
        let doc: toml::Value = "[llm]\nmodel = \"gemini-2.5-flash\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.provider"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
