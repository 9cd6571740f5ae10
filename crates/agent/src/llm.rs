//! Model invocation adapters.
//!
//! Every provider is asked for a single JSON object at a low temperature. Transport
//! timeouts surface as [`LlmError::Timeout`]; every other failure (connection, non-2xx
//! status, empty candidate text) is [`LlmError::Unavailable`]. Nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use sendmoney_core::config::{LlmConfig, LlmProvider};
use sendmoney_core::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub temperature: f32,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("model call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl From<LlmError> for ApplicationError {
    fn from(value: LlmError) -> Self {
        match value {
            LlmError::Unavailable(message) => Self::ModelUnavailable(message),
            LlmError::Timeout { timeout_secs } => Self::ModelTimeout { timeout_secs },
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    fn model(&self) -> &str;
}

pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let transport = HttpTransport::new(config.timeout_secs)?;
    let base_url = config.effective_base_url().to_string();
    let model = config.model.clone();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient {
            transport,
            base_url,
            model,
            api_key: required_key(config)?,
        }),
        LlmProvider::OpenAi => Arc::new(OpenAiClient {
            transport,
            base_url,
            model,
            api_key: required_key(config)?,
        }),
        LlmProvider::Ollama => Arc::new(OllamaClient { transport, base_url, model }),
    };
    Ok(client)
}

fn required_key(config: &LlmConfig) -> Result<SecretString, LlmError> {
    config
        .api_key
        .clone()
        .ok_or_else(|| LlmError::Unavailable("llm.api_key is not configured".to_string()))
}

#[derive(Clone)]
struct HttpTransport {
    http: Client,
    timeout_secs: u64,
}

impl HttpTransport {
    fn new(timeout_secs: u64) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Unavailable(format!("http client: {error}")))?;
        Ok(Self { http, timeout_secs })
    }

    fn map_error(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout { timeout_secs: self.timeout_secs }
        } else {
            LlmError::Unavailable(error.to_string())
        }
    }

    async fn post_json<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        body: &Value,
    ) -> Result<R, LlmError> {
        let response = request.json(body).send().await.map_err(|error| self.map_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(300).collect();
            return Err(LlmError::Unavailable(format!("provider returned {status}: {detail}")));
        }

        response.json::<R>().await.map_err(|error| self.map_error(error))
    }
}

fn non_empty(text: String) -> Result<String, LlmError> {
    if text.trim().is_empty() {
        Err(LlmError::Unavailable("model returned no text".to_string()))
    } else {
        Ok(text)
    }
}

pub struct GeminiClient {
    transport: HttpTransport,
    base_url: String,
    model: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

fn gemini_body(request: &CompletionRequest) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        "generationConfig": {
            "temperature": request.temperature,
            "responseMimeType": "application/json"
        }
    })
}

fn gemini_text(response: GeminiResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default()
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let builder = self
            .transport
            .http
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret());
        let response: GeminiResponse =
            self.transport.post_json(builder, &gemini_body(request)).await?;
        non_empty(gemini_text(response))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

pub struct OpenAiClient {
    transport: HttpTransport,
    base_url: String,
    model: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

fn openai_body(model: &str, request: &CompletionRequest) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.system_instruction },
            { "role": "user", "content": request.prompt }
        ],
        "response_format": { "type": "json_object" },
        "temperature": request.temperature
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let builder =
            self.transport.http.post(url).bearer_auth(self.api_key.expose_secret());
        let response: OpenAiResponse =
            self.transport.post_json(builder, &openai_body(&self.model, request)).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        non_empty(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

pub struct OllamaClient {
    transport: HttpTransport,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

fn ollama_body(model: &str, request: &CompletionRequest) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.system_instruction },
            { "role": "user", "content": request.prompt }
        ],
        "stream": false,
        "format": "json",
        "options": { "temperature": request.temperature }
    })
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let builder = self.transport.http.post(url);
        let response: OllamaResponse =
            self.transport.post_json(builder, &ollama_body(&self.model, request)).await?;
        non_empty(response.message.map(|message| message.content).unwrap_or_default())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use sendmoney_core::config::{AppConfig, LlmProvider};
    use sendmoney_core::errors::ApplicationError;

    use super::{
        build_client, gemini_body, gemini_text, ollama_body, openai_body, CompletionRequest,
        GeminiResponse, LlmError,
    };

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_instruction: "be a send money agent".to_string(),
            prompt: "User's Latest Input:\n\"hi\"".to_string(),
            temperature: 0.1,
        }
    }

    #[test]
    fn gemini_body_requests_json_output() {
        let body = gemini_body(&request());

        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be a send money agent");
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn gemini_text_joins_candidate_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }]
        }))
        .expect("response");

        assert_eq!(gemini_text(response), "{\"a\":1}");
    }

    #[test]
    fn gemini_text_is_empty_without_candidates() {
        let response: GeminiResponse =
            serde_json::from_value(json!({ "candidates": [] })).expect("response");
        assert_eq!(gemini_text(response), "");
    }

    #[test]
    fn openai_and_ollama_bodies_carry_system_and_user_turns() {
        let openai = openai_body("gpt-4o-mini", &request());
        assert_eq!(openai["response_format"]["type"], "json_object");
        assert_eq!(openai["messages"][0]["role"], "system");
        assert_eq!(openai["messages"][1]["role"], "user");

        let ollama = ollama_body("llama3", &request());
        assert_eq!(ollama["format"], "json");
        assert_eq!(ollama["stream"], false);
    }

    #[test]
    fn llm_errors_map_to_application_errors() {
        assert_eq!(
            ApplicationError::from(LlmError::Timeout { timeout_secs: 12 }),
            ApplicationError::ModelTimeout { timeout_secs: 12 }
        );
        assert!(matches!(
            ApplicationError::from(LlmError::Unavailable("refused".to_string())),
            ApplicationError::ModelUnavailable(_)
        ));
    }

    #[test]
    fn hosted_providers_require_an_api_key() {
        let mut config = AppConfig::default().llm;
        config.provider = LlmProvider::OpenAi;
        assert!(build_client(&config).is_err());

        config.provider = LlmProvider::Ollama;
        config.model = "llama3".to_string();
        let client = build_client(&config).expect("ollama client");
        assert_eq!(client.model(), "llama3");
    }
}
