use serde_json::{Map, Value};
use tera::{Context, Tera};
use thiserror::Error;

use sendmoney_core::catalog::{default_promo, COUNTRY_CURRENCIES, DELIVERY_METHODS, SUPPORTED_COUNTRIES};
use sendmoney_core::domain::chat::Message;
use sendmoney_core::domain::transfer::TransferState;

const SYSTEM_INSTRUCTION_TEMPLATE: &str =
    include_str!("../../../templates/agent/system_instruction.md");

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const EMPTY_HISTORY: &str = "No previous messages.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("system instruction template failed: {0}")]
    Template(#[from] tera::Error),
    #[error("prompt state could not be serialized: {0}")]
    State(#[from] serde_json::Error),
}

/// Renders the agent's system instruction with the catalog interpolated.
pub fn render_system_instruction() -> Result<String, PromptError> {
    let mut tera = Tera::default();
    tera.add_raw_template("system_instruction", SYSTEM_INSTRUCTION_TEMPLATE)?;

    let currencies = COUNTRY_CURRENCIES
        .iter()
        .map(|(country, currency)| (country.to_string(), Value::String(currency.to_string())))
        .collect::<Map<String, Value>>();

    let mut context = Context::new();
    context.insert("countries", &SUPPORTED_COUNTRIES.join(", "));
    context.insert("methods", &DELIVERY_METHODS.join(", "));
    context.insert("currencies", &serde_json::to_string(&currencies)?);
    context.insert("promo", &default_promo());

    Ok(tera.render("system_instruction", &context)?)
}

/// Per-turn model input: current state, recent transcript and the latest message.
#[derive(Clone, Debug)]
pub struct PromptContext<'a> {
    pub user_message: &'a str,
    pub state: &'a TransferState,
    pub history: &'a [Message],
    pub history_limit: usize,
}

impl<'a> PromptContext<'a> {
    pub fn new(user_message: &'a str, state: &'a TransferState, history: &'a [Message]) -> Self {
        Self { user_message, state, history, history_limit: DEFAULT_HISTORY_LIMIT }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn render(&self) -> Result<String, PromptError> {
        let state = serde_json::to_string_pretty(self.state)?;

        let skip = self.history.len().saturating_sub(self.history_limit);
        let transcript = self.history[skip..]
            .iter()
            .map(|message| {
                format!("{}: {}", message.role.as_str().to_ascii_uppercase(), message.content)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let transcript = if transcript.is_empty() { EMPTY_HISTORY.to_string() } else { transcript };

        Ok(format!(
            "Current Internal State:\n{state}\n\nConversation History:\n{transcript}\n\nUser's Latest Input:\n\"{}\"",
            self.user_message
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use sendmoney_core::catalog::{PROMO_IMAGE_URL, PROMO_LINK};
    use sendmoney_core::domain::chat::{Message, Role};
    use sendmoney_core::domain::transfer::TransferState;

    use super::{render_system_instruction, PromptContext, EMPTY_HISTORY};

    fn message(index: usize, role: Role) -> Message {
        Message {
            id: format!("m-{index}"),
            role,
            content: format!("message {index}"),
            timestamp: Utc.with_ymd_and_hms(2025, 12, 1, 10, 0, 0).single().expect("timestamp"),
            promo: None,
        }
    }

    #[test]
    fn system_instruction_interpolates_catalog() {
        let instruction = render_system_instruction().expect("render");

        assert!(instruction.contains("Supported Countries: USA, Mexico, India"));
        assert!(instruction.contains("Bank Deposit, Cash Pickup, Mobile Wallet"));
        assert!(instruction.contains("\"Brazil\":\"BRL\""));
        assert!(instruction.contains(PROMO_IMAGE_URL));
        assert!(instruction.contains(PROMO_LINK));
        assert!(!instruction.contains("{{"));
    }

    #[test]
    fn empty_history_uses_placeholder() {
        let state = TransferState::default();
        let prompt = PromptContext::new("hello", &state, &[]).render().expect("render");

        assert!(prompt.starts_with("Current Internal State:\n{\n  \"destinationCountry\": null,"));
        assert!(prompt.contains(&format!("Conversation History:\n{EMPTY_HISTORY}\n\n")));
        assert!(prompt.ends_with("User's Latest Input:\n\"hello\""));
    }

    #[test]
    fn history_is_capped_to_most_recent_entries() {
        let history = (0..14)
            .map(|index| message(index, if index % 2 == 0 { Role::User } else { Role::Agent }))
            .collect::<Vec<_>>();
        let state = TransferState::default();

        let prompt = PromptContext::new("next", &state, &history).render().expect("render");

        assert!(!prompt.contains("message 3\n"));
        assert!(prompt.contains("USER: message 4\nAGENT: message 5"));
        assert!(prompt.contains("AGENT: message 13\n\nUser's Latest Input:"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let state = TransferState {
            destination_country: Some("Japan".to_string()),
            ..TransferState::default()
        };
        let history = vec![message(1, Role::User)];
        let context = PromptContext::new("500", &state, &history).with_history_limit(5);

        assert_eq!(context.render().expect("first"), context.render().expect("second"));
    }
}
