use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::transfer::{PromoData, TransferState};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub promo: Option<PromoData>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_message: String,
    #[serde(default)]
    pub current_state: Option<TransferState>,
    #[serde(default)]
    pub message_history: Vec<Message>,
}

impl ChatRequest {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self { user_message: user_message.into(), current_state: None, message_history: Vec::new() }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.user_message.trim().is_empty() {
            return Err(DomainError::RequestValidation(
                "userMessage must contain at least one non-whitespace character".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub agent_response: String,
    pub updated_state: TransferState,
    pub promo: Option<PromoData>,
}
