use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use sendmoney_core::domain::session::SessionFields;

pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// One key-level mutation of a session, applied by [`SessionRepository::write_fields`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldChange {
    Set { key: String, value: Value },
    Delete { key: String },
}

impl FieldChange {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self::Set { key: key.into(), value }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Stored fields, or `None` when the session does not exist (or has expired).
    async fn get(&self, session_id: &str) -> Result<Option<SessionFields>, RepositoryError>;

    /// Creates an empty session. Creating an existing session leaves its fields untouched.
    async fn create(&self, session_id: &str) -> Result<(), RepositoryError>;

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), RepositoryError>;

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), RepositoryError>;

    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn load_or_create(&self, session_id: &str) -> Result<SessionFields, RepositoryError> {
        if let Some(fields) = self.get(session_id).await? {
            return Ok(fields);
        }
        self.create(session_id).await?;
        Ok(SessionFields::new())
    }

    async fn write_fields(
        &self,
        session_id: &str,
        changes: &[FieldChange],
    ) -> Result<(), RepositoryError> {
        for change in changes {
            match change {
                FieldChange::Set { key, value } => self.set(session_id, key, value.clone()).await?,
                FieldChange::Delete { key } => self.delete(session_id, key).await?,
            }
        }
        Ok(())
    }
}
