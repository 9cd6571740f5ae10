use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;

use sendmoney_core::domain::session::SessionFields;

use super::{FieldChange, RepositoryError, SessionRepository};

struct StoredSession {
    fields: SessionFields,
    touched_at: Instant,
}

impl StoredSession {
    fn new() -> Self {
        Self { fields: SessionFields::new(), touched_at: Instant::now() }
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, StoredSession>>,
    ttl: Option<Duration>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions idle for longer than `ttl` are dropped on their next lookup, and swept
    /// from the map whenever a session is created or written.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { sessions: RwLock::default(), ttl: Some(ttl).filter(|ttl| !ttl.is_zero()) }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn is_expired(&self, session: &StoredSession) -> bool {
        self.ttl.map(|ttl| session.touched_at.elapsed() > ttl).unwrap_or(false)
    }

    fn sweep_expired(&self, sessions: &mut HashMap<String, StoredSession>) {
        if self.ttl.is_some() {
            sessions.retain(|_, session| !self.is_expired(session));
        }
    }

    fn apply(session: &mut StoredSession, change: &FieldChange) {
        match change {
            FieldChange::Set { key, value } => {
                session.fields.insert(key.clone(), value.clone());
            }
            FieldChange::Delete { key } => {
                session.fields.remove(key);
            }
        }
        session.touched_at = Instant::now();
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get(&self, session_id: &str) -> Result<Option<SessionFields>, RepositoryError> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                None => return Ok(None),
                Some(session) if !self.is_expired(session) => {
                    return Ok(Some(session.fields.clone()))
                }
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions.get(session_id).map(|session| self.is_expired(session)).unwrap_or(false) {
            sessions.remove(session_id);
        }
        Ok(sessions.get(session_id).map(|session| session.fields.clone()))
    }

    async fn create(&self, session_id: &str) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        self.sweep_expired(&mut sessions);
        sessions.entry(session_id.to_string()).or_insert_with(StoredSession::new);
        Ok(())
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), RepositoryError> {
        self.write_fields(session_id, &[FieldChange::set(key, value)]).await
    }

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), RepositoryError> {
        self.write_fields(session_id, &[FieldChange::delete(key)]).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn write_fields(
        &self,
        session_id: &str,
        changes: &[FieldChange],
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        self.sweep_expired(&mut sessions);
        let session = sessions.entry(session_id.to_string()).or_insert_with(StoredSession::new);
        for change in changes {
            Self::apply(session, change);
        }
        Ok(())
    }
}
