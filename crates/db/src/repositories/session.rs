use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::{Row, Sqlite, SqliteConnection};

use sendmoney_core::domain::session::SessionFields;

use super::{FieldChange, RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
    ttl: Option<chrono::Duration>,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, ttl: None }
    }

    /// Sessions idle for longer than `ttl` are dropped on their next lookup, and swept
    /// from the table whenever a session is created or written.
    pub fn with_ttl(pool: DbPool, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).ok().filter(|ttl| *ttl > chrono::Duration::zero());
        Self { pool, ttl }
    }

    fn is_expired(&self, touched_at: &str) -> Result<bool, RepositoryError> {
        let Some(ttl) = self.ttl else {
            return Ok(false);
        };
        let touched_at = DateTime::parse_from_rfc3339(touched_at)
            .map_err(|e| RepositoryError::Decode(format!("invalid touched_at: {e}")))?
            .with_timezone(&Utc);
        Ok(Utc::now() - touched_at > ttl)
    }

    async fn sweep_expired(&self, conn: &mut SqliteConnection) -> Result<u64, RepositoryError> {
        let Some(ttl) = self.ttl else {
            return Ok(0);
        };
        let cutoff = timestamp(Utc::now() - ttl);
        let swept = sqlx::query("DELETE FROM session WHERE touched_at < ?")
            .bind(cutoff)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        Ok(swept)
    }
}

/// Fixed-width UTC timestamps so `touched_at` orders lexically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn unavailable_or_database(error: sqlx::Error) -> RepositoryError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            RepositoryError::Unavailable(error.to_string())
        }
        other => RepositoryError::Database(other),
    }
}

async fn touch_session(
    conn: &mut SqliteConnection,
    session_id: &str,
    now: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO session (id, created_at, touched_at)
         VALUES (?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET touched_at = excluded.touched_at",
    )
    .bind(session_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn apply_change(
    conn: &mut SqliteConnection,
    session_id: &str,
    change: &FieldChange,
    now: &str,
) -> Result<(), RepositoryError> {
    match change {
        FieldChange::Set { key, value } => {
            let encoded = serde_json::to_string(value)
                .map_err(|e| RepositoryError::Decode(format!("value for `{key}`: {e}")))?;
            sqlx::query(
                "INSERT INTO session_field (session_id, key, value, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(session_id, key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
            )
            .bind(session_id)
            .bind(key)
            .bind(encoded)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
        FieldChange::Delete { key } => {
            sqlx::query("DELETE FROM session_field WHERE session_id = ? AND key = ?")
                .bind(session_id)
                .bind(key)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn get(&self, session_id: &str) -> Result<Option<SessionFields>, RepositoryError> {
        let session = sqlx::query("SELECT touched_at FROM session WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable_or_database)?;

        let Some(session) = session else {
            return Ok(None);
        };
        let touched_at: String =
            session.try_get("touched_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        if self.is_expired(&touched_at)? {
            sqlx::query("DELETE FROM session WHERE id = ?")
                .bind(session_id)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        let rows = sqlx::query("SELECT key, value FROM session_field WHERE session_id = ?")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        let mut fields = SessionFields::new();
        for row in rows {
            let key: String =
                row.try_get("key").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let raw: String =
                row.try_get("value").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let value: Value = serde_json::from_str(&raw)
                .map_err(|e| RepositoryError::Decode(format!("value for `{key}`: {e}")))?;
            fields.insert(key, value);
        }

        Ok(Some(fields))
    }

    async fn create(&self, session_id: &str) -> Result<(), RepositoryError> {
        let now = timestamp(Utc::now());
        let mut conn = self.pool.acquire().await.map_err(unavailable_or_database)?;
        self.sweep_expired(&mut *conn).await?;
        sqlx::query(
            "INSERT INTO session (id, created_at, touched_at)
             VALUES (?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(session_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await
        .map_err(unavailable_or_database)?;
        Ok(())
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), RepositoryError> {
        self.write_fields(session_id, &[FieldChange::set(key, value)]).await
    }

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), RepositoryError> {
        self.write_fields(session_id, &[FieldChange::delete(key)]).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(unavailable_or_database)?;
        Ok(())
    }

    async fn write_fields(
        &self,
        session_id: &str,
        changes: &[FieldChange],
    ) -> Result<(), RepositoryError> {
        let now = timestamp(Utc::now());
        let mut tx: sqlx::Transaction<'_, Sqlite> =
            self.pool.begin().await.map_err(unavailable_or_database)?;

        self.sweep_expired(&mut *tx).await?;
        touch_session(&mut *tx, session_id, &now).await?;
        for change in changes {
            apply_change(&mut *tx, session_id, change, &now).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
