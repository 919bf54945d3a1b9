use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{ConversationTurn, HistoryStore};
use crate::context::{ContextPatch, ContextState, ContextStore, PendingAction};
use crate::telemetry::{ErrorReport, ErrorReporter, LogReporter};

/// SQLite-backed context, history and error log.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    history_cap: usize,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>, history_cap: usize) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create database parent directory: {}",
                    parent.display()
                )
            })?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at: {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;",
        )?;
        Self::with_connection(conn, history_cap)
    }

    pub fn open_in_memory(history_cap: usize) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, history_cap)
    }

    fn with_connection(conn: Connection, history_cap: usize) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            history_cap: history_cap.max(1),
        };
        store
            .ensure_schema()
            .context("Failed to initialize database schema")?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("DB lock poisoned: {}", e))
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_context (
                user_id TEXT PRIMARY KEY,
                pending_action TEXT,
                last_entity TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS conversation_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                user_message TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_turns_user ON conversation_turns(user_id, id);
            CREATE TABLE IF NOT EXISTS error_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                operation TEXT NOT NULL,
                payload TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Most recent error reports, newest first.
    pub fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorReport>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, operation, payload, message, created_at
             FROM error_log ORDER BY id DESC LIMIT ?",
        )?;
        let rows: Result<Vec<_>, _> = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect();
        rows?
            .into_iter()
            .map(|(user_id, operation, payload, message, at)| {
                Ok(ErrorReport {
                    user_id,
                    operation,
                    payload: serde_json::from_str(&payload).unwrap_or_default(),
                    message,
                    at: parse_timestamp(&at)?,
                })
            })
            .collect()
    }

    fn insert_error(&self, report: &ErrorReport) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO error_log (user_id, operation, payload, message, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                report.user_id,
                report.operation,
                report.payload.to_string(),
                report.message,
                report.at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("bad timestamp in database: {}", value))?
        .with_timezone(&Utc))
}

#[async_trait]
impl ContextStore for SqliteStore {
    async fn load(&self, user_id: &str) -> Result<Option<ContextState>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT pending_action, last_entity, updated_at FROM user_context WHERE user_id = ?",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((pending, entity, updated_at)) = row else {
            return Ok(None);
        };
        Ok(Some(ContextState {
            pending_action: pending.as_deref().and_then(PendingAction::parse),
            last_mentioned_entity: entity,
            updated_at: Some(parse_timestamp(&updated_at)?),
        }))
    }

    async fn merge(&self, user_id: &str, patch: &ContextPatch, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_context (user_id, pending_action, last_entity, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                pending_action = COALESCE(excluded.pending_action, user_context.pending_action),
                last_entity = COALESCE(excluded.last_entity, user_context.last_entity),
                updated_at = excluded.updated_at",
            params![
                user_id,
                patch.pending_action.map(PendingAction::as_str),
                patch.last_mentioned_entity,
                at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn replace(&self, user_id: &str, state: &ContextState) -> Result<()> {
        let conn = self.lock()?;
        let at = state.updated_at.unwrap_or_else(Utc::now);
        conn.execute(
            "INSERT OR REPLACE INTO user_context (user_id, pending_action, last_entity, updated_at)
             VALUES (?, ?, ?, ?)",
            params![
                user_id,
                state.pending_action.map(PendingAction::as_str),
                state.last_mentioned_entity,
                at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM user_context WHERE user_id = ?", [user_id])?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn append(&self, user_id: &str, turn: ConversationTurn) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversation_turns (user_id, user_message, ai_response, created_at)
             VALUES (?, ?, ?, ?)",
            params![
                user_id,
                turn.user_message,
                turn.ai_response,
                turn.at.to_rfc3339()
            ],
        )?;
        let trimmed = conn.execute(
            "DELETE FROM conversation_turns
             WHERE user_id = ?1 AND id NOT IN (
                SELECT id FROM conversation_turns WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![user_id, self.history_cap as i64],
        )?;
        if trimmed > 0 {
            debug!("trimmed {} old turns for {}", trimmed, user_id);
        }
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_message, ai_response, created_at FROM conversation_turns
             WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )?;
        let rows: Result<Vec<_>, _> = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect();
        let mut turns = rows?
            .into_iter()
            .map(|(user_message, ai_response, at)| {
                Ok(ConversationTurn {
                    user_message,
                    ai_response,
                    at: parse_timestamp(&at)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        turns.reverse();
        Ok(turns)
    }
}

#[async_trait]
impl ErrorReporter for SqliteStore {
    async fn report(&self, report: &ErrorReport) {
        LogReporter.report(report).await;
        if let Err(e) = self.insert_error(report) {
            warn!("failed to persist error report: {}", e);
        }
    }
}

#[cfg(test)]
mod tests;
