pub mod sqlite;

pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;

/// A user's in-memory history is dropped after a day without a new turn.
const HISTORY_IDLE: Duration = Duration::from_secs(24 * 60 * 60);

/// One exchange with the assistant. Rich-card answers are stored as their alt text.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub user_message: String,
    pub ai_response: String,
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user_message: impl Into<String>, ai_response: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ai_response: ai_response.into(),
            at: Utc::now(),
        }
    }
}

/// Per-user conversation history, capped to the most recent turns.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, user_id: &str, turn: ConversationTurn) -> Result<()>;

    /// The last `limit` turns, oldest first.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;
}

/// Process-local history for at most `max_users` users, each capped to `cap` turns.
pub struct MemoryHistoryStore {
    cap: usize,
    turns: moka::sync::Cache<String, VecDeque<ConversationTurn>>,
}

impl MemoryHistoryStore {
    pub fn new(cap: usize, max_users: u64) -> Self {
        Self {
            cap: cap.max(1),
            turns: moka::sync::Cache::builder()
                .max_capacity(max_users)
                .time_to_idle(HISTORY_IDLE)
                .build(),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, user_id: &str, turn: ConversationTurn) -> Result<()> {
        self.turns
            .entry(user_id.to_string())
            .and_upsert_with(|existing| {
                let mut log = existing.map(moka::Entry::into_value).unwrap_or_default();
                log.push_back(turn);
                while log.len() > self.cap {
                    log.pop_front();
                }
                log
            });
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .turns
            .get(user_id)
            .map(|log| {
                let skip = log.len().saturating_sub(limit);
                log.into_iter().skip(skip).collect()
            })
            .unwrap_or_default())
    }
}
