//! Short-lived per-user conversation state.
//!
//! A user's context remembers two things between messages: an action the
//! bot is waiting on (a city for a weather question) and the last city the
//! user talked about. Both go stale after a fixed TTL. Staleness is checked
//! lazily on read; an expired record is deleted and reported as empty. The
//! in-memory store also evicts records on its own once they outlive the TTL,
//! so users who never come back do not accumulate.
//!
//! Reads and writes for one user are not serialized. Two messages from the
//! same user processed concurrently can interleave their read and write, in
//! which case the last write wins.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Users tracked at once by [`ContextManager::in_memory`].
pub const DEFAULT_MAX_USERS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingAction {
    #[serde(rename = "awaiting-city-for-weather")]
    AwaitingCityForWeather,
}

impl PendingAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PendingAction::AwaitingCityForWeather => "awaiting-city-for-weather",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "awaiting-city-for-weather" => Some(PendingAction::AwaitingCityForWeather),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextState {
    #[serde(default)]
    pub pending_action: Option<PendingAction>,
    #[serde(default)]
    pub last_mentioned_entity: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContextState {
    pub fn is_empty(&self) -> bool {
        self.pending_action.is_none() && self.last_mentioned_entity.is_none()
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.updated_at.is_some_and(|at| now - at > ttl)
    }
}

/// Fields to write. `None` means "leave as is" under merge and "unset" under replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    pub pending_action: Option<PendingAction>,
    pub last_mentioned_entity: Option<String>,
}

impl ContextPatch {
    pub fn pending(action: PendingAction) -> Self {
        Self {
            pending_action: Some(action),
            last_mentioned_entity: None,
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            pending_action: None,
            last_mentioned_entity: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending_action.is_none() && self.last_mentioned_entity.is_none()
    }

    fn into_state(self, at: DateTime<Utc>) -> ContextState {
        ContextState {
            pending_action: self.pending_action,
            last_mentioned_entity: self.last_mentioned_entity,
            updated_at: Some(at),
        }
    }
}

/// How a classified message changes the user's context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextUpdate {
    Keep,
    Clear,
    Merge(ContextPatch),
    Replace(ContextPatch),
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<ContextState>>;

    /// Overlay the set fields of `patch` onto the stored record (creating it if absent).
    async fn merge(&self, user_id: &str, patch: &ContextPatch, at: DateTime<Utc>) -> Result<()>;

    async fn replace(&self, user_id: &str, state: &ContextState) -> Result<()>;

    async fn delete(&self, user_id: &str) -> Result<()>;
}

/// Process-local context records. Each write restarts the record's
/// time-to-live; past it, or past `max_users`, moka evicts the record
/// without waiting for a read.
pub struct MemoryContextStore {
    records: moka::sync::Cache<String, ContextState>,
}

impl MemoryContextStore {
    pub fn new(ttl: std::time::Duration, max_users: u64) -> Self {
        Self {
            records: moka::sync::Cache::builder()
                .max_capacity(max_users)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn load(&self, user_id: &str) -> Result<Option<ContextState>> {
        Ok(self.records.get(user_id))
    }

    async fn merge(&self, user_id: &str, patch: &ContextPatch, at: DateTime<Utc>) -> Result<()> {
        self.records
            .entry(user_id.to_string())
            .and_upsert_with(|existing| {
                let mut record = existing.map(moka::Entry::into_value).unwrap_or_default();
                if let Some(action) = patch.pending_action {
                    record.pending_action = Some(action);
                }
                if let Some(entity) = &patch.last_mentioned_entity {
                    record.last_mentioned_entity = Some(entity.clone());
                }
                record.updated_at = Some(at);
                record
            });
        Ok(())
    }

    async fn replace(&self, user_id: &str, state: &ContextState) -> Result<()> {
        self.records.insert(user_id.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        self.records.invalidate(user_id);
        Ok(())
    }
}

/// TTL-aware front for a [`ContextStore`].
#[derive(Clone)]
pub struct ContextManager {
    store: Arc<dyn ContextStore>,
    ttl: Duration,
}

impl ContextManager {
    pub fn new(store: Arc<dyn ContextStore>, ttl: std::time::Duration) -> Self {
        Self {
            store,
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    pub fn in_memory(ttl: std::time::Duration) -> Self {
        Self::new(Arc::new(MemoryContextStore::new(ttl, DEFAULT_MAX_USERS)), ttl)
    }

    pub async fn get(&self, user_id: &str) -> Result<ContextState> {
        self.get_at(user_id, Utc::now()).await
    }

    /// Read the context as of `now`. A record older than the TTL is deleted
    /// and an empty state returned.
    pub async fn get_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<ContextState> {
        match self.store.load(user_id).await? {
            Some(state) if state.is_expired(now, self.ttl) => {
                debug!("context for {} expired, clearing", user_id);
                self.store.delete(user_id).await?;
                Ok(ContextState::default())
            }
            Some(state) => Ok(state),
            None => Ok(ContextState::default()),
        }
    }

    pub async fn set(&self, user_id: &str, patch: &ContextPatch) -> Result<()> {
        self.set_at(user_id, patch, Utc::now()).await
    }

    pub async fn set_at(
        &self,
        user_id: &str,
        patch: &ContextPatch,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store.merge(user_id, patch, now).await
    }

    pub async fn clear(&self, user_id: &str) -> Result<()> {
        self.store.delete(user_id).await
    }

    pub async fn apply(&self, user_id: &str, update: ContextUpdate) -> Result<()> {
        self.apply_at(user_id, update, Utc::now()).await
    }

    pub async fn apply_at(
        &self,
        user_id: &str,
        update: ContextUpdate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match update {
            ContextUpdate::Keep => Ok(()),
            ContextUpdate::Clear => self.clear(user_id).await,
            ContextUpdate::Merge(patch) => self.set_at(user_id, &patch, now).await,
            ContextUpdate::Replace(patch) if patch.is_empty() => self.clear(user_id).await,
            ContextUpdate::Replace(patch) => {
                self.store.replace(user_id, &patch.into_state(now)).await
            }
        }
    }
}

#[cfg(test)]
mod tests;
