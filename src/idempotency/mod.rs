//! First-writer-wins bookkeeping for webhook redeliveries and reply tokens.
//!
//! Both guards sit on an [`ExpiringKeySet`]: an atomic insert-if-absent over
//! keys that expire after a fixed retention. The in-process implementation is
//! backed by moka; a shared KV store can implement the same trait for
//! multi-instance deployments.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ExpiringKeySet: Send + Sync {
    /// Insert `key` unless it is already present and unexpired.
    ///
    /// Returns `true` only for the caller that inserted it.
    async fn insert_if_absent(&self, key: &str) -> bool;
}

/// Process-local key set with per-entry time-to-live.
pub struct MemoryKeySet {
    cache: moka::sync::Cache<String, ()>,
}

impl MemoryKeySet {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        Self {
            cache: moka::sync::Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl ExpiringKeySet for MemoryKeySet {
    async fn insert_if_absent(&self, key: &str) -> bool {
        self.cache.entry(key.to_string()).or_insert(()).is_fresh()
    }
}

/// Drops events whose identity was already seen within the retention window.
#[derive(Clone)]
pub struct EventDeduplicator {
    seen: Arc<dyn ExpiringKeySet>,
}

impl EventDeduplicator {
    pub fn new(seen: Arc<dyn ExpiringKeySet>) -> Self {
        Self { seen }
    }

    pub fn in_memory(retention: Duration, max_entries: u64) -> Self {
        Self::new(Arc::new(MemoryKeySet::new(retention, max_entries)))
    }

    /// Record `identity`; returns `true` if it had been recorded before.
    pub async fn check_and_record(&self, identity: &str) -> bool {
        let duplicate = !self.seen.insert_if_absent(identity).await;
        if duplicate {
            debug!("duplicate event {}", identity);
        }
        duplicate
    }
}

/// Where a response for an event will be sent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryChannel {
    Reply,
    Push,
}

impl DeliveryChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryChannel::Reply => "reply",
            DeliveryChannel::Push => "push",
        }
    }
}

/// Ensures each reply token is claimed at most once across the process.
#[derive(Clone)]
pub struct ReplyTokenGuard {
    used: Arc<dyn ExpiringKeySet>,
}

impl ReplyTokenGuard {
    pub fn new(used: Arc<dyn ExpiringKeySet>) -> Self {
        Self { used }
    }

    pub fn in_memory(retention: Duration, max_entries: u64) -> Self {
        Self::new(Arc::new(MemoryKeySet::new(retention, max_entries)))
    }

    /// Claim the token if nobody has. Losers and token-less events go to push.
    pub async fn claim(&self, reply_token: Option<&str>) -> DeliveryChannel {
        match reply_token {
            Some(token) if self.used.insert_if_absent(token).await => DeliveryChannel::Reply,
            Some(token) => {
                debug!("reply token {} already claimed, using push", token);
                DeliveryChannel::Push
            }
            None => DeliveryChannel::Push,
        }
    }
}
