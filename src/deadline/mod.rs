use std::time::Duration;
use tokio::time::Instant;

use crate::config::DeliveryConfig;

/// Wall-clock budget for one webhook request.
///
/// Created when the request arrives and shared read-only by every event in the
/// batch. Uses tokio's clock so paused-time tests can drive it.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineTracker {
    started: Instant,
    budget: Duration,
}

impl DeadlineTracker {
    pub fn start(budget: Duration) -> Self {
        Self::started_at(Instant::now(), budget)
    }

    pub fn started_at(started: Instant, budget: Duration) -> Self {
        Self { started, budget }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Budget left, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// True once the remaining budget is at or below `reserve`.
    pub fn should_fallback(&self, reserve: Duration) -> bool {
        self.remaining() <= reserve
    }
}

/// Checkpoints in event processing where the deadline is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Before classification and handler dispatch.
    Intake,
    /// Before fetching and analyzing media content.
    Media,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Media => "media",
        }
    }
}

/// Per-stage reserves: how much budget must remain for a stage to start normally.
#[derive(Debug, Clone, Copy)]
pub struct DeadlinePolicy {
    pub budget: Duration,
    pub intake_reserve: Duration,
    pub media_reserve: Duration,
}

impl DeadlinePolicy {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            budget: config.budget(),
            intake_reserve: Duration::from_millis(config.intake_reserve_ms),
            media_reserve: Duration::from_millis(config.media_reserve_ms),
        }
    }

    pub fn reserve(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Intake => self.intake_reserve,
            Stage::Media => self.media_reserve,
        }
    }

    pub fn start(&self) -> DeadlineTracker {
        DeadlineTracker::start(self.budget)
    }

    pub fn should_fallback(&self, tracker: &DeadlineTracker, stage: Stage) -> bool {
        tracker.should_fallback(self.reserve(stage))
    }
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}
