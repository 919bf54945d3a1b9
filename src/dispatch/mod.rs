//! Per-event pipeline: dedup, deadline gates, reply-token claim, handler,
//! validation and the reply-then-push send.
//!
//! Every event that survives dedup gets exactly one send attempt chain. A
//! handler error becomes an apology, and a reply failure falls back to push,
//! so the user only hears nothing when both channels fail.

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::channels::MessagingClient;
use crate::deadline::{DeadlinePolicy, DeadlineTracker, Stage};
use crate::delivery::{self, DeliveryOutcome, PayloadLimits, ResponsePayload};
use crate::events::InboundEvent;
use crate::handlers::Handlers;
use crate::idempotency::{DeliveryChannel, EventDeduplicator, ReplyTokenGuard};
use crate::replies::{self, Language};
use crate::telemetry::{self, ErrorReport, ErrorReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Seen before within the retention window; nothing was done.
    Duplicate,
    Delivered(DeliveryChannel),
    /// Both channels failed. Logged, not retried.
    Undelivered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub duplicates: usize,
    pub replied: usize,
    pub pushed: usize,
    pub undelivered: usize,
}

impl BatchSummary {
    fn tally(outcomes: &[EventOutcome]) -> Self {
        let mut summary = Self {
            received: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome {
                EventOutcome::Duplicate => summary.duplicates += 1,
                EventOutcome::Delivered(DeliveryChannel::Reply) => summary.replied += 1,
                EventOutcome::Delivered(DeliveryChannel::Push) => summary.pushed += 1,
                EventOutcome::Undelivered => summary.undelivered += 1,
            }
        }
        summary
    }
}

/// Everything the dispatcher needs, assembled by the caller.
pub struct DispatcherParts {
    pub dedup: EventDeduplicator,
    pub tokens: ReplyTokenGuard,
    pub handlers: Arc<Handlers>,
    pub messenger: Arc<dyn MessagingClient>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub policy: DeadlinePolicy,
    pub limits: PayloadLimits,
    pub default_language: Language,
}

pub struct Dispatcher {
    dedup: EventDeduplicator,
    tokens: ReplyTokenGuard,
    handlers: Arc<Handlers>,
    messenger: Arc<dyn MessagingClient>,
    reporter: Arc<dyn ErrorReporter>,
    policy: DeadlinePolicy,
    limits: PayloadLimits,
    default_language: Language,
}

impl Dispatcher {
    pub fn new(parts: DispatcherParts) -> Self {
        Self {
            dedup: parts.dedup,
            tokens: parts.tokens,
            handlers: parts.handlers,
            messenger: parts.messenger,
            reporter: parts.reporter,
            policy: parts.policy,
            limits: parts.limits,
            default_language: parts.default_language,
        }
    }

    pub fn policy(&self) -> DeadlinePolicy {
        self.policy
    }

    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Process a batch concurrently. Completion order is not arrival order.
    pub async fn dispatch_batch(
        &self,
        events: &[InboundEvent],
        deadline: &DeadlineTracker,
    ) -> BatchSummary {
        let outcomes = join_all(events.iter().map(|event| self.dispatch(event, deadline))).await;
        BatchSummary::tally(&outcomes)
    }

    pub async fn dispatch(&self, event: &InboundEvent, deadline: &DeadlineTracker) -> EventOutcome {
        let identity = event.dedup_key();
        telemetry::record_event(event.label());

        if self.dedup.check_and_record(&identity).await {
            telemetry::record_duplicate();
            info!(
                user_id = %event.user_id,
                identity = %identity,
                redelivery = event.redelivery,
                "dropping duplicate {} event",
                event.label()
            );
            return EventOutcome::Duplicate;
        }

        let lang = self.language_of(event);

        if self.policy.should_fallback(deadline, Stage::Intake) {
            telemetry::record_fallback(Stage::Intake.as_str());
            warn!(
                user_id = %event.user_id,
                identity = %identity,
                "{}ms left before handling, answering by push",
                deadline.remaining().as_millis()
            );
            let payloads = self.late_response(event, lang).await;
            return self
                .send(event, &identity, DeliveryChannel::Push, payloads, lang)
                .await;
        }

        let channel = self.tokens.claim(event.reply_token.as_deref()).await;

        if event.is_media() && self.policy.should_fallback(deadline, Stage::Media) {
            telemetry::record_fallback(Stage::Media.as_str());
            warn!(
                user_id = %event.user_id,
                identity = %identity,
                "not enough time left for {} analysis",
                event.label()
            );
            let payloads = vec![ResponsePayload::text(replies::timeout_notice(lang))];
            return self
                .send(event, &identity, DeliveryChannel::Push, payloads, lang)
                .await;
        }

        self.show_loading(event);

        let payloads = match self.handlers.handle(event, lang).await {
            Ok(payloads) => payloads,
            Err(e) => self.apologize(event, e, lang).await,
        };
        self.send(event, &identity, channel, payloads, lang).await
    }

    fn language_of(&self, event: &InboundEvent) -> Language {
        event.text().map_or(self.default_language, |text| {
            Language::detect(text, self.default_language)
        })
    }

    /// The cheap path once the deadline is close: text still goes through the
    /// text handler, anything slower gets the timeout notice.
    async fn late_response(&self, event: &InboundEvent, lang: Language) -> Vec<ResponsePayload> {
        let Some(text) = event.text() else {
            return vec![ResponsePayload::text(replies::timeout_notice(lang))];
        };
        match self.handlers.handle_text(&event.user_id, text, lang).await {
            Ok(payloads) => payloads,
            Err(e) => self.apologize(event, e, lang).await,
        }
    }

    async fn apologize(
        &self,
        event: &InboundEvent,
        err: anyhow::Error,
        lang: Language,
    ) -> Vec<ResponsePayload> {
        let operation = format!("handle_{}", event.label());
        telemetry::record_handler_error(&operation);
        let report = ErrorReport::new(&event.user_id, operation, event.summary(), &err);
        self.reporter.report(&report).await;
        vec![ResponsePayload::text(replies::apology(lang))]
    }

    /// Fire and forget; the indicator is cosmetic.
    fn show_loading(&self, event: &InboundEvent) {
        let messenger = Arc::clone(&self.messenger);
        let user_id = event.user_id.clone();
        let seconds = event.loading_seconds();
        tokio::spawn(async move {
            if let Err(e) = messenger.show_loading(&user_id, seconds).await {
                debug!("loading indicator for {} failed: {}", user_id, e);
            }
        });
    }

    async fn send(
        &self,
        event: &InboundEvent,
        identity: &str,
        channel: DeliveryChannel,
        payloads: Vec<ResponsePayload>,
        lang: Language,
    ) -> EventOutcome {
        let payloads = delivery::validate(payloads, &self.limits, lang);
        let routes = delivery::plan_routes(channel, event.reply_token.as_deref(), &event.user_id);
        match delivery::deliver(self.messenger.as_ref(), &routes, &payloads).await {
            DeliveryOutcome::Delivered(used) => {
                info!(
                    user_id = %event.user_id,
                    identity = %identity,
                    channel = used.as_str(),
                    "delivered {} payload(s)",
                    payloads.len()
                );
                EventOutcome::Delivered(used)
            }
            DeliveryOutcome::Failed => {
                error!(
                    user_id = %event.user_id,
                    identity = %identity,
                    "could not deliver response on any channel"
                );
                EventOutcome::Undelivered
            }
        }
    }
}

#[cfg(test)]
mod tests;
