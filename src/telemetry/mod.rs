//! Usage counters and error reporting.
//!
//! Counters go through the `metrics` facade and are no-ops until a recorder
//! is installed, so library code and tests never depend on one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::Value;
use tracing::error;

/// A failed handler run, with enough context to find the message later.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub user_id: String,
    pub operation: String,
    pub payload: Value,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(
        user_id: impl Into<String>,
        operation: impl Into<String>,
        payload: Value,
        err: &anyhow::Error,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            operation: operation.into(),
            payload,
            message: format!("{:#}", err),
            at: Utc::now(),
        }
    }
}

/// Error-tracking collaborator. Reporting never fails from the caller's point of view.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, report: &ErrorReport);
}

/// Reporter that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

#[async_trait]
impl ErrorReporter for LogReporter {
    async fn report(&self, report: &ErrorReport) {
        error!(
            user_id = %report.user_id,
            operation = %report.operation,
            "handler failed: {}",
            report.message
        );
    }
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

pub fn record_event(label: &str) {
    counter!("kazebot_events_total", "kind" => label.to_string()).increment(1);
}

pub fn record_duplicate() {
    counter!("kazebot_duplicates_total").increment(1);
}

pub fn record_fallback(stage: &'static str) {
    counter!("kazebot_deadline_fallbacks_total", "stage" => stage).increment(1);
}

pub fn record_delivery(channel: &'static str, outcome: &'static str) {
    counter!("kazebot_deliveries_total", "channel" => channel, "outcome" => outcome).increment(1);
}

pub fn record_handler_error(operation: &str) {
    counter!("kazebot_handler_errors_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_ai_request() {
    counter!("kazebot_ai_requests_total").increment(1);
}

pub fn record_video_search() {
    counter!("kazebot_video_searches_total").increment(1);
}
