//! HTTP surface: the platform webhook plus health, status and metrics.
//!
//! The webhook answers only after every event in the batch has been
//! dispatched, so the platform's request timeout is the budget the
//! deadline tracker works against.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::events::WebhookBatch;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-line-signature";

const FEATURES: &[&str] = &[
    "weather",
    "time",
    "assistant",
    "media",
    "video",
    "location",
    "postback",
];

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct GatewayState {
    dispatcher: Arc<Dispatcher>,
    channel_secret: Option<Arc<str>>,
    metrics: Option<PrometheusHandle>,
    cities: Arc<[String]>,
}

impl GatewayState {
    /// An empty `channel_secret` disables signature checks.
    pub fn new(dispatcher: Arc<Dispatcher>, channel_secret: &str) -> Self {
        let cities = dispatcher
            .handlers()
            .cities()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        Self {
            dispatcher,
            channel_secret: (!channel_secret.is_empty()).then(|| Arc::from(channel_secret)),
            metrics: None,
            cities,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn build_router(state: GatewayState, webhook_path: &str, max_body_bytes: usize) -> Router {
    Router::new()
        .route(webhook_path, post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state, &config.webhook_path, config.max_body_bytes);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("webhook gateway listening on {}{}", addr, config.webhook_path);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server error")?;
    info!("webhook gateway stopped");
    Ok(())
}

/// POST {webhookPath}: verify, parse, dispatch every event, then acknowledge.
async fn webhook_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let deadline = state.dispatcher.policy().start();

    if let Some(secret) = state.channel_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !validate_signature(secret, signature, &body) {
            warn!("webhook signature missing or invalid");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "invalid signature"})),
            )
                .into_response();
        }
    }

    let batch = match WebhookBatch::parse(&body) {
        Ok(batch) => batch,
        Err(e) => {
            error!("rejecting webhook batch: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "malformed webhook batch"})),
            )
                .into_response();
        }
    };

    let destination = batch
        .destination
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let events = batch.into_events();
    if events.is_empty() {
        debug!("webhook batch for {} carried no handleable events", destination);
        return (StatusCode::OK, "OK").into_response();
    }

    let summary = state.dispatcher.dispatch_batch(&events, &deadline).await;
    info!(
        "batch for {} done in {}ms: {} received, {} duplicate, {} replied, {} pushed, {} undelivered",
        destination,
        deadline.elapsed().as_millis(),
        summary.received,
        summary.duplicates,
        summary.replied,
        summary.pushed,
        summary.undelivered
    );
    (StatusCode::OK, "OK").into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn status_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(json!({
        "bot": "kazebot",
        "version": crate::VERSION,
        "features": FEATURES,
        "cities": &*state.cities,
    }))
}

async fn metrics_handler(State(state): State<GatewayState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Check a base64 HMAC-SHA256 signature of `body`.
pub fn validate_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(provided) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    expected.as_slice().ct_eq(&provided).into()
}

/// Base64 HMAC-SHA256 of `body`, as the platform would sign it.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
