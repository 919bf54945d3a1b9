use anyhow::Result;
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::errors::KazeError;
use crate::utils::http::error_snippet;

/// Turn a provider response into its JSON body, classifying failures.
///
/// Rate limits and server errors are retryable; everything else, including
/// a 200 that carries an `error` object, is not.
pub async fn check_response(response: Response, provider: &str) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = error_snippet(response).await;
        return Err(api_error(provider, status.as_u16(), &body).into());
    }
    let json: Value = response.json().await.map_err(|e| KazeError::Provider {
        message: format!("{} returned an unreadable body: {}", provider, e),
        retryable: false,
    })?;
    if let Some(err) = json.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| err.to_string(), str::to_string);
        return Err(KazeError::Provider {
            message: format!("{} API error: {}", provider, message),
            retryable: false,
        }
        .into());
    }
    Ok(json)
}

pub(crate) fn api_error(provider: &str, status: u16, body: &str) -> KazeError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .map(|m| m.as_str().map_or_else(|| m.to_string(), str::to_string))
                .or_else(|| v.get("message").and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string());
    KazeError::Provider {
        message: format!("{} API error ({}): {}", provider, status, detail),
        retryable: status == 429 || status >= 500,
    }
}

/// Retry behaviour for provider calls. Every attempt spends the same webhook
/// delivery budget, so the defaults allow one quick second try.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(300),
        }
    }
}

/// Rate limits, server errors and refused connections; not timeouts.
fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(kaze) = err.downcast_ref::<KazeError>() {
        return kaze.is_retryable();
    }
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .is_some_and(reqwest::Error::is_connect)
    })
}

/// Run `call`, repeating it after transient failures.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, provider: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries && is_transient(&e) => {
                attempt += 1;
                warn!(
                    "{} request failed, retry {}/{}: {}",
                    provider, attempt, config.max_retries, e
                );
                tokio::time::sleep(config.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
