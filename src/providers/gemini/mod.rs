use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::errors::{RetryConfig, check_response, with_retry};
use super::{AiAssistant, AiRequest};
use crate::config::GeminiConfig;
use crate::telemetry;
use crate::utils::http::http_client;

// The whole call has to fit inside the webhook delivery budget.
const REQUEST_TIMEOUT_SECS: u64 = 18;
const MAX_OUTPUT_TOKENS: u32 = 1024;
const TEMPERATURE: f64 = 0.7;

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    retry: RetryConfig,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            client: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
            retry: RetryConfig::default(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_payload(request: &AiRequest) -> Value {
        let mut contents: Vec<Value> = Vec::with_capacity(request.history.len() * 2 + 1);
        for turn in &request.history {
            contents.push(json!({"role": "user", "parts": [{"text": turn.user_message}]}));
            contents.push(json!({"role": "model", "parts": [{"text": turn.ai_response}]}));
        }

        let mut parts = vec![json!({"text": request.prompt})];
        if let Some(uri) = &request.video_uri {
            parts.push(json!({"file_data": {"file_uri": uri}}));
        }
        if let Some(attachment) = &request.attachment {
            parts.push(json!({
                "inline_data": {
                    "mime_type": attachment.mime_type,
                    "data": BASE64.encode(&attachment.data)
                }
            }));
        }
        contents.push(json!({"role": "user", "parts": parts}));

        let mut payload = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
                "temperature": TEMPERATURE,
            },
        });
        if let Some(system) = &request.system {
            payload["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        payload
    }

    fn parse_response(json: &Value) -> Result<String> {
        let candidate = json["candidates"]
            .as_array()
            .and_then(|arr| arr.first())
            .context("No candidates in Gemini response")?;

        let text: String = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            let reason = candidate["finishReason"].as_str().unwrap_or("unknown");
            anyhow::bail!("Gemini returned no text (finish reason: {})", reason);
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl AiAssistant for GeminiClient {
    async fn generate(&self, request: &AiRequest) -> Result<String> {
        let payload = Self::build_payload(request);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let client = &self.client;
        let (url, payload) = (&url, &payload);
        let json = with_retry(self.retry, "Gemini", move || async move {
            telemetry::record_ai_request();
            let resp = client
                .post(url)
                .json(payload)
                .send()
                .await
                .context("Failed to send request to Gemini API")?;
            check_response(resp, "Gemini").await
        })
        .await?;
        if let Some(tokens) = json["usageMetadata"]["totalTokenCount"].as_u64() {
            debug!("gemini call used {} tokens", tokens);
        }
        Self::parse_response(&json)
    }
}
