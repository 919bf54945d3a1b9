use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{FetchedContent, MessagingClient};
use crate::config::LineConfig;
use crate::delivery::ResponsePayload;
use crate::errors::{KazeError, KazeResult};
use crate::utils::http::{error_snippet, http_client, limited_body};

/// LINE Messaging API client.
pub struct LineClient {
    client: Client,
    access_token: String,
    api_base: String,
    data_api_base: String,
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            client: http_client(Duration::from_secs(10)),
            access_token: config.channel_access_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            data_api_base: config.data_api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn post_json(&self, path: &str, body: &Value) -> KazeResult<Response> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!(e).context(format!("LINE request to {} failed", path)))?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(api_error(response).await)
    }
}

/// Map a non-2xx response. A 400 that names the reply token means the token
/// is spent or expired, which callers handle by falling back to push.
async fn api_error(response: Response) -> KazeError {
    let status = response.status();
    let body = error_snippet(response).await;
    if status == StatusCode::BAD_REQUEST && body.to_lowercase().contains("reply token") {
        return KazeError::ReplyTokenRejected(body);
    }
    KazeError::Delivery {
        status: status.as_u16(),
        message: body,
    }
}

/// LINE accepts loading durations of 5..=60 seconds in steps of 5.
fn loading_seconds(seconds: u32) -> u32 {
    (seconds.div_ceil(5) * 5).clamp(5, 60)
}

#[async_trait]
impl MessagingClient for LineClient {
    async fn reply(&self, reply_token: &str, payloads: &[ResponsePayload]) -> KazeResult<()> {
        let body = json!({ "replyToken": reply_token, "messages": payloads });
        self.post_json("/v2/bot/message/reply", &body).await?;
        debug!("replied with {} message(s)", payloads.len());
        Ok(())
    }

    async fn push(&self, user_id: &str, payloads: &[ResponsePayload]) -> KazeResult<()> {
        let body = json!({ "to": user_id, "messages": payloads });
        self.post_json("/v2/bot/message/push", &body).await?;
        debug!("pushed {} message(s) to {}", payloads.len(), user_id);
        Ok(())
    }

    async fn fetch_content(&self, message_id: &str, max_bytes: usize) -> Result<FetchedContent> {
        let url = format!(
            "{}/v2/bot/message/{}/content",
            self.data_api_base, message_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = error_snippet(response).await;
            return Err(anyhow!("LINE content API error ({}): {}", status, body));
        }
        if response
            .content_length()
            .is_some_and(|len| len as usize > max_bytes)
        {
            return Ok(FetchedContent::TooLarge);
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let (bytes, truncated) = limited_body(response, max_bytes).await?;
        if truncated {
            return Ok(FetchedContent::TooLarge);
        }
        Ok(FetchedContent::Content {
            bytes,
            content_type,
        })
    }

    async fn show_loading(&self, user_id: &str, seconds: u32) -> Result<()> {
        let body = json!({ "chatId": user_id, "loadingSeconds": loading_seconds(seconds) });
        self.post_json("/v2/bot/chat/loading/start", &body)
            .await
            .map_err(|e| anyhow!("loading indicator failed: {}", e))?;
        Ok(())
    }
}
