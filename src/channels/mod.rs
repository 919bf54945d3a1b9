pub mod line;

pub use line::LineClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::delivery::ResponsePayload;
use crate::errors::KazeResult;

/// Downloaded message content (image, audio, video or file).
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedContent {
    Content {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    /// The content exceeds the size cap and was not downloaded.
    TooLarge,
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Answer through a single-use reply token.
    async fn reply(&self, reply_token: &str, payloads: &[ResponsePayload]) -> KazeResult<()>;

    /// Send to a user directly, independent of any reply token.
    async fn push(&self, user_id: &str, payloads: &[ResponsePayload]) -> KazeResult<()>;

    async fn fetch_content(&self, message_id: &str, max_bytes: usize) -> Result<FetchedContent>;

    /// Show a typing/loading indicator. Default is a no-op for platforms without one.
    async fn show_loading(&self, _user_id: &str, _seconds: u32) -> Result<()> {
        Ok(())
    }
}
