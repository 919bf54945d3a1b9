//! Outbound collaborators that produce response content: the generative AI
//! assistant, the weather service and video search.

pub mod errors;
pub mod gemini;
pub mod weather;
pub mod youtube;

pub use gemini::GeminiClient;
pub use weather::OpenWeatherClient;
pub use youtube::YouTubeClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::delivery::ResponsePayload;
use crate::router::{City, ForecastHorizon};
use crate::store::ConversationTurn;

/// Binary content sent alongside a prompt (image, audio, video or document).
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiRequest {
    pub system: Option<String>,
    /// Prior turns, oldest first.
    pub history: Vec<ConversationTurn>,
    pub prompt: String,
    pub attachment: Option<Attachment>,
    /// Public video the assistant should watch, e.g. a YouTube link.
    pub video_uri: Option<String>,
}

impl AiRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    #[must_use]
    pub fn with_video(mut self, uri: impl Into<String>) -> Self {
        self.video_uri = Some(uri.into());
        self
    }
}

/// Generative text assistant.
#[async_trait]
pub trait AiAssistant: Send + Sync {
    async fn generate(&self, request: &AiRequest) -> Result<String>;
}

/// Weather lookups, rendered directly into deliverable payloads.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &City) -> Result<ResponsePayload>;

    async fn forecast(&self, city: &City, horizon: ForecastHorizon) -> Result<ResponsePayload>;

    /// Current conditions at arbitrary coordinates, e.g. a shared location.
    async fn current_at(&self, latitude: f64, longitude: f64) -> Result<ResponsePayload>;
}

/// One video search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoResult {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub url: String,
}

/// Keyword search over a video catalogue, most relevant first.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<VideoResult>>;
}
