//! Inbound webhook events.
//!
//! The platform posts a batch `{"destination": ..., "events": [...]}`. The
//! batch envelope must parse; individual events that are not messages or
//! postbacks (follow, unfollow, join, ...) or that lack a user id are skipped.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::errors::{KazeError, KazeResult};
use crate::utils::truncate_chars;

#[derive(Debug, Deserialize)]
pub struct WebhookBatch {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    events: Option<Vec<Value>>,
}

impl WebhookBatch {
    pub fn parse(body: &[u8]) -> KazeResult<Self> {
        serde_json::from_slice(body).map_err(|e| KazeError::MalformedBatch(e.to_string()))
    }

    /// Decode each raw event on its own, dropping the ones the bot does not handle.
    pub fn into_events(self) -> Vec<InboundEvent> {
        self.events
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<RawEvent>(raw) {
                Ok(event) => InboundEvent::from_raw(event),
                Err(e) => {
                    debug!("skipping undecodable webhook event: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    File,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Text(String),
    Media {
        kind: MediaKind,
        message_id: String,
        file_name: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        title: Option<String>,
        address: Option<String>,
    },
    /// A message type the bot has no handler for (stickers, for instance).
    Unsupported { message_type: String },
    Postback { data: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user_id: String,
    pub reply_token: Option<String>,
    /// Platform timestamp in milliseconds.
    pub timestamp: i64,
    pub payload: EventPayload,
    pub redelivery: bool,
}

impl InboundEvent {
    /// `"{replyToken or userId}_{timestamp}"`, the key used to drop redeliveries.
    pub fn dedup_key(&self) -> String {
        let anchor = self.reply_token.as_deref().unwrap_or(&self.user_id);
        format!("{}_{}", anchor, self.timestamp)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self.payload, EventPayload::Media { .. })
    }

    /// Short label for logs, metrics and error reports.
    pub fn label(&self) -> &str {
        match &self.payload {
            EventPayload::Text(_) => "text",
            EventPayload::Media { kind, .. } => kind.as_str(),
            EventPayload::Location { .. } => "location",
            EventPayload::Unsupported { message_type } => message_type,
            EventPayload::Postback { .. } => "postback",
        }
    }

    /// How long the typing indicator should run while this event is handled.
    pub fn loading_seconds(&self) -> u32 {
        match &self.payload {
            EventPayload::Media { kind, .. } => match kind {
                MediaKind::Image => 25,
                MediaKind::Audio => 30,
                MediaKind::Video => 45,
                MediaKind::File => 35,
            },
            EventPayload::Location { .. } => 15,
            _ => 10,
        }
    }

    /// Payload summary attached to error reports. Text is clipped.
    pub fn summary(&self) -> Value {
        let detail = match &self.payload {
            EventPayload::Text(text) => json!({ "text": truncate_chars(text, 200) }),
            EventPayload::Media {
                message_id,
                file_name,
                ..
            } => json!({ "messageId": message_id, "fileName": file_name }),
            EventPayload::Location {
                latitude,
                longitude,
                ..
            } => json!({ "latitude": latitude, "longitude": longitude }),
            EventPayload::Unsupported { .. } => Value::Null,
            EventPayload::Postback { data } => json!({ "data": data }),
        };
        json!({
            "type": self.label(),
            "timestamp": self.timestamp,
            "detail": detail,
        })
    }

    fn from_raw(raw: RawEvent) -> Option<Self> {
        let Some(user_id) = raw.source.and_then(|s| s.user_id) else {
            debug!("skipping {} event without a user id", raw.event_type);
            return None;
        };
        let payload = match raw.event_type.as_str() {
            "message" => raw.message?.into_payload(),
            "postback" => EventPayload::Postback {
                data: raw.postback?.data,
            },
            other => {
                debug!("skipping unhandled event type: {}", other);
                return None;
            }
        };
        Some(Self {
            user_id,
            reply_token: raw.reply_token.filter(|t| !t.is_empty()),
            timestamp: raw.timestamp,
            payload,
            redelivery: raw.delivery_context.is_some_and(|d| d.is_redelivery),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    postback: Option<RawPostback>,
    #[serde(default)]
    delivery_context: Option<RawDeliveryContext>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSource {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

impl RawMessage {
    fn into_payload(self) -> EventPayload {
        let media = |kind| EventPayload::Media {
            kind,
            message_id: self.id.clone(),
            file_name: self.file_name.clone(),
        };
        match self.message_type.as_str() {
            "text" => EventPayload::Text(self.text.clone().unwrap_or_default()),
            "image" => media(MediaKind::Image),
            "audio" => media(MediaKind::Audio),
            "video" => media(MediaKind::Video),
            "file" => media(MediaKind::File),
            "location" => match (self.latitude, self.longitude) {
                (Some(latitude), Some(longitude)) => EventPayload::Location {
                    latitude,
                    longitude,
                    title: self.title.clone(),
                    address: self.address.clone(),
                },
                _ => EventPayload::Unsupported {
                    message_type: self.message_type.clone(),
                },
            },
            _ => EventPayload::Unsupported {
                message_type: self.message_type.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPostback {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeliveryContext {
    #[serde(default)]
    is_redelivery: bool,
}
