use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One outbound message, serialized in the platform's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsePayload {
    #[serde(rename = "text")]
    Text { text: String },
    /// Structured card with a plain-text fallback for clients that cannot render it.
    #[serde(rename = "flex")]
    Card {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: Value,
    },
}

impl ResponsePayload {
    pub fn text(text: impl Into<String>) -> Self {
        ResponsePayload::Text { text: text.into() }
    }

    pub fn card(alt_text: impl Into<String>, contents: Value) -> Self {
        ResponsePayload::Card {
            alt_text: alt_text.into(),
            contents,
        }
    }

    /// The text a reader sees on a client that only renders plain text.
    pub fn plain_text(&self) -> &str {
        match self {
            ResponsePayload::Text { text } => text,
            ResponsePayload::Card { alt_text, .. } => alt_text,
        }
    }

    pub fn serialized_len(&self) -> usize {
        serde_json::to_vec(self).map_or(usize::MAX, |bytes| bytes.len())
    }
}

/// Joined plain text of a response, as recorded in conversation history.
pub fn plain_text_of(payloads: &[ResponsePayload]) -> String {
    payloads
        .iter()
        .map(ResponsePayload::plain_text)
        .collect::<Vec<_>>()
        .join("\n")
}
