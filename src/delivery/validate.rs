use serde_json::Value;
use tracing::warn;

use super::ResponsePayload;
use crate::config::DeliveryConfig;
use crate::replies::{self, Language};
use crate::utils::regex::RegexPatterns;
use crate::utils::truncate_chars;

#[derive(Debug, Clone, Copy)]
pub struct PayloadLimits {
    pub max_text_chars: usize,
    pub max_alt_text_chars: usize,
    pub max_card_bytes: usize,
    pub max_payloads: usize,
}

impl PayloadLimits {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            max_text_chars: config.max_text_chars,
            max_alt_text_chars: config.max_alt_text_chars,
            max_card_bytes: config.max_card_bytes,
            max_payloads: config.max_payloads,
        }
    }
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}

/// Make a handler's output safe to send. Never fails.
///
/// - Text is newline-normalized, trimmed and clamped to `max_text_chars`.
///   Empty text becomes the apology.
/// - Cards get a non-empty alt text clamped to `max_alt_text_chars`. A card
///   with a malformed body or one serializing past `max_card_bytes` is
///   replaced by its alt text.
/// - At most `max_payloads` payloads are kept. An empty list becomes a single apology.
pub fn validate(
    payloads: Vec<ResponsePayload>,
    limits: &PayloadLimits,
    lang: Language,
) -> Vec<ResponsePayload> {
    let mut out: Vec<ResponsePayload> = payloads
        .into_iter()
        .take(limits.max_payloads)
        .map(|payload| validate_one(payload, limits, lang))
        .collect();
    if out.is_empty() {
        out.push(ResponsePayload::text(replies::apology(lang)));
    }
    out
}

fn validate_one(payload: ResponsePayload, limits: &PayloadLimits, lang: Language) -> ResponsePayload {
    match payload {
        ResponsePayload::Text { text } => {
            let text = sanitize_text(&text, limits.max_text_chars);
            if text.is_empty() {
                ResponsePayload::text(replies::apology(lang))
            } else {
                ResponsePayload::Text { text }
            }
        }
        ResponsePayload::Card { alt_text, contents } => {
            let mut alt_text = sanitize_text(&alt_text, limits.max_alt_text_chars);
            if alt_text.is_empty() {
                alt_text = replies::default_alt_text(lang).to_string();
            }
            if !is_card_body(&contents) {
                warn!("card body is malformed, sending alt text instead");
                return ResponsePayload::Text { text: alt_text };
            }
            let card = ResponsePayload::Card { alt_text, contents };
            let size = card.serialized_len();
            if size > limits.max_card_bytes {
                warn!(
                    "card is {} bytes (limit {}), sending alt text instead",
                    size, limits.max_card_bytes
                );
                return ResponsePayload::text(card.plain_text());
            }
            card
        }
    }
}

/// A card body is an object carrying its own `type` (bubble or carousel).
fn is_card_body(contents: &Value) -> bool {
    contents
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty())
}

/// Normalize line endings, collapse runs of blank lines, trim, and clamp to `max_chars`.
pub fn sanitize_text(text: &str, max_chars: usize) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = RegexPatterns::excess_newlines().replace_all(&unified, "\n\n");
    truncate_chars(collapsed.trim(), max_chars)
        .trim_end()
        .to_string()
}
