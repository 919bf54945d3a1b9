use serde_json::{Value, json};

use crate::delivery::ResponsePayload;
use crate::providers::VideoResult;
use crate::utils::truncate_chars;

/// Kept small so the carousel stays under the default card size limit.
const MAX_BUBBLES: usize = 3;
const TITLE_CHARS: usize = 40;
const CHANNEL_CHARS: usize = 24;

fn clip(text: &str, max_chars: usize) -> String {
    let clipped = truncate_chars(text, max_chars);
    if clipped.len() < text.len() {
        format!("{}…", clipped.trim_end())
    } else {
        clipped.to_string()
    }
}

fn bubble(video: &VideoResult) -> Value {
    json!({
        "type": "bubble",
        "size": "micro",
        "hero": {
            "type": "image",
            "url": video.thumbnail_url,
            "size": "full",
            "aspectRatio": "16:9",
            "aspectMode": "cover",
            "action": {"type": "uri", "uri": video.url}
        },
        "body": {
            "type": "box",
            "layout": "vertical",
            "contents": [
                {"type": "text", "text": clip(&video.title, TITLE_CHARS), "weight": "bold", "size": "sm", "wrap": true},
                {"type": "text", "text": clip(&video.channel_title, CHANNEL_CHARS), "size": "xxs", "color": "#999999"}
            ]
        }
    })
}

/// Search results as a carousel of tappable thumbnails. The alt text lists
/// titles and links so plain-text clients still get something usable.
pub fn video_card(videos: &[VideoResult]) -> ResponsePayload {
    let shown = &videos[..videos.len().min(MAX_BUBBLES)];
    let bubbles: Vec<Value> = shown.iter().map(bubble).collect();
    let alt = shown
        .iter()
        .map(|v| format!("{} {}", clip(&v.title, TITLE_CHARS), v.url))
        .collect::<Vec<_>>()
        .join("\n");
    ResponsePayload::card(alt, json!({"type": "carousel", "contents": bubbles}))
}
