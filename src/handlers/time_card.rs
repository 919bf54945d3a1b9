use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Value, json};

use crate::delivery::ResponsePayload;

const ZONES: [(&str, &str, Tz); 2] = [
    ("🇯🇵 Japan", "JST", chrono_tz::Asia::Tokyo),
    ("🇹🇭 Thailand", "ICT", chrono_tz::Asia::Bangkok),
];

fn row(label: &str, abbreviation: &str, local: &DateTime<Tz>) -> Value {
    json!({
        "type": "box",
        "layout": "vertical",
        "margin": "md",
        "contents": [
            {"type": "text", "text": label, "size": "sm", "color": "#666666"},
            {"type": "text", "text": format!("{} {}", local.format("%H:%M"), abbreviation),
             "size": "xl", "weight": "bold"},
            {"type": "text", "text": local.format("%A, %-d %B %Y").to_string(), "size": "xs", "color": "#999999"}
        ]
    })
}

/// Current time in Japan and Thailand as one card.
pub fn time_card(now: DateTime<Utc>) -> ResponsePayload {
    let mut rows = Vec::with_capacity(ZONES.len());
    let mut alt = Vec::with_capacity(ZONES.len());
    for (label, abbreviation, tz) in ZONES {
        let local = now.with_timezone(&tz);
        rows.push(row(label, abbreviation, &local));
        alt.push(format!("{} {}", local.format("%H:%M"), abbreviation));
    }
    let bubble = json!({
        "type": "bubble",
        "size": "kilo",
        "header": {
            "type": "box",
            "layout": "vertical",
            "backgroundColor": "#4A90E2",
            "contents": [
                {"type": "text", "text": "🕐 Current time", "weight": "bold", "color": "#FFFFFF"}
            ]
        },
        "body": {"type": "box", "layout": "vertical", "contents": rows}
    });
    ResponsePayload::card(format!("Current time: {}", alt.join(" / ")), bubble)
}
