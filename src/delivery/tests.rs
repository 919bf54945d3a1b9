use super::*;
use crate::channels::FetchedContent;
use crate::errors::{KazeError, KazeResult};
use crate::replies::{self, Language};
use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Mutex;

#[derive(Default)]
struct ScriptedClient {
    reply_error: Option<fn() -> KazeError>,
    push_error: Option<fn() -> KazeError>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl MessagingClient for ScriptedClient {
    async fn reply(&self, reply_token: &str, _payloads: &[ResponsePayload]) -> KazeResult<()> {
        self.calls.lock().unwrap().push(format!("reply:{reply_token}"));
        match self.reply_error {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }

    async fn push(&self, user_id: &str, _payloads: &[ResponsePayload]) -> KazeResult<()> {
        self.calls.lock().unwrap().push(format!("push:{user_id}"));
        match self.push_error {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }

    async fn fetch_content(
        &self,
        _message_id: &str,
        _max_bytes: usize,
    ) -> anyhow::Result<FetchedContent> {
        Ok(FetchedContent::TooLarge)
    }
}

fn token_rejected() -> KazeError {
    KazeError::ReplyTokenRejected("Invalid reply token".into())
}

fn server_error() -> KazeError {
    KazeError::Delivery {
        status: 500,
        message: "down".into(),
    }
}

fn limits() -> PayloadLimits {
    PayloadLimits::default()
}

fn padded_card(bytes: usize) -> ResponsePayload {
    ResponsePayload::card(
        "Weather in Tokyo: 18°C",
        json!({"type": "bubble", "body": {"type": "box", "padding": "x".repeat(bytes)}}),
    )
}

#[test]
fn plan_routes_reply_then_push() {
    let routes = plan_routes(DeliveryChannel::Reply, Some("rt"), "U1");
    assert_eq!(
        routes,
        vec![
            DeliveryRoute::Reply {
                reply_token: "rt".into()
            },
            DeliveryRoute::Push {
                user_id: "U1".into()
            }
        ]
    );
}

#[test]
fn plan_routes_push_only() {
    assert_eq!(
        plan_routes(DeliveryChannel::Push, Some("rt"), "U1"),
        vec![DeliveryRoute::Push {
            user_id: "U1".into()
        }]
    );
    assert_eq!(plan_routes(DeliveryChannel::Reply, None, "U1").len(), 1);
}

#[tokio::test]
async fn deliver_stops_at_first_success() {
    let client = ScriptedClient::default();
    let routes = plan_routes(DeliveryChannel::Reply, Some("rt"), "U1");
    let outcome = deliver(&client, &routes, &[ResponsePayload::text("hi")]).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered(DeliveryChannel::Reply));
    assert_eq!(*client.calls.lock().unwrap(), vec!["reply:rt"]);
}

#[tokio::test]
async fn deliver_falls_back_to_push_on_rejected_token() {
    let client = ScriptedClient {
        reply_error: Some(token_rejected),
        ..ScriptedClient::default()
    };
    let routes = plan_routes(DeliveryChannel::Reply, Some("rt"), "U1");
    let outcome = deliver(&client, &routes, &[ResponsePayload::text("hi")]).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered(DeliveryChannel::Push));
    assert_eq!(*client.calls.lock().unwrap(), vec!["reply:rt", "push:U1"]);
}

#[tokio::test]
async fn deliver_falls_back_on_any_reply_error() {
    let client = ScriptedClient {
        reply_error: Some(server_error),
        ..ScriptedClient::default()
    };
    let routes = plan_routes(DeliveryChannel::Reply, Some("rt"), "U1");
    let outcome = deliver(&client, &routes, &[ResponsePayload::text("hi")]).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered(DeliveryChannel::Push));
}

#[tokio::test]
async fn deliver_reports_failure_when_every_route_fails() {
    let client = ScriptedClient {
        reply_error: Some(token_rejected),
        push_error: Some(server_error),
        ..ScriptedClient::default()
    };
    let routes = plan_routes(DeliveryChannel::Reply, Some("rt"), "U1");
    let outcome = deliver(&client, &routes, &[ResponsePayload::text("hi")]).await;
    assert_eq!(outcome, DeliveryOutcome::Failed);
    assert_eq!(client.calls.lock().unwrap().len(), 2);
}

#[test]
fn oversized_card_becomes_alt_text() {
    let card = padded_card(4000);
    assert!(card.serialized_len() > 2500);
    let out = validate(vec![card], &limits(), Language::English);
    assert_eq!(out, vec![ResponsePayload::text("Weather in Tokyo: 18°C")]);
}

#[test]
fn small_card_is_kept() {
    let card = padded_card(100);
    let out = validate(vec![card.clone()], &limits(), Language::English);
    assert_eq!(out, vec![card]);
}

#[test]
fn long_text_is_clamped_to_limit() {
    let out = validate(
        vec![ResponsePayload::text("あ".repeat(6000))],
        &limits(),
        Language::Japanese,
    );
    assert_eq!(out[0].plain_text().chars().count(), 5000);
}

#[test]
fn empty_text_becomes_apology() {
    let out = validate(
        vec![ResponsePayload::text("  \n\n ")],
        &limits(),
        Language::Thai,
    );
    assert_eq!(out, vec![ResponsePayload::text(replies::apology(Language::Thai))]);
}

#[test]
fn empty_list_becomes_apology() {
    let out = validate(vec![], &limits(), Language::English);
    assert_eq!(
        out,
        vec![ResponsePayload::text(replies::apology(Language::English))]
    );
}

#[test]
fn card_without_alt_text_gets_default() {
    let out = validate(
        vec![ResponsePayload::card("", json!({"type": "bubble"}))],
        &limits(),
        Language::English,
    );
    assert_eq!(out[0].plain_text(), replies::default_alt_text(Language::English));
}

#[test]
fn malformed_card_body_becomes_text() {
    let out = validate(
        vec![ResponsePayload::card("Forecast", json!(["not", "a", "bubble"]))],
        &limits(),
        Language::English,
    );
    assert_eq!(out, vec![ResponsePayload::text("Forecast")]);
}

#[test]
fn alt_text_is_clamped() {
    let out = validate(
        vec![ResponsePayload::card("a".repeat(1000), json!({"type": "bubble"}))],
        &limits(),
        Language::English,
    );
    assert_eq!(out[0].plain_text().chars().count(), 400);
}

#[test]
fn payload_count_is_capped() {
    let many = (0..8).map(|i| ResponsePayload::text(format!("m{i}"))).collect();
    let out = validate(many, &limits(), Language::English);
    assert_eq!(out.len(), 5);
    assert_eq!(out[4].plain_text(), "m4");
}

#[test]
fn sanitize_normalizes_newlines() {
    assert_eq!(sanitize_text("a\r\nb\rc", 100), "a\nb\nc");
    assert_eq!(sanitize_text("a\n\n\n\n\nb", 100), "a\n\nb");
    assert_eq!(sanitize_text("  padded  ", 100), "padded");
}

#[test]
fn card_serializes_in_wire_format() {
    let card = ResponsePayload::card("Alt", json!({"type": "bubble"}));
    assert_eq!(
        serde_json::to_value(&card).unwrap(),
        json!({"type": "flex", "altText": "Alt", "contents": {"type": "bubble"}})
    );
    assert_eq!(
        serde_json::to_value(ResponsePayload::text("hi")).unwrap(),
        json!({"type": "text", "text": "hi"})
    );
}

#[test]
fn plain_text_of_joins_payloads() {
    let payloads = vec![
        ResponsePayload::text("one"),
        ResponsePayload::card("two", json!({"type": "bubble"})),
    ];
    assert_eq!(plain_text_of(&payloads), "one\ntwo");
}

proptest! {
    #[test]
    fn validated_text_is_never_empty_or_oversized(text in ".{0,7000}") {
        let out = validate(vec![ResponsePayload::text(text)], &limits(), Language::English);
        prop_assert_eq!(out.len(), 1);
        let sent = out[0].plain_text();
        prop_assert!(!sent.is_empty());
        prop_assert!(sent.chars().count() <= 5000);
    }

    #[test]
    fn validated_cards_fit_the_byte_limit(padding in 0usize..6000) {
        let out = validate(vec![padded_card(padding)], &limits(), Language::English);
        match &out[0] {
            ResponsePayload::Card { .. } => prop_assert!(out[0].serialized_len() <= 2500),
            ResponsePayload::Text { text } => prop_assert_eq!(text.as_str(), "Weather in Tokyo: 18°C"),
        }
    }
}
