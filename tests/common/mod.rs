// Shared test helpers; not all items used by every test binary.
#![allow(unused)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use kazebot::channels::{LineClient, MessagingClient};
use kazebot::config::Config;
use kazebot::context::ContextManager;
use kazebot::deadline::DeadlinePolicy;
use kazebot::delivery::PayloadLimits;
use kazebot::dispatch::{Dispatcher, DispatcherParts};
use kazebot::gateway::{self, GatewayState};
use kazebot::handlers::{HandlerSettings, Handlers, Services};
use kazebot::idempotency::{EventDeduplicator, ReplyTokenGuard};
use kazebot::providers::{GeminiClient, OpenWeatherClient, YouTubeClient};
use kazebot::replies::Language;
use kazebot::router::CityDirectory;
use kazebot::store::MemoryHistoryStore;
use kazebot::telemetry::LogReporter;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SECRET: &str = "test-channel-secret";
pub const WEBHOOK: &str = "/webhook";

pub const REPLY_PATH: &str = "/v2/bot/message/reply";
pub const PUSH_PATH: &str = "/v2/bot/message/push";

/// A gateway wired to real platform, AI, weather and video clients, all pointed at
/// one mock server.
pub struct Harness {
    pub server: MockServer,
    pub app: Router,
    pub context: ContextManager,
}

pub struct HarnessOptions {
    pub secret: &'static str,
    pub policy: DeadlinePolicy,
    pub gemini_reply: &'static str,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            secret: SECRET,
            policy: DeadlinePolicy::default(),
            gemini_reply: "Hello from Gemini",
        }
    }
}

pub async fn harness() -> Harness {
    harness_with(HarnessOptions::default()).await
}

pub async fn harness_with(options: HarnessOptions) -> Harness {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    mount_gemini(&server, options.gemini_reply).await;
    mount_weather(&server).await;
    mount_youtube(&server).await;

    let mut config = Config::default();
    config.line.channel_secret = options.secret.to_string();
    config.line.channel_access_token = "test-token".to_string();
    config.line.api_base = server.uri();
    config.line.data_api_base = server.uri();
    config.providers.gemini.api_key = "test-gemini-key".to_string();
    config.providers.gemini.api_base = server.uri();
    config.providers.weather.api_key = "test-weather-key".to_string();
    config.providers.weather.api_base = server.uri();
    config.providers.youtube.api_key = "test-youtube-key".to_string();
    config.providers.youtube.api_base = server.uri();

    let context = ContextManager::in_memory(Duration::from_secs(config.context.ttl_secs));
    let messenger: Arc<dyn MessagingClient> = Arc::new(LineClient::new(&config.line));
    let services = Services {
        ai: Arc::new(GeminiClient::new(&config.providers.gemini)),
        weather: Arc::new(OpenWeatherClient::new(&config.providers.weather)),
        video: Arc::new(YouTubeClient::new(&config.providers.youtube)),
        messenger: messenger.clone(),
        context: context.clone(),
        history: Arc::new(MemoryHistoryStore::new(
            config.context.history_limit,
            config.context.max_users,
        )),
    };
    let dispatcher = Dispatcher::new(DispatcherParts {
        dedup: EventDeduplicator::in_memory(Duration::from_secs(300), 1_000),
        tokens: ReplyTokenGuard::in_memory(Duration::from_secs(300), 1_000),
        handlers: Arc::new(Handlers::new(
            services,
            HandlerSettings {
                cities: CityDirectory::builtin(),
                ..HandlerSettings::default()
            },
        )),
        messenger,
        reporter: Arc::new(LogReporter),
        policy: options.policy,
        limits: PayloadLimits::from_config(&config.delivery),
        default_language: Language::English,
    });

    let state = GatewayState::new(Arc::new(dispatcher), options.secret);
    let app = gateway::build_router(state, WEBHOOK, config.gateway.max_body_bytes);
    Harness {
        server,
        app,
        context,
    }
}

async fn mount_platform(server: &MockServer) {
    for endpoint in [REPLY_PATH, PUSH_PATH, "/v2/bot/chat/loading/start"] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path_regex(r"^/v2/bot/message/[^/]+/content$"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        )
        .mount(server)
        .await;
}

async fn mount_gemini(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/models/[^/]+:generateContent$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": reply}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 12}
        })))
        .mount(server)
        .await;
}

async fn mount_weather(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Tokyo",
            "weather": [{"main": "Rain", "description": "light rain"}],
            "main": {"temp": 18.2, "feels_like": 17.4, "humidity": 81, "temp_min": 16.9, "temp_max": 19.3},
            "wind": {"speed": 3.6}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [
                {
                    "dt": 1_792_206_000,
                    "main": {"temp": 21.0, "temp_min": 19.0, "temp_max": 22.0},
                    "weather": [{"main": "Clouds", "description": "broken clouds"}],
                    "pop": 0.3
                }
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_youtube(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": {"kind": "youtube#video", "videoId": "dQw4w9WgXcQ"},
                "snippet": {
                    "title": "Otaru canal walk",
                    "description": "Evening stroll",
                    "channelTitle": "Hokkaido Walks",
                    "thumbnails": {"high": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"}}
                }
            }]
        })))
        .mount(server)
        .await;
}

pub fn text_event(reply_token: Option<&str>, user_id: &str, timestamp: i64, text: &str) -> Value {
    let mut event = json!({
        "type": "message",
        "timestamp": timestamp,
        "source": {"type": "user", "userId": user_id},
        "message": {"id": format!("m{}", timestamp), "type": "text", "text": text},
        "deliveryContext": {"isRedelivery": false}
    });
    if let Some(token) = reply_token {
        event["replyToken"] = json!(token);
    }
    event
}

pub fn image_event(reply_token: &str, user_id: &str, timestamp: i64) -> Value {
    json!({
        "type": "message",
        "replyToken": reply_token,
        "timestamp": timestamp,
        "source": {"type": "user", "userId": user_id},
        "message": {"id": format!("img{}", timestamp), "type": "image"}
    })
}

pub fn batch(events: Vec<Value>) -> String {
    json!({"destination": "Ubot", "events": events}).to_string()
}

pub fn sign(body: &str) -> String {
    gateway::sign(SECRET, body.as_bytes())
}

pub async fn post_webhook(app: &Router, body: &str, signature: Option<&str>) -> StatusCode {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK)
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-line-signature", signature);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

/// Post `body` with a valid signature.
pub async fn deliver(h: &Harness, body: &str) -> StatusCode {
    post_webhook(&h.app, body, Some(&sign(body))).await
}

/// JSON bodies of every request the mock server received on `endpoint`.
pub async fn sent_to(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .filter_map(|r| serde_json::from_slice(&r.body).ok())
        .collect()
}

pub async fn requests_matching(server: &MockServer, prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .count()
}

/// Plain text of the first message in a reply or push body.
pub fn first_text(body: &Value) -> String {
    let message = &body["messages"][0];
    message["text"]
        .as_str()
        .or_else(|| message["altText"].as_str())
        .unwrap_or_default()
        .to_string()
}
