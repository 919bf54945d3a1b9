use super::*;
use crate::channels::FetchedContent;
use crate::context::ContextManager;
use crate::errors::{KazeError, KazeResult};
use crate::events::{EventPayload, MediaKind};
use crate::handlers::{HandlerSettings, Services};
use crate::providers::{AiAssistant, AiRequest, VideoResult, VideoSearch, WeatherProvider};
use crate::router::{City, ForecastHorizon};
use crate::store::MemoryHistoryStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct EchoAi {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl AiAssistant for EchoAi {
    async fn generate(&self, request: &AiRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("model overloaded"));
        }
        Ok(format!("echo: {}", request.prompt))
    }
}

struct StaticWeather;

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn current(&self, city: &City) -> Result<ResponsePayload> {
        Ok(ResponsePayload::text(format!("sunny in {}", city.name)))
    }

    async fn forecast(&self, city: &City, _horizon: ForecastHorizon) -> Result<ResponsePayload> {
        Ok(ResponsePayload::text(format!("forecast for {}", city.name)))
    }

    async fn current_at(&self, _latitude: f64, _longitude: f64) -> Result<ResponsePayload> {
        Ok(ResponsePayload::text("sunny here"))
    }
}

struct NoVideos;

#[async_trait]
impl VideoSearch for NoVideos {
    async fn search(&self, _query: &str) -> Result<Vec<VideoResult>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Reply(String, Vec<ResponsePayload>),
    Push(String, Vec<ResponsePayload>),
}

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    fetches: AtomicUsize,
    reject_replies: bool,
    fail_push: bool,
}

impl RecordingMessenger {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn replies(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Reply(..)))
            .count()
    }

    fn pushes(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Push(..)))
            .count()
    }
}

#[async_trait]
impl MessagingClient for RecordingMessenger {
    async fn reply(&self, reply_token: &str, payloads: &[ResponsePayload]) -> KazeResult<()> {
        if self.reject_replies {
            return Err(KazeError::ReplyTokenRejected("Invalid reply token".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Reply(reply_token.to_string(), payloads.to_vec()));
        Ok(())
    }

    async fn push(&self, user_id: &str, payloads: &[ResponsePayload]) -> KazeResult<()> {
        if self.fail_push {
            return Err(KazeError::Delivery {
                status: 500,
                message: "push down".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Push(user_id.to_string(), payloads.to_vec()));
        Ok(())
    }

    async fn fetch_content(&self, _message_id: &str, _max_bytes: usize) -> Result<FetchedContent> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedContent::Content {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            content_type: Some("image/jpeg".into()),
        })
    }
}

#[derive(Default)]
struct RecordingReporter {
    reports: Mutex<Vec<ErrorReport>>,
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, report: &ErrorReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

struct Rig {
    dispatcher: Dispatcher,
    messenger: Arc<RecordingMessenger>,
    reporter: Arc<RecordingReporter>,
    ai: Arc<EchoAi>,
}

fn rig_with(messenger: RecordingMessenger, ai_fails: bool) -> Rig {
    let messenger = Arc::new(messenger);
    let reporter = Arc::new(RecordingReporter::default());
    let ai = Arc::new(EchoAi {
        fail: ai_fails,
        calls: AtomicUsize::new(0),
    });
    let services = Services {
        ai: ai.clone(),
        weather: Arc::new(StaticWeather),
        video: Arc::new(NoVideos),
        messenger: messenger.clone(),
        context: ContextManager::in_memory(Duration::from_secs(600)),
        history: Arc::new(MemoryHistoryStore::new(20, 100)),
    };
    let dispatcher = Dispatcher::new(DispatcherParts {
        dedup: EventDeduplicator::in_memory(Duration::from_secs(300), 1000),
        tokens: ReplyTokenGuard::in_memory(Duration::from_secs(300), 1000),
        handlers: Arc::new(Handlers::new(services, HandlerSettings::default())),
        messenger: messenger.clone(),
        reporter: reporter.clone(),
        policy: DeadlinePolicy::default(),
        limits: PayloadLimits::default(),
        default_language: Language::English,
    });
    Rig {
        dispatcher,
        messenger,
        reporter,
        ai,
    }
}

fn rig() -> Rig {
    rig_with(RecordingMessenger::default(), false)
}

fn text_event(token: Option<&str>, timestamp: i64, text: &str) -> InboundEvent {
    InboundEvent {
        user_id: "U1".to_string(),
        reply_token: token.map(str::to_string),
        timestamp,
        payload: EventPayload::Text(text.to_string()),
        redelivery: false,
    }
}

fn image_event(token: &str, timestamp: i64) -> InboundEvent {
    InboundEvent {
        user_id: "U1".to_string(),
        reply_token: Some(token.to_string()),
        timestamp,
        payload: EventPayload::Media {
            kind: MediaKind::Image,
            message_id: "m1".to_string(),
            file_name: None,
        },
        redelivery: false,
    }
}

fn fresh_deadline() -> DeadlineTracker {
    DeadlinePolicy::default().start()
}

#[tokio::test]
async fn test_text_event_replies_once() {
    let r = rig();
    let outcome = r
        .dispatcher
        .dispatch(&text_event(Some("tok"), 1, "hello there"), &fresh_deadline())
        .await;
    assert_eq!(outcome, EventOutcome::Delivered(DeliveryChannel::Reply));
    assert_eq!(
        r.messenger.sent(),
        vec![Sent::Reply(
            "tok".into(),
            vec![ResponsePayload::text("echo: hello there")]
        )]
    );
}

#[tokio::test]
async fn test_redelivered_event_is_handled_once() {
    let r = rig();
    let event = text_event(Some("tok"), 1, "hello");
    let deadline = fresh_deadline();
    let summary = r
        .dispatcher
        .dispatch_batch(&[event.clone(), event], &deadline)
        .await;
    assert_eq!(summary.received, 2);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(r.ai.calls.load(Ordering::SeqCst), 1);
    assert_eq!(r.messenger.sent().len(), 1);
}

#[tokio::test]
async fn test_shared_reply_token_used_once() {
    let r = rig();
    let summary = r
        .dispatcher
        .dispatch_batch(
            &[
                text_event(Some("abc"), 1, "first"),
                text_event(Some("abc"), 2, "second"),
            ],
            &fresh_deadline(),
        )
        .await;
    assert_eq!(summary.replied, 1);
    assert_eq!(summary.pushed, 1);
    assert_eq!(r.messenger.replies(), 1);
    assert_eq!(r.messenger.pushes(), 1);
}

#[tokio::test]
async fn test_event_without_token_is_pushed() {
    let r = rig();
    let outcome = r
        .dispatcher
        .dispatch(&text_event(None, 1, "hello"), &fresh_deadline())
        .await;
    assert_eq!(outcome, EventOutcome::Delivered(DeliveryChannel::Push));
}

#[tokio::test]
async fn test_handler_failure_sends_apology_and_reports() {
    let r = rig_with(RecordingMessenger::default(), true);
    let outcome = r
        .dispatcher
        .dispatch(&text_event(Some("tok"), 1, "tell me a story"), &fresh_deadline())
        .await;
    assert_eq!(outcome, EventOutcome::Delivered(DeliveryChannel::Reply));
    assert_eq!(
        r.messenger.sent(),
        vec![Sent::Reply(
            "tok".into(),
            vec![ResponsePayload::text(replies::apology(Language::English))]
        )]
    );

    let reports = r.reporter.reports.lock().unwrap().clone();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].user_id, "U1");
    assert_eq!(reports[0].operation, "handle_text");
    assert!(reports[0].message.contains("model overloaded"));
    assert_eq!(reports[0].payload["detail"]["text"], "tell me a story");
}

#[tokio::test]
async fn test_apology_matches_message_language() {
    let r = rig_with(RecordingMessenger::default(), true);
    r.dispatcher
        .dispatch(&text_event(Some("tok"), 1, "สวัสดีครับ"), &fresh_deadline())
        .await;
    let Sent::Reply(_, payloads) = &r.messenger.sent()[0] else {
        panic!("expected a reply");
    };
    assert_eq!(payloads[0].plain_text(), replies::apology(Language::Thai));
}

#[tokio::test]
async fn test_rejected_reply_falls_back_to_push() {
    let r = rig_with(
        RecordingMessenger {
            reject_replies: true,
            ..RecordingMessenger::default()
        },
        false,
    );
    let outcome = r
        .dispatcher
        .dispatch(&text_event(Some("tok"), 1, "hello"), &fresh_deadline())
        .await;
    assert_eq!(outcome, EventOutcome::Delivered(DeliveryChannel::Push));
    assert_eq!(
        r.messenger.sent(),
        vec![Sent::Push(
            "U1".into(),
            vec![ResponsePayload::text("echo: hello")]
        )]
    );
}

#[tokio::test]
async fn test_both_channels_failing_is_undelivered() {
    let r = rig_with(
        RecordingMessenger {
            reject_replies: true,
            fail_push: true,
            ..RecordingMessenger::default()
        },
        false,
    );
    let outcome = r
        .dispatcher
        .dispatch(&text_event(Some("tok"), 1, "hello"), &fresh_deadline())
        .await;
    assert_eq!(outcome, EventOutcome::Undelivered);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_deadline_skips_media_analysis() {
    let r = rig();
    let deadline = fresh_deadline();
    tokio::time::advance(Duration::from_secs(23)).await;

    let outcome = r.dispatcher.dispatch(&image_event("tok", 1), &deadline).await;
    assert_eq!(outcome, EventOutcome::Delivered(DeliveryChannel::Push));
    assert_eq!(r.messenger.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(r.ai.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        r.messenger.sent(),
        vec![Sent::Push(
            "U1".into(),
            vec![ResponsePayload::text(replies::timeout_notice(Language::English))]
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_late_text_is_still_answered_by_push() {
    let r = rig();
    let deadline = fresh_deadline();
    tokio::time::advance(Duration::from_secs(19)).await;

    let outcome = r
        .dispatcher
        .dispatch(&text_event(Some("tok"), 1, "weather in Tokyo"), &deadline)
        .await;
    assert_eq!(outcome, EventOutcome::Delivered(DeliveryChannel::Push));
    assert_eq!(r.messenger.replies(), 0);
    assert_eq!(
        r.messenger.sent(),
        vec![Sent::Push(
            "U1".into(),
            vec![ResponsePayload::text("sunny in Tokyo")]
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_media_gate_is_tighter_than_intake_gate() {
    let r = rig();
    let deadline = fresh_deadline();
    // 7s left: above the intake reserve, below the media reserve.
    tokio::time::advance(Duration::from_secs(15)).await;

    let image = r.dispatcher.dispatch(&image_event("img", 1), &deadline).await;
    let text = r
        .dispatcher
        .dispatch(&text_event(Some("txt"), 2, "hello"), &deadline)
        .await;

    assert_eq!(image, EventOutcome::Delivered(DeliveryChannel::Push));
    assert_eq!(text, EventOutcome::Delivered(DeliveryChannel::Reply));
    assert_eq!(r.messenger.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_media_event_is_analyzed_when_time_allows() {
    let r = rig();
    let outcome = r
        .dispatcher
        .dispatch(&image_event("tok", 1), &fresh_deadline())
        .await;
    assert_eq!(outcome, EventOutcome::Delivered(DeliveryChannel::Reply));
    assert_eq!(r.messenger.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(r.ai.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_batch_summary_tally() {
    let summary = BatchSummary::tally(&[
        EventOutcome::Duplicate,
        EventOutcome::Delivered(DeliveryChannel::Reply),
        EventOutcome::Delivered(DeliveryChannel::Push),
        EventOutcome::Undelivered,
    ]);
    assert_eq!(
        summary,
        BatchSummary {
            received: 4,
            duplicates: 1,
            replied: 1,
            pushed: 1,
            undelivered: 1,
        }
    );
}
