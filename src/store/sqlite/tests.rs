use super::*;
use crate::context::ContextManager;
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-16T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn context_merge_keeps_unset_fields() {
    let store = SqliteStore::open_in_memory(20).unwrap();
    store
        .merge("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();
    store
        .merge(
            "U1",
            &ContextPatch::pending(PendingAction::AwaitingCityForWeather),
            t0() + chrono::Duration::seconds(1),
        )
        .await
        .unwrap();

    let state = store.load("U1").await.unwrap().unwrap();
    assert_eq!(state.last_mentioned_entity.as_deref(), Some("Tokyo"));
    assert_eq!(
        state.pending_action,
        Some(PendingAction::AwaitingCityForWeather)
    );
    assert_eq!(state.updated_at, Some(t0() + chrono::Duration::seconds(1)));
}

#[tokio::test]
async fn context_replace_and_delete() {
    let store = SqliteStore::open_in_memory(20).unwrap();
    store
        .merge(
            "U1",
            &ContextPatch {
                pending_action: Some(PendingAction::AwaitingCityForWeather),
                last_mentioned_entity: Some("Bangkok".into()),
            },
            t0(),
        )
        .await
        .unwrap();
    store
        .replace(
            "U1",
            &ContextState {
                pending_action: None,
                last_mentioned_entity: Some("Sapporo".into()),
                updated_at: Some(t0()),
            },
        )
        .await
        .unwrap();

    let state = store.load("U1").await.unwrap().unwrap();
    assert_eq!(state.pending_action, None);
    assert_eq!(state.last_mentioned_entity.as_deref(), Some("Sapporo"));

    store.delete("U1").await.unwrap();
    assert!(store.load("U1").await.unwrap().is_none());
}

#[tokio::test]
async fn context_manager_expires_sqlite_records() {
    let store = Arc::new(SqliteStore::open_in_memory(20).unwrap());
    let ctx = ContextManager::new(store.clone(), std::time::Duration::from_secs(600));
    ctx.set_at("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();

    let state = ctx
        .get_at("U1", t0() + chrono::Duration::seconds(601))
        .await
        .unwrap();
    assert!(state.is_empty());
    assert!(store.load("U1").await.unwrap().is_none());
}

#[tokio::test]
async fn history_is_capped_per_user() {
    let store = SqliteStore::open_in_memory(3).unwrap();
    for i in 0..5 {
        store
            .append("U1", ConversationTurn::new(format!("q{i}"), format!("a{i}")))
            .await
            .unwrap();
    }
    store
        .append("U2", ConversationTurn::new("other", "user"))
        .await
        .unwrap();

    let recent = store.recent("U1", 10).await.unwrap();
    let questions: Vec<_> = recent.iter().map(|t| t.user_message.as_str()).collect();
    assert_eq!(questions, vec!["q2", "q3", "q4"]);
    assert_eq!(store.recent("U2", 10).await.unwrap().len(), 1);

    let window = store.recent("U1", 2).await.unwrap();
    assert_eq!(window[0].user_message, "q3");
    assert_eq!(window[1].ai_response, "a4");
}

#[tokio::test]
async fn error_reports_are_persisted() {
    let store = SqliteStore::open_in_memory(20).unwrap();
    let report = ErrorReport::new(
        "U1",
        "image",
        serde_json::json!({"messageId": "m1"}),
        &anyhow!("vision call failed"),
    );
    store.report(&report).await;

    let errors = store.recent_errors(5).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].operation, "image");
    assert_eq!(errors[0].payload["messageId"], "m1");
    assert_eq!(errors[0].message, "vision call failed");
}

#[test]
fn open_creates_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/kazebot.db");
    let store = SqliteStore::open(&path, 20).unwrap();
    drop(store);
    assert!(path.exists());
}
