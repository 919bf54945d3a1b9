use super::*;
use std::time::Duration as StdDuration;

fn manager() -> ContextManager {
    ContextManager::in_memory(StdDuration::from_secs(600))
}

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-16T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn unknown_user_has_empty_context() {
    let state = manager().get_at("U1", t0()).await.unwrap();
    assert!(state.is_empty());
    assert_eq!(state.updated_at, None);
}

#[tokio::test]
async fn set_merges_fields() {
    let ctx = manager();
    ctx.set_at("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();
    ctx.set_at(
        "U1",
        &ContextPatch::pending(PendingAction::AwaitingCityForWeather),
        t0() + Duration::seconds(5),
    )
    .await
    .unwrap();

    let state = ctx.get_at("U1", t0() + Duration::seconds(6)).await.unwrap();
    assert_eq!(state.last_mentioned_entity.as_deref(), Some("Tokyo"));
    assert_eq!(
        state.pending_action,
        Some(PendingAction::AwaitingCityForWeather)
    );
    assert_eq!(state.updated_at, Some(t0() + Duration::seconds(5)));
}

#[tokio::test]
async fn context_survives_until_ttl() {
    let ctx = manager();
    ctx.set_at("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();

    let just_before = t0() + Duration::seconds(599);
    let state = ctx.get_at("U1", just_before).await.unwrap();
    assert_eq!(state.last_mentioned_entity.as_deref(), Some("Tokyo"));

    let exactly = t0() + Duration::seconds(600);
    let state = ctx.get_at("U1", exactly).await.unwrap();
    assert_eq!(state.last_mentioned_entity.as_deref(), Some("Tokyo"));
}

#[tokio::test]
async fn expired_context_is_cleared_on_read() {
    let store = Arc::new(MemoryContextStore::new(StdDuration::from_secs(600), 100));
    let ctx = ContextManager::new(store.clone(), StdDuration::from_secs(600));
    ctx.set_at("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();

    let after = t0() + Duration::seconds(601);
    let state = ctx.get_at("U1", after).await.unwrap();
    assert!(state.is_empty());
    assert!(store.load("U1").await.unwrap().is_none());
}

#[tokio::test]
async fn writes_refresh_the_ttl() {
    let ctx = manager();
    ctx.set_at("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();
    ctx.set_at(
        "U1",
        &ContextPatch::entity("Tokyo"),
        t0() + Duration::seconds(500),
    )
    .await
    .unwrap();

    let state = ctx
        .get_at("U1", t0() + Duration::seconds(900))
        .await
        .unwrap();
    assert_eq!(state.last_mentioned_entity.as_deref(), Some("Tokyo"));
}

#[tokio::test]
async fn replace_drops_unset_fields() {
    let ctx = manager();
    ctx.set_at(
        "U1",
        &ContextPatch {
            pending_action: Some(PendingAction::AwaitingCityForWeather),
            last_mentioned_entity: Some("Bangkok".into()),
        },
        t0(),
    )
    .await
    .unwrap();

    ctx.apply_at(
        "U1",
        ContextUpdate::Replace(ContextPatch::entity("Tokyo")),
        t0(),
    )
    .await
    .unwrap();

    let state = ctx.get_at("U1", t0()).await.unwrap();
    assert_eq!(state.pending_action, None);
    assert_eq!(state.last_mentioned_entity.as_deref(), Some("Tokyo"));
}

#[tokio::test]
async fn apply_keep_and_clear() {
    let ctx = manager();
    ctx.set_at("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();

    ctx.apply_at("U1", ContextUpdate::Keep, t0()).await.unwrap();
    assert!(!ctx.get_at("U1", t0()).await.unwrap().is_empty());

    ctx.apply_at("U1", ContextUpdate::Clear, t0()).await.unwrap();
    assert!(ctx.get_at("U1", t0()).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_replace_clears() {
    let ctx = manager();
    ctx.set_at("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();
    ctx.apply_at("U1", ContextUpdate::Replace(ContextPatch::default()), t0())
        .await
        .unwrap();
    assert!(ctx.get_at("U1", t0()).await.unwrap().is_empty());
}

#[tokio::test]
async fn users_are_isolated() {
    let ctx = manager();
    ctx.set_at("U1", &ContextPatch::entity("Tokyo"), t0())
        .await
        .unwrap();
    assert!(ctx.get_at("U2", t0()).await.unwrap().is_empty());
}

#[test]
fn pending_action_round_trips_through_str() {
    let action = PendingAction::AwaitingCityForWeather;
    assert_eq!(PendingAction::parse(action.as_str()), Some(action));
    assert_eq!(PendingAction::parse("something-else"), None);
}

#[tokio::test]
async fn memory_store_evicts_idle_users_without_a_read() {
    let store = MemoryContextStore::new(StdDuration::from_millis(50), 100);
    for n in 0..5 {
        store
            .merge(&format!("U{n}"), &ContextPatch::entity("Tokyo"), Utc::now())
            .await
            .unwrap();
    }
    store.records.run_pending_tasks();
    assert_eq!(store.records.entry_count(), 5);

    tokio::time::sleep(StdDuration::from_millis(120)).await;
    store.records.run_pending_tasks();
    assert_eq!(store.records.entry_count(), 0);
}

#[tokio::test]
async fn memory_store_is_bounded_by_user_count() {
    let store = MemoryContextStore::new(StdDuration::from_secs(600), 3);
    for n in 0..20 {
        store
            .merge(&format!("U{n}"), &ContextPatch::entity("Osaka"), Utc::now())
            .await
            .unwrap();
    }
    store.records.run_pending_tasks();
    assert!(store.records.entry_count() <= 3);
}

#[tokio::test]
async fn memory_store_merge_keeps_other_field() {
    let store = MemoryContextStore::new(StdDuration::from_secs(600), 100);
    store
        .merge("U1", &ContextPatch::entity("Nagoya"), t0())
        .await
        .unwrap();
    store
        .merge(
            "U1",
            &ContextPatch::pending(PendingAction::AwaitingCityForWeather),
            t0() + Duration::seconds(1),
        )
        .await
        .unwrap();

    let record = store.load("U1").await.unwrap().unwrap();
    assert_eq!(record.last_mentioned_entity.as_deref(), Some("Nagoya"));
    assert_eq!(
        record.pending_action,
        Some(PendingAction::AwaitingCityForWeather)
    );
    assert_eq!(record.updated_at, Some(t0() + Duration::seconds(1)));
}
