//! Integration tests for the SQLite recent-change store.
//! Uses an in-memory database and a manually advanced clock.

use std::sync::Arc;

use anima_core::evolution::{AppliedLimit, LimitKind};
use anima_core::test_utils::{casual_chat_event, context_aged, engine_with_store, fixed_now};
use anima_core::{EvolutionConfig, FixedClock, SqliteRecentChangeStore};
use anima_shared::{RecentChangeStore, RecentChanges, TraitKind, TraitVector};
use chrono::Duration;

const TEST_AGENT: &str = "agent.test";

async fn setup() -> (SqliteRecentChangeStore, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(fixed_now()));
    let store = SqliteRecentChangeStore::connect("sqlite::memory:", clock.clone())
        .await
        .unwrap();
    store.init().await.unwrap();
    (store, clock)
}

fn single(kind: TraitKind, delta: f64) -> TraitVector {
    let mut deltas = TraitVector::zeros();
    deltas[kind] = delta;
    deltas
}

#[tokio::test]
async fn test_windows_sum_absolute_deltas() {
    let (store, clock) = setup().await;

    // t0: -0.02 openness
    store.record_changes(TEST_AGENT, &single(TraitKind::Openness, -0.02)).await.unwrap();
    // t0 + 3d: +0.01 openness
    clock.advance(Duration::days(3));
    store.record_changes(TEST_AGENT, &single(TraitKind::Openness, 0.01)).await.unwrap();
    // t0 + 3d + 1h: +0.005 humor
    clock.advance(Duration::hours(1));
    store.record_changes(TEST_AGENT, &single(TraitKind::Humor, 0.005)).await.unwrap();

    let changes = store.recent_changes(TEST_AGENT).await.unwrap();
    assert!((changes.daily[TraitKind::Openness] - 0.01).abs() < 1e-12);
    assert!((changes.weekly[TraitKind::Openness] - 0.03).abs() < 1e-12);
    assert!((changes.monthly[TraitKind::Openness] - 0.03).abs() < 1e-12);
    assert!((changes.daily[TraitKind::Humor] - 0.005).abs() < 1e-12);

    // Move past the weekly window of the first row only.
    clock.advance(Duration::days(4));
    let changes = store.recent_changes(TEST_AGENT).await.unwrap();
    assert_eq!(changes.daily[TraitKind::Openness], 0.0);
    assert!((changes.weekly[TraitKind::Openness] - 0.01).abs() < 1e-12);
    assert!((changes.monthly[TraitKind::Openness] - 0.03).abs() < 1e-12);

    // Everything falls out of the monthly window.
    clock.advance(Duration::days(40));
    let changes = store.recent_changes(TEST_AGENT).await.unwrap();
    assert_eq!(changes.monthly, TraitVector::zeros());
}

#[tokio::test]
async fn test_agents_are_isolated() {
    let (store, _) = setup().await;
    store.record_changes("agent.a", &TraitVector::splat(0.01)).await.unwrap();

    let other = store.recent_changes("agent.b").await.unwrap();
    assert_eq!(other.weekly, TraitVector::zeros());
    let own = store.recent_changes("agent.a").await.unwrap();
    assert!((own.weekly.sum_abs() - 0.1).abs() < 1e-12);
}

#[tokio::test]
async fn test_unknown_trait_rows_are_ignored() {
    let (store, _) = setup().await;
    sqlx::query(
        "INSERT INTO trait_change_log (id, agent_id, trait_name, delta, recorded_at) VALUES ('x', ?, 'charisma', 0.5, ?)",
    )
    .bind(TEST_AGENT)
    .bind(fixed_now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
    .execute(store.pool())
    .await
    .unwrap();

    let changes = store.recent_changes(TEST_AGENT).await.unwrap();
    assert_eq!(changes, RecentChanges::default());
}

#[tokio::test]
async fn test_recorded_changes_feed_the_limiter() {
    let (store, _) = setup().await;
    let store = Arc::new(store);
    let engine = engine_with_store(EvolutionConfig::default(), store.clone());
    let ctx = context_aged(TEST_AGENT, 60);
    let traits = TraitVector::splat(0.5);

    let first = engine
        .process_evolution(TEST_AGENT, None, &[casual_chat_event("evt-1", fixed_now())], &traits, &ctx)
        .await;
    assert!(first.success);
    assert!(first.adjustment.limited_delta[TraitKind::Openness] > 0.0);

    // Openness used its whole daily allowance.
    store.record_changes(TEST_AGENT, &first.adjustment.limited_delta).await.unwrap();

    let second = engine
        .process_evolution(TEST_AGENT, None, &[casual_chat_event("evt-2", fixed_now())], &first.new_traits, &ctx)
        .await;
    assert!(second.success);
    assert_eq!(second.adjustment.limited_delta[TraitKind::Openness], 0.0);
    assert!(second
        .adjustment
        .applied_limits
        .contains(&AppliedLimit::for_trait(LimitKind::DailyLimit, TraitKind::Openness)));
}
