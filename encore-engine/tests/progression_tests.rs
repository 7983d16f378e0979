//! Integration tests for the gig progression engine
//!
//! Exercises the advance() entry point end to end against a real SQLite
//! database: idempotency, cursor monotonicity, in-order processing,
//! completion safety, and the concurrent-duplicate-trigger race.

use chrono::{Duration as ChronoDuration, Utc};
use encore_common::db::{init_database, queries, Band, Gig, GigStatus, SetlistEntry, Venue};
use encore_common::{ChangeNotifier, GigEvent};
use encore_engine::scoring::{ScoreContext, SongScorer, TracingLedger};
use encore_engine::{AdvanceOutcome, GigEngine};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Deterministic scorer so aggregate assertions are exact
struct FixedScorer(f64);

impl SongScorer for FixedScorer {
    fn score(&self, _song_id: Uuid, _ctx: &ScoreContext<'_>) -> f64 {
        self.0
    }
}

struct Fixture {
    _dir: TempDir,
    pool: SqlitePool,
    engine: Arc<GigEngine>,
    notifier: ChangeNotifier,
    gig_id: Uuid,
}

/// Seed a gig with the reference setlist [180, 200, 150]s (or a custom
/// one), started `started_secs_ago` seconds in the past.
async fn fixture_with_setlist(
    durations: &[Option<i64>],
    started_secs_ago: Option<i64>,
) -> Fixture {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("encore.db")).await.unwrap();

    let band = Band {
        id: Uuid::new_v4(),
        name: "Integration Test Band".into(),
        fame: 5000.0,
        fan_count: 1500,
    };
    let venue = Venue {
        id: Uuid::new_v4(),
        name: "Test Hall".into(),
        capacity: 800,
        base_cost: 250.0,
    };
    queries::insert_band(&pool, &band).await.unwrap();
    queries::insert_venue(&pool, &venue).await.unwrap();

    let gig_id = Uuid::new_v4();
    let gig = Gig {
        id: gig_id,
        band_id: band.id,
        venue_id: venue.id,
        owner_id: Uuid::new_v4(),
        status: if started_secs_ago.is_some() {
            GigStatus::InProgress
        } else {
            GigStatus::Scheduled
        },
        booked_at: Utc::now() - ChronoDuration::days(10),
        scheduled_for: Utc::now(),
        started_at: started_secs_ago.map(|s| Utc::now() - ChronoDuration::seconds(s)),
        current_song_position: 0,
        ticket_price: 20.0,
        tickets_sold: 400,
        predicted_tickets: 500,
        last_ticket_update: None,
    };
    queries::insert_gig(&pool, &gig).await.unwrap();

    for (position, duration) in durations.iter().enumerate() {
        queries::insert_setlist_entry(
            &pool,
            &SetlistEntry {
                gig_id,
                position: position as i64,
                song_id: Uuid::new_v4(),
                duration_seconds: *duration,
            },
        )
        .await
        .unwrap();
    }

    let notifier = ChangeNotifier::new();
    let engine = Arc::new(GigEngine::with_collaborators(
        pool.clone(),
        notifier.clone(),
        Arc::new(FixedScorer(75.0)),
        Arc::new(TracingLedger),
    ));

    Fixture {
        _dir: dir,
        pool,
        engine,
        notifier,
        gig_id,
    }
}

async fn reference_fixture(started_secs_ago: Option<i64>) -> Fixture {
    fixture_with_setlist(&[Some(180), Some(200), Some(150)], started_secs_ago).await
}

async fn performance_count(f: &Fixture) -> usize {
    match queries::get_outcome_by_gig(&f.pool, f.gig_id).await.unwrap() {
        Some(outcome) => queries::list_song_performances(&f.pool, outcome.id)
            .await
            .unwrap()
            .len(),
        None => 0,
    }
}

async fn cursor(f: &Fixture) -> i64 {
    queries::get_gig(&f.pool, f.gig_id)
        .await
        .unwrap()
        .unwrap()
        .current_song_position
}

#[tokio::test]
async fn test_advance_on_scheduled_gig_is_noop() {
    let f = reference_fixture(None).await;
    let outcome = f.engine.advance(f.gig_id).await.unwrap();
    assert_eq!(outcome, AdvanceOutcome::NotInProgress);
    assert!(queries::get_outcome_by_gig(&f.pool, f.gig_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_nothing_due_before_first_boundary() {
    // T0+170s: position 0 comes due at 180s
    let f = reference_fixture(Some(170)).await;
    match f.engine.advance(f.gig_id).await.unwrap() {
        AdvanceOutcome::InProgress { processed, next_due } => {
            assert_eq!(processed, 0);
            let hint = next_due.expect("next-due hint expected");
            assert!(hint <= Duration::from_secs(10), "hint too far out: {hint:?}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(cursor(&f).await, 0);
    assert_eq!(performance_count(&f).await, 0);
}

#[tokio::test]
async fn test_first_song_processed_after_its_duration() {
    // T0+185s: exactly position 0 is due
    let f = reference_fixture(Some(185)).await;
    match f.engine.advance(f.gig_id).await.unwrap() {
        AdvanceOutcome::InProgress { processed, .. } => assert_eq!(processed, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(cursor(&f).await, 1);
    assert_eq!(performance_count(&f).await, 1);
}

#[tokio::test]
async fn test_song_processing_is_idempotent() {
    let f = reference_fixture(Some(185)).await;
    f.engine.advance(f.gig_id).await.unwrap();
    let cursor_after_first = cursor(&f).await;

    // Second call at the same instant: no new record, cursor untouched
    match f.engine.advance(f.gig_id).await.unwrap() {
        AdvanceOutcome::InProgress { processed, .. } => assert_eq!(processed, 0),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(performance_count(&f).await, 1);
    assert_eq!(cursor(&f).await, cursor_after_first);
}

#[tokio::test]
async fn test_concurrent_duplicate_trigger() {
    // Two simultaneous advances must produce exactly one record for
    // position 0, not two
    let f = reference_fixture(Some(185)).await;
    let (a, b) = tokio::join!(f.engine.advance(f.gig_id), f.engine.advance(f.gig_id));
    a.unwrap();
    b.unwrap();

    assert_eq!(performance_count(&f).await, 1);
    assert_eq!(cursor(&f).await, 1);
}

#[tokio::test]
async fn test_full_show_completes_in_order() {
    // T0+531s: all three positions due, gig completes
    let f = reference_fixture(Some(531)).await;
    assert_eq!(
        f.engine.advance(f.gig_id).await.unwrap(),
        AdvanceOutcome::Completed
    );

    let gig = queries::get_gig(&f.pool, f.gig_id).await.unwrap().unwrap();
    assert_eq!(gig.status, GigStatus::Completed);
    assert_eq!(gig.current_song_position, 3);

    let outcome = queries::get_outcome_by_gig(&f.pool, f.gig_id)
        .await
        .unwrap()
        .unwrap();
    let performances = queries::list_song_performances(&f.pool, outcome.id)
        .await
        .unwrap();
    let positions: Vec<i64> = performances.iter().map(|p| p.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);

    // FixedScorer(75.0) makes the aggregates exact
    assert_eq!(outcome.overall_rating, 75.0);
    assert_eq!(outcome.performance_grade.as_deref(), Some("B"));
    assert_eq!(outcome.attendance, 400);
    assert_eq!(outcome.ticket_revenue, 400.0 * 20.0);
    assert_eq!(outcome.costs, 250.0);
}

#[tokio::test]
async fn test_advance_on_completed_gig_is_noop() {
    let f = reference_fixture(Some(531)).await;
    f.engine.advance(f.gig_id).await.unwrap();

    let before = queries::get_outcome_by_gig(&f.pool, f.gig_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        f.engine.advance(f.gig_id).await.unwrap(),
        AdvanceOutcome::Completed
    );

    let after = queries::get_outcome_by_gig(&f.pool, f.gig_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(performance_count(&f).await, 3);
    assert_eq!(after.total_revenue, before.total_revenue);
    assert_eq!(after.overall_rating, before.overall_rating);
}

#[tokio::test]
async fn test_cursor_is_monotonic_across_calls() {
    let f = reference_fixture(Some(185)).await;
    let mut last = 0;
    for _ in 0..5 {
        f.engine.advance(f.gig_id).await.unwrap();
        let current = cursor(&f).await;
        assert!(current >= last, "cursor regressed: {last} -> {current}");
        last = current;
    }
}

#[tokio::test]
async fn test_empty_setlist_completes_immediately() {
    let f = fixture_with_setlist(&[], Some(5)).await;
    assert_eq!(
        f.engine.advance(f.gig_id).await.unwrap(),
        AdvanceOutcome::Completed
    );
    let outcome = queries::get_outcome_by_gig(&f.pool, f.gig_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.overall_rating, 0.0);
}

#[tokio::test]
async fn test_missing_duration_falls_back_and_completes() {
    // Null duration is paced as 180s, so at +185s the single song is done
    let f = fixture_with_setlist(&[None], Some(185)).await;
    assert_eq!(
        f.engine.advance(f.gig_id).await.unwrap(),
        AdvanceOutcome::Completed
    );
    assert_eq!(performance_count(&f).await, 1);
}

#[tokio::test]
async fn test_cancelled_gig_is_not_advanced() {
    let f = reference_fixture(Some(185)).await;
    assert!(f.engine.cancel(f.gig_id).await.unwrap());
    assert_eq!(
        f.engine.advance(f.gig_id).await.unwrap(),
        AdvanceOutcome::NotInProgress
    );
    assert_eq!(performance_count(&f).await, 0);
}

#[tokio::test]
async fn test_start_transition_is_guarded() {
    let f = reference_fixture(None).await;
    assert!(f.engine.start(f.gig_id).await.unwrap());
    let gig = queries::get_gig(&f.pool, f.gig_id).await.unwrap().unwrap();
    assert_eq!(gig.status, GigStatus::InProgress);
    assert!(gig.started_at.is_some());

    // Replayed start is a no-op
    assert!(!f.engine.start(f.gig_id).await.unwrap());
}

#[tokio::test]
async fn test_song_performed_event_is_broadcast() {
    let f = reference_fixture(Some(185)).await;
    let mut rx = f.notifier.subscribe();
    f.engine.advance(f.gig_id).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no event within timeout")
        .unwrap();
    match event {
        GigEvent::SongPerformed { gig_id, position, .. } => {
            assert_eq!(gig_id, f.gig_id);
            assert_eq!(position, 0);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
