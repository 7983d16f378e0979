//! Integration tests for the ticket demand sweep

use chrono::{Duration as ChronoDuration, Utc};
use encore_common::db::{init_database, queries, Band, Gig, GigStatus, Venue};
use encore_common::ChangeNotifier;
use encore_engine::tickets::TicketDemandSimulator;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

async fn seed_scheduled_gig(
    pool: &SqlitePool,
    fame: f64,
    fan_count: i64,
    capacity: i64,
    price: f64,
) -> Uuid {
    let band = Band {
        id: Uuid::new_v4(),
        name: "Demand Test Band".into(),
        fame,
        fan_count,
    };
    let venue = Venue {
        id: Uuid::new_v4(),
        name: "Demand Hall".into(),
        capacity,
        base_cost: 100.0,
    };
    queries::insert_band(pool, &band).await.unwrap();
    queries::insert_venue(pool, &venue).await.unwrap();

    let gig_id = Uuid::new_v4();
    queries::insert_gig(
        pool,
        &Gig {
            id: gig_id,
            band_id: band.id,
            venue_id: venue.id,
            owner_id: Uuid::new_v4(),
            status: GigStatus::Scheduled,
            booked_at: Utc::now() - ChronoDuration::days(8),
            scheduled_for: Utc::now() + ChronoDuration::days(2),
            started_at: None,
            current_song_position: 0,
            ticket_price: price,
            tickets_sold: 0,
            predicted_tickets: 0,
            last_ticket_update: None,
        },
    )
    .await
    .unwrap();
    gig_id
}

#[tokio::test]
async fn test_sweep_sells_for_scheduled_gig() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("encore.db")).await.unwrap();
    let gig_id = seed_scheduled_gig(&pool, 10_000.0, 5000, 1000, 20.0).await;

    let simulator = TicketDemandSimulator::new(pool.clone(), ChangeNotifier::new());
    let stats = simulator.run_daily_sweep().await.unwrap();
    assert_eq!(stats.gigs_seen, 1);
    assert_eq!(stats.gigs_sold, 1);

    let gig = queries::get_gig(&pool, gig_id).await.unwrap().unwrap();
    assert!(gig.tickets_sold > 0, "no tickets sold");
    assert!(gig.tickets_sold <= 1000);
    assert!(gig.last_ticket_update.is_some());
}

#[tokio::test]
async fn test_never_oversells_across_many_sweeps() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("encore.db")).await.unwrap();
    // Tiny room, huge demand: capacity is hit fast and must never be exceeded
    let gig_id = seed_scheduled_gig(&pool, 50_000.0, 100_000, 50, 10.0).await;

    let simulator = TicketDemandSimulator::new(pool.clone(), ChangeNotifier::new());
    for _ in 0..30 {
        simulator.run_daily_sweep().await.unwrap();
        let gig = queries::get_gig(&pool, gig_id).await.unwrap().unwrap();
        assert!(
            gig.tickets_sold <= 50,
            "oversold: {} > capacity 50",
            gig.tickets_sold
        );
    }

    let gig = queries::get_gig(&pool, gig_id).await.unwrap().unwrap();
    assert_eq!(gig.tickets_sold, 50, "hot gig should sell out");

    // A sold-out gig is skipped entirely
    let stats = simulator.run_daily_sweep().await.unwrap();
    assert_eq!(stats.gigs_skipped, 1);
    assert_eq!(stats.tickets_sold, 0);
}

#[tokio::test]
async fn test_sweep_ignores_non_scheduled_gigs() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("encore.db")).await.unwrap();
    let gig_id = seed_scheduled_gig(&pool, 10_000.0, 5000, 1000, 20.0).await;
    queries::mark_started(&pool, gig_id, Utc::now()).await.unwrap();

    let simulator = TicketDemandSimulator::new(pool.clone(), ChangeNotifier::new());
    let stats = simulator.run_daily_sweep().await.unwrap();
    assert_eq!(stats.gigs_seen, 0);

    let gig = queries::get_gig(&pool, gig_id).await.unwrap().unwrap();
    assert_eq!(gig.tickets_sold, 0);
}

#[tokio::test]
async fn test_one_broken_gig_does_not_block_the_sweep() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("encore.db")).await.unwrap();
    let healthy = seed_scheduled_gig(&pool, 10_000.0, 5000, 1000, 20.0).await;

    // A gig whose band row is missing gets skipped, not fatal
    let venue = Venue {
        id: Uuid::new_v4(),
        name: "Orphan Hall".into(),
        capacity: 500,
        base_cost: 50.0,
    };
    queries::insert_venue(&pool, &venue).await.unwrap();
    queries::insert_gig(
        &pool,
        &Gig {
            id: Uuid::new_v4(),
            band_id: Uuid::new_v4(),
            venue_id: venue.id,
            owner_id: Uuid::new_v4(),
            status: GigStatus::Scheduled,
            booked_at: Utc::now() - ChronoDuration::days(3),
            scheduled_for: Utc::now() + ChronoDuration::days(5),
            started_at: None,
            current_song_position: 0,
            ticket_price: 25.0,
            tickets_sold: 0,
            predicted_tickets: 0,
            last_ticket_update: None,
        },
    )
    .await
    .unwrap();

    let simulator = TicketDemandSimulator::new(pool.clone(), ChangeNotifier::new());
    let stats = simulator.run_daily_sweep().await.unwrap();
    assert_eq!(stats.gigs_seen, 2);
    assert_eq!(stats.gigs_skipped, 1);
    assert_eq!(stats.gigs_sold, 1);

    let gig = queries::get_gig(&pool, healthy).await.unwrap().unwrap();
    assert!(gig.tickets_sold > 0);
}
