//! Database initialization
//!
//! Creates the schema on first run and opens existing databases in place.
//! All DDL is `CREATE ... IF NOT EXISTS`, so initialization is idempotent
//! and safe to run from any number of processes.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer; the trigger loops all
    // read and occasionally write the same rows
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_bands_table(&pool).await?;
    create_venues_table(&pool).await?;
    create_gigs_table(&pool).await?;
    create_setlist_entries_table(&pool).await?;
    create_outcomes_table(&pool).await?;
    create_song_performances_table(&pool).await?;

    Ok(pool)
}

async fn create_bands_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bands (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            fame REAL NOT NULL DEFAULT 0,
            fan_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_venues_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venues (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            capacity INTEGER NOT NULL,
            base_cost REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_gigs_table(pool: &SqlitePool) -> Result<()> {
    // band_id/venue_id are soft references: the engine substitutes
    // placeholders when the row is missing rather than refusing to progress
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gigs (
            id TEXT PRIMARY KEY,
            band_id TEXT NOT NULL,
            venue_id TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            booked_at INTEGER NOT NULL,
            scheduled_for INTEGER NOT NULL,
            started_at INTEGER,
            current_song_position INTEGER NOT NULL DEFAULT 0,
            ticket_price REAL NOT NULL DEFAULT 0,
            tickets_sold INTEGER NOT NULL DEFAULT 0,
            predicted_tickets INTEGER NOT NULL DEFAULT 0,
            last_ticket_update INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_gigs_status ON gigs(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_gigs_owner_status ON gigs(owner_id, status)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_setlist_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS setlist_entries (
            gig_id TEXT NOT NULL REFERENCES gigs(id),
            position INTEGER NOT NULL,
            song_id TEXT NOT NULL,
            duration_seconds INTEGER,
            PRIMARY KEY (gig_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_outcomes_table(pool: &SqlitePool) -> Result<()> {
    // gig_id UNIQUE backs the exactly-once outcome creation: racing
    // check-then-insert callers collapse onto one row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS outcomes (
            id TEXT PRIMARY KEY,
            gig_id TEXT NOT NULL UNIQUE REFERENCES gigs(id),
            attendance INTEGER NOT NULL DEFAULT 0,
            ticket_revenue REAL NOT NULL DEFAULT 0,
            merch_revenue REAL NOT NULL DEFAULT 0,
            total_revenue REAL NOT NULL DEFAULT 0,
            costs REAL NOT NULL DEFAULT 0,
            net_profit REAL NOT NULL DEFAULT 0,
            overall_rating REAL NOT NULL DEFAULT 0,
            performance_grade TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_song_performances_table(pool: &SqlitePool) -> Result<()> {
    // UNIQUE(outcome_id, position) is the idempotency anchor: concurrent
    // processors of the same position collapse onto one row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS song_performances (
            id TEXT PRIMARY KEY,
            outcome_id TEXT NOT NULL REFERENCES outcomes(id),
            position INTEGER NOT NULL,
            song_id TEXT NOT NULL,
            score REAL NOT NULL,
            revenue REAL NOT NULL DEFAULT 0,
            fame_gain REAL NOT NULL DEFAULT 0,
            performed_at INTEGER NOT NULL,
            UNIQUE (outcome_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
