//! Gig, setlist, outcome, and performance queries
//!
//! All writes here are designed for uncoordinated concurrent callers:
//! inserts that must happen exactly once use `ON CONFLICT DO NOTHING` and
//! report whether this caller won, and status/cursor updates carry their
//! precondition in the WHERE clause so a stale caller's write is a no-op.

use crate::db::models::*;
use crate::time::{from_unix_secs, to_unix_secs};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

fn uuid_col(row: &SqliteRow, col: &str) -> Result<Uuid> {
    let s: String = row.get(col);
    Uuid::parse_str(&s).map_err(|e| Error::Internal(format!("bad uuid in column {col}: {e}")))
}

fn gig_from_row(row: &SqliteRow) -> Result<Gig> {
    let status: String = row.get("status");
    Ok(Gig {
        id: uuid_col(row, "id")?,
        band_id: uuid_col(row, "band_id")?,
        venue_id: uuid_col(row, "venue_id")?,
        owner_id: uuid_col(row, "owner_id")?,
        status: status.parse()?,
        booked_at: from_unix_secs(row.get("booked_at")),
        scheduled_for: from_unix_secs(row.get("scheduled_for")),
        started_at: row.get::<Option<i64>, _>("started_at").map(from_unix_secs),
        current_song_position: row.get("current_song_position"),
        ticket_price: row.get("ticket_price"),
        tickets_sold: row.get("tickets_sold"),
        predicted_tickets: row.get("predicted_tickets"),
        last_ticket_update: row
            .get::<Option<i64>, _>("last_ticket_update")
            .map(from_unix_secs),
    })
}

fn performance_from_row(row: &SqliteRow) -> Result<SongPerformance> {
    Ok(SongPerformance {
        id: uuid_col(row, "id")?,
        outcome_id: uuid_col(row, "outcome_id")?,
        position: row.get("position"),
        song_id: uuid_col(row, "song_id")?,
        score: row.get("score"),
        revenue: row.get("revenue"),
        fame_gain: row.get("fame_gain"),
        performed_at: from_unix_secs(row.get("performed_at")),
    })
}

fn outcome_from_row(row: &SqliteRow) -> Result<Outcome> {
    Ok(Outcome {
        id: uuid_col(row, "id")?,
        gig_id: uuid_col(row, "gig_id")?,
        attendance: row.get("attendance"),
        ticket_revenue: row.get("ticket_revenue"),
        merch_revenue: row.get("merch_revenue"),
        total_revenue: row.get("total_revenue"),
        costs: row.get("costs"),
        net_profit: row.get("net_profit"),
        overall_rating: row.get("overall_rating"),
        performance_grade: row.get("performance_grade"),
    })
}

/// Get a gig by id
pub async fn get_gig(pool: &SqlitePool, gig_id: Uuid) -> Result<Option<Gig>> {
    let row = sqlx::query("SELECT * FROM gigs WHERE id = ?")
        .bind(gig_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(gig_from_row).transpose()
}

/// All in-progress gigs owned by one player, for the global sweep
pub async fn list_in_progress_gigs_for_owner(
    pool: &SqlitePool,
    owner_id: Uuid,
) -> Result<Vec<Gig>> {
    let rows = sqlx::query(
        "SELECT * FROM gigs WHERE owner_id = ? AND status = 'in_progress' ORDER BY started_at",
    )
    .bind(owner_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(gig_from_row).collect()
}

/// Owners who currently have at least one in-progress gig; the sweep
/// harness runs one global sweep per active owner
pub async fn list_active_owners(pool: &SqlitePool) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT DISTINCT owner_id FROM gigs WHERE status = 'in_progress'")
        .fetch_all(pool)
        .await?;
    rows.iter().map(|row| uuid_col(row, "owner_id")).collect()
}

/// All not-yet-started gigs, for the ticket-demand sweep
pub async fn list_scheduled_gigs(pool: &SqlitePool) -> Result<Vec<Gig>> {
    let rows = sqlx::query("SELECT * FROM gigs WHERE status = 'scheduled' ORDER BY scheduled_for")
        .fetch_all(pool)
        .await?;
    rows.iter().map(gig_from_row).collect()
}

/// Ordered setlist for a gig (the setlist provider interface)
pub async fn get_setlist(pool: &SqlitePool, gig_id: Uuid) -> Result<Vec<SetlistEntry>> {
    let rows = sqlx::query(
        "SELECT gig_id, position, song_id, duration_seconds
         FROM setlist_entries WHERE gig_id = ? ORDER BY position",
    )
    .bind(gig_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SetlistEntry {
                gig_id: uuid_col(row, "gig_id")?,
                position: row.get("position"),
                song_id: uuid_col(row, "song_id")?,
                duration_seconds: row.get("duration_seconds"),
            })
        })
        .collect()
}

pub async fn get_band(pool: &SqlitePool, band_id: Uuid) -> Result<Option<Band>> {
    let row = sqlx::query("SELECT * FROM bands WHERE id = ?")
        .bind(band_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(|row| {
        Ok(Band {
            id: uuid_col(&row, "id")?,
            name: row.get("name"),
            fame: row.get("fame"),
            fan_count: row.get("fan_count"),
        })
    })
    .transpose()
}

pub async fn get_venue(pool: &SqlitePool, venue_id: Uuid) -> Result<Option<Venue>> {
    let row = sqlx::query("SELECT * FROM venues WHERE id = ?")
        .bind(venue_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(|row| {
        Ok(Venue {
            id: uuid_col(&row, "id")?,
            name: row.get("name"),
            capacity: row.get("capacity"),
            base_cost: row.get("base_cost"),
        })
    })
    .transpose()
}

/// Get the outcome row for a gig, if one has been created yet
pub async fn get_outcome_by_gig(pool: &SqlitePool, gig_id: Uuid) -> Result<Option<Outcome>> {
    let row = sqlx::query("SELECT * FROM outcomes WHERE gig_id = ?")
        .bind(gig_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(outcome_from_row).transpose()
}

/// Insert an outcome row; returns false if another caller already created
/// one for this gig (the UNIQUE(gig_id) constraint absorbs the race)
pub async fn insert_outcome(pool: &SqlitePool, outcome: &Outcome) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO outcomes
            (id, gig_id, attendance, ticket_revenue, merch_revenue,
             total_revenue, costs, net_profit, overall_rating, performance_grade)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (gig_id) DO NOTHING
        "#,
    )
    .bind(outcome.id.to_string())
    .bind(outcome.gig_id.to_string())
    .bind(outcome.attendance)
    .bind(outcome.ticket_revenue)
    .bind(outcome.merch_revenue)
    .bind(outcome.total_revenue)
    .bind(outcome.costs)
    .bind(outcome.net_profit)
    .bind(outcome.overall_rating)
    .bind(outcome.performance_grade.clone())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Overwrite an outcome's aggregate fields at finalization
pub async fn update_outcome(pool: &SqlitePool, outcome: &Outcome) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE outcomes
        SET attendance = ?, ticket_revenue = ?, merch_revenue = ?,
            total_revenue = ?, costs = ?, net_profit = ?,
            overall_rating = ?, performance_grade = ?
        WHERE id = ?
        "#,
    )
    .bind(outcome.attendance)
    .bind(outcome.ticket_revenue)
    .bind(outcome.merch_revenue)
    .bind(outcome.total_revenue)
    .bind(outcome.costs)
    .bind(outcome.net_profit)
    .bind(outcome.overall_rating)
    .bind(outcome.performance_grade.clone())
    .bind(outcome.id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Get the performance record at one setlist position, if any
pub async fn get_song_performance(
    pool: &SqlitePool,
    outcome_id: Uuid,
    position: i64,
) -> Result<Option<SongPerformance>> {
    let row = sqlx::query("SELECT * FROM song_performances WHERE outcome_id = ? AND position = ?")
        .bind(outcome_id.to_string())
        .bind(position)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(performance_from_row).transpose()
}

/// Insert a performance record; returns false if the position was already
/// processed by another caller (race loss, not an error)
pub async fn insert_song_performance(
    pool: &SqlitePool,
    performance: &SongPerformance,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO song_performances
            (id, outcome_id, position, song_id, score, revenue, fame_gain, performed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (outcome_id, position) DO NOTHING
        "#,
    )
    .bind(performance.id.to_string())
    .bind(performance.outcome_id.to_string())
    .bind(performance.position)
    .bind(performance.song_id.to_string())
    .bind(performance.score)
    .bind(performance.revenue)
    .bind(performance.fame_gain)
    .bind(to_unix_secs(performance.performed_at))
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// All performance records for an outcome, in setlist order
pub async fn list_song_performances(
    pool: &SqlitePool,
    outcome_id: Uuid,
) -> Result<Vec<SongPerformance>> {
    let rows = sqlx::query("SELECT * FROM song_performances WHERE outcome_id = ? ORDER BY position")
        .bind(outcome_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(performance_from_row).collect()
}

/// Advance the gig's song cursor to `position + 1`
///
/// The WHERE clause makes this commutative under replay: the cursor only
/// moves forward, a redundant or out-of-date caller changes nothing, and a
/// cancellation that raced in stops the advance entirely.
pub async fn advance_position(pool: &SqlitePool, gig_id: Uuid, position: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE gigs SET current_song_position = ?
        WHERE id = ? AND current_song_position <= ? AND status = 'in_progress'
        "#,
    )
    .bind(position + 1)
    .bind(gig_id.to_string())
    .bind(position)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// scheduled → in_progress; sets started_at and status in one statement
pub async fn mark_started(pool: &SqlitePool, gig_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE gigs SET status = 'in_progress', started_at = ? WHERE id = ? AND status = 'scheduled'",
    )
    .bind(to_unix_secs(now))
    .bind(gig_id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// in_progress → completed; returns false if another caller got there first
pub async fn mark_completed(pool: &SqlitePool, gig_id: Uuid) -> Result<bool> {
    let result =
        sqlx::query("UPDATE gigs SET status = 'completed' WHERE id = ? AND status = 'in_progress'")
            .bind(gig_id.to_string())
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Cancel from either non-terminal state
pub async fn mark_cancelled(pool: &SqlitePool, gig_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE gigs SET status = 'cancelled' WHERE id = ? AND status IN ('scheduled', 'in_progress')",
    )
    .bind(gig_id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Record one sweep's ticket sales for a scheduled gig
pub async fn add_ticket_sales(
    pool: &SqlitePool,
    gig_id: Uuid,
    count: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE gigs SET tickets_sold = tickets_sold + ?, last_ticket_update = ?
        WHERE id = ? AND status = 'scheduled'
        "#,
    )
    .bind(count)
    .bind(to_unix_secs(now))
    .bind(gig_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a band (seeding / test fixtures)
pub async fn insert_band(pool: &SqlitePool, band: &Band) -> Result<()> {
    sqlx::query("INSERT INTO bands (id, name, fame, fan_count) VALUES (?, ?, ?, ?)")
        .bind(band.id.to_string())
        .bind(band.name.clone())
        .bind(band.fame)
        .bind(band.fan_count)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert a venue (seeding / test fixtures)
pub async fn insert_venue(pool: &SqlitePool, venue: &Venue) -> Result<()> {
    sqlx::query("INSERT INTO venues (id, name, capacity, base_cost) VALUES (?, ?, ?, ?)")
        .bind(venue.id.to_string())
        .bind(venue.name.clone())
        .bind(venue.capacity)
        .bind(venue.base_cost)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert a gig (creation is owned by the scheduling domain; the engine
/// only ever mutates existing rows)
pub async fn insert_gig(pool: &SqlitePool, gig: &Gig) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO gigs
            (id, band_id, venue_id, owner_id, status, booked_at, scheduled_for,
             started_at, current_song_position, ticket_price, tickets_sold,
             predicted_tickets, last_ticket_update)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(gig.id.to_string())
    .bind(gig.band_id.to_string())
    .bind(gig.venue_id.to_string())
    .bind(gig.owner_id.to_string())
    .bind(gig.status.as_str())
    .bind(to_unix_secs(gig.booked_at))
    .bind(to_unix_secs(gig.scheduled_for))
    .bind(gig.started_at.map(to_unix_secs))
    .bind(gig.current_song_position)
    .bind(gig.ticket_price)
    .bind(gig.tickets_sold)
    .bind(gig.predicted_tickets)
    .bind(gig.last_ticket_update.map(to_unix_secs))
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert one setlist position (seeding / test fixtures)
pub async fn insert_setlist_entry(pool: &SqlitePool, entry: &SetlistEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO setlist_entries (gig_id, position, song_id, duration_seconds) VALUES (?, ?, ?, ?)",
    )
    .bind(entry.gig_id.to_string())
    .bind(entry.position)
    .bind(entry.song_id.to_string())
    .bind(entry.duration_seconds)
    .execute(pool)
    .await?;
    Ok(())
}
