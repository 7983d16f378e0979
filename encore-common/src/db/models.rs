//! Database models

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Gig lifecycle state
///
/// Allowed transitions: scheduled → in_progress → completed, with cancelled
/// reachable from either non-terminal state. All transitions are performed
/// by guarded UPDATEs so a stale caller loses quietly instead of regressing
/// the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GigStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl GigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GigStatus::Scheduled => "scheduled",
            GigStatus::InProgress => "in_progress",
            GigStatus::Completed => "completed",
            GigStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, GigStatus::Completed | GigStatus::Cancelled)
    }
}

impl fmt::Display for GigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GigStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(GigStatus::Scheduled),
            "in_progress" => Ok(GigStatus::InProgress),
            "completed" => Ok(GigStatus::Completed),
            "cancelled" => Ok(GigStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("unknown gig status: {other}"))),
        }
    }
}

/// One scheduled-then-executed live show instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gig {
    pub id: Uuid,
    pub band_id: Uuid,
    pub venue_id: Uuid,
    /// The player who booked this gig; the global sweep iterates per owner
    pub owner_id: Uuid,
    pub status: GigStatus,
    pub booked_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
    /// Set once, on the scheduled → in_progress transition
    pub started_at: Option<DateTime<Utc>>,
    /// 0-based cursor into the setlist; monotone non-decreasing, advanced
    /// only by the song performance processor
    pub current_song_position: i64,
    pub ticket_price: f64,
    pub tickets_sold: i64,
    pub predicted_tickets: i64,
    pub last_ticket_update: Option<DateTime<Utc>>,
}

/// One position of a gig's setlist; immutable once the gig starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetlistEntry {
    pub gig_id: Uuid,
    /// 0-based, unique within the setlist
    pub position: i64,
    pub song_id: Uuid,
    /// None or non-positive means the song's duration is unknown; pacing
    /// substitutes a fallback so progression never stalls
    pub duration_seconds: Option<i64>,
}

/// Aggregate financial/quality result for one gig; created lazily, exactly
/// once, on first processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: Uuid,
    pub gig_id: Uuid,
    pub attendance: i64,
    pub ticket_revenue: f64,
    pub merch_revenue: f64,
    pub total_revenue: f64,
    pub costs: f64,
    pub net_profit: f64,
    pub overall_rating: f64,
    pub performance_grade: Option<String>,
}

/// Point-in-time record of one performed setlist position
///
/// (outcome_id, position) is unique: a position is "done" iff a row exists
/// for it. This is the idempotency anchor for the whole progression engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongPerformance {
    pub id: Uuid,
    pub outcome_id: Uuid,
    pub position: i64,
    pub song_id: Uuid,
    pub score: f64,
    pub revenue: f64,
    pub fame_gain: f64,
    pub performed_at: DateTime<Utc>,
}

/// Performing act; fame and fan base feed scoring and ticket demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub id: Uuid,
    pub name: String,
    pub fame: f64,
    pub fan_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub capacity: i64,
    pub base_cost: f64,
}
