//! Setlist pacing: how far a live gig should have progressed by now
//!
//! This is the pure time arithmetic behind the progression engine. Given a
//! gig's start time, the current wall-clock time, and the ordered list of
//! song durations, it answers:
//!
//! - how many seconds of the show have elapsed
//! - which setlist positions are *due* (their song has fully played out)
//! - whether the whole setlist has run its course
//! - how long until the next position comes due (the wake-up hint used by
//!   the focused trigger loop)
//!
//! A position is due once the cumulative duration of the setlist **through
//! that position** has elapsed: a song is performed when it finishes, not
//! when it starts. A 3-song setlist of [180, 200, 150] seconds has due
//! boundaries at 180 s, 380 s, and 530 s.
//!
//! No side effects, no clock access; callers pass `now` in.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Substitute duration for songs with a missing or non-positive duration.
///
/// Guarantees forward progress: a gig whose setlist data is incomplete
/// still paces through every position and reaches completion.
pub const FALLBACK_SONG_DURATION_SECS: i64 = 180;

/// Precomputed cumulative pacing for one setlist
#[derive(Debug, Clone)]
pub struct SetlistPacing {
    /// boundaries[i] = seconds from gig start until position i is due
    boundaries: Vec<i64>,
}

impl SetlistPacing {
    /// Build pacing from the setlist's durations, in position order.
    ///
    /// `None` and non-positive durations fall back to
    /// [`FALLBACK_SONG_DURATION_SECS`].
    pub fn new<I>(durations: I) -> Self
    where
        I: IntoIterator<Item = Option<i64>>,
    {
        let mut boundaries = Vec::new();
        let mut total = 0i64;
        for duration in durations {
            let secs = match duration {
                Some(d) if d > 0 => d,
                _ => FALLBACK_SONG_DURATION_SECS,
            };
            total += secs;
            boundaries.push(total);
        }
        Self { boundaries }
    }

    /// Number of setlist positions
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// An empty setlist is immediately eligible for completion
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Total runtime of the full setlist in seconds
    pub fn total_secs(&self) -> i64 {
        self.boundaries.last().copied().unwrap_or(0)
    }

    /// Seconds from gig start until `position` is due
    pub fn due_at(&self, position: usize) -> Option<i64> {
        self.boundaries.get(position).copied()
    }

    /// Count of positions due at `elapsed_secs`; positions `0..due_count`
    /// should all have been performed by now
    pub fn due_count(&self, elapsed_secs: i64) -> usize {
        self.boundaries.iter().filter(|&&b| b <= elapsed_secs).count()
    }

    /// Whether elapsed time covers the full setlist duration
    pub fn is_complete(&self, elapsed_secs: i64) -> bool {
        elapsed_secs >= self.total_secs()
    }

    /// Time until the next position comes due, or None once every boundary
    /// has passed. This is the precise wake-up hint for a watching trigger.
    pub fn next_due_in(&self, elapsed_secs: i64) -> Option<Duration> {
        self.boundaries
            .iter()
            .find(|&&b| b > elapsed_secs)
            .map(|&b| Duration::from_secs((b - elapsed_secs) as u64))
    }
}

/// Seconds elapsed since the gig started, clamped to zero for gigs whose
/// start timestamp is still in the future (nothing is due yet)
pub fn elapsed_secs(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started_at).num_seconds().max(0)
}
