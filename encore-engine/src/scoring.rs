//! Scoring and ledger seams
//!
//! Two collaborator interfaces the progression engine calls out through:
//!
//! - [`SongScorer`] rates one performed song from its context. The exact
//!   artistic formula is a tuning concern; the engine only depends on the
//!   trait, and tests substitute deterministic scorers.
//! - [`RevenueLedger`] receives incremental revenue/fame effects. Calls are
//!   fire-and-forget: the ledger must never fail progression.

use encore_common::db::{Band, Venue};
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

/// Inputs available when scoring one setlist position
#[derive(Debug, Clone)]
pub struct ScoreContext<'a> {
    pub band: &'a Band,
    pub venue: &'a Venue,
    /// Tickets sold by showtime; proxy for crowd size
    pub attendance: i64,
    /// 0-based position being performed
    pub position: i64,
    /// Total setlist length
    pub setlist_len: usize,
}

/// Song scoring collaborator
pub trait SongScorer: Send + Sync {
    /// Rate a performance on a 0-100 scale
    fn score(&self, song_id: Uuid, ctx: &ScoreContext<'_>) -> f64;
}

/// Default scorer: band fame and crowd fill set the baseline, crowd energy
/// builds as the set progresses, and a small random spread keeps repeated
/// shows from being identical.
#[derive(Debug, Default)]
pub struct HouseScorer;

impl SongScorer for HouseScorer {
    fn score(&self, _song_id: Uuid, ctx: &ScoreContext<'_>) -> f64 {
        let fame_factor = (ctx.band.fame / 10_000.0).clamp(0.0, 1.0);
        let fill = if ctx.venue.capacity > 0 {
            (ctx.attendance as f64 / ctx.venue.capacity as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        // Crowd warms up over the set, worth up to 10 points by the closer
        let energy = if ctx.setlist_len > 1 {
            ctx.position as f64 / (ctx.setlist_len as f64 - 1.0)
        } else {
            1.0
        };

        let base = 40.0 + 30.0 * fame_factor + 20.0 * fill + 10.0 * energy;
        let jitter: f64 = rand::thread_rng().gen_range(-8.0..8.0);
        (base + jitter).clamp(0.0, 100.0)
    }
}

/// Incremental effect emitted toward the revenue/fame ledger
#[derive(Debug, Clone)]
pub enum LedgerEffect {
    /// One song's contribution, emitted as it is performed
    SongPlayed {
        gig_id: Uuid,
        song_id: Uuid,
        revenue: f64,
        fame_gain: f64,
    },
    /// The gig's final aggregate result
    GigSettled {
        gig_id: Uuid,
        net_profit: f64,
        overall_rating: f64,
    },
}

/// Revenue/fame ledger collaborator; implementations must not block and
/// must swallow their own failures
pub trait RevenueLedger: Send + Sync {
    fn record(&self, effect: LedgerEffect);
}

/// Default ledger: logs effects and drops them. The real ledger lives in
/// another subsystem; progression only needs the hand-off point.
#[derive(Debug, Default)]
pub struct TracingLedger;

impl RevenueLedger for TracingLedger {
    fn record(&self, effect: LedgerEffect) {
        debug!(?effect, "ledger effect recorded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_fixture<'a>(band: &'a Band, venue: &'a Venue) -> ScoreContext<'a> {
        ScoreContext {
            band,
            venue,
            attendance: 500,
            position: 0,
            setlist_len: 3,
        }
    }

    fn band(fame: f64) -> Band {
        Band {
            id: Uuid::new_v4(),
            name: "Test Band".into(),
            fame,
            fan_count: 1000,
        }
    }

    fn venue(capacity: i64) -> Venue {
        Venue {
            id: Uuid::new_v4(),
            name: "Test Venue".into(),
            capacity,
            base_cost: 100.0,
        }
    }

    #[test]
    fn test_score_stays_in_range() {
        let band = band(50_000.0);
        let venue = venue(100);
        let scorer = HouseScorer;
        for _ in 0..100 {
            let score = scorer.score(Uuid::new_v4(), &ctx_fixture(&band, &venue));
            assert!((0.0..=100.0).contains(&score), "score out of range: {score}");
        }
    }

    #[test]
    fn test_zero_capacity_venue_does_not_panic() {
        let band = band(0.0);
        let venue = venue(0);
        let score = HouseScorer.score(Uuid::new_v4(), &ctx_fixture(&band, &venue));
        assert!(score.is_finite());
    }
}
