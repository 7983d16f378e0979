//! Ticket demand simulator
//!
//! A batch sweep over every not-yet-started gig that sells one simulated
//! day's worth of tickets. Demand is a product of:
//!
//! 1. **draw power**: fame against a fixed ceiling, weighted with fan base
//!    against 3x venue capacity, penalized linearly for large venues and
//!    capped at 1.2
//! 2. a **base daily sale rate** from four tiers of draw power, each linear
//!    within its band and deliberately discontinuous at the boundaries
//!    (a buzzing act sells at a different *rate*, not a scaled amount)
//! 3. an advance-booking bonus, a price-sensitivity factor, and an urgency
//!    multiplier near the event date
//!
//! The result is scaled by capacity, jittered ±20%, and clamped to the
//! remaining unsold capacity, so a gig never oversells.
//!
//! Unlike the progression engine, this sweep is deliberately **not**
//! idempotent: one run means one simulated day of sales, and running twice
//! in the same window double-sells. Cadence control belongs to the caller.

use crate::error::Result;
use chrono::{DateTime, Utc};
use encore_common::db::{queries, Gig};
use encore_common::time::now;
use encore_common::{ChangeNotifier, GigEvent};
use rand::Rng;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Fame value treated as "as famous as it gets" for draw purposes
pub const FAME_CEILING: f64 = 10_000.0;
/// Weight of fame vs. fan base in draw power
const FAME_WEIGHT: f64 = 0.6;
const FAN_WEIGHT: f64 = 0.4;
/// Venue size where the linear draw penalty bottoms out at 50%
const VENUE_PENALTY_CAPACITY: f64 = 10_000.0;
/// Hard cap on draw power
pub const DRAW_POWER_CAP: f64 = 1.2;
/// Advance-booking bonus: up to +30%, saturating at a 14-day horizon
const BOOKING_BONUS_MAX: f64 = 0.3;
const BOOKING_HORIZON_DAYS: f64 = 14.0;
/// Price-sensitivity floor
const PRICE_FACTOR_FLOOR: f64 = 0.5;
/// Multiplicative randomness applied to each day's sales
const JITTER: f64 = 0.2;

/// Derived per-gig inputs for one simulated day of demand
#[derive(Debug, Clone)]
pub struct TicketSalesState {
    pub venue_capacity: i64,
    pub tickets_sold: i64,
    pub ticket_price: f64,
    pub band_fame: f64,
    pub band_fan_count: i64,
    pub days_until_event: i64,
    pub days_between_booking_and_event: i64,
}

/// Draw power: a 0–1.2 estimate of an act's ability to fill this venue
pub fn draw_power(fame: f64, fan_count: i64, capacity: i64) -> f64 {
    let fame_ratio = (fame / FAME_CEILING).max(0.0);
    let fan_ratio = if capacity > 0 {
        (fan_count as f64 / (3.0 * capacity as f64)).max(0.0)
    } else {
        0.0
    };
    // Bigger rooms are harder to fill: linear penalty up to 50%
    let venue_scale =
        1.0 - 0.5 * ((capacity as f64).min(VENUE_PENALTY_CAPACITY) / VENUE_PENALTY_CAPACITY);

    ((FAME_WEIGHT * fame_ratio + FAN_WEIGHT * fan_ratio) * venue_scale).clamp(0.0, DRAW_POWER_CAP)
}

/// Base daily sale rate (fraction of capacity sold per day) from draw power
///
/// Four demand regimes, each linear in draw power within its band. The
/// jumps at 1.0 / 0.7 / 0.4 are intentional: crossing into a hotter regime
/// changes the selling *rate*, not just its scale.
pub fn base_daily_rate(draw: f64) -> f64 {
    if draw >= 1.0 {
        0.20 + (draw - 1.0) * 0.50
    } else if draw >= 0.7 {
        0.10 + (draw - 0.7) * 0.20
    } else if draw >= 0.4 {
        0.04 + (draw - 0.4) * 0.10
    } else {
        0.01 + draw * 0.05
    }
}

/// Advance-booking bonus: longer lead times build more word of mouth,
/// saturating at the 14-day horizon
pub fn booking_bonus(days_between_booking_and_event: i64) -> f64 {
    let days = (days_between_booking_and_event.max(0) as f64).min(BOOKING_HORIZON_DAYS);
    1.0 + BOOKING_BONUS_MAX * (days / BOOKING_HORIZON_DAYS)
}

/// Price sensitivity: decreases linearly with ticket price, floored at 0.5
pub fn price_factor(ticket_price: f64) -> f64 {
    (1.0 - ticket_price / 100.0).max(PRICE_FACTOR_FLOOR)
}

/// Urgency multiplier as the event approaches
pub fn urgency_multiplier(days_until_event: i64) -> f64 {
    if days_until_event <= 3 {
        1.5
    } else if days_until_event <= 7 {
        1.2
    } else {
        1.0
    }
}

/// Deterministic tickets-today target, before randomness and clamping
pub fn tickets_today_deterministic(state: &TicketSalesState) -> f64 {
    let draw = draw_power(state.band_fame, state.band_fan_count, state.venue_capacity);
    state.venue_capacity as f64
        * base_daily_rate(draw)
        * booking_bonus(state.days_between_booking_and_event)
        * price_factor(state.ticket_price)
        * urgency_multiplier(state.days_until_event)
}

/// Apply ±20% jitter and clamp to remaining unsold capacity
fn tickets_today<R: Rng>(state: &TicketSalesState, rng: &mut R) -> i64 {
    let remaining = (state.venue_capacity - state.tickets_sold).max(0);
    if remaining == 0 {
        return 0;
    }
    let target = tickets_today_deterministic(state);
    let jittered = target * rng.gen_range(1.0 - JITTER..=1.0 + JITTER);
    (jittered.round() as i64).clamp(0, remaining)
}

/// Counters for one sweep, for logging and tests
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub gigs_seen: usize,
    pub gigs_sold: usize,
    pub gigs_skipped: usize,
    pub gigs_failed: usize,
    pub tickets_sold: i64,
}

/// The daily demand sweep over all scheduled gigs
pub struct TicketDemandSimulator {
    pool: SqlitePool,
    notifier: ChangeNotifier,
}

impl TicketDemandSimulator {
    pub fn new(pool: SqlitePool, notifier: ChangeNotifier) -> Self {
        Self { pool, notifier }
    }

    /// Sell one simulated day's worth of tickets for every scheduled gig
    ///
    /// Failures for one gig never block the rest of the sweep.
    pub async fn run_daily_sweep(&self) -> Result<SweepStats> {
        let gigs = queries::list_scheduled_gigs(&self.pool).await?;
        let mut stats = SweepStats::default();
        stats.gigs_seen = gigs.len();

        for gig in gigs {
            match self.sell_for_gig(&gig).await {
                Ok(None) => stats.gigs_skipped += 1,
                Ok(Some(count)) => {
                    if count > 0 {
                        stats.gigs_sold += 1;
                        stats.tickets_sold += count;
                    }
                }
                Err(e) => {
                    stats.gigs_failed += 1;
                    warn!(gig_id = %gig.id, error = %e, "ticket sweep failed for gig");
                }
            }
        }

        info!(
            seen = stats.gigs_seen,
            sold_for = stats.gigs_sold,
            skipped = stats.gigs_skipped,
            failed = stats.gigs_failed,
            tickets = stats.tickets_sold,
            "ticket demand sweep complete"
        );
        Ok(stats)
    }

    /// One gig's simulated day; None means the gig was skipped at capacity
    async fn sell_for_gig(&self, gig: &Gig) -> Result<Option<i64>> {
        let state = match self.sales_state(gig, now()).await? {
            Some(state) => state,
            None => return Ok(None),
        };

        if state.tickets_sold >= state.venue_capacity {
            debug!(gig_id = %gig.id, "at capacity, skipping");
            return Ok(None);
        }

        let count = tickets_today(&state, &mut rand::thread_rng());
        if count == 0 {
            return Ok(Some(0));
        }

        queries::add_ticket_sales(&self.pool, gig.id, count, now()).await?;
        debug!(gig_id = %gig.id, count, "tickets sold");
        self.notifier.notify(GigEvent::TicketsSold {
            gig_id: gig.id,
            count,
            tickets_sold: state.tickets_sold + count,
            timestamp: now(),
        });
        Ok(Some(count))
    }

    /// Assemble the derived sales state for one gig; None when the band or
    /// venue row is missing (logged, gig skipped this sweep)
    async fn sales_state(
        &self,
        gig: &Gig,
        now: DateTime<Utc>,
    ) -> Result<Option<TicketSalesState>> {
        let Some(band) = queries::get_band(&self.pool, gig.band_id).await? else {
            warn!(gig_id = %gig.id, "band missing, skipping demand for gig");
            return Ok(None);
        };
        let Some(venue) = queries::get_venue(&self.pool, gig.venue_id).await? else {
            warn!(gig_id = %gig.id, "venue missing, skipping demand for gig");
            return Ok(None);
        };

        Ok(Some(TicketSalesState {
            venue_capacity: venue.capacity,
            tickets_sold: gig.tickets_sold,
            ticket_price: gig.ticket_price,
            band_fame: band.fame,
            band_fan_count: band.fan_count,
            days_until_event: (gig.scheduled_for - now).num_days().max(0),
            days_between_booking_and_event: (gig.scheduled_for - gig.booked_at).num_days().max(0),
        }))
    }
}
