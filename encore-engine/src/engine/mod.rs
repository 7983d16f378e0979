//! Gig progression state machine
//!
//! **Responsibilities:**
//! - The single `advance()` entry point every trigger converges on
//! - Lifecycle transitions (start, cancel, completion via finalization)
//! - Idempotent outcome creation (check-then-insert, loser re-reads)
//!
//! There is deliberately no owning conductor process: any number of
//! uncoordinated callers may invoke `advance()` at any time, so every step
//! is safe under arbitrary repetition and interleaving. Correctness comes
//! from existence-checked inserts and monotonic guarded updates, not call
//! ordering.

mod finalize;
mod song;

pub(crate) use song::ProcessResult;

use crate::error::{Error, Result};
use crate::pacing::{self, SetlistPacing};
use crate::scoring::{HouseScorer, RevenueLedger, SongScorer, TracingLedger};
use encore_common::db::{queries, Band, Gig, GigStatus, Outcome, Venue};
use encore_common::time::now;
use encore_common::{ChangeNotifier, GigEvent};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What one `advance()` call accomplished, plus the wake-up hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Gig is scheduled, cancelled, or unknown; nothing to do
    NotInProgress,
    /// Gig is live; `processed` positions were performed by this call and
    /// `next_due` says when the next position comes due
    InProgress {
        processed: usize,
        next_due: Option<Duration>,
    },
    /// Gig is completed (by this call or a previous one)
    Completed,
}

impl AdvanceOutcome {
    /// The focused trigger's scheduling hint, if one applies
    pub fn next_due(&self) -> Option<Duration> {
        match self {
            AdvanceOutcome::InProgress { next_due, .. } => *next_due,
            _ => None,
        }
    }
}

/// The progression engine shared by all triggers
pub struct GigEngine {
    pool: SqlitePool,
    notifier: ChangeNotifier,
    scorer: Arc<dyn SongScorer>,
    ledger: Arc<dyn RevenueLedger>,
}

impl GigEngine {
    /// Create an engine with the default scorer and ledger
    pub fn new(pool: SqlitePool, notifier: ChangeNotifier) -> Self {
        Self::with_collaborators(
            pool,
            notifier,
            Arc::new(HouseScorer),
            Arc::new(TracingLedger),
        )
    }

    /// Create an engine with explicit collaborators (tests substitute
    /// deterministic scorers here)
    pub fn with_collaborators(
        pool: SqlitePool,
        notifier: ChangeNotifier,
        scorer: Arc<dyn SongScorer>,
        ledger: Arc<dyn RevenueLedger>,
    ) -> Self {
        Self {
            pool,
            notifier,
            scorer,
            ledger,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Advance a gig as far as wall-clock time allows
    ///
    /// Safe to call from any number of concurrent triggers; redundant calls
    /// degrade to existence checks and no-op guarded updates.
    pub async fn advance(&self, gig_id: Uuid) -> Result<AdvanceOutcome> {
        let Some(gig) = queries::get_gig(&self.pool, gig_id).await? else {
            debug!(%gig_id, "advance called for unknown gig");
            return Ok(AdvanceOutcome::NotInProgress);
        };

        match gig.status {
            GigStatus::InProgress => {}
            GigStatus::Completed => return Ok(AdvanceOutcome::Completed),
            _ => {
                debug!(%gig_id, status = %gig.status, "advance is a no-op");
                return Ok(AdvanceOutcome::NotInProgress);
            }
        }

        let setlist = queries::get_setlist(&self.pool, gig_id).await?;
        let pacing = SetlistPacing::new(setlist.iter().map(|e| e.duration_seconds));

        // Outcome creation races with other triggers; first writer wins and
        // the loser re-reads the winner's row
        let outcome = self.ensure_outcome(&gig).await?;

        // An in-progress gig without started_at is inconsistent data; treat
        // as zero elapsed so nothing is due and the next tick retries
        let elapsed = match gig.started_at {
            Some(started_at) => pacing::elapsed_secs(started_at, now()),
            None => {
                warn!(%gig_id, "in-progress gig has no started_at");
                0
            }
        };

        let due = pacing.due_count(elapsed);
        let cursor = gig.current_song_position.max(0) as usize;
        let mut processed = 0;

        if due > cursor {
            // One scoring context per call; positions are processed strictly
            // in ascending order because later pacing depends on all earlier
            // durations being fixed
            let (band, venue) = self.load_context(&gig).await?;
            for position in cursor..due {
                let Some(entry) = setlist.get(position) else {
                    warn!(%gig_id, position, "cursor beyond setlist length");
                    break;
                };
                match self
                    .process_song(&gig, &band, &venue, outcome.id, entry, setlist.len())
                    .await?
                {
                    ProcessResult::Performed(_) => processed += 1,
                    ProcessResult::AlreadyProcessed => {}
                    ProcessResult::Halted => {
                        // The cursor guard saw a status we did not; re-read
                        // and report the fresh state instead of writing more
                        let status = queries::get_gig(&self.pool, gig_id)
                            .await?
                            .map(|g| g.status);
                        return Ok(match status {
                            Some(GigStatus::Completed) => AdvanceOutcome::Completed,
                            Some(GigStatus::InProgress) => AdvanceOutcome::InProgress {
                                processed,
                                next_due: pacing.next_due_in(elapsed),
                            },
                            _ => AdvanceOutcome::NotInProgress,
                        });
                    }
                }
            }
        }

        if pacing.is_complete(elapsed) {
            return self.finalize_gig(&gig, &outcome).await;
        }

        Ok(AdvanceOutcome::InProgress {
            processed,
            next_due: pacing.next_due_in(elapsed),
        })
    }

    /// scheduled → in_progress: sets started_at and status atomically.
    /// Returns false if the gig was not in `scheduled` (already started,
    /// cancelled, or unknown).
    pub async fn start(&self, gig_id: Uuid) -> Result<bool> {
        let started = queries::mark_started(&self.pool, gig_id, now()).await?;
        if started {
            info!(%gig_id, "gig started");
            self.notifier.notify(GigEvent::GigStarted {
                gig_id,
                timestamp: now(),
            });
        } else {
            debug!(%gig_id, "start was a no-op");
        }
        Ok(started)
    }

    /// Cancel from either non-terminal state; a no-op on terminal gigs
    pub async fn cancel(&self, gig_id: Uuid) -> Result<bool> {
        let cancelled = queries::mark_cancelled(&self.pool, gig_id).await?;
        if cancelled {
            info!(%gig_id, "gig cancelled");
            self.notifier.notify(GigEvent::GigCancelled {
                gig_id,
                timestamp: now(),
            });
        }
        Ok(cancelled)
    }

    /// Ensure exactly one outcome row exists for the gig
    ///
    /// Check-then-insert with a UNIQUE constraint absorbing the race: the
    /// losing writer discards its provisional row and re-reads the winner's.
    async fn ensure_outcome(&self, gig: &Gig) -> Result<Outcome> {
        if let Some(outcome) = queries::get_outcome_by_gig(&self.pool, gig.id).await? {
            return Ok(outcome);
        }

        // Provisional estimates; finalization overwrites with real aggregates
        let ticket_revenue = gig.tickets_sold as f64 * gig.ticket_price;
        let provisional = Outcome {
            id: Uuid::new_v4(),
            gig_id: gig.id,
            attendance: gig.tickets_sold,
            ticket_revenue,
            merch_revenue: 0.0,
            total_revenue: ticket_revenue,
            costs: 0.0,
            net_profit: ticket_revenue,
            overall_rating: 0.0,
            performance_grade: None,
        };

        if queries::insert_outcome(&self.pool, &provisional).await? {
            info!(gig_id = %gig.id, outcome_id = %provisional.id, "created outcome");
            return Ok(provisional);
        }

        debug!(gig_id = %gig.id, "lost outcome creation race, re-reading");
        queries::get_outcome_by_gig(&self.pool, gig.id)
            .await?
            .ok_or_else(|| Error::Internal(format!("outcome vanished for gig {}", gig.id)))
    }

    /// Load the scoring context, degrading to neutral placeholders when the
    /// band or venue row is missing so progression never stalls on bad data
    async fn load_context(&self, gig: &Gig) -> Result<(Band, Venue)> {
        let band = match queries::get_band(&self.pool, gig.band_id).await? {
            Some(band) => band,
            None => {
                warn!(gig_id = %gig.id, band_id = %gig.band_id, "band missing, using placeholder");
                Band {
                    id: gig.band_id,
                    name: String::new(),
                    fame: 0.0,
                    fan_count: 0,
                }
            }
        };
        let venue = match queries::get_venue(&self.pool, gig.venue_id).await? {
            Some(venue) => venue,
            None => {
                warn!(gig_id = %gig.id, venue_id = %gig.venue_id, "venue missing, using placeholder");
                Venue {
                    id: gig.venue_id,
                    name: String::new(),
                    capacity: 0,
                    base_cost: 0.0,
                }
            }
        };
        Ok((band, venue))
    }
}
