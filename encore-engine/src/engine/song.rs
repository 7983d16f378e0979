//! Song performance processor
//!
//! Processes one (gig, outcome, position) triple exactly once. The
//! existence check runs immediately before the insert (never cached from an
//! earlier read) because concurrent triggers race to process the same
//! position; the UNIQUE(outcome_id, position) constraint catches whatever
//! slips between the check and the write.

use super::GigEngine;
use crate::error::Result;
use crate::scoring::{LedgerEffect, ScoreContext};
use encore_common::db::{queries, Band, Gig, SetlistEntry, SongPerformance, Venue};
use encore_common::time::now;
use encore_common::GigEvent;
use tracing::{debug, info};
use uuid::Uuid;

/// Share of the crowd buying merch per song, scaled by performance quality
const MERCH_RATE_PER_SONG: f64 = 0.15;

/// Fame points per song at a perfect score
const FAME_GAIN_PER_SONG: f64 = 5.0;

/// Result of processing one setlist position
#[derive(Debug)]
pub(crate) enum ProcessResult {
    /// This caller computed and persisted the record
    Performed(SongPerformance),
    /// Another caller already owns this position; normal no-op
    AlreadyProcessed,
    /// The guarded cursor advance was refused mid-call: the gig left
    /// `in_progress` under us, or a concurrent caller moved past this
    /// position. The caller must stop processing further positions.
    Halted,
}

impl GigEngine {
    /// Idempotently perform one setlist position
    ///
    /// On success the gig's cursor advances to `position + 1` via a
    /// monotonic guarded update, which makes the whole operation
    /// commutative under replay. On failure nothing advances and the next
    /// trigger tick retries the same position.
    pub(crate) async fn process_song(
        &self,
        gig: &Gig,
        band: &Band,
        venue: &Venue,
        outcome_id: Uuid,
        entry: &SetlistEntry,
        setlist_len: usize,
    ) -> Result<ProcessResult> {
        // Existence check, immediately before any write
        if queries::get_song_performance(&self.pool, outcome_id, entry.position)
            .await?
            .is_some()
        {
            debug!(gig_id = %gig.id, position = entry.position, "position already processed");
            self.heal_cursor(gig.id, entry.position).await?;
            return Ok(ProcessResult::AlreadyProcessed);
        }

        let ctx = ScoreContext {
            band,
            venue,
            attendance: gig.tickets_sold,
            position: entry.position,
            setlist_len,
        };
        let score = self.scorer.score(entry.song_id, &ctx);
        let revenue = gig.tickets_sold as f64 * MERCH_RATE_PER_SONG * (score / 100.0);
        let fame_gain = FAME_GAIN_PER_SONG * (score / 100.0);

        let record = SongPerformance {
            id: Uuid::new_v4(),
            outcome_id,
            position: entry.position,
            song_id: entry.song_id,
            score,
            revenue,
            fame_gain,
            performed_at: now(),
        };

        if !queries::insert_song_performance(&self.pool, &record).await? {
            // A concurrent caller won between our check and our insert
            debug!(gig_id = %gig.id, position = entry.position, "lost processing race");
            self.heal_cursor(gig.id, entry.position).await?;
            return Ok(ProcessResult::AlreadyProcessed);
        }

        if !queries::advance_position(&self.pool, gig.id, entry.position).await? {
            // The status guard refused: a cancellation (or a concurrent
            // advance) landed after our snapshot. The record stands, but this
            // call must re-check the gig before touching later positions.
            debug!(gig_id = %gig.id, position = entry.position, "cursor advance refused, halting");
            return Ok(ProcessResult::Halted);
        }

        info!(
            gig_id = %gig.id,
            position = entry.position,
            song_id = %entry.song_id,
            score,
            "song performed"
        );

        // Fire-and-forget collaborators; neither can fail progression
        self.ledger.record(LedgerEffect::SongPlayed {
            gig_id: gig.id,
            song_id: entry.song_id,
            revenue,
            fame_gain,
        });
        self.notifier.notify(GigEvent::SongPerformed {
            gig_id: gig.id,
            song_id: entry.song_id,
            position: entry.position,
            score,
            timestamp: now(),
        });

        Ok(ProcessResult::Performed(record))
    }

    /// Re-apply the cursor advance for an already-processed position
    ///
    /// Covers the crash window between a record insert and its cursor
    /// update: the record's existence is authoritative, so any later caller
    /// may complete the advance. Redundant applications are no-ops.
    async fn heal_cursor(&self, gig_id: Uuid, position: i64) -> Result<()> {
        if queries::advance_position(&self.pool, gig_id, position).await? {
            debug!(%gig_id, position, "cursor healed to match processed records");
            self.notifier.notify(GigEvent::PositionAdvanced {
                gig_id,
                position: position + 1,
                timestamp: now(),
            });
        }
        Ok(())
    }
}
