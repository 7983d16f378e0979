//! Gig finalization
//!
//! Computes the final aggregate outcome and performs the
//! in_progress → completed transition. Runs only once the full setlist
//! duration has elapsed. Re-running against an already-completed gig is a
//! no-op after the initial status check, so any trigger may attempt it.
//!
//! Write order matters for crash safety: the outcome aggregates are written
//! before the status flips. A crash in between leaves the gig in_progress
//! and the next tick recomputes identical aggregates and completes.

use super::{AdvanceOutcome, GigEngine};
use crate::error::Result;
use crate::scoring::LedgerEffect;
use encore_common::db::{queries, Gig, GigStatus, Outcome};
use encore_common::time::now;
use encore_common::GigEvent;
use tracing::{debug, info};

/// Letter grade for an overall rating
fn grade_for(rating: f64) -> &'static str {
    match rating {
        r if r >= 90.0 => "S",
        r if r >= 80.0 => "A",
        r if r >= 65.0 => "B",
        r if r >= 50.0 => "C",
        r if r >= 35.0 => "D",
        _ => "F",
    }
}

impl GigEngine {
    /// Finalize a gig whose setlist has fully elapsed
    pub(crate) async fn finalize_gig(
        &self,
        gig: &Gig,
        outcome: &Outcome,
    ) -> Result<AdvanceOutcome> {
        // Fresh status read: a cancellation or a competing completion may
        // have raced with this call
        let Some(fresh) = queries::get_gig(&self.pool, gig.id).await? else {
            return Ok(AdvanceOutcome::NotInProgress);
        };
        match fresh.status {
            GigStatus::InProgress => {}
            GigStatus::Completed => {
                debug!(gig_id = %gig.id, "already completed, finalize is a no-op");
                return Ok(AdvanceOutcome::Completed);
            }
            _ => return Ok(AdvanceOutcome::NotInProgress),
        }

        let performances = queries::list_song_performances(&self.pool, outcome.id).await?;
        let venue = queries::get_venue(&self.pool, fresh.venue_id).await?;

        let attendance = fresh.tickets_sold;
        let ticket_revenue = attendance as f64 * fresh.ticket_price;
        let merch_revenue: f64 = performances.iter().map(|p| p.revenue).sum();
        let total_revenue = ticket_revenue + merch_revenue;
        let costs = venue.map(|v| v.base_cost).unwrap_or(0.0);
        let net_profit = total_revenue - costs;
        let overall_rating = if performances.is_empty() {
            0.0
        } else {
            performances.iter().map(|p| p.score).sum::<f64>() / performances.len() as f64
        };

        let final_outcome = Outcome {
            id: outcome.id,
            gig_id: fresh.id,
            attendance,
            ticket_revenue,
            merch_revenue,
            total_revenue,
            costs,
            net_profit,
            overall_rating,
            performance_grade: Some(grade_for(overall_rating).to_string()),
        };
        queries::update_outcome(&self.pool, &final_outcome).await?;

        if !queries::mark_completed(&self.pool, fresh.id).await? {
            // Lost the completion race; report whatever state won
            let status = queries::get_gig(&self.pool, fresh.id)
                .await?
                .map(|g| g.status);
            return Ok(match status {
                Some(GigStatus::Completed) => AdvanceOutcome::Completed,
                _ => AdvanceOutcome::NotInProgress,
            });
        }

        info!(
            gig_id = %fresh.id,
            overall_rating,
            net_profit,
            grade = grade_for(overall_rating),
            "gig completed"
        );

        self.ledger.record(LedgerEffect::GigSettled {
            gig_id: fresh.id,
            net_profit,
            overall_rating,
        });
        self.notifier.notify(GigEvent::GigCompleted {
            gig_id: fresh.id,
            overall_rating,
            net_profit,
            timestamp: now(),
        });

        Ok(AdvanceOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_bands() {
        assert_eq!(grade_for(95.0), "S");
        assert_eq!(grade_for(90.0), "S");
        assert_eq!(grade_for(85.0), "A");
        assert_eq!(grade_for(70.0), "B");
        assert_eq!(grade_for(55.0), "C");
        assert_eq!(grade_for(40.0), "D");
        assert_eq!(grade_for(10.0), "F");
    }
}
