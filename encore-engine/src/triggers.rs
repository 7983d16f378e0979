//! Trigger multiplexer
//!
//! Three independent, uncoordinated entry points all converge on
//! [`GigEngine::advance`]:
//!
//! - the **global sweep**: a fixed-interval pass over one owner's
//!   in-progress gigs, guaranteeing eventual progress even when nobody is
//!   watching
//! - the **focused loop**: runs while a viewer observes one gig; sleeps on
//!   the engine's next-due hint instead of polling blindly, and wakes early
//!   on any change notification for that gig
//! - **change notifications** themselves, consumed inside the focused loop
//!
//! None of the loops coordinate. Both may fire for the same gig in the same
//! instant; `advance()`'s idempotency makes that redundant but safe. An
//! unhandled error inside a loop delays the next attempt by a backoff
//! rather than killing the loop, so a skipped tick is only ever delayed,
//! never lost.

use crate::engine::{AdvanceOutcome, GigEngine};
use crate::error::Result;
use encore_common::config::EngineConfig;
use encore_common::db::queries;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What one global sweep pass covered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPass {
    /// In-progress gigs the owner had when the pass started
    pub seen: usize,
    /// How many of them advanced without error
    pub advanced: usize,
}

/// One pass of the global sweep: advance every in-progress gig this owner
/// has. Per-gig failures are logged and skipped so one broken gig cannot
/// stall its neighbors.
pub async fn global_sweep_once(engine: &GigEngine, owner_id: Uuid) -> Result<SweepPass> {
    let gigs = queries::list_in_progress_gigs_for_owner(engine.pool(), owner_id).await?;
    let seen = gigs.len();
    let mut advanced = 0;
    for gig in gigs {
        match engine.advance(gig.id).await {
            Ok(_) => advanced += 1,
            Err(e) => warn!(gig_id = %gig.id, error = %e, "sweep advance failed, will retry next tick"),
        }
    }
    Ok(SweepPass { seen, advanced })
}

/// Low-frequency global sweep for one active owner; runs until the owner
/// has no in-progress gigs left or `stop` flips to true
///
/// Exiting on an empty pass lets the spawner prune finished tasks. If the
/// owner starts another gig later, the owner refresh spawns a fresh loop.
pub async fn global_sweep_loop(
    engine: Arc<GigEngine>,
    owner_id: Uuid,
    config: EngineConfig,
    mut stop: watch::Receiver<bool>,
) {
    let interval = Duration::from_secs(config.sweep_interval_secs);
    let backoff = Duration::from_secs(config.trigger_backoff_secs);
    info!(%owner_id, ?interval, "global sweep started");

    loop {
        let delay = match global_sweep_once(&engine, owner_id).await {
            Ok(pass) if pass.seen == 0 => {
                debug!(%owner_id, "owner has no in-progress gigs left");
                break;
            }
            Ok(pass) => {
                debug!(%owner_id, seen = pass.seen, advanced = pass.advanced, "global sweep tick");
                interval
            }
            Err(e) => {
                error!(%owner_id, error = %e, "global sweep failed, backing off");
                backoff
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
    info!(%owner_id, "global sweep stopped");
}

/// Why the focused loop woke up
enum Wake {
    Timer,
    Change,
    Stop,
}

/// High-frequency loop while a viewer watches one gig
///
/// Advances immediately, then sleeps on the next-due hint (fallback
/// interval when no hint applies), waking early when a change notification
/// arrives for this gig. Exits when the gig completes or `stop` flips.
pub async fn focused_loop(
    engine: Arc<GigEngine>,
    gig_id: Uuid,
    config: EngineConfig,
    mut stop: watch::Receiver<bool>,
) {
    let fallback = Duration::from_secs(config.focused_fallback_secs);
    let backoff = Duration::from_secs(config.trigger_backoff_secs);
    // Subscribe before the first advance so no mutation we cause is missed
    let mut events = engine.notifier().subscribe();
    info!(%gig_id, "focused loop started");

    loop {
        let delay = match engine.advance(gig_id).await {
            Ok(AdvanceOutcome::Completed) => {
                info!(%gig_id, "gig completed, focused loop done");
                break;
            }
            Ok(AdvanceOutcome::InProgress { next_due, .. }) => next_due.unwrap_or(fallback),
            // Not started yet (or cancelled): wait for a change notification
            // such as GigStarted rather than spinning
            Ok(AdvanceOutcome::NotInProgress) => fallback,
            Err(e) => {
                error!(%gig_id, error = %e, "focused advance failed, backing off");
                backoff
            }
        };

        match wait_for_wake(&mut events, &mut stop, gig_id, delay).await {
            Wake::Timer => {}
            Wake::Change => debug!(%gig_id, "woken by change notification"),
            Wake::Stop => break,
        }
    }
    info!(%gig_id, "focused loop stopped");
}

/// Sleep for `delay`, waking early on a change notification for `gig_id`
/// or a stop signal. Notifications for other gigs do not wake the loop.
async fn wait_for_wake(
    events: &mut broadcast::Receiver<encore_common::GigEvent>,
    stop: &mut watch::Receiver<bool>,
    gig_id: Uuid,
    delay: Duration,
) -> Wake {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return Wake::Timer,
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    return Wake::Stop;
                }
            }
            event = events.recv() => match event {
                Ok(ev) if ev.gig_id() == gig_id => return Wake::Change,
                Ok(_) => {}
                // Lagged means we missed events; re-advance to catch up
                Err(broadcast::error::RecvError::Lagged(_)) => return Wake::Change,
                // Sender gone means the engine is shutting down
                Err(broadcast::error::RecvError::Closed) => return Wake::Stop,
            }
        }
    }
}
