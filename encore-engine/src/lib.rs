//! # Encore Engine
//!
//! Live performance progression and ticket-demand simulation:
//! - `pacing`: pure elapsed-time math over a gig's setlist
//! - `engine`: the gig progression state machine and song processor
//! - `triggers`: the independent timer/event loops that drive `advance()`
//! - `tickets`: the daily ticket-demand batch sweep
//! - `scoring`: the song-scoring and revenue-ledger seams

pub mod engine;
pub mod error;
pub mod pacing;
pub mod scoring;
pub mod tickets;
pub mod triggers;

pub use engine::{AdvanceOutcome, GigEngine};
pub use error::{Error, Result};
