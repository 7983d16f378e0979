//! # Encore Common Library
//!
//! Shared code for the Encore live-performance simulation engine:
//! - Database models, schema initialization, and queries
//! - Event types (GigEvent enum) and the change-notification broadcaster
//! - Configuration loading
//! - Error types and time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{ChangeNotifier, GigEvent};
