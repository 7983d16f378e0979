//! Error types for encore-engine
//!
//! Nothing here ever reaches an end user synchronously; trigger loops log
//! these and retry on the next tick.

use thiserror::Error;

/// Main error type for the engine crate
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors surfaced from the shared library
    #[error(transparent)]
    Common(#[from] encore_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
