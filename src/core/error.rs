//! Core error kinds.
//!
//! The core never swallows a store error except where §7 of the design
//! explicitly allows it (per-key loops in the recomputer, per-level fallback
//! lookups); everywhere else a `CoreError` propagates to the caller.

use thiserror::Error;

/// The five error kinds the core can produce. `Insufficient` from the design
/// notes is deliberately not a variant here: it is carried as
/// `cannot_determine = true` inside a successful response, never as an error.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient store/network failure: {0}")]
    Transient(#[source] anyhow::Error),

    #[error("permanent failure: {0}")]
    Permanent(#[source] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        CoreError::Transient(err.into())
    }

    pub fn permanent(err: impl Into<anyhow::Error>) -> Self {
        CoreError::Permanent(err.into())
    }
}
