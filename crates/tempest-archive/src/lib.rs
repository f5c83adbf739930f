//! Rollup maintenance and resolution-aware range queries
//!
//! [`RollupMaintainer`] keeps the 5m/15m/1h/1d tables consistent with the
//! base observations; [`RangeQueryRouter`] picks the cheapest table for a
//! requested span.

pub mod maintainer;
pub mod router;

pub use maintainer::*;
pub use router::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] tempest_db::DbError),

    #[error("Invalid range: {from} > {to}")]
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid interval: to ({to}) must be after from ({from})")]
    InvalidInterval {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("Store error: {0}")]
    Store(#[from] tempest_db::DbError),
}

pub type QueryResult<T> = Result<T, QueryError>;
