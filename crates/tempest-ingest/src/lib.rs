//! Station reading ingestion
//!
//! Readings arrive from a [`ReadingSource`](tempest_core::ReadingSource) as
//! loosely typed field maps, are normalized to an [`Observation`], and are
//! written with their rollups in one transaction by [`Ingestor`].
//!
//! [`Observation`]: tempest_core::Observation

pub mod ambient;
pub mod normalize;
pub mod simulator;
pub mod upserter;

pub use ambient::*;
pub use normalize::*;
pub use simulator::*;
pub use upserter::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Reading has no timestamp")]
    MissingTimestamp,

    #[error("Unparseable timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Store error: {0}")]
    Store(#[from] tempest_db::DbError),

    #[error("Rollup error: {0}")]
    Rollup(#[from] tempest_archive::ArchiveError),

    #[error("Source error: {0}")]
    Source(String),
}

pub type IngestResult<T> = Result<T, IngestError>;
