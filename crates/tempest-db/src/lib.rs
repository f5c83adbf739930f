//! Durable store for station observations and their rollups
//!
//! One base table keyed by timestamp plus one table per rollup resolution,
//! keyed by bucket start. Timestamps are stored as Unix seconds.

pub mod client;
pub mod queries;
pub mod schema;

pub use client::*;
pub use schema::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Stored timestamp out of range: {0}")]
    InvalidTimestamp(i64),
}

pub type DbResult<T> = Result<T, DbError>;
