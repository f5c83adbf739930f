//! Span-based routing of range queries to raw or rollup tables

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tempest_core::{Observation, Resolution};
use tempest_db::DbClient;
use tracing::{debug, instrument};

use crate::{QueryError, QueryResult};

/// Table a range query is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuerySource {
    Raw,
    Rollup(Resolution),
}

impl std::fmt::Display for QuerySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuerySource::Raw => f.write_str("raw"),
            QuerySource::Rollup(r) => write!(f, "{r}"),
        }
    }
}

/// Pick the tier for a span; thresholds are inclusive upper bounds
pub fn select_source(span: Duration) -> QuerySource {
    if span <= Duration::hours(48) {
        QuerySource::Raw
    } else if span <= Duration::days(7) {
        QuerySource::Rollup(Resolution::FiveMinutes)
    } else if span <= Duration::days(31) {
        QuerySource::Rollup(Resolution::FifteenMinutes)
    } else if span <= Duration::days(370) {
        QuerySource::Rollup(Resolution::OneHour)
    } else {
        QuerySource::Rollup(Resolution::OneDay)
    }
}

/// Rows returned by a routed query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeQueryResult {
    pub source: QuerySource,
    /// Ascending by time; rollup rows are keyed by bucket start
    pub observations: Vec<Observation>,
}

/// Read-only router over the store
#[derive(Debug, Clone)]
pub struct RangeQueryRouter {
    db: DbClient,
}

impl RangeQueryRouter {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Rows with time (or bucket start) in `[from, to]`
    ///
    /// Rollup rows carry averages, gust and daily-rain maxima, and the wind
    /// direction reconstructed from its circular components.
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> QueryResult<RangeQueryResult> {
        if to <= from {
            return Err(QueryError::InvalidInterval { from, to });
        }

        let source = select_source(to - from);
        let observations = match source {
            QuerySource::Raw => self.db.observations_between(from, to).await?,
            QuerySource::Rollup(resolution) => self
                .db
                .rollups_between(resolution, from, to)
                .await?
                .iter()
                .map(|b| b.to_observation())
                .collect(),
        };

        debug!(%source, rows = observations.len(), "Range query served");
        Ok(RangeQueryResult {
            source,
            observations,
        })
    }
}
