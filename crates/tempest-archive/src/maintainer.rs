//! Recompute-on-write rollup maintenance

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tempest_core::{aggregate_bucket, Resolution, RollupBucket};
use tempest_db::{queries, DbClient};
use tracing::{debug, info, instrument};

use crate::{ArchiveError, ArchiveResult};

/// What happened to one bucket after a recompute
#[derive(Debug, Clone, PartialEq)]
pub enum BucketUpdate {
    Upserted(RollupBucket),
    Removed {
        resolution: Resolution,
        bucket: DateTime<Utc>,
    },
}

impl BucketUpdate {
    pub fn resolution(&self) -> Resolution {
        match self {
            BucketUpdate::Upserted(b) => b.resolution,
            BucketUpdate::Removed { resolution, .. } => *resolution,
        }
    }
}

/// Maintains every rollup table from the base observations
///
/// Buckets are always rebuilt from the full set of observations they cover,
/// never adjusted from their previous value.
#[derive(Debug, Clone)]
pub struct RollupMaintainer {
    resolutions: Vec<Resolution>,
}

impl Default for RollupMaintainer {
    fn default() -> Self {
        Self {
            resolutions: Resolution::ALL.to_vec(),
        }
    }
}

impl RollupMaintainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// Recompute the bucket containing `t` at every resolution
    ///
    /// Runs on the caller's connection so the base upsert and the rollup
    /// writes commit together.
    pub async fn recompute(
        &self,
        conn: &mut SqliteConnection,
        t: DateTime<Utc>,
    ) -> ArchiveResult<Vec<BucketUpdate>> {
        let mut updates = Vec::with_capacity(self.resolutions.len());
        for &resolution in &self.resolutions {
            let bucket = resolution.bucket_start(t);
            updates.push(self.recompute_bucket(&mut *conn, resolution, bucket).await?);
        }
        Ok(updates)
    }

    /// Rebuild one bucket from `[bucket, bucket + resolution)`
    pub async fn recompute_bucket(
        &self,
        conn: &mut SqliteConnection,
        resolution: Resolution,
        bucket: DateTime<Utc>,
    ) -> ArchiveResult<BucketUpdate> {
        let (start, end) = resolution.bucket_bounds(bucket);
        let observations = queries::observations_in_bucket(&mut *conn, start, end).await?;

        match aggregate_bucket(resolution, start, &observations) {
            Some(rollup) => {
                queries::upsert_rollup(&mut *conn, &rollup).await?;
                debug!(
                    %resolution,
                    bucket = %start,
                    samples = rollup.sample_count,
                    "Rollup bucket recomputed"
                );
                Ok(BucketUpdate::Upserted(rollup))
            }
            None => {
                queries::delete_rollup(&mut *conn, resolution, start).await?;
                debug!(%resolution, bucket = %start, "Empty rollup bucket removed");
                Ok(BucketUpdate::Removed {
                    resolution,
                    bucket: start,
                })
            }
        }
    }

    /// Recompute the buckets containing `t` in a transaction of their own
    #[instrument(skip(self, db))]
    pub async fn refresh(&self, db: &DbClient, t: DateTime<Utc>) -> ArchiveResult<Vec<BucketUpdate>> {
        let mut tx = db.begin().await?;
        let updates = self.recompute(&mut tx, t).await?;
        tx.commit().await.map_err(tempest_db::DbError::from)?;
        Ok(updates)
    }

    /// Recompute every bucket overlapping `[from, to]` at every resolution
    ///
    /// Used after bulk imports. Returns the number of buckets written;
    /// buckets left without observations are deleted.
    #[instrument(skip(self, db))]
    pub async fn rebuild_range(
        &self,
        db: &DbClient,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ArchiveResult<usize> {
        if from > to {
            return Err(ArchiveError::InvalidRange { from, to });
        }

        let mut tx = db.begin().await?;
        let mut written = 0;

        for &resolution in &self.resolutions {
            let mut bucket = resolution.bucket_start(from);
            while bucket <= to {
                if let BucketUpdate::Upserted(_) =
                    self.recompute_bucket(&mut tx, resolution, bucket).await?
                {
                    written += 1;
                }
                bucket += resolution.duration();
            }
        }

        tx.commit().await.map_err(tempest_db::DbError::from)?;
        info!(written, "Rollups rebuilt");
        Ok(written)
    }
}
