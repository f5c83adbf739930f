//! Idempotent write of one reading plus its rollups

use tempest_archive::{BucketUpdate, RollupMaintainer};
use tempest_core::{Observation, RawReading};
use tempest_db::{queries, DbClient, DbError};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::{normalize, IngestResult};

/// Writes observations and keeps rollups in step
///
/// Each call is one unit of work: the base upsert and the recompute of every
/// bucket covering the reading commit in a single transaction. Calls through
/// the same `Ingestor` are additionally serialized.
pub struct Ingestor {
    db: DbClient,
    maintainer: RollupMaintainer,
    write_lock: Mutex<()>,
}

/// Result of one ingestion
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// The normalized reading as stored
    pub observation: Observation,
    pub rollups: Vec<BucketUpdate>,
}

impl Ingestor {
    pub fn new(db: DbClient) -> Self {
        Self::with_maintainer(db, RollupMaintainer::default())
    }

    pub fn with_maintainer(db: DbClient, maintainer: RollupMaintainer) -> Self {
        Self {
            db,
            maintainer,
            write_lock: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &DbClient {
        &self.db
    }

    /// Normalize a raw reading and store it
    pub async fn ingest(&self, raw: &RawReading) -> IngestResult<IngestReport> {
        let observation = normalize(raw)?;
        self.ingest_observation(observation).await
    }

    /// Store an observation, replacing any at the same second
    #[instrument(skip(self, observation), fields(time = %observation.time))]
    pub async fn ingest_observation(&self, observation: Observation) -> IngestResult<IngestReport> {
        let observation = observation.sanitized();
        let _guard = self.write_lock.lock().await;

        let mut tx = self.db.begin().await?;
        queries::upsert_observation(&mut *tx, &observation).await?;
        debug!("Observation upserted");

        let rollups = self.maintainer.recompute(&mut tx, observation.time).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(buckets = rollups.len(), "Reading ingested");
        Ok(IngestReport {
            observation,
            rollups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IngestError;
    use serde_json::json;

    fn reading(value: serde_json::Value) -> RawReading {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_ingest_returns_stored_reading() {
        let ingestor = Ingestor::new(DbClient::in_memory().await.unwrap());
        let report = ingestor
            .ingest(&reading(json!({
                "dateutc": 1_717_243_200_000_i64,
                "tempf": 71.3,
                "humidity": "bogus",
            })))
            .await
            .unwrap();

        assert_eq!(report.observation.temp_f, Some(71.3));
        assert_eq!(report.observation.humidity, None);
        assert_eq!(report.rollups.len(), 4);

        let stored = ingestor.db().latest_observation().await.unwrap().unwrap();
        assert_eq!(stored, report.observation);
    }

    #[tokio::test]
    async fn test_missing_timestamp_writes_nothing() {
        let ingestor = Ingestor::new(DbClient::in_memory().await.unwrap());
        let err = ingestor
            .ingest(&reading(json!({ "tempf": 60.0 })))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::MissingTimestamp));
        assert_eq!(ingestor.db().count_observations().await.unwrap(), 0);
    }
}
