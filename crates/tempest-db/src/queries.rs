//! Query operations for the observation and rollup tables
//!
//! The free functions take any SQLite executor, so the same statement runs
//! against the pool or inside a caller's transaction (`&mut *tx`).

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};
use tempest_core::{Observation, Resolution, RollupBucket};
use tracing::{debug, instrument};

use crate::schema::{rollup_table, ObservationRow, RollupRow, OBSERVATIONS_TABLE};
use crate::{DbClient, DbResult};

/// Insert an observation, replacing every field of an existing row at the same time
pub async fn upsert_observation<'e, E>(executor: E, obs: &Observation) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = ObservationRow::from(obs);
    sqlx::query(
        r#"
        INSERT INTO observations (
            time, tempf, dewpointf, humidity, baromrelin,
            windspeedmph, windgustmph, winddir, dailyrainin,
            solarradiation, uv
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(time) DO UPDATE SET
            tempf = excluded.tempf,
            dewpointf = excluded.dewpointf,
            humidity = excluded.humidity,
            baromrelin = excluded.baromrelin,
            windspeedmph = excluded.windspeedmph,
            windgustmph = excluded.windgustmph,
            winddir = excluded.winddir,
            dailyrainin = excluded.dailyrainin,
            solarradiation = excluded.solarradiation,
            uv = excluded.uv
        "#,
    )
    .bind(row.time)
    .bind(row.temp_f)
    .bind(row.dew_point_f)
    .bind(row.humidity)
    .bind(row.barom_rel_in)
    .bind(row.wind_speed_mph)
    .bind(row.wind_gust_mph)
    .bind(row.wind_dir)
    .bind(row.daily_rain_in)
    .bind(row.solar_radiation)
    .bind(row.uv)
    .execute(executor)
    .await?;

    Ok(())
}

/// Stored times are whole seconds, so a fractional lower bound rounds up
fn lower_bound_secs(from: DateTime<Utc>) -> i64 {
    if from.timestamp_subsec_nanos() > 0 {
        from.timestamp() + 1
    } else {
        from.timestamp()
    }
}

/// Observations with `from <= time <= to`, ascending
pub async fn observations_between<'e, E>(
    executor: E,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DbResult<Vec<Observation>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, ObservationRow>(
        r#"
        SELECT * FROM observations
        WHERE time >= ? AND time <= ?
        ORDER BY time ASC
        "#,
    )
    .bind(lower_bound_secs(from))
    .bind(to.timestamp())
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Observation::try_from).collect()
}

/// Observations with `start <= time < end`, ascending
pub async fn observations_in_bucket<'e, E>(
    executor: E,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> DbResult<Vec<Observation>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, ObservationRow>(
        r#"
        SELECT * FROM observations
        WHERE time >= ? AND time < ?
        ORDER BY time ASC
        "#,
    )
    .bind(start.timestamp())
    .bind(end.timestamp())
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Observation::try_from).collect()
}

/// Most recent observation, if any
pub async fn latest_observation<'e, E>(executor: E) -> DbResult<Option<Observation>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ObservationRow>(
        "SELECT * FROM observations ORDER BY time DESC LIMIT 1",
    )
    .fetch_optional(executor)
    .await?;

    row.map(Observation::try_from).transpose()
}

/// Insert or fully replace the bucket keyed by `(resolution, bucket)`
pub async fn upsert_rollup<'e, E>(executor: E, bucket: &RollupBucket) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = RollupRow::from(bucket);
    let sql = format!(
        r#"
        INSERT OR REPLACE INTO {} (
            bucket, sample_count,
            tempf_avg, tempf_min, tempf_max,
            dewpointf_avg, dewpointf_min, dewpointf_max,
            humidity_avg, humidity_min, humidity_max,
            baromrelin_avg, baromrelin_min, baromrelin_max,
            windspeedmph_avg, windspeedmph_min, windspeedmph_max,
            windgustmph_max, winddir_sin_avg, winddir_cos_avg,
            solarradiation_avg, solarradiation_max,
            uv_avg, uv_max, dailyrainin_max
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        rollup_table(bucket.resolution)
    );

    sqlx::query(&sql)
        .bind(row.bucket)
        .bind(row.sample_count)
        .bind(row.tempf_avg)
        .bind(row.tempf_min)
        .bind(row.tempf_max)
        .bind(row.dewpointf_avg)
        .bind(row.dewpointf_min)
        .bind(row.dewpointf_max)
        .bind(row.humidity_avg)
        .bind(row.humidity_min)
        .bind(row.humidity_max)
        .bind(row.baromrelin_avg)
        .bind(row.baromrelin_min)
        .bind(row.baromrelin_max)
        .bind(row.windspeedmph_avg)
        .bind(row.windspeedmph_min)
        .bind(row.windspeedmph_max)
        .bind(row.windgustmph_max)
        .bind(row.winddir_sin_avg)
        .bind(row.winddir_cos_avg)
        .bind(row.solarradiation_avg)
        .bind(row.solarradiation_max)
        .bind(row.uv_avg)
        .bind(row.uv_max)
        .bind(row.dailyrainin_max)
        .execute(executor)
        .await?;

    Ok(())
}

/// Remove a bucket; returns the number of rows deleted
pub async fn delete_rollup<'e, E>(
    executor: E,
    resolution: Resolution,
    bucket: DateTime<Utc>,
) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("DELETE FROM {} WHERE bucket = ?", rollup_table(resolution));
    let result = sqlx::query(&sql)
        .bind(bucket.timestamp())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn get_rollup<'e, E>(
    executor: E,
    resolution: Resolution,
    bucket: DateTime<Utc>,
) -> DbResult<Option<RollupBucket>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT * FROM {} WHERE bucket = ?", rollup_table(resolution));
    let row = sqlx::query_as::<_, RollupRow>(&sql)
        .bind(bucket.timestamp())
        .fetch_optional(executor)
        .await?;

    row.map(|r| r.into_bucket(resolution)).transpose()
}

/// Buckets with `from <= bucket <= to`, ascending
pub async fn rollups_between<'e, E>(
    executor: E,
    resolution: Resolution,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DbResult<Vec<RollupBucket>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT * FROM {} WHERE bucket >= ? AND bucket <= ? ORDER BY bucket ASC",
        rollup_table(resolution)
    );
    let rows = sqlx::query_as::<_, RollupRow>(&sql)
        .bind(lower_bound_secs(from))
        .bind(to.timestamp())
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(|r| r.into_bucket(resolution)).collect()
}

impl DbClient {
    /// Upsert a single observation outside any transaction
    #[instrument(skip(self, obs), fields(time = %obs.time))]
    pub async fn upsert_observation(&self, obs: &Observation) -> DbResult<()> {
        upsert_observation(self.pool(), obs).await?;
        debug!("Upserted observation");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn observations_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Observation>> {
        let observations = observations_between(self.pool(), from, to).await?;
        debug!("Retrieved {} observations", observations.len());
        Ok(observations)
    }

    #[instrument(skip(self))]
    pub async fn rollups_between(
        &self,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<RollupBucket>> {
        let buckets = rollups_between(self.pool(), resolution, from, to).await?;
        debug!("Retrieved {} {} buckets", buckets.len(), resolution);
        Ok(buckets)
    }

    pub async fn get_rollup(
        &self,
        resolution: Resolution,
        bucket: DateTime<Utc>,
    ) -> DbResult<Option<RollupBucket>> {
        get_rollup(self.pool(), resolution, bucket).await
    }

    pub async fn latest_observation(&self) -> DbResult<Option<Observation>> {
        latest_observation(self.pool()).await
    }

    /// Number of rows in the base table
    pub async fn count_observations(&self) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {OBSERVATIONS_TABLE}");
        let count: (i64,) = sqlx::query_as(&sql).fetch_one(self.pool()).await?;
        Ok(count.0)
    }

    pub async fn count_rollups(&self, resolution: Resolution) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", rollup_table(resolution));
        let count: (i64,) = sqlx::query_as(&sql).fetch_one(self.pool()).await?;
        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempest_core::aggregate_bucket;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn obs(minute: i64, temp: f64) -> Observation {
        let mut o = Observation::empty(at(minute));
        o.temp_f = Some(temp);
        o.wind_dir = Some(90.0);
        o
    }

    #[tokio::test]
    async fn test_upsert_replaces_all_fields() {
        let db = DbClient::in_memory().await.unwrap();

        let mut first = obs(0, 40.0);
        first.humidity = Some(80.0);
        db.upsert_observation(&first).await.unwrap();

        let second = obs(0, 41.5);
        db.upsert_observation(&second).await.unwrap();

        assert_eq!(db.count_observations().await.unwrap(), 1);
        let stored = db.latest_observation().await.unwrap().unwrap();
        assert_eq!(stored.temp_f, Some(41.5));
        assert_eq!(stored.humidity, None);
    }

    #[tokio::test]
    async fn test_observations_between_is_inclusive_and_ordered() {
        let db = DbClient::in_memory().await.unwrap();
        for (m, t) in [(10, 3.0), (0, 1.0), (5, 2.0), (15, 4.0)] {
            db.upsert_observation(&obs(m, t)).await.unwrap();
        }

        let found = db.observations_between(at(0), at(10)).await.unwrap();
        let temps: Vec<_> = found.iter().map(|o| o.temp_f.unwrap()).collect();
        assert_eq!(temps, vec![1.0, 2.0, 3.0]);

        let half_open = observations_in_bucket(db.pool(), at(0), at(10)).await.unwrap();
        assert_eq!(half_open.len(), 2);
    }

    #[tokio::test]
    async fn test_fractional_lower_bound_excludes_earlier_second() {
        let db = DbClient::in_memory().await.unwrap();
        db.upsert_observation(&obs(0, 1.0)).await.unwrap();
        db.upsert_observation(&obs(1, 2.0)).await.unwrap();
        let bucket = aggregate_bucket(Resolution::FiveMinutes, at(0), &[obs(0, 1.0)]).unwrap();
        upsert_rollup(db.pool(), &bucket).await.unwrap();

        let from = at(0) + Duration::milliseconds(500);
        let found = db.observations_between(from, at(60)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.iter().all(|o| o.time >= from));

        let buckets = db
            .rollups_between(Resolution::FiveMinutes, from, at(60))
            .await
            .unwrap();
        assert!(buckets.is_empty());

        // the upper bound stays inclusive of its own second
        let to = at(1) + Duration::milliseconds(500);
        assert_eq!(db.observations_between(at(0), to).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rollup_upsert_get_delete() {
        let db = DbClient::in_memory().await.unwrap();
        let bucket =
            aggregate_bucket(Resolution::FiveMinutes, at(0), &[obs(0, 10.0), obs(1, 20.0)])
                .unwrap();

        upsert_rollup(db.pool(), &bucket).await.unwrap();
        upsert_rollup(db.pool(), &bucket).await.unwrap();
        assert_eq!(db.count_rollups(Resolution::FiveMinutes).await.unwrap(), 1);
        assert_eq!(db.count_rollups(Resolution::OneHour).await.unwrap(), 0);

        let stored = db
            .get_rollup(Resolution::FiveMinutes, at(0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, bucket);

        let deleted = delete_rollup(db.pool(), Resolution::FiveMinutes, at(0))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(db
            .get_rollup(Resolution::FiveMinutes, at(0))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_writes_inside_transaction_roll_back() {
        let db = DbClient::in_memory().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        upsert_observation(&mut *tx, &obs(0, 50.0)).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(db.count_observations().await.unwrap(), 0);
        assert!(db.latest_observation().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.db");
        let opts = crate::DbConnectionBuilder::new(&path).build().unwrap();

        let db = DbClient::with_options(opts.clone()).await.unwrap();
        db.migrate().await.unwrap();
        db.upsert_observation(&obs(3, 61.0)).await.unwrap();
        db.close().await;

        let reopened = DbClient::with_options(opts).await.unwrap();
        let latest = reopened.latest_observation().await.unwrap().unwrap();
        assert_eq!(latest.time, at(3));
        assert_eq!(latest.temp_f, Some(61.0));
    }
}
