//! Table layout and row types
//!
//! Column names follow the station's field names (`tempf`, `baromrelin`, ...).
//! Rollup tables repeat those names with `_avg`/`_min`/`_max` suffixes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tempest_core::{FieldStats, Observation, Resolution, RollupBucket};

use crate::{DbError, DbResult};

pub const OBSERVATIONS_TABLE: &str = "observations";

/// Rollup table backing a resolution
pub fn rollup_table(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::FiveMinutes => "observations_5m",
        Resolution::FifteenMinutes => "observations_15m",
        Resolution::OneHour => "observations_1h",
        Resolution::OneDay => "observations_1d",
    }
}

/// DDL for the base table and every rollup table
pub fn schema_statements() -> Vec<String> {
    let mut statements = vec![format!(
        r#"
        CREATE TABLE IF NOT EXISTS {OBSERVATIONS_TABLE} (
            time INTEGER PRIMARY KEY NOT NULL,
            tempf REAL,
            dewpointf REAL,
            humidity REAL,
            baromrelin REAL,
            windspeedmph REAL,
            windgustmph REAL,
            winddir REAL,
            dailyrainin REAL,
            solarradiation REAL,
            uv REAL
        )
        "#
    )];

    for resolution in Resolution::ALL {
        statements.push(format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                bucket INTEGER PRIMARY KEY NOT NULL,
                sample_count INTEGER NOT NULL,
                tempf_avg REAL, tempf_min REAL, tempf_max REAL,
                dewpointf_avg REAL, dewpointf_min REAL, dewpointf_max REAL,
                humidity_avg REAL, humidity_min REAL, humidity_max REAL,
                baromrelin_avg REAL, baromrelin_min REAL, baromrelin_max REAL,
                windspeedmph_avg REAL, windspeedmph_min REAL, windspeedmph_max REAL,
                windgustmph_max REAL,
                winddir_sin_avg REAL,
                winddir_cos_avg REAL,
                solarradiation_avg REAL, solarradiation_max REAL,
                uv_avg REAL, uv_max REAL,
                dailyrainin_max REAL
            )
            "#,
            table = rollup_table(resolution)
        ));
    }

    statements
}

pub(crate) fn from_unix(secs: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(DbError::InvalidTimestamp(secs))
}

/// Row of the base observation table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ObservationRow {
    /// Unix seconds, unique
    pub time: i64,

    #[sqlx(rename = "tempf")]
    pub temp_f: Option<f64>,

    #[sqlx(rename = "dewpointf")]
    pub dew_point_f: Option<f64>,

    pub humidity: Option<f64>,

    #[sqlx(rename = "baromrelin")]
    pub barom_rel_in: Option<f64>,

    #[sqlx(rename = "windspeedmph")]
    pub wind_speed_mph: Option<f64>,

    #[sqlx(rename = "windgustmph")]
    pub wind_gust_mph: Option<f64>,

    #[sqlx(rename = "winddir")]
    pub wind_dir: Option<f64>,

    #[sqlx(rename = "dailyrainin")]
    pub daily_rain_in: Option<f64>,

    #[sqlx(rename = "solarradiation")]
    pub solar_radiation: Option<f64>,

    pub uv: Option<f64>,
}

impl From<&Observation> for ObservationRow {
    fn from(obs: &Observation) -> Self {
        Self {
            time: obs.time.timestamp(),
            temp_f: obs.temp_f,
            dew_point_f: obs.dew_point_f,
            humidity: obs.humidity,
            barom_rel_in: obs.barom_rel_in,
            wind_speed_mph: obs.wind_speed_mph,
            wind_gust_mph: obs.wind_gust_mph,
            wind_dir: obs.wind_dir,
            daily_rain_in: obs.daily_rain_in,
            solar_radiation: obs.solar_radiation,
            uv: obs.uv,
        }
    }
}

impl TryFrom<ObservationRow> for Observation {
    type Error = DbError;

    fn try_from(row: ObservationRow) -> DbResult<Self> {
        Ok(Observation {
            time: from_unix(row.time)?,
            temp_f: row.temp_f,
            dew_point_f: row.dew_point_f,
            humidity: row.humidity,
            barom_rel_in: row.barom_rel_in,
            wind_speed_mph: row.wind_speed_mph,
            wind_gust_mph: row.wind_gust_mph,
            wind_dir: row.wind_dir,
            daily_rain_in: row.daily_rain_in,
            solar_radiation: row.solar_radiation,
            uv: row.uv,
        })
    }
}

/// Row of any rollup table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RollupRow {
    /// Bucket start, Unix seconds
    pub bucket: i64,
    pub sample_count: i64,

    pub tempf_avg: Option<f64>,
    pub tempf_min: Option<f64>,
    pub tempf_max: Option<f64>,

    pub dewpointf_avg: Option<f64>,
    pub dewpointf_min: Option<f64>,
    pub dewpointf_max: Option<f64>,

    pub humidity_avg: Option<f64>,
    pub humidity_min: Option<f64>,
    pub humidity_max: Option<f64>,

    pub baromrelin_avg: Option<f64>,
    pub baromrelin_min: Option<f64>,
    pub baromrelin_max: Option<f64>,

    pub windspeedmph_avg: Option<f64>,
    pub windspeedmph_min: Option<f64>,
    pub windspeedmph_max: Option<f64>,

    pub windgustmph_max: Option<f64>,
    pub winddir_sin_avg: Option<f64>,
    pub winddir_cos_avg: Option<f64>,

    pub solarradiation_avg: Option<f64>,
    pub solarradiation_max: Option<f64>,

    pub uv_avg: Option<f64>,
    pub uv_max: Option<f64>,

    pub dailyrainin_max: Option<f64>,
}

impl From<&RollupBucket> for RollupRow {
    fn from(b: &RollupBucket) -> Self {
        Self {
            bucket: b.bucket.timestamp(),
            sample_count: b.sample_count,
            tempf_avg: b.temp_f.avg,
            tempf_min: b.temp_f.min,
            tempf_max: b.temp_f.max,
            dewpointf_avg: b.dew_point_f.avg,
            dewpointf_min: b.dew_point_f.min,
            dewpointf_max: b.dew_point_f.max,
            humidity_avg: b.humidity.avg,
            humidity_min: b.humidity.min,
            humidity_max: b.humidity.max,
            baromrelin_avg: b.barom_rel_in.avg,
            baromrelin_min: b.barom_rel_in.min,
            baromrelin_max: b.barom_rel_in.max,
            windspeedmph_avg: b.wind_speed_mph.avg,
            windspeedmph_min: b.wind_speed_mph.min,
            windspeedmph_max: b.wind_speed_mph.max,
            windgustmph_max: b.wind_gust_mph_max,
            winddir_sin_avg: b.wind_dir_sin_avg,
            winddir_cos_avg: b.wind_dir_cos_avg,
            solarradiation_avg: b.solar_radiation_avg,
            solarradiation_max: b.solar_radiation_max,
            uv_avg: b.uv_avg,
            uv_max: b.uv_max,
            dailyrainin_max: b.daily_rain_in_max,
        }
    }
}

impl RollupRow {
    /// Rebuild the domain bucket; the resolution comes from the table it was read from
    pub fn into_bucket(self, resolution: Resolution) -> DbResult<RollupBucket> {
        Ok(RollupBucket {
            resolution,
            bucket: from_unix(self.bucket)?,
            sample_count: self.sample_count,
            temp_f: FieldStats {
                avg: self.tempf_avg,
                min: self.tempf_min,
                max: self.tempf_max,
            },
            dew_point_f: FieldStats {
                avg: self.dewpointf_avg,
                min: self.dewpointf_min,
                max: self.dewpointf_max,
            },
            humidity: FieldStats {
                avg: self.humidity_avg,
                min: self.humidity_min,
                max: self.humidity_max,
            },
            barom_rel_in: FieldStats {
                avg: self.baromrelin_avg,
                min: self.baromrelin_min,
                max: self.baromrelin_max,
            },
            wind_speed_mph: FieldStats {
                avg: self.windspeedmph_avg,
                min: self.windspeedmph_min,
                max: self.windspeedmph_max,
            },
            wind_gust_mph_max: self.windgustmph_max,
            wind_dir_sin_avg: self.winddir_sin_avg,
            wind_dir_cos_avg: self.winddir_cos_avg,
            solar_radiation_avg: self.solarradiation_avg,
            solar_radiation_max: self.solarradiation_max,
            uv_avg: self.uv_avg,
            uv_max: self.uv_max,
            daily_rain_in_max: self.dailyrainin_max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rollup_tables_are_distinct() {
        let mut names: Vec<_> = Resolution::ALL.iter().map(|r| rollup_table(*r)).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Resolution::ALL.len());
        assert!(!names.contains(&OBSERVATIONS_TABLE));
    }

    #[test]
    fn test_schema_statements_cover_all_tables() {
        let statements = schema_statements();
        assert_eq!(statements.len(), 1 + Resolution::ALL.len());
        assert!(statements[0].contains("time INTEGER PRIMARY KEY"));
        assert!(statements[1..]
            .iter()
            .all(|s| s.contains("bucket INTEGER PRIMARY KEY")));
    }

    #[test]
    fn test_observation_row_conversion() {
        let mut obs = Observation::empty(Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap());
        obs.temp_f = Some(81.5);
        obs.wind_dir = Some(270.0);

        let row = ObservationRow::from(&obs);
        assert_eq!(row.time, 1_720_094_400);
        assert_eq!(row.temp_f, Some(81.5));
        assert_eq!(row.humidity, None);

        let back = Observation::try_from(row).unwrap();
        assert_eq!(back, obs);
    }

    #[test]
    fn test_out_of_range_timestamp() {
        assert!(matches!(
            from_unix(i64::MAX),
            Err(DbError::InvalidTimestamp(i64::MAX))
        ));
    }
}
