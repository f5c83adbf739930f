//! Aggregation of observations into rollup buckets

use chrono::{DateTime, Utc};

use crate::circular::CircularAccumulator;
use crate::types::{FieldStats, Observation, Resolution, RollupBucket};

/// Aggregation type for rollup columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateType {
    Min,
    Max,
    Avg,
    Count,
}

/// Accumulator for calculating aggregates over multiple observations
///
/// Absent values are skipped, so an all-absent field aggregates to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accumulator {
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    count: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.count += 1;
    }

    pub fn add_opt(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.add(v);
        }
    }

    pub fn result(&self, aggregate_type: AggregateType) -> Option<f64> {
        if self.count == 0 {
            return None;
        }

        match aggregate_type {
            AggregateType::Min => self.min,
            AggregateType::Max => self.max,
            AggregateType::Avg => Some(self.sum / self.count as f64),
            AggregateType::Count => Some(self.count as f64),
        }
    }

    pub fn stats(&self) -> FieldStats {
        FieldStats {
            avg: self.result(AggregateType::Avg),
            min: self.result(AggregateType::Min),
            max: self.result(AggregateType::Max),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Per-field accumulators for one bucket
#[derive(Debug, Clone, Default)]
pub struct BucketAccumulator {
    samples: i64,
    temp_f: Accumulator,
    dew_point_f: Accumulator,
    humidity: Accumulator,
    barom_rel_in: Accumulator,
    wind_speed_mph: Accumulator,
    wind_gust_mph: Accumulator,
    wind_dir: CircularAccumulator,
    solar_radiation: Accumulator,
    uv: Accumulator,
    daily_rain_in: Accumulator,
}

impl BucketAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, obs: &Observation) {
        self.samples += 1;
        self.temp_f.add_opt(obs.temp_f);
        self.dew_point_f.add_opt(obs.dew_point_f);
        self.humidity.add_opt(obs.humidity);
        self.barom_rel_in.add_opt(obs.barom_rel_in);
        self.wind_speed_mph.add_opt(obs.wind_speed_mph);
        self.wind_gust_mph.add_opt(obs.wind_gust_mph);
        if let Some(dir) = obs.wind_dir {
            self.wind_dir.add(dir);
        }
        self.solar_radiation.add_opt(obs.solar_radiation);
        self.uv.add_opt(obs.uv);
        self.daily_rain_in.add_opt(obs.daily_rain_in);
    }

    pub fn samples(&self) -> i64 {
        self.samples
    }

    /// Finish the bucket; `None` when no observation contributed
    pub fn finish(&self, resolution: Resolution, bucket: DateTime<Utc>) -> Option<RollupBucket> {
        if self.samples == 0 {
            return None;
        }

        let wind_dir = self.wind_dir.mean_components();

        Some(RollupBucket {
            resolution,
            bucket,
            sample_count: self.samples,
            temp_f: self.temp_f.stats(),
            dew_point_f: self.dew_point_f.stats(),
            humidity: self.humidity.stats(),
            barom_rel_in: self.barom_rel_in.stats(),
            wind_speed_mph: self.wind_speed_mph.stats(),
            wind_gust_mph_max: self.wind_gust_mph.result(AggregateType::Max),
            wind_dir_sin_avg: wind_dir.map(|(sin, _)| sin),
            wind_dir_cos_avg: wind_dir.map(|(_, cos)| cos),
            solar_radiation_avg: self.solar_radiation.result(AggregateType::Avg),
            solar_radiation_max: self.solar_radiation.result(AggregateType::Max),
            uv_avg: self.uv.result(AggregateType::Avg),
            uv_max: self.uv.result(AggregateType::Max),
            daily_rain_in_max: self.daily_rain_in.result(AggregateType::Max),
        })
    }
}

/// Aggregate the observations that fall in the bucket starting at `bucket`
///
/// Observations outside `[bucket, bucket + resolution)` are ignored.
pub fn aggregate_bucket(
    resolution: Resolution,
    bucket: DateTime<Utc>,
    observations: &[Observation],
) -> Option<RollupBucket> {
    let end = bucket + resolution.duration();
    let mut acc = BucketAccumulator::new();
    for obs in observations
        .iter()
        .filter(|o| o.time >= bucket && o.time < end)
    {
        acc.add(obs);
    }
    acc.finish(resolution, bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circular::angular_distance;
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn test_accumulator_min_max_avg() {
        let mut acc = Accumulator::new();
        acc.add(10.0);
        acc.add(5.0);
        acc.add(15.0);
        assert_eq!(acc.result(AggregateType::Min), Some(5.0));
        assert_eq!(acc.result(AggregateType::Max), Some(15.0));
        assert_eq!(acc.result(AggregateType::Avg), Some(10.0));
        assert_eq!(acc.result(AggregateType::Count), Some(3.0));
    }

    #[test]
    fn test_accumulator_empty() {
        let acc = Accumulator::new();
        assert_eq!(acc.result(AggregateType::Avg), None);
        assert_eq!(acc.stats(), FieldStats::default());
    }

    #[test]
    fn test_absent_values_are_skipped() {
        let mut acc = Accumulator::new();
        acc.add_opt(None);
        acc.add_opt(Some(4.0));
        acc.add_opt(None);
        assert_eq!(acc.result(AggregateType::Avg), Some(4.0));
        assert_eq!(acc.count(), 1);
    }

    #[test]
    fn test_aggregate_bucket_fields() {
        let mut a = Observation::empty(at(0));
        a.temp_f = Some(50.0);
        a.wind_gust_mph = Some(12.0);
        a.wind_dir = Some(350.0);
        a.daily_rain_in = Some(0.10);
        a.uv = Some(1.0);
        let mut b = Observation::empty(at(2));
        b.temp_f = Some(54.0);
        b.wind_gust_mph = Some(9.0);
        b.wind_dir = Some(10.0);
        b.daily_rain_in = Some(0.12);
        b.uv = Some(3.0);

        let bucket = aggregate_bucket(Resolution::FiveMinutes, at(0), &[a, b]).unwrap();
        assert_eq!(bucket.sample_count, 2);
        assert_eq!(bucket.temp_f.avg, Some(52.0));
        assert_eq!(bucket.temp_f.min, Some(50.0));
        assert_eq!(bucket.temp_f.max, Some(54.0));
        assert_eq!(bucket.wind_gust_mph_max, Some(12.0));
        assert_eq!(bucket.daily_rain_in_max, Some(0.12));
        assert_eq!(bucket.uv_avg, Some(2.0));
        assert_eq!(bucket.uv_max, Some(3.0));
        assert_eq!(bucket.humidity, FieldStats::default());

        let dir = bucket.wind_dir().unwrap();
        assert!(angular_distance(dir, 0.0) < 1e-9, "got {dir}");
    }

    #[test]
    fn test_aggregate_bucket_excludes_outside_samples() {
        let mut inside = Observation::empty(at(4));
        inside.temp_f = Some(60.0);
        let mut edge = Observation::empty(at(5));
        edge.temp_f = Some(99.0);

        let bucket = aggregate_bucket(Resolution::FiveMinutes, at(0), &[inside, edge]).unwrap();
        assert_eq!(bucket.sample_count, 1);
        assert_eq!(bucket.temp_f.max, Some(60.0));
    }

    #[test]
    fn test_aggregate_empty_bucket_is_none() {
        assert!(aggregate_bucket(Resolution::OneHour, at(0), &[]).is_none());
    }

    #[test]
    fn test_sample_without_fields_still_counts() {
        let bucket =
            aggregate_bucket(Resolution::FiveMinutes, at(0), &[Observation::empty(at(1))]).unwrap();
        assert_eq!(bucket.sample_count, 1);
        assert_eq!(bucket.wind_dir(), None);
        assert_eq!(bucket.to_observation().temp_f, None);
    }
}
