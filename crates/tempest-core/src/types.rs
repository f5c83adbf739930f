//! Core data types for station observations and rollups

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::circular;

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

/// A reading as delivered by a station source, before normalization
pub type RawReading = serde_json::Map<String, serde_json::Value>;

/// One sensor sample, keyed by its timestamp
///
/// Absent fields stay `None`; they are never coerced to zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub time: DateTime<Utc>,

    #[serde(rename = "tempf")]
    pub temp_f: Option<f64>,

    #[serde(rename = "dewpointf")]
    pub dew_point_f: Option<f64>,

    pub humidity: Option<f64>,

    #[serde(rename = "baromrelin")]
    pub barom_rel_in: Option<f64>,

    #[serde(rename = "windspeedmph")]
    pub wind_speed_mph: Option<f64>,

    #[serde(rename = "windgustmph")]
    pub wind_gust_mph: Option<f64>,

    /// Degrees, 0-360
    #[serde(rename = "winddir")]
    pub wind_dir: Option<f64>,

    /// Cumulative rainfall since local midnight
    #[serde(rename = "dailyrainin")]
    pub daily_rain_in: Option<f64>,

    /// W/m²
    #[serde(rename = "solarradiation")]
    pub solar_radiation: Option<f64>,

    pub uv: Option<f64>,
}

impl Observation {
    /// An observation with every field absent
    pub fn empty(time: DateTime<Utc>) -> Self {
        Self {
            time,
            temp_f: None,
            dew_point_f: None,
            humidity: None,
            barom_rel_in: None,
            wind_speed_mph: None,
            wind_gust_mph: None,
            wind_dir: None,
            daily_rain_in: None,
            solar_radiation: None,
            uv: None,
        }
    }

    /// Drop non-finite values to absent and truncate the timestamp to whole seconds
    pub fn sanitized(mut self) -> Self {
        self.time = truncate_to_second(self.time);
        for field in self.fields_mut() {
            *field = field.filter(|v| v.is_finite());
        }
        self
    }

    fn fields_mut(&mut self) -> [&mut Option<f64>; 10] {
        [
            &mut self.temp_f,
            &mut self.dew_point_f,
            &mut self.humidity,
            &mut self.barom_rel_in,
            &mut self.wind_speed_mph,
            &mut self.wind_gust_mph,
            &mut self.wind_dir,
            &mut self.daily_rain_in,
            &mut self.solar_radiation,
            &mut self.uv,
        ]
    }
}

/// Fixed rollup resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Resolution {
    pub const ALL: [Resolution; 4] = [
        Resolution::FiveMinutes,
        Resolution::FifteenMinutes,
        Resolution::OneHour,
        Resolution::OneDay,
    ];

    /// Bucket width in seconds
    pub fn seconds(self) -> i64 {
        match self {
            Resolution::FiveMinutes => 5 * 60,
            Resolution::FifteenMinutes => 15 * 60,
            Resolution::OneHour => 60 * 60,
            Resolution::OneDay => 24 * 60 * 60,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::seconds(self.seconds())
    }

    pub fn tag(self) -> &'static str {
        match self {
            Resolution::FiveMinutes => "5m",
            Resolution::FifteenMinutes => "15m",
            Resolution::OneHour => "1h",
            Resolution::OneDay => "1d",
        }
    }

    /// Start of the bucket containing `t`: `floor(t / R) * R`
    pub fn bucket_start(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let secs = t.timestamp().div_euclid(self.seconds()) * self.seconds();
        DateTime::from_timestamp(secs, 0).unwrap_or(t)
    }

    /// Half-open interval `[bucket, bucket + R)` containing `t`
    pub fn bucket_bounds(self, t: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.bucket_start(t);
        (start, start + self.duration())
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Average/min/max of one scalar field within a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Pre-aggregated summary of the observations in `[bucket, bucket + resolution)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupBucket {
    pub resolution: Resolution,
    pub bucket: DateTime<Utc>,
    pub sample_count: i64,
    pub temp_f: FieldStats,
    pub dew_point_f: FieldStats,
    pub humidity: FieldStats,
    pub barom_rel_in: FieldStats,
    pub wind_speed_mph: FieldStats,
    pub wind_gust_mph_max: Option<f64>,
    /// Mean of `sin(direction)` over contributing samples
    pub wind_dir_sin_avg: Option<f64>,
    /// Mean of `cos(direction)` over contributing samples
    pub wind_dir_cos_avg: Option<f64>,
    pub solar_radiation_avg: Option<f64>,
    pub solar_radiation_max: Option<f64>,
    pub uv_avg: Option<f64>,
    pub uv_max: Option<f64>,
    pub daily_rain_in_max: Option<f64>,
}

impl RollupBucket {
    /// Scalar wind direction reconstructed from the circular components
    pub fn wind_dir(&self) -> Option<f64> {
        circular::direction_from_components(self.wind_dir_sin_avg?, self.wind_dir_cos_avg?)
    }

    /// Observation-shaped view of the bucket
    ///
    /// Scalars carry their averages, gust and daily rain their maxima.
    pub fn to_observation(&self) -> Observation {
        Observation {
            time: self.bucket,
            temp_f: self.temp_f.avg,
            dew_point_f: self.dew_point_f.avg,
            humidity: self.humidity.avg,
            barom_rel_in: self.barom_rel_in.avg,
            wind_speed_mph: self.wind_speed_mph.avg,
            wind_gust_mph: self.wind_gust_mph_max,
            wind_dir: self.wind_dir(),
            daily_rain_in: self.daily_rain_in_max,
            solar_radiation: self.solar_radiation_avg,
            uv: self.uv_avg,
        }
    }
}

/// Forecast quantity valid over `[start, start + duration)`
///
/// Read-only input supplied by the forecast collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastGridPoint {
    pub value: Option<f64>,
    pub start: DateTime<Utc>,
    pub duration: Duration,
}

impl ForecastGridPoint {
    pub fn new(value: Option<f64>, start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            value,
            start,
            duration,
        }
    }

    /// Parse a `"<RFC 3339 start>/<ISO 8601 duration>"` validity string
    pub fn parse(value: Option<f64>, valid_time: &str) -> Option<Self> {
        let (start, duration) = valid_time.split_once('/')?;
        let start = DateTime::parse_from_rfc3339(start).ok()?.with_timezone(&Utc);
        let duration = parse_iso_duration(duration)?;
        if duration <= Duration::zero() {
            return None;
        }
        start.checked_add_signed(duration)?;
        Some(Self::new(value, start, duration))
    }

    /// `None` when the interval runs past the representable date range
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.start.checked_add_signed(self.duration)
    }
}

/// Parse `P[nD][T[nH][nM][nS]]`
pub fn parse_iso_duration(s: &str) -> Option<Duration> {
    let rest = s.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut total = 0i64;
    let mut seen = false;

    if !date_part.is_empty() {
        let days = date_part.strip_suffix('D')?.parse::<i64>().ok()?;
        total = total.checked_add(days.checked_mul(86_400)?)?;
        seen = true;
    }

    if let Some(time_part) = time_part {
        let mut digits = String::new();
        let mut last_unit = 0u8;
        for c in time_part.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let (rank, scale) = match c {
                'H' => (1, 3_600),
                'M' => (2, 60),
                'S' => (3, 1),
                _ => return None,
            };
            if rank <= last_unit || digits.is_empty() {
                return None;
            }
            let part = digits.parse::<i64>().ok()?.checked_mul(scale)?;
            total = total.checked_add(part)?;
            digits.clear();
            last_unit = rank;
            seen = true;
        }
        if !digits.is_empty() {
            return None;
        }
    }

    if !seen {
        return None;
    }
    Duration::try_seconds(total)
}

pub fn truncate_to_second(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}
