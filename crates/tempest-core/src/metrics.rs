//! Derived meteorological metrics
//!
//! Pure functions over a single observation or an already time-ordered
//! series. Inputs that are missing, non-finite, or outside a formula's valid
//! domain give `None`; nothing here panics on data quality.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::circular::CircularAccumulator;
use crate::types::{ForecastGridPoint, Observation};
use crate::units::precip_to_inches;

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn in_trailing_window(t: DateTime<Utc>, ref_time: DateTime<Utc>, window: Duration) -> bool {
    t >= ref_time - window && t <= ref_time
}

fn in_day(t: DateTime<Utc>, day_start: DateTime<Utc>) -> bool {
    t >= day_start && t < day_start + Duration::hours(24)
}

fn hours_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_milliseconds() as f64 / 3_600_000.0
}

/// Heat index (°F) by the Rothfusz regression
///
/// Defined for temperature ≥ 80°F and relative humidity ≥ 40%.
pub fn heat_index_f(temp_f: Option<f64>, humidity: Option<f64>) -> Option<f64> {
    let t = finite(temp_f)?;
    let rh = finite(humidity)?;
    if t < 80.0 || rh < 40.0 {
        return None;
    }
    Some(
        -42.379 + 2.04901523 * t + 10.14333127 * rh
            - 0.22475541 * t * rh
            - 0.00683783 * t * t
            - 0.05481717 * rh * rh
            + 0.00122874 * t * t * rh
            + 0.00085282 * t * rh * rh
            - 0.00000199 * t * t * rh * rh,
    )
}

/// NWS wind chill (°F)
///
/// Defined for temperature ≤ 50°F and wind speed > 3 mph.
pub fn wind_chill_f(temp_f: Option<f64>, wind_mph: Option<f64>) -> Option<f64> {
    let t = finite(temp_f)?;
    let v = finite(wind_mph)?;
    if t > 50.0 || v <= 3.0 {
        return None;
    }
    let v16 = v.powf(0.16);
    Some(35.74 + 0.6215 * t - 35.75 * v16 + 0.4275 * t * v16)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeelsLikeKind {
    HeatIndex,
    WindChill,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeelsLike {
    pub value: f64,
    pub kind: FeelsLikeKind,
}

/// Heat index when defined, otherwise wind chill
pub fn feels_like(obs: &Observation) -> Option<FeelsLike> {
    if let Some(value) = heat_index_f(obs.temp_f, obs.humidity) {
        return Some(FeelsLike {
            value,
            kind: FeelsLikeKind::HeatIndex,
        });
    }
    wind_chill_f(obs.temp_f, obs.wind_speed_mph).map(|value| FeelsLike {
        value,
        kind: FeelsLikeKind::WindChill,
    })
}

/// Circular standard deviation (degrees) of wind direction over
/// `[ref_time - window, ref_time]`
pub fn wind_variability_deg(
    series: &[Observation],
    ref_time: DateTime<Utc>,
    window: Duration,
) -> Option<f64> {
    let mut acc = CircularAccumulator::new();
    acc.extend(
        series
            .iter()
            .filter(|o| in_trailing_window(o.time, ref_time, window))
            .filter_map(|o| finite(o.wind_dir)),
    );
    acc.std_dev_degrees()
}

/// Highest gust in `[day_start, day_start + 24h)`
pub fn max_gust_for_day(series: &[Observation], day_start: DateTime<Utc>) -> Option<f64> {
    series
        .iter()
        .filter(|o| in_day(o.time, day_start))
        .filter_map(|o| finite(o.wind_gust_mph))
        .reduce(f64::max)
}

/// Mean wind speed over `[ref_time - window, ref_time]`
pub fn mean_wind_speed(
    series: &[Observation],
    ref_time: DateTime<Utc>,
    window: Duration,
) -> Option<f64> {
    let (total, count) = series
        .iter()
        .filter(|o| in_trailing_window(o.time, ref_time, window))
        .filter_map(|o| finite(o.wind_speed_mph))
        .fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));
    (count > 0).then(|| total / count as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GustCategory {
    Smooth,
    Gusty,
    Turbulent,
}

impl GustCategory {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= 1.3 {
            GustCategory::Smooth
        } else if ratio <= 1.6 {
            GustCategory::Gusty
        } else {
            GustCategory::Turbulent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GustFactor {
    pub ratio: f64,
    pub category: GustCategory,
}

/// Ratio of the latest gust to the mean wind speed; needs a positive mean
pub fn gust_factor(latest_gust: Option<f64>, mean_speed: Option<f64>) -> Option<GustFactor> {
    let gust = finite(latest_gust)?;
    let mean = finite(mean_speed)?;
    if mean <= 0.0 {
        return None;
    }
    let ratio = gust / mean;
    Some(GustFactor {
        ratio,
        category: GustCategory::from_ratio(ratio),
    })
}

/// Wind run (miles) for `[day_start, day_start + 24h)`
///
/// Trapezoidal integration of speed over consecutive same-day samples;
/// a missing speed counts as calm at that endpoint.
pub fn wind_run_miles_for_day(series: &[Observation], day_start: DateTime<Utc>) -> Option<f64> {
    let points: Vec<(DateTime<Utc>, f64)> = series
        .iter()
        .filter(|o| in_day(o.time, day_start))
        .map(|o| (o.time, finite(o.wind_speed_mph).unwrap_or(0.0)))
        .collect();

    if points.len() < 2 {
        return None;
    }

    let miles: f64 = points
        .windows(2)
        .filter_map(|pair| {
            let dt = hours_between(pair[0].0, pair[1].0);
            (dt > 0.0).then(|| (pair[0].1 + pair[1].1) / 2.0 * dt)
        })
        .sum();

    miles.is_finite().then_some(miles)
}

/// Solar energy (Wh/m²) across the series
///
/// Trapezoidal integration over consecutive samples where both irradiance
/// endpoints are present.
pub fn solar_energy_wh_m2(series: &[Observation]) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }

    let total: f64 = series
        .windows(2)
        .filter_map(|pair| {
            let a = finite(pair[0].solar_radiation)?;
            let b = finite(pair[1].solar_radiation)?;
            let dt = hours_between(pair[0].time, pair[1].time);
            (dt > 0.0).then(|| (a + b) / 2.0 * dt)
        })
        .sum();

    total.is_finite().then_some(total)
}

/// Forecast precipitation (inches) over `[range_start, range_end)`
///
/// Each grid point contributes `value × overlap / validity` for the part of
/// its validity interval inside the range. Values are in `unit_code` units.
pub fn sum_precip_inches(
    points: &[ForecastGridPoint],
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    unit_code: &str,
) -> Option<f64> {
    if points.is_empty() || range_end <= range_start {
        return None;
    }

    let total: f64 = points
        .iter()
        .filter_map(|p| {
            let value = finite(p.value)?;
            let span = p.duration.num_milliseconds();
            if span <= 0 {
                return None;
            }
            let overlap_start = p.start.max(range_start);
            let overlap_end = p.end()?.min(range_end);
            let overlap = (overlap_end - overlap_start).num_milliseconds();
            (overlap > 0).then(|| value * overlap as f64 / span as f64)
        })
        .sum();

    total
        .is_finite()
        .then(|| precip_to_inches(total, unit_code))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Min/max/avg of one field, ignoring absent values
pub fn series_stats<F>(series: &[Observation], field: F) -> Option<SeriesStats>
where
    F: Fn(&Observation) -> Option<f64>,
{
    let mut acc = crate::rollups::Accumulator::new();
    for obs in series {
        acc.add_opt(finite(field(obs)));
    }
    let stats = acc.stats();
    Some(SeriesStats {
        min: stats.min?,
        max: stats.max?,
        avg: stats.avg?,
    })
}

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass label for a bearing
pub fn deg_to_compass(degrees: f64) -> Option<&'static str> {
    if !degrees.is_finite() {
        return None;
    }
    let ix = (degrees.rem_euclid(360.0) / 22.5).round() as usize % 16;
    Some(COMPASS_POINTS[ix])
}
