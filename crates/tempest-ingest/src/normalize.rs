//! Field-alias normalization of raw station readings

use chrono::{DateTime, Utc};
use serde_json::Value;
use tempest_core::units::hpa_to_inhg;
use tempest_core::{truncate_to_second, Observation, RawReading};

use crate::{IngestError, IngestResult};

const TIME_KEYS: &[&str] = &["dateutc", "dateUTC", "date"];

/// Epoch values above this are milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Value of the first alias present with a non-null value
fn first_present<'a>(raw: &'a RawReading, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

/// Finite number from a JSON number or numeric string
pub fn pick_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn field(raw: &RawReading, keys: &[&str]) -> Option<f64> {
    first_present(raw, keys).and_then(pick_number)
}

/// Parse a timestamp value, truncated to whole seconds
///
/// Numbers (or numeric strings) are epoch milliseconds when above 1e12 and
/// epoch seconds otherwise; other strings must be RFC 3339.
pub fn parse_time(value: &Value) -> IngestResult<DateTime<Utc>> {
    let invalid = || IngestError::InvalidTimestamp(value.to_string());

    if let Some(n) = pick_number(value) {
        let secs = if n > EPOCH_MILLIS_THRESHOLD {
            n / 1000.0
        } else {
            n
        };
        return DateTime::from_timestamp(secs.floor() as i64, 0).ok_or_else(invalid);
    }

    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|t| truncate_to_second(t.with_timezone(&Utc)))
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Map a raw reading onto the fixed observation fields
///
/// Unknown keys are ignored; non-numeric or non-finite values become absent.
pub fn normalize(raw: &RawReading) -> IngestResult<Observation> {
    let time = first_present(raw, TIME_KEYS).ok_or(IngestError::MissingTimestamp)?;
    let time = parse_time(time)?;

    let barom_rel_in = match field(raw, &["baromrelin"]) {
        Some(inhg) => Some(inhg),
        None => field(raw, &["baromrelhpa"])
            .map(hpa_to_inhg)
            .or_else(|| field(raw, &["baromrel"])),
    };

    let obs = Observation {
        time,
        temp_f: field(raw, &["tempf"]),
        dew_point_f: field(raw, &["dewPoint", "dewpointf", "dewpoint"]),
        humidity: field(raw, &["humidity"]),
        barom_rel_in,
        wind_speed_mph: field(raw, &["windspeedmph", "windSpeed"]),
        wind_gust_mph: field(raw, &["windgustmph", "windGust"]),
        wind_dir: field(raw, &["winddir", "windDir"]),
        daily_rain_in: field(raw, &["dailyrainin", "dailyRainin"]),
        solar_radiation: field(raw, &["solarradiation", "solarRadiation"]),
        uv: field(raw, &["uv"]),
    };

    Ok(obs.sanitized())
}
