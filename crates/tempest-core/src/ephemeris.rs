//! Solar and lunar ephemeris for the station overlay
//!
//! Low-precision positional astronomy after the SunCalc formulas (a few
//! arc-minutes for the sun, under a degree for the moon), enough for display
//! and rise/set times to within a minute or two. Azimuths are degrees
//! clockwise from north in `[0, 360)`.

use std::f64::consts::PI;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::circular::normalize_degrees;

const RAD: f64 = PI / 180.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
/// Obliquity of the ecliptic
const OBLIQUITY: f64 = RAD * 23.4397;
/// Sun altitude at apparent sunrise/sunset, including refraction and disc radius
const SUNRISE_ALTITUDE: f64 = -0.833 * RAD;
/// Mean Earth-Sun distance, km
const SUN_DISTANCE_KM: f64 = 149_598_000.0;
const J0: f64 = 0.0009;

fn to_julian(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / MILLIS_PER_DAY - 0.5 + J1970
}

fn from_julian(j: f64) -> Option<DateTime<Utc>> {
    let millis = ((j + 0.5 - J1970) * MILLIS_PER_DAY).round();
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

fn to_days(t: DateTime<Utc>) -> f64 {
    to_julian(t) - J2000
}

fn right_ascension(l: f64, b: f64) -> f64 {
    (l.sin() * OBLIQUITY.cos() - b.tan() * OBLIQUITY.sin()).atan2(l.cos())
}

fn declination(l: f64, b: f64) -> f64 {
    (b.sin() * OBLIQUITY.cos() + b.cos() * OBLIQUITY.sin() * l.sin()).asin()
}

/// Azimuth measured from south, positive westward
fn azimuth(h: f64, phi: f64, dec: f64) -> f64 {
    h.sin().atan2(h.cos() * phi.sin() - dec.tan() * phi.cos())
}

fn altitude(h: f64, phi: f64, dec: f64) -> f64 {
    (phi.sin() * dec.sin() + phi.cos() * dec.cos() * h.cos()).asin()
}

fn sidereal_time(d: f64, lw: f64) -> f64 {
    RAD * (280.16 + 360.985_623_5 * d) - lw
}

fn astro_refraction(h: f64) -> f64 {
    let h = h.max(0.0);
    0.000_296_7 / (h + 0.003_125_36 / (h + 0.089_011_79)).tan()
}

fn north_azimuth_deg(south_azimuth: f64) -> f64 {
    normalize_degrees(south_azimuth.to_degrees() + 180.0)
}

fn solar_mean_anomaly(d: f64) -> f64 {
    RAD * (357.5291 + 0.985_600_28 * d)
}

fn ecliptic_longitude(m: f64) -> f64 {
    let center = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    let perihelion = RAD * 102.9372;
    m + center + perihelion + PI
}

struct EquatorialCoords {
    dec: f64,
    ra: f64,
}

fn sun_coords(d: f64) -> EquatorialCoords {
    let l = ecliptic_longitude(solar_mean_anomaly(d));
    EquatorialCoords {
        dec: declination(l, 0.0),
        ra: right_ascension(l, 0.0),
    }
}

struct MoonCoords {
    dec: f64,
    ra: f64,
    distance_km: f64,
}

fn moon_coords(d: f64) -> MoonCoords {
    let l = RAD * (218.316 + 13.176_396 * d);
    let m = RAD * (134.963 + 13.064_993 * d);
    let f = RAD * (93.272 + 13.229_350 * d);

    let lon = l + RAD * 6.289 * m.sin();
    let lat = RAD * 5.128 * f.sin();
    MoonCoords {
        ra: right_ascension(lon, lat),
        dec: declination(lon, lat),
        distance_km: 385_001.0 - 20_905.0 * m.cos(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarPosition {
    pub azimuth_deg: f64,
    pub altitude_deg: f64,
}

pub fn sun_position(t: DateTime<Utc>, lat: f64, lon: f64) -> SolarPosition {
    let lw = RAD * -lon;
    let phi = RAD * lat;
    let d = to_days(t);
    let c = sun_coords(d);
    let h = sidereal_time(d, lw) - c.ra;

    SolarPosition {
        azimuth_deg: north_azimuth_deg(azimuth(h, phi, c.dec)),
        altitude_deg: altitude(h, phi, c.dec).to_degrees(),
    }
}

/// Sun transit and horizon crossings for the solar day nearest `t`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub solar_noon: Option<DateTime<Utc>>,
    /// `None` during polar day or night
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

impl SunTimes {
    pub fn day_length(&self) -> Option<Duration> {
        Some(self.sunset? - self.sunrise?)
    }
}

pub fn sun_times(t: DateTime<Utc>, lat: f64, lon: f64) -> SunTimes {
    let lw = RAD * -lon;
    let phi = RAD * lat;
    let d = to_days(t);

    let n = (d - J0 - lw / (2.0 * PI)).round();
    let ds = J0 + lw / (2.0 * PI) + n;
    let m = solar_mean_anomaly(ds);
    let l = ecliptic_longitude(m);
    let dec = declination(l, 0.0);
    let transit = |ds: f64| J2000 + ds + 0.0053 * m.sin() - 0.0069 * (2.0 * l).sin();

    let j_noon = transit(ds);

    let cos_w = (SUNRISE_ALTITUDE.sin() - phi.sin() * dec.sin()) / (phi.cos() * dec.cos());
    let (sunrise, sunset) = if (-1.0..=1.0).contains(&cos_w) {
        let w = cos_w.acos();
        let j_set = transit(J0 + (w + lw) / (2.0 * PI) + n);
        let j_rise = j_noon - (j_set - j_noon);
        (from_julian(j_rise), from_julian(j_set))
    } else {
        (None, None)
    };

    SunTimes {
        solar_noon: from_julian(j_noon),
        sunrise,
        sunset,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoonPosition {
    pub azimuth_deg: f64,
    /// Includes atmospheric refraction
    pub altitude_deg: f64,
    pub distance_km: f64,
}

pub fn moon_position(t: DateTime<Utc>, lat: f64, lon: f64) -> MoonPosition {
    let lw = RAD * -lon;
    let phi = RAD * lat;
    let d = to_days(t);
    let c = moon_coords(d);
    let h = sidereal_time(d, lw) - c.ra;
    let alt = altitude(h, phi, c.dec);

    MoonPosition {
        azimuth_deg: north_azimuth_deg(azimuth(h, phi, c.dec)),
        altitude_deg: (alt + astro_refraction(alt)).to_degrees(),
        distance_km: c.distance_km,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoonIllumination {
    /// Illuminated fraction of the disc, 0..=1
    pub fraction: f64,
    /// Fraction of the synodic cycle: 0 new, 0.25 first quarter, 0.5 full, 0.75 last quarter
    pub phase: f64,
}

pub fn moon_illumination(t: DateTime<Utc>) -> MoonIllumination {
    let d = to_days(t);
    let s = sun_coords(d);
    let m = moon_coords(d);

    let elongation = (s.dec.sin() * m.dec.sin()
        + s.dec.cos() * m.dec.cos() * (s.ra - m.ra).cos())
    .clamp(-1.0, 1.0)
    .acos();
    let inc = (SUN_DISTANCE_KM * elongation.sin())
        .atan2(m.distance_km - SUN_DISTANCE_KM * elongation.cos());
    let angle = (s.dec.cos() * (s.ra - m.ra).sin()).atan2(
        s.dec.sin() * m.dec.cos() - s.dec.cos() * m.dec.sin() * (s.ra - m.ra).cos(),
    );
    let sign = if angle < 0.0 { -1.0 } else { 1.0 };

    MoonIllumination {
        fraction: (1.0 + inc.cos()) / 2.0,
        phase: 0.5 + 0.5 * inc * sign / PI,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoonPhase {
    New,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    Full,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl MoonPhase {
    pub fn from_phase(phase: f64) -> Self {
        let p = phase.rem_euclid(1.0);
        match p {
            p if p < 0.03 => MoonPhase::New,
            p if p < 0.22 => MoonPhase::WaxingCrescent,
            p if p < 0.28 => MoonPhase::FirstQuarter,
            p if p < 0.47 => MoonPhase::WaxingGibbous,
            p if p < 0.53 => MoonPhase::Full,
            p if p < 0.72 => MoonPhase::WaningGibbous,
            p if p < 0.78 => MoonPhase::LastQuarter,
            p if p < 0.97 => MoonPhase::WaningCrescent,
            _ => MoonPhase::New,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MoonPhase::New => "New Moon",
            MoonPhase::WaxingCrescent => "Waxing Crescent",
            MoonPhase::FirstQuarter => "First Quarter",
            MoonPhase::WaxingGibbous => "Waxing Gibbous",
            MoonPhase::Full => "Full Moon",
            MoonPhase::WaningGibbous => "Waning Gibbous",
            MoonPhase::LastQuarter => "Last Quarter",
            MoonPhase::WaningCrescent => "Waning Crescent",
        }
    }
}

/// Forward scan for the next full moon
///
/// Samples the illumination phase every `step` and keeps the sample nearest
/// phase 0.5. The scan ends at the first sample at or past 0.5, so a second
/// full moon inside `horizon` is never chosen. The moon's ecliptic latitude
/// keeps the phase from settling on 0.5: it jumps across by up to about 0.014
/// at opposition. `tolerance` only fires when a sample lands inside that jump,
/// and the bracket is what normally ends the scan. The answer can be off by up
/// to one step.
#[derive(Debug, Clone, Copy)]
pub struct FullMoonSearch {
    pub step: Duration,
    pub horizon: Duration,
    pub tolerance: f64,
}

impl Default for FullMoonSearch {
    fn default() -> Self {
        Self {
            step: Duration::minutes(10),
            horizon: Duration::days(30),
            // one 10-minute step moves the phase by about 0.000235
            tolerance: 0.0002,
        }
    }
}

impl FullMoonSearch {
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.step <= Duration::zero() || self.horizon < Duration::zero() {
            return None;
        }

        let end = from.checked_add_signed(self.horizon)?;
        let mut best: Option<(DateTime<Utc>, f64)> = None;
        let mut previous: Option<f64> = None;
        let mut t = from;

        while t <= end {
            let phase = moon_illumination(t).phase;
            let distance = (phase - 0.5).abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((t, distance));
            }
            let crossed = previous.is_some_and(|p| p < 0.5 && phase >= 0.5);
            if distance <= self.tolerance || crossed {
                break;
            }
            previous = Some(phase);
            t = match t.checked_add_signed(self.step) {
                Some(next) => next,
                None => break,
            };
        }

        best.map(|(t, _)| t)
    }
}

pub fn next_full_moon(from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    FullMoonSearch::default().next_after(from)
}

/// Everything the overlay shows for one instant and place
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ephemeris {
    pub sun: SolarPosition,
    pub sun_times: SunTimes,
    pub moon: MoonPosition,
    pub moon_illumination: MoonIllumination,
    pub moon_phase: MoonPhase,
    pub next_full_moon: Option<DateTime<Utc>>,
}

pub fn ephemeris(t: DateTime<Utc>, lat: f64, lon: f64) -> Ephemeris {
    let moon_illumination = moon_illumination(t);
    Ephemeris {
        sun: sun_position(t, lat, lon),
        sun_times: sun_times(t, lat, lon),
        moon: moon_position(t, lat, lon),
        moon_phase: MoonPhase::from_phase(moon_illumination.phase),
        moon_illumination,
        next_full_moon: next_full_moon(t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EUGENE: (f64, f64) = (44.05, -123.09);

    #[test]
    fn test_julian_round_trip() {
        let t = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(from_julian(to_julian(t)), Some(t));
        assert!((to_julian(Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap()) - J2000).abs() < 1e-9);
    }

    #[test]
    fn test_sun_overhead_at_equinox_noon() {
        let t = Utc.with_ymd_and_hms(2024, 3, 20, 12, 7, 0).unwrap();
        let sun = sun_position(t, 0.0, 0.0);
        assert!(sun.altitude_deg > 85.0, "got {}", sun.altitude_deg);
    }

    #[test]
    fn test_sun_below_horizon_at_midnight() {
        let t = Utc.with_ymd_and_hms(2024, 6, 21, 8, 0, 0).unwrap();
        let sun = sun_position(t, EUGENE.0, EUGENE.1);
        assert!(sun.altitude_deg < 0.0);
        assert!((0.0..360.0).contains(&sun.azimuth_deg));
    }

    #[test]
    fn test_summer_solstice_times() {
        let t = Utc.with_ymd_and_hms(2024, 6, 21, 20, 0, 0).unwrap();
        let times = sun_times(t, EUGENE.0, EUGENE.1);
        let noon = times.solar_noon.unwrap();
        let rise = times.sunrise.unwrap();
        let set = times.sunset.unwrap();

        assert!(rise < noon && noon < set);
        let noon_expected = Utc.with_ymd_and_hms(2024, 6, 21, 20, 14, 0).unwrap();
        assert!((noon - noon_expected).num_minutes().abs() <= 5);

        let hours = times.day_length().unwrap().num_minutes() as f64 / 60.0;
        assert!(hours > 15.2 && hours < 16.0, "got {hours}");
    }

    #[test]
    fn test_polar_night_has_no_sunrise() {
        let t = Utc.with_ymd_and_hms(2024, 12, 21, 12, 0, 0).unwrap();
        let times = sun_times(t, 80.0, 0.0);
        assert!(times.sunrise.is_none());
        assert!(times.sunset.is_none());
        assert!(times.day_length().is_none());
        assert!(times.solar_noon.is_some());
    }

    #[test]
    fn test_full_and_new_moon_illumination() {
        let full = moon_illumination(Utc.with_ymd_and_hms(2024, 1, 25, 17, 54, 0).unwrap());
        assert!(full.fraction > 0.97, "got {}", full.fraction);
        assert_eq!(MoonPhase::from_phase(full.phase), MoonPhase::Full);

        let new = moon_illumination(Utc.with_ymd_and_hms(2024, 1, 11, 11, 57, 0).unwrap());
        assert!(new.fraction < 0.03, "got {}", new.fraction);
        assert_eq!(MoonPhase::from_phase(new.phase), MoonPhase::New);
    }

    #[test]
    fn test_quarter_phases() {
        let first = moon_illumination(Utc.with_ymd_and_hms(2024, 1, 18, 3, 53, 0).unwrap());
        assert_eq!(MoonPhase::from_phase(first.phase), MoonPhase::FirstQuarter);

        let last = moon_illumination(Utc.with_ymd_and_hms(2024, 2, 2, 23, 18, 0).unwrap());
        assert_eq!(MoonPhase::from_phase(last.phase), MoonPhase::LastQuarter);
    }

    #[test]
    fn test_phase_buckets() {
        assert_eq!(MoonPhase::from_phase(0.0), MoonPhase::New);
        assert_eq!(MoonPhase::from_phase(0.98), MoonPhase::New);
        assert_eq!(MoonPhase::from_phase(0.1), MoonPhase::WaxingCrescent);
        assert_eq!(MoonPhase::from_phase(0.4), MoonPhase::WaxingGibbous);
        assert_eq!(MoonPhase::from_phase(0.5), MoonPhase::Full);
        assert_eq!(MoonPhase::from_phase(0.6), MoonPhase::WaningGibbous);
        assert_eq!(MoonPhase::from_phase(0.9), MoonPhase::WaningCrescent);
        assert_eq!(MoonPhase::Full.name(), "Full Moon");
    }

    #[test]
    fn test_moon_distance_in_range() {
        let moon = moon_position(Utc.with_ymd_and_hms(2024, 1, 25, 17, 54, 0).unwrap(), EUGENE.0, EUGENE.1);
        assert!(moon.distance_km > 355_000.0 && moon.distance_km < 407_000.0);
        assert!((0.0..360.0).contains(&moon.azimuth_deg));
        assert!(moon.altitude_deg.abs() <= 90.0);
    }

    #[test]
    fn test_next_full_moon() {
        let from = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
        let found = next_full_moon(from).unwrap();
        let actual = Utc.with_ymd_and_hms(2024, 1, 25, 17, 54, 0).unwrap();
        assert!(
            (found - actual).num_hours().abs() <= 6,
            "found {found}, expected near {actual}"
        );
    }

    #[test]
    fn test_full_moon_search_is_forward_and_bounded() {
        let from = Utc.with_ymd_and_hms(2024, 1, 26, 0, 0, 0).unwrap();
        let search = FullMoonSearch::default();
        let found = search.next_after(from).unwrap();
        assert!(found >= from);
        assert!(found <= from + search.horizon);
    }

    #[test]
    fn test_full_moon_search_stops_at_first_full_moon() {
        // 2024-01-25 17:54 and 2024-02-24 12:30 both fall inside this horizon
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let search = FullMoonSearch {
            horizon: Duration::days(60),
            ..FullMoonSearch::default()
        };
        let found = search.next_after(from).unwrap();
        let first = Utc.with_ymd_and_hms(2024, 1, 25, 17, 54, 0).unwrap();
        assert!((found - first).num_hours().abs() <= 6, "found {found}");

        // just past one full moon, the scan runs on to the next
        let after = Utc.with_ymd_and_hms(2024, 1, 26, 12, 0, 0).unwrap();
        let found = next_full_moon(after).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 2, 24, 12, 30, 0).unwrap();
        assert!((found - second).num_hours().abs() <= 6, "found {found}");
    }

    #[test]
    fn test_full_moon_search_early_exit() {
        let from = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
        let search = FullMoonSearch {
            tolerance: 0.5,
            ..FullMoonSearch::default()
        };
        assert_eq!(search.next_after(from), Some(from));

        let broken = FullMoonSearch {
            step: Duration::zero(),
            ..FullMoonSearch::default()
        };
        assert_eq!(broken.next_after(from), None);
    }

    #[test]
    fn test_ephemeris_bundle() {
        let t = Utc.with_ymd_and_hms(2024, 1, 25, 17, 54, 0).unwrap();
        let e = ephemeris(t, EUGENE.0, EUGENE.1);
        assert_eq!(e.moon_phase, MoonPhase::Full);
        assert!(e.next_full_moon.is_some());
        assert!(e.sun_times.sunrise.is_some());
    }
}
