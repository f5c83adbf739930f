//! Simulated station for dry runs

use anyhow::Result;
use chrono::{Timelike, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tempest_core::{RawReading, ReadingSource};

/// Synthetic readings in the Ambient field layout
///
/// Temperature follows a diurnal curve around `base_temp_f`; wind direction
/// sweeps slowly around north so rollups cross the 0°/360° seam.
pub struct SimulatorSource {
    base_temp_f: f64,
    tick: AtomicU64,
}

impl SimulatorSource {
    pub fn new(base_temp_f: f64) -> Self {
        Self {
            base_temp_f,
            tick: AtomicU64::new(0),
        }
    }

    fn generate_reading(&self) -> RawReading {
        let now = Utc::now();
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);

        let hour = now.hour() as f64 + now.minute() as f64 / 60.0;
        let diurnal = ((hour - 9.0) / 24.0 * std::f64::consts::TAU).sin();
        // Cheap deterministic jitter in [-1, 1]
        let variation = ((tick * 37 % 21) as f64 / 10.0) - 1.0;

        let temp = self.base_temp_f + 10.0 * diurnal + variation;
        let humidity = (65.0 - 20.0 * diurnal).clamp(5.0, 100.0);
        let speed = 4.0 + variation.abs() * 3.0;
        let dir = (350.0 + (tick % 40) as f64).rem_euclid(360.0);
        let solar = (800.0 * diurnal).max(0.0);

        let reading = json!({
            "dateutc": now.timestamp_millis(),
            "tempf": temp,
            "dewPoint": temp - (100.0 - humidity) / 5.0 * 9.0 / 5.0,
            "humidity": humidity,
            "baromrelin": 29.92 + variation * 0.05,
            "windspeedmph": speed,
            "windgustmph": speed * 1.4,
            "winddir": dir,
            "dailyrainin": 0.0,
            "solarradiation": solar,
            "uv": (solar / 100.0).floor(),
        });

        match reading {
            Value::Object(map) => map,
            _ => RawReading::new(),
        }
    }
}

impl Default for SimulatorSource {
    fn default() -> Self {
        Self::new(60.0)
    }
}

#[async_trait::async_trait]
impl ReadingSource for SimulatorSource {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn latest_reading(&self) -> Result<RawReading> {
        Ok(self.generate_reading())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;

    #[tokio::test]
    async fn test_simulator_readings_normalize() {
        let source = SimulatorSource::default();
        assert_eq!(source.name(), "simulator");

        for _ in 0..50 {
            let raw = source.latest_reading().await.unwrap();
            let obs = normalize(&raw).unwrap();

            let dir = obs.wind_dir.unwrap();
            assert!((0.0..360.0).contains(&dir));
            assert!(obs.temp_f.is_some());
            assert!(obs.humidity.unwrap() <= 100.0);
            assert!(obs.solar_radiation.unwrap() >= 0.0);
        }
    }
}
