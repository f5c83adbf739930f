//! Periodic ingestion trigger

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use std::time::Duration;
use tempest_archive::RangeQueryRouter;
use tempest_core::ephemeris::ephemeris;
use tempest_core::metrics::{
    deg_to_compass, feels_like, gust_factor, max_gust_for_day, mean_wind_speed,
    solar_energy_wh_m2, wind_run_miles_for_day, wind_variability_deg,
};
use tempest_core::{Observation, ReadingSource};
use tempest_ingest::{IngestReport, Ingestor};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

/// Derived conditions for the latest reading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    pub feels_like_f: Option<f64>,
    pub compass: Option<&'static str>,
    pub wind_variability_deg: Option<f64>,
    pub gust_factor: Option<f64>,
    pub max_gust_today_mph: Option<f64>,
    pub wind_run_today_mi: Option<f64>,
    pub solar_today_wh_m2: Option<f64>,
}

/// Compute conditions from an ascending series ending at `latest`
pub fn conditions(series: &[Observation], latest: &Observation) -> Conditions {
    let now = latest.time;
    let window = ChronoDuration::minutes(10);
    let day_start = utc_day(now);
    let today: Vec<Observation> = series
        .iter()
        .filter(|o| o.time >= day_start)
        .cloned()
        .collect();

    Conditions {
        feels_like_f: feels_like(latest).map(|f| f.value),
        compass: latest.wind_dir.and_then(deg_to_compass),
        wind_variability_deg: wind_variability_deg(series, now, window),
        gust_factor: gust_factor(latest.wind_gust_mph, mean_wind_speed(series, now, window))
            .map(|g| g.ratio),
        max_gust_today_mph: max_gust_for_day(series, day_start),
        wind_run_today_mi: wind_run_miles_for_day(series, day_start),
        solar_today_wh_m2: solar_energy_wh_m2(&today),
    }
}

/// Runs one ingestion cycle per poll interval
pub struct Scheduler {
    source: Box<dyn ReadingSource>,
    ingestor: Ingestor,
    router: RangeQueryRouter,
    poll_interval: Duration,
    latitude: f64,
    longitude: f64,
}

impl Scheduler {
    pub fn new(
        source: Box<dyn ReadingSource>,
        ingestor: Ingestor,
        poll_interval: Duration,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        let router = RangeQueryRouter::new(ingestor.db().clone());
        Self {
            source,
            ingestor,
            router,
            poll_interval,
            latitude,
            longitude,
        }
    }

    /// Run cycles until cancelled; a zero interval runs exactly one
    ///
    /// A failed cycle is logged and the next one runs on schedule.
    pub async fn run(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return self.run_cycle().await.map(|_| ());
        }

        info!(
            source = self.source.name(),
            interval_secs = self.poll_interval.as_secs(),
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                error!("Ingestion cycle failed: {:#}", e);
            }
        }
    }

    /// Fetch one reading, store it, and log the derived overlay
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn run_cycle(&self) -> Result<IngestReport> {
        let raw = self
            .source
            .latest_reading()
            .await
            .context("Failed to fetch reading")?;

        let report = self
            .ingestor
            .ingest(&raw)
            .await
            .context("Failed to ingest reading")?;

        self.log_overlay(&report.observation).await;
        Ok(report)
    }

    async fn log_overlay(&self, latest: &Observation) {
        let now = latest.time;
        match self.router.query(now - ChronoDuration::hours(24), now).await {
            Ok(result) => {
                let c = conditions(&result.observations, latest);
                info!(
                    time = %now,
                    temp_f = ?latest.temp_f,
                    feels_like_f = ?c.feels_like_f,
                    wind = ?c.compass,
                    wind_variability_deg = ?c.wind_variability_deg,
                    gust_factor = ?c.gust_factor,
                    max_gust_today_mph = ?c.max_gust_today_mph,
                    wind_run_today_mi = ?c.wind_run_today_mi,
                    solar_today_wh_m2 = ?c.solar_today_wh_m2,
                    "Conditions"
                );
            }
            Err(e) => error!("Conditions query failed: {}", e),
        }

        let sky = ephemeris(now, self.latitude, self.longitude);
        info!(
            sun_altitude_deg = sky.sun.altitude_deg,
            sunrise = ?sky.sun_times.sunrise,
            sunset = ?sky.sun_times.sunset,
            moon_phase = sky.moon_phase.name(),
            moon_illumination = sky.moon_illumination.fraction,
            next_full_moon = ?sky.next_full_moon,
            "Ephemeris"
        );
    }
}

/// Midnight UTC of the day containing `t`
fn utc_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(ChronoDuration::days(1)).unwrap_or(t)
}
