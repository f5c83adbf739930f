//! Daemon configuration from environment variables

use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tempest_ingest::DEFAULT_AMBIENT_BASE_URL;

const DEFAULT_DATABASE_URL: &str = "sqlite://tempest.db?mode=rwc";

/// Where readings come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationSource {
    Ambient {
        base_url: String,
        api_key: String,
        app_key: String,
    },
    Simulator,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// sqlx SQLite connection URL
    pub database_url: String,

    pub source: StationSource,

    /// Time between ingestion cycles; zero runs a single cycle
    pub poll_interval: Duration,

    /// Station latitude, degrees north
    pub latitude: f64,

    /// Station longitude, degrees east
    pub longitude: f64,
}

fn parse_or<T>(value: Option<String>, default: T, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v.trim().parse().with_context(|| format!("Invalid {name}")),
        None => Ok(default),
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let source = match lookup("STATION_SOURCE").as_deref().unwrap_or("ambient") {
            "ambient" => StationSource::Ambient {
                base_url: lookup("AMBIENT_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_AMBIENT_BASE_URL.to_string()),
                api_key: lookup("AMBIENT_API_KEY")
                    .context("AMBIENT_API_KEY environment variable not set")?,
                app_key: lookup("AMBIENT_APP_KEY")
                    .context("AMBIENT_APP_KEY environment variable not set")?,
            },
            "simulator" => StationSource::Simulator,
            other => return Err(anyhow!("Unknown STATION_SOURCE: {other}")),
        };

        let poll_secs: u64 = parse_or(lookup("POLL_INTERVAL"), 60, "POLL_INTERVAL")?;
        let latitude: f64 = parse_or(lookup("STATION_LAT"), 44.05, "STATION_LAT")?;
        let longitude: f64 = parse_or(lookup("STATION_LON"), -123.09, "STATION_LON")?;

        if !(-90.0..=90.0).contains(&latitude) {
            return Err(anyhow!("STATION_LAT out of range: {latitude}"));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(anyhow!("STATION_LON out of range: {longitude}"));
        }

        Ok(Self {
            database_url,
            source,
            poll_interval: Duration::from_secs(poll_secs),
            latitude,
            longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = config(&[("STATION_SOURCE", "simulator")]).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.source, StationSource::Simulator);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.latitude, 44.05);
        assert_eq!(config.longitude, -123.09);
    }

    #[test]
    fn test_ambient_requires_keys() {
        assert!(config(&[]).is_err());
        assert!(config(&[("AMBIENT_API_KEY", "a")]).is_err());

        let config = config(&[("AMBIENT_API_KEY", "a"), ("AMBIENT_APP_KEY", "b")]).unwrap();
        assert_eq!(
            config.source,
            StationSource::Ambient {
                base_url: DEFAULT_AMBIENT_BASE_URL.to_string(),
                api_key: "a".into(),
                app_key: "b".into(),
            }
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("STATION_SOURCE", "davis")]).is_err());
        assert!(config(&[("STATION_SOURCE", "simulator"), ("POLL_INTERVAL", "soon")]).is_err());
        assert!(config(&[("STATION_SOURCE", "simulator"), ("STATION_LAT", "91")]).is_err());
    }

    #[test]
    fn test_run_once() {
        let config = config(&[("STATION_SOURCE", "simulator"), ("POLL_INTERVAL", "0")]).unwrap();
        assert!(config.poll_interval.is_zero());
    }
}
