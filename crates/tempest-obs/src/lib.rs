//! Tracing subscriber setup shared by the binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,tempest=debug";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// `LOG_FORMAT=pretty` selects human-readable output; anything else is JSON
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize logging. `RUST_LOG` wins over the default filter.
///
/// A second call is a no-op.
pub fn init(service_name: &str) {
    init_with(service_name, LogFormat::from_env());
}

pub fn init_with(service_name: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(env_filter());
    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_ok() {
        tracing::info!(service = %service_name, "Observability initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_with("test", LogFormat::Pretty);
        init_with("test", LogFormat::Json);
    }
}
