use anyhow::Result;

use crate::RawReading;

/// A station feed that yields its most recent reading on demand
#[async_trait::async_trait]
pub trait ReadingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn latest_reading(&self) -> Result<RawReading>;
}
