//! Ambient Weather REST source

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tempest_core::{RawReading, ReadingSource};
use tracing::debug;

pub const DEFAULT_AMBIENT_BASE_URL: &str = "https://rt.ambientweather.net/v1";

/// Fetches the latest reading of the first device on an Ambient Weather account
pub struct AmbientSource {
    client: Client,
    base_url: String,
    api_key: String,
    app_key: String,
}

impl AmbientSource {
    pub fn new(base_url: String, api_key: String, app_key: String) -> Result<Self> {
        if base_url.is_empty() || api_key.is_empty() || app_key.is_empty() {
            return Err(anyhow!("invalid ambient configuration"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            app_key,
        })
    }

    fn devices_url(&self) -> String {
        format!("{}/devices", self.base_url)
    }
}

/// Pull `lastData` out of a devices response
///
/// Accepts the usual array of devices (first device wins) or a single
/// device object.
pub fn extract_last_data(body: &Value) -> Result<RawReading> {
    let device = match body {
        Value::Array(devices) => devices.first().context("no devices in response")?,
        Value::Object(_) => body,
        other => return Err(anyhow!("unexpected devices response: {other}")),
    };

    device
        .get("lastData")
        .and_then(Value::as_object)
        .cloned()
        .context("device has no lastData")
}

#[async_trait::async_trait]
impl ReadingSource for AmbientSource {
    fn name(&self) -> &str {
        "ambient"
    }

    async fn latest_reading(&self) -> Result<RawReading> {
        let resp = self
            .client
            .get(self.devices_url())
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("applicationKey", self.app_key.as_str()),
            ])
            .header("Accept", "application/json")
            .send()
            .await
            .context("ambient request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("ambient fetch failed: {} {}", status, text));
        }

        let body: Value = resp.json().await.context("ambient response is not JSON")?;
        let reading = extract_last_data(&body)?;
        debug!(fields = reading.len(), "Fetched ambient reading");
        Ok(reading)
    }
}
