//! Smart Citizen API client.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const READINGS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct SckApi {
    client: Client,
    base: String,
}

#[derive(Debug, Deserialize)]
struct ReadingsResponse {
    #[serde(default)]
    readings: Vec<Value>,
}

impl SckApi {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(READINGS_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    /// `GET /devices/{id}` — the current device document.
    pub async fn fetch_device(&self, device_id: &str) -> Result<Value, reqwest::Error> {
        let url = format!("{}/devices/{}", self.base, device_id);
        let resp = self
            .client
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        resp.json::<Value>().await
    }

    /// `GET /devices/{id}/readings` — historical rollup data for one sensor.
    ///
    /// Rows come back as `[timestamp_iso, value]` pairs; short or
    /// null-valued rows are dropped here so callers see only usable points.
    pub async fn fetch_readings(
        &self,
        device_id: &str,
        sensor_id: u32,
        rollup: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<(String, f64)>> {
        let url = format!("{}/devices/{}/readings", self.base, device_id);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("sensor_id", sensor_id.to_string().as_str()),
                ("rollup", rollup),
                ("from", from),
                ("to", to),
                ("function", "avg"),
            ])
            .send()
            .await
            .with_context(|| format!("readings request failed for sensor {sensor_id}"))?
            .error_for_status()
            .with_context(|| format!("readings request rejected for sensor {sensor_id}"))?;

        let body: ReadingsResponse = resp
            .json()
            .await
            .context("malformed readings response")?;

        Ok(body
            .readings
            .iter()
            .filter_map(parse_reading_row)
            .collect())
    }
}

fn parse_reading_row(row: &Value) -> Option<(String, f64)> {
    let pair = row.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    let ts = pair[0].as_str()?;
    let value = pair[1].as_f64()?;
    Some((ts.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::parse_reading_row;
    use serde_json::json;

    #[test]
    fn well_formed_rows_parse() {
        let row = json!(["2026-02-01T00:00:00Z", 21.5]);
        assert_eq!(
            parse_reading_row(&row),
            Some(("2026-02-01T00:00:00Z".to_string(), 21.5))
        );
    }

    #[test]
    fn null_and_short_rows_are_dropped() {
        assert_eq!(parse_reading_row(&json!(["2026-02-01T00:00:00Z", null])), None);
        assert_eq!(parse_reading_row(&json!(["2026-02-01T00:00:00Z"])), None);
        assert_eq!(parse_reading_row(&json!("not-a-row")), None);
    }
}
