//! InfluxDB v2 HTTP write client.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct InfluxWriter {
    client: Client,
    url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxWriter {
    pub fn new(url: &str, token: &str, org: &str, bucket: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(WRITE_TIMEOUT)
            .build()
            .context("failed to build InfluxDB HTTP client")?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            org: org.to_string(),
            bucket: bucket.to_string(),
        })
    }

    /// Write a batch of line protocol records. Returns the number of lines
    /// written. An empty batch is a no-op: no request is issued.
    pub async fn write_lines(&self, lines: &[String]) -> Result<usize> {
        if lines.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/api/v2/write", self.url);
        let resp = self
            .client
            .post(&url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(lines.join("\n"))
            .send()
            .await
            .context("InfluxDB write request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("InfluxDB write rejected ({status}): {body}"));
        }
        Ok(lines.len())
    }

    /// Connectivity probe against `GET /health`. Callers treat a failure
    /// as a warning, not a fatal condition; the write path has its own
    /// retry behavior.
    pub async fn probe_health(&self) -> Result<()> {
        let url = format!("{}/health", self.url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("InfluxDB health request failed")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("InfluxDB health check returned {status}"));
        }
        Ok(())
    }
}
