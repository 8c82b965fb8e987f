//! Import historical Smart Citizen data into InfluxDB.
//!
//! Iterates over every sensor in the catalog, fetches rollup readings
//! from `/devices/{id}/readings`, and writes them as line protocol.
//! Per-sensor failures are logged and skipped; the run always visits
//! every sensor.

use anyhow::Result;
use clap::Parser;
use sck_collector::api::SckApi;
use sck_collector::catalog::SensorCatalog;
use sck_collector::influx::InfluxWriter;
use sck_collector::lineproto;
use std::time::Duration;

const WRITE_BATCH_SIZE: usize = 5000;

#[derive(Parser)]
#[command(name = "backfill", version, about = "Backfill InfluxDB with historical Smart Citizen data")]
struct Cli {
    /// Start date (YYYY-MM-DD or ISO 8601, e.g. 2025-02-01)
    #[arg(long = "from")]
    from_date: String,
    /// End date (YYYY-MM-DD or ISO 8601, e.g. 2025-02-04)
    #[arg(long = "to")]
    to_date: String,
    /// Server-side rollup interval
    #[arg(long, default_value = "1m")]
    rollup: String,
    #[arg(long, default_value = "19396")]
    device_id: String,
    #[arg(long, default_value = "https://api.smartcitizen.me/v0")]
    api_base: String,
    #[arg(long, default_value = "http://localhost:8086")]
    influxdb_url: String,
    #[arg(long, default_value = "my-super-secret-token")]
    token: String,
    #[arg(long, default_value = "sck")]
    org: String,
    #[arg(long, default_value = "sck_data")]
    bucket: String,
    /// Delay between API requests in seconds
    #[arg(long, default_value_t = 1.0)]
    delay: f64,
}

/// Bare dates become full-day ISO ranges for the API.
fn normalize_date(date: &str, end_of_day: bool) -> String {
    if date.contains('T') {
        return date.to_string();
    }
    if end_of_day {
        format!("{date}T23:59:59Z")
    } else {
        format!("{date}T00:00:00Z")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let from = normalize_date(&cli.from_date, false);
    let to = normalize_date(&cli.to_date, true);
    let delay = Duration::from_secs_f64(cli.delay.max(0.0));

    let api = SckApi::new(&cli.api_base)?;
    let writer = InfluxWriter::new(&cli.influxdb_url, &cli.token, &cli.org, &cli.bucket)?;
    let catalog = SensorCatalog;

    tracing::info!(
        device = %cli.device_id,
        %from,
        %to,
        rollup = %cli.rollup,
        sensors = catalog.len(),
        "starting backfill"
    );

    let mut total_points = 0usize;
    for (idx, (sensor_id, sensor_name)) in catalog.entries().enumerate() {
        tracing::info!(
            sensor = idx + 1,
            total = catalog.len(),
            sensor_id,
            sensor_name,
            "fetching sensor history"
        );

        let rows = match api
            .fetch_readings(&cli.device_id, sensor_id, &cli.rollup, &from, &to)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(sensor_id, error = %err, "fetch failed; skipping sensor");
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        if rows.is_empty() {
            tracing::info!(sensor_id, "no data");
            tokio::time::sleep(delay).await;
            continue;
        }

        let mut lines = Vec::with_capacity(rows.len());
        for (ts_iso, value) in &rows {
            match lineproto::iso_to_ns(ts_iso) {
                Ok(ts_ns) => {
                    lines.push(lineproto::encode_line(&cli.device_id, sensor_name, *value, ts_ns))
                }
                Err(err) => {
                    tracing::warn!(sensor_id, error = %err, "bad timestamp in history row");
                }
            }
        }

        for batch in lines.chunks(WRITE_BATCH_SIZE) {
            writer.write_lines(batch).await?;
        }

        total_points += lines.len();
        tracing::info!(sensor_id, points = lines.len(), "sensor written");

        // Rate limiting against the public API.
        tokio::time::sleep(delay).await;
    }

    tracing::info!(total_points, "backfill complete");
    Ok(())
}
