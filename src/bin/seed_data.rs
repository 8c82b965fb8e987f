//! Generate synthetic sensor data for local testing.
//!
//! Writes realistic diurnal patterns to InfluxDB at 1-minute intervals:
//! sinusoidal temperature, inversely correlated humidity, day/night noise,
//! daylight bell-curve light and UV, slowly drifting pressure, spiky PM,
//! a slowly draining battery, and noisy WiFi RSSI. Deterministic for a
//! given seed and time range.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Timelike, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sck_collector::influx::InfluxWriter;
use sck_collector::lineproto;
use std::f64::consts::PI;

const WRITE_BATCH_SIZE: usize = 1000;
const DEVICE_ID: &str = "19396";

#[derive(Parser)]
#[command(name = "seed-data", version, about = "Seed InfluxDB with synthetic SCK data")]
struct Cli {
    #[arg(long, default_value = "http://localhost:8086")]
    influxdb_url: String,
    #[arg(long, default_value = "my-super-secret-token")]
    token: String,
    #[arg(long, default_value = "sck")]
    org: String,
    #[arg(long, default_value = "sck_data")]
    bucket: String,
    /// Hours of data to generate
    #[arg(long, default_value_t = 24)]
    hours: i64,
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

struct Gauss {
    rng: StdRng,
}

impl Gauss {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Box-Muller normal sample.
    fn sample(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen::<f64>();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..high)
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }
}

fn generate_lines(start: DateTime<Utc>, end: DateTime<Utc>, seed: u64) -> Vec<String> {
    let mut g = Gauss::new(seed);
    let mut lines = Vec::new();
    let mut current = start;

    while current <= end {
        let ts_ns = current.timestamp_nanos_opt().unwrap_or_default();
        let hour = f64::from(current.hour()) + f64::from(current.minute()) / 60.0;
        let day_frac = hour / 24.0;

        // Temperature: sinusoidal 18-28 C, peak mid-afternoon.
        let temp = 23.0 + 5.0 * (2.0 * PI * (day_frac - 0.25)).sin() + g.sample(0.0, 0.3);

        // Humidity: inversely correlated with temperature.
        let hum = (75.0 - 1.5 * (temp - 18.0) + g.sample(0.0, 2.0)).clamp(25.0, 85.0);

        // Noise: louder during the day (8-22h).
        let noise = if (8..22).contains(&current.hour()) {
            45.0 + g.sample(0.0, 5.0)
        } else {
            32.0 + g.sample(0.0, 3.0)
        }
        .clamp(20.0, 80.0);

        // Light: bell curve during daylight, near zero at night.
        let light = if (6..=20).contains(&current.hour()) {
            let light_frac = (PI * (hour - 6.0) / 14.0).sin();
            (50_000.0 * light_frac + g.sample(0.0, 500.0)).max(0.0)
        } else {
            g.sample(0.0, 2.0).max(0.0)
        };

        // Pressure: slow drift 101.0-102.5 kPa.
        let pressure = 101.75 + 0.75 * (2.0 * PI * day_frac / 3.0 + g.sample(0.0, 0.1)).sin();

        // UV: diurnal bell, zero-ish at night.
        let (uv_a, uv_b, uv_c) = if (7..=19).contains(&current.hour()) {
            let uv_frac = (PI * (hour - 7.0) / 12.0).sin();
            (
                (8.0 * uv_frac + g.sample(0.0, 0.2)).max(0.0),
                (3.0 * uv_frac + g.sample(0.0, 0.1)).max(0.0),
                (0.5 * uv_frac + g.sample(0.0, 0.02)).max(0.0),
            )
        } else {
            (
                g.sample(0.02, 0.01).max(0.0),
                g.sample(0.01, 0.005).max(0.0),
                g.sample(0.005, 0.002).max(0.0),
            )
        };

        // Particulate matter: low base with occasional spikes.
        let mut pm_base = 5.0 + g.sample(0.0, 2.0);
        if g.chance(0.05) {
            pm_base += g.uniform(15.0, 40.0);
        }
        let pm_1 = (pm_base * 0.6 + g.sample(0.0, 0.5)).max(0.0);
        let pm_2_5 = (pm_base + g.sample(0.0, 1.0)).max(0.0);
        let pm_4 = (pm_base * 1.1 + g.sample(0.0, 1.0)).max(0.0);
        let pm_10 = (pm_base * 1.2 + g.sample(0.0, 1.5)).max(0.0);

        // Battery: slow decline over the run.
        let minutes_elapsed = (current - start).num_seconds() as f64 / 60.0;
        let battery = (100.0 - minutes_elapsed / 240.0 + g.sample(0.0, 0.1)).max(90.0);

        let rssi = -65.0 + g.sample(0.0, 8.0);

        let channels: [(&str, f64); 14] = [
            ("temperature", round_to(temp, 2)),
            ("humidity", round_to(hum, 2)),
            ("noise_dba", round_to(noise, 2)),
            ("light", round_to(light, 2)),
            ("pressure", round_to(pressure, 2)),
            ("uv_a", round_to(uv_a, 4)),
            ("uv_b", round_to(uv_b, 4)),
            ("uv_c", round_to(uv_c, 4)),
            ("pm_1", round_to(pm_1, 2)),
            ("pm_2_5", round_to(pm_2_5, 2)),
            ("pm_4", round_to(pm_4, 2)),
            ("pm_10", round_to(pm_10, 2)),
            ("battery", round_to(battery, 1)),
            ("wifi_rssi", round_to(rssi, 1)),
        ];

        for (name, value) in channels {
            lines.push(lineproto::encode_line(DEVICE_ID, name, value, ts_ns));
        }

        current += ChronoDuration::minutes(1);
    }

    lines
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let end = Utc::now()
        .duration_trunc(ChronoDuration::minutes(1))
        .unwrap_or_else(|_| Utc::now());
    let start = end - ChronoDuration::hours(cli.hours);

    tracing::info!(hours = cli.hours, %start, %end, "generating synthetic data");
    let lines = generate_lines(start, end, cli.seed);
    tracing::info!(records = lines.len(), "generated line protocol records");

    let writer = InfluxWriter::new(&cli.influxdb_url, &cli.token, &cli.org, &cli.bucket)?;
    let mut written = 0usize;
    for batch in lines.chunks(WRITE_BATCH_SIZE) {
        writer.write_lines(batch).await?;
        written += batch.len();
        tracing::info!(written, total = lines.len(), "batch written");
    }

    tracing::info!("done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 1, 1, 0, 0).unwrap();
        let a = generate_lines(start, end, 42);
        let b = generate_lines(start, end, 42);
        assert_eq!(a, b);
        let c = generate_lines(start, end, 7);
        assert_ne!(a, c);
    }

    #[test]
    fn fourteen_channels_per_minute() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 1, 0, 9, 0).unwrap();
        let lines = generate_lines(start, end, 42);
        // 10 minute marks inclusive, 14 channels each.
        assert_eq!(lines.len(), 10 * 14);
        assert!(lines[0].starts_with("sck_sensors,device_id=19396,sensor_name=temperature "));
    }

    #[test]
    fn values_stay_in_physical_ranges() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        for line in generate_lines(start, end, 42) {
            let value: f64 = line
                .split("value=")
                .nth(1)
                .unwrap()
                .split(' ')
                .next()
                .unwrap()
                .parse()
                .unwrap();
            if line.contains("sensor_name=humidity ") {
                assert!((25.0..=85.0).contains(&value), "{line}");
            }
            if line.contains("sensor_name=battery ") {
                assert!(value >= 90.0, "{line}");
            }
        }
    }
}
