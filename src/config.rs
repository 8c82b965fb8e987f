use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub device_id: String,
    pub api_base: String,
    pub poll_interval_seconds: u64,

    pub influxdb_url: String,
    pub influxdb_token: String,
    pub influxdb_org: String,
    pub influxdb_bucket: String,

    pub health_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let device_id = env_string("SCK_DEVICE_ID", Some("19396".to_string()))?;
        let api_base = env_string(
            "SCK_API_BASE",
            Some("https://api.smartcitizen.me/v0".to_string()),
        )?;
        let poll_interval_seconds = env_u64("POLL_INTERVAL_SECONDS", Some(60))?;

        let influxdb_url =
            env_string("INFLUXDB_URL", Some("http://influxdb:8086".to_string()))?;
        let influxdb_token =
            env_string("INFLUXDB_TOKEN", Some("my-super-secret-token".to_string()))?;
        let influxdb_org = env_string("INFLUXDB_ORG", Some("sck".to_string()))?;
        let influxdb_bucket = env_string("INFLUXDB_BUCKET", Some("sck_data".to_string()))?;

        let health_port = env_u64("HEALTH_PORT", Some(8000))? as u16;

        Ok(Self {
            device_id,
            api_base,
            poll_interval_seconds,
            influxdb_url,
            influxdb_token,
            influxdb_org,
            influxdb_bucket,
            health_port,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

fn env_string(key: &str, default: Option<String>) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}
