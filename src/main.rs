use anyhow::Result;
use sck_collector::api::SckApi;
use sck_collector::catalog::SensorCatalog;
use sck_collector::config::Config;
use sck_collector::influx::InfluxWriter;
use sck_collector::poll::{self, LiveDevice, PollCycle};
use sck_collector::shutdown::{self, Shutdown};
use sck_collector::state::PollStatus;
use sck_collector::{health, lineproto};

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sck_collector=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing()?;

    tracing::info!(
        device = %config.device_id,
        interval_secs = config.poll_interval_seconds,
        influx = %config.influxdb_url,
        measurement = lineproto::MEASUREMENT,
        "collector starting"
    );

    let writer = InfluxWriter::new(
        &config.influxdb_url,
        &config.influxdb_token,
        &config.influxdb_org,
        &config.influxdb_bucket,
    )?;

    // Connectivity probe before entering the loop; failure here is not
    // fatal, the write path retries via backoff.
    match writer.probe_health().await {
        Ok(()) => tracing::info!("InfluxDB connection OK"),
        Err(err) => tracing::warn!(error = %err, "cannot reach InfluxDB; will retry in the loop"),
    }

    let shutdown = Shutdown::new();
    let status = PollStatus::new();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(shutdown::listen_for_signals(signal_shutdown));

    let health_shutdown = shutdown.clone();
    let health_status = status.clone();
    let health_port = config.health_port;
    let health_handle = tokio::spawn(async move {
        if let Err(err) = health::serve(health_port, health_status, health_shutdown).await {
            tracing::error!(error = %err, "health server exited");
        }
    });

    let api = SckApi::new(&config.api_base)?;
    let source = LiveDevice {
        api,
        device_id: config.device_id.clone(),
    };
    let cycle = PollCycle::new(
        source,
        writer,
        SensorCatalog,
        config.device_id.clone(),
        status,
    );

    poll::run(cycle, config.poll_interval(), shutdown.clone()).await;

    // The loop owns the store client; it is dropped exactly once here
    // after the final cycle has unwound.
    let _ = health_handle.await;
    tracing::info!("shutdown complete");
    Ok(())
}
