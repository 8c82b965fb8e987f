//! InfluxDB line protocol encoding.

use crate::normalize::Reading;
use anyhow::{Context, Result};
use chrono::DateTime;

pub const MEASUREMENT: &str = "sck_sensors";

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Parse an ISO-8601 timestamp into nanoseconds since the Unix epoch.
///
/// A trailing `Z` is treated as `+00:00`. Exact for whole seconds; the
/// source API does not carry sub-second precision.
pub fn iso_to_ns(iso: &str) -> Result<i64> {
    let dt = DateTime::parse_from_rfc3339(iso)
        .with_context(|| format!("invalid ISO-8601 timestamp {iso:?}"))?;
    Ok(dt.timestamp() * NANOS_PER_SEC + i64::from(dt.timestamp_subsec_nanos()))
}

/// Encode one reading as a line protocol record.
///
/// Precondition: `sensor_name` comes from the static catalog (snake_case
/// ASCII) and `device_id` is a bare numeric id, so no tag escaping is
/// performed here.
pub fn encode_line(device_id: &str, sensor_name: &str, value: f64, ts_ns: i64) -> String {
    format!("{MEASUREMENT},device_id={device_id},sensor_name={sensor_name} value={value} {ts_ns}")
}

/// Encode a batch of normalized readings, one line per reading.
///
/// Empty input yields an empty batch; callers must not issue a store
/// write for it.
pub fn encode(readings: &[Reading], device_id: &str) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(readings.len());
    for reading in readings {
        let ts_ns = iso_to_ns(&reading.timestamp)?;
        lines.push(encode_line(
            device_id,
            reading.sensor_name,
            reading.value,
            ts_ns,
        ));
    }
    Ok(lines)
}
