//! Raw API payload -> normalized readings.
//!
//! The device document is untrusted: any field may be absent or null.
//! Extraction never fails on malformed structure, it only produces fewer
//! readings. Per-item problems (non-numeric value, missing timestamp) are
//! logged and skipped without aborting the batch.

use crate::catalog::SensorCatalog;
use serde_json::Value;

/// One normalized sensor-channel measurement.
///
/// `sensor_name` always comes from the catalog, so downstream consumers
/// may treat it as a safe tag value.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor_id: u32,
    pub sensor_name: &'static str,
    pub value: f64,
    pub timestamp: String,
}

/// Extract readings from a `GET /devices/{id}` response.
///
/// Sensors live at `data.sensors[]`; each entry needs an `id` in the
/// catalog, a non-null numeric `value`, and a timestamp (its own
/// `last_reading_at`, falling back to the document's top-level one).
/// Input order is preserved.
pub fn parse_sensors(payload: &Value, catalog: &SensorCatalog) -> Vec<Reading> {
    let sensors = payload
        .pointer("/data/sensors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let device_timestamp = payload.get("last_reading_at").and_then(Value::as_str);

    let mut readings = Vec::with_capacity(sensors.len());
    for entry in sensors {
        let Some(sensor_id) = entry.get("id").and_then(Value::as_u64).map(|id| id as u32)
        else {
            continue;
        };
        let Some(sensor_name) = catalog.name(sensor_id) else {
            continue; // not in the allow-list
        };

        let raw_value = entry.get("value").cloned().unwrap_or(Value::Null);
        if raw_value.is_null() {
            continue; // no reading this cycle
        }
        let Some(value) = coerce_f64(&raw_value) else {
            tracing::warn!(sensor_id, %raw_value, "non-numeric sensor value; skipping reading");
            continue;
        };

        let Some(timestamp) = entry
            .get("last_reading_at")
            .and_then(Value::as_str)
            .or(device_timestamp)
        else {
            tracing::warn!(sensor_id, "reading has no resolvable timestamp; skipping");
            continue;
        };

        readings.push(Reading {
            sensor_id,
            sensor_name,
            value,
            timestamp: timestamp.to_string(),
        });
    }

    readings
}

/// The API usually sends numbers but occasionally quotes them.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
