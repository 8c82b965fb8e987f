//! Static sensor allow-list.
//!
//! Smart Citizen numeric sensor ids are stable across firmware versions;
//! the names here become InfluxDB tag values, so they stay snake_case
//! ASCII. Ids missing from this table are deliberately ignored by the
//! normalizer rather than treated as errors.

/// Sensor id -> normalized name, ordered by id for stable iteration.
const SENSOR_TABLE: &[(u32, &str)] = &[
    (10, "battery"),
    (14, "light"),
    (53, "noise_dba"),
    (55, "temperature"),
    (56, "humidity"),
    (58, "pressure"),
    (193, "pm_1"),
    (194, "pm_2_5"),
    (195, "pm_4"),
    (196, "pm_10"),
    (197, "pn_0_5"),
    (198, "pn_1"),
    (199, "pn_2_5"),
    (200, "pn_4"),
    (201, "pn_10"),
    (202, "typical_particle_size"),
    (214, "uv_a"),
    (215, "uv_b"),
    (216, "uv_c"),
    (220, "wifi_rssi"),
    (221, "sd_card_present"),
];

/// Immutable id -> name mapping, loaded once at process start.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorCatalog;

impl SensorCatalog {
    pub fn name(&self, sensor_id: u32) -> Option<&'static str> {
        SENSOR_TABLE
            .iter()
            .find(|(id, _)| *id == sensor_id)
            .map(|(_, name)| *name)
    }

    /// All catalog entries in ascending id order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &'static str)> {
        SENSOR_TABLE.iter().copied()
    }

    pub fn len(&self) -> usize {
        SENSOR_TABLE.len()
    }

    pub fn is_empty(&self) -> bool {
        SENSOR_TABLE.is_empty()
    }
}
