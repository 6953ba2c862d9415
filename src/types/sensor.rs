//! Defines the sensor channels recognized in the monitoring service payloads.
//!
//! A station can report several measurement streams (radar gauge, pressure
//! sensor, float gauge, ...). Only the channels listed here are kept when a
//! payload is normalized; anything else the service emits (diagnostics,
//! battery voltage, ...) is dropped.

/// Identifiers of the measurement channels that are kept during normalization.
///
/// Each identifier becomes one column of a [`crate::StationTable`].
pub const SENSOR_CHANNELS: [&str; 20] = [
    "aqu", "atm", "bub", "bwl", "ecs", "enb", "enc", "flt", "pr1", "pr2", "prs", "prt", "prte",
    "pwl", "ra2", "ra3", "rad", "ras", "stp", "wls",
];

/// Returns `true` if `sensor` is one of the [`SENSOR_CHANNELS`].
///
/// # Examples
///
/// ```
/// use sealevel_observer::is_known_sensor;
///
/// assert!(is_known_sensor("wls"));
/// assert!(!is_known_sensor("bat"));
/// ```
pub fn is_known_sensor(sensor: &str) -> bool {
    SENSOR_CHANNELS.contains(&sensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sensors() {
        for sensor in SENSOR_CHANNELS {
            assert!(is_known_sensor(sensor), "{sensor} should be known");
        }
        assert!(!is_known_sensor("WLS"));
        assert!(!is_known_sensor(""));
    }
}
