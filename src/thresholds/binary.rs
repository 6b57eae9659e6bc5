//! Binary condition evaluator.

use serde::{Deserialize, Serialize};

/// State string that raises a binary alarm.
pub const STATE_ON: &str = "on";

/// Configuration of one monitored binary sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySensorConfig {
    pub binary_sensor_entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BinarySensorConfig {
    /// Alarm name: the display name, falling back to the entity id.
    pub fn alarm_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.binary_sensor_entity,
        }
    }

    /// Whether `name` refers to this sensor, by display name or entity id.
    pub fn matches(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name) || self.binary_sensor_entity == name
    }
}

/// Alarm present iff the state is exactly `"on"`.
pub fn evaluate_binary(state: &str) -> bool {
    state == STATE_ON
}
