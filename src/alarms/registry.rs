//! Registry of active alarms.

use crate::thresholds::ThresholdLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

/// One currently triggered alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub alarm_name: String,
    pub timestamp_triggered: DateTime<Utc>,
    /// Breached level, `None` for binary sensor alarms.
    pub threshold_value: Option<ThresholdLevel>,
}

/// How alarm names are attributed to a sensor id.
///
/// Numeric alarms are named `{sensor_id}_{level}`. With [`SensorMatch::Prefix`]
/// any name starting with the sensor id belongs to the sensor, which also
/// matches alarms of a sensor whose id merely extends it (`sensor.temp` vs
/// `sensor.temp_2`). [`SensorMatch::Strict`] requires the `_` separator right
/// after the id. Both agree on names that do not share such a prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SensorMatch {
    #[default]
    Prefix,
    Strict,
}

impl SensorMatch {
    pub fn matches(self, sensor_id: &str, alarm_name: &str) -> bool {
        match self {
            SensorMatch::Prefix => alarm_name.starts_with(sensor_id),
            SensorMatch::Strict => alarm_name
                .strip_prefix(sensor_id)
                .is_some_and(|rest| rest.starts_with('_')),
        }
    }

    /// Parse from an env-style flag (`true`/`1` selects strict matching).
    pub fn from_flag(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => SensorMatch::Strict,
            other => SensorMatch::from_str(other).unwrap_or_default(),
        }
    }
}

/// Authoritative mapping of alarm name to record, kept in insertion order.
///
/// Names are unique: creating an alarm that already exists is a no-op.
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    alarms: Vec<AlarmRecord>,
    matching: SensorMatch,
}

impl AlarmRegistry {
    pub fn new(matching: SensorMatch) -> Self {
        Self {
            alarms: Vec::new(),
            matching,
        }
    }

    pub fn matching(&self) -> SensorMatch {
        self.matching
    }

    pub fn exists(&self, name: &str) -> bool {
        self.alarms.iter().any(|a| a.alarm_name == name)
    }

    /// Insert a new alarm unless one with this name is already active.
    ///
    /// Returns true if a record was inserted.
    pub fn create(
        &mut self,
        name: &str,
        timestamp: DateTime<Utc>,
        threshold_value: Option<ThresholdLevel>,
    ) -> bool {
        if self.exists(name) {
            return false;
        }
        self.alarms.push(AlarmRecord {
            alarm_name: name.to_string(),
            timestamp_triggered: timestamp,
            threshold_value,
        });
        true
    }

    /// Remove an alarm by name. Clearing an absent alarm is not an error.
    ///
    /// Returns true if a record was removed.
    pub fn clear_by_name(&mut self, name: &str) -> bool {
        let before = self.alarms.len();
        self.alarms.retain(|a| a.alarm_name != name);
        self.alarms.len() != before
    }

    /// Remove every alarm attributed to `sensor_id` and return their names.
    pub fn clear_by_sensor_prefix(&mut self, sensor_id: &str) -> Vec<String> {
        let matching = self.matching;
        let mut removed = Vec::new();
        self.alarms.retain(|a| {
            if matching.matches(sensor_id, &a.alarm_name) {
                removed.push(a.alarm_name.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Active alarms in trigger order.
    pub fn list_active(&self) -> &[AlarmRecord] {
        &self.alarms
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOW: Option<ThresholdLevel> = Some(ThresholdLevel::WarningLow);
    const HIGH: Option<ThresholdLevel> = Some(ThresholdLevel::WarningHigh);

    #[test]
    fn test_create_is_idempotent() {
        let mut registry = AlarmRegistry::default();
        let now = Utc::now();

        assert!(registry.create("sensor.temp_s_minus", now, LOW));
        assert!(!registry.create("sensor.temp_s_minus", now, LOW));

        assert_eq!(registry.len(), 1);
        assert!(registry.exists("sensor.temp_s_minus"));
    }

    #[test]
    fn test_clear_by_name_is_idempotent() {
        let mut registry = AlarmRegistry::default();
        registry.create("Door", Utc::now(), None);

        assert!(registry.clear_by_name("Door"));
        assert!(!registry.clear_by_name("Door"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_active_keeps_insertion_order() {
        let mut registry = AlarmRegistry::default();
        let now = Utc::now();
        registry.create("b", now, None);
        registry.create("a", now, None);
        registry.create("c", now, None);
        registry.clear_by_name("a");

        let names: Vec<&str> = registry
            .list_active()
            .iter()
            .map(|a| a.alarm_name.as_str())
            .collect();
        assert_eq!(names, ["b", "c"]);
    }

    #[test]
    fn test_prefix_clear_over_matches() {
        let mut registry = AlarmRegistry::new(SensorMatch::Prefix);
        let now = Utc::now();
        registry.create("sensor.temp_s_minus", now, LOW);
        registry.create("sensor.temp_2_s_plus", now, HIGH);
        registry.create("sensor.humidity_s_plus", now, HIGH);

        let removed = registry.clear_by_sensor_prefix("sensor.temp");
        assert_eq!(removed, ["sensor.temp_s_minus", "sensor.temp_2_s_plus"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_strict_clear_requires_separator() {
        let mut registry = AlarmRegistry::new(SensorMatch::Strict);
        let now = Utc::now();
        registry.create("sensor.temp_s_minus", now, LOW);
        registry.create("sensor.temp_2_s_plus", now, HIGH);

        let removed = registry.clear_by_sensor_prefix("sensor.temp");
        assert_eq!(removed, ["sensor.temp_s_minus"]);
        assert!(registry.exists("sensor.temp_2_s_plus"));

        assert!(!SensorMatch::Strict.matches("sensor.temp", "sensor.temp"));
    }

    #[test]
    fn test_sensor_match_from_flag() {
        assert_eq!(SensorMatch::from_flag("true"), SensorMatch::Strict);
        assert_eq!(SensorMatch::from_flag("strict"), SensorMatch::Strict);
        assert_eq!(SensorMatch::from_flag("0"), SensorMatch::Prefix);
        assert_eq!(SensorMatch::from_flag("prefix"), SensorMatch::Prefix);
    }

    #[test]
    fn test_record_json_shape() {
        let mut registry = AlarmRegistry::default();
        registry.create("sensor.temp_s_plus", Utc::now(), HIGH);
        registry.create("Door", Utc::now(), None);

        let json = serde_json::to_value(registry.list_active()).unwrap();
        assert_eq!(json[0]["alarm_name"], "sensor.temp_s_plus");
        assert_eq!(json[0]["threshold_value"], "s_plus");
        assert!(json[0]["timestamp_triggered"].is_string());
        assert!(json[1]["threshold_value"].is_null());
    }
}
