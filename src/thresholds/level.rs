//! Threshold levels and resolution modes.
//!
//! The serialized names (`s_minus_minus`, `s_minus`, `s_plus`, `s_plus_plus`)
//! are part of the alarm-name contract: numeric alarms are named
//! `{sensor_id}_{level}`.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Named boundary classification of a numeric reading.
///
/// Ordered from lowest to highest band.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
pub enum ThresholdLevel {
    /// Below `s_minus_minus`
    #[serde(rename = "s_minus_minus")]
    #[strum(serialize = "s_minus_minus")]
    CriticalLow,
    /// Between `s_minus_minus` (inclusive) and `s_minus`
    #[serde(rename = "s_minus")]
    #[strum(serialize = "s_minus")]
    WarningLow,
    /// Between `s_plus` and `s_plus_plus` (inclusive)
    #[serde(rename = "s_plus")]
    #[strum(serialize = "s_plus")]
    WarningHigh,
    /// Above `s_plus_plus`
    #[serde(rename = "s_plus_plus")]
    #[strum(serialize = "s_plus_plus")]
    CriticalHigh,
}

impl ThresholdLevel {
    /// Levels enabled when a sensor is added without an explicit selection.
    pub const DEFAULT_ACTIVE: [ThresholdLevel; 2] =
        [ThresholdLevel::WarningLow, ThresholdLevel::WarningHigh];

    /// Alarm name for this level on the given sensor.
    pub fn alarm_name(self, sensor_id: &str) -> String {
        format!("{}_{}", sensor_id, self)
    }
}

/// How alarms of a numeric sensor are resolved.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResolutionMode {
    /// Alarms clear themselves once the value is back in the safe range.
    #[default]
    Automatic,
    /// Alarms stay until a clear request passes the guard.
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_level_names() {
        let names: Vec<String> = ThresholdLevel::iter().map(|l| l.to_string()).collect();
        assert_eq!(names, ["s_minus_minus", "s_minus", "s_plus", "s_plus_plus"]);
        assert_eq!(
            ThresholdLevel::from_str("s_plus_plus").unwrap(),
            ThresholdLevel::CriticalHigh
        );
        assert!(ThresholdLevel::from_str("critical_high").is_err());
    }

    #[test]
    fn test_alarm_name() {
        assert_eq!(
            ThresholdLevel::WarningLow.alarm_name("sensor.temp"),
            "sensor.temp_s_minus"
        );
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&ThresholdLevel::CriticalLow).unwrap();
        assert_eq!(json, "\"s_minus_minus\"");

        let mode: ResolutionMode = serde_json::from_str("\"manual\"").unwrap();
        assert_eq!(mode, ResolutionMode::Manual);
        assert_eq!(ResolutionMode::default().to_string(), "automatic");
    }
}
