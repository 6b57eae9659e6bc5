//! Config entry types and acceptance validation.

use crate::error::{Result, ThresholdsError};
use crate::thresholds::{
    BinarySensorConfig, ResolutionMode, SensorConfig, ThresholdLevel, Thresholds,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique id of the setup marker entry.
pub const SETUP_UNIQUE_ID: &str = "setup";

/// Title of the setup marker entry.
pub const SETUP_TITLE: &str = "Easy Thresholds";

/// One stored configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    /// `"setup"` for the marker entry, the sensor entity id otherwise.
    pub unique_id: String,
    pub title: String,
    pub data: EntryData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryData {
    Setup,
    Sensor(SensorConfig),
    BinarySensor(BinarySensorConfig),
}

impl ConfigEntry {
    pub fn is_setup(&self) -> bool {
        matches!(self.data, EntryData::Setup)
    }

    /// Entity id of the monitored sensor, `None` for the setup entry.
    pub fn sensor_entity(&self) -> Option<&str> {
        match &self.data {
            EntryData::Setup => None,
            EntryData::Sensor(config) => Some(&config.sensor_entity),
            EntryData::BinarySensor(config) => Some(&config.binary_sensor_entity),
        }
    }
}

/// Raw sensor form input, as submitted by the configuring caller.
///
/// Every field is optional here; [`SensorForm::validate`] decides what is
/// required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorForm {
    #[serde(default)]
    pub sensor_entity: Option<String>,
    #[serde(default)]
    pub s_minus_minus: Option<f64>,
    #[serde(default)]
    pub s_minus: Option<f64>,
    #[serde(default)]
    pub s_plus: Option<f64>,
    #[serde(default)]
    pub s_plus_plus: Option<f64>,
    #[serde(default)]
    pub active_thresholds: Option<BTreeSet<ThresholdLevel>>,
    #[serde(default)]
    pub resolution_mode: Option<ResolutionMode>,
}

impl SensorForm {
    pub const DEFAULT_S_MINUS_MINUS: f64 = -10.0;
    pub const DEFAULT_S_MINUS: f64 = 0.0;
    pub const DEFAULT_S_PLUS: f64 = 100.0;
    pub const DEFAULT_S_PLUS_PLUS: f64 = 110.0;

    /// Form pre-filled with the defaults offered when adding a sensor.
    pub fn with_defaults(sensor_entity: impl Into<String>) -> Self {
        Self {
            sensor_entity: Some(sensor_entity.into()),
            s_minus_minus: Some(Self::DEFAULT_S_MINUS_MINUS),
            s_minus: Some(Self::DEFAULT_S_MINUS),
            s_plus: Some(Self::DEFAULT_S_PLUS),
            s_plus_plus: Some(Self::DEFAULT_S_PLUS_PLUS),
            active_thresholds: Some(ThresholdLevel::DEFAULT_ACTIVE.into_iter().collect()),
            resolution_mode: Some(ResolutionMode::Automatic),
        }
    }

    /// Options form: fields left empty keep the current configuration's values.
    pub fn merged_over(self, current: &SensorConfig) -> Self {
        let t = &current.thresholds;
        Self {
            sensor_entity: Some(current.sensor_entity.clone()),
            s_minus_minus: self.s_minus_minus.or(Some(t.critical_low())),
            s_minus: self.s_minus.or(Some(t.warning_low())),
            s_plus: self.s_plus.or(Some(t.warning_high())),
            s_plus_plus: self.s_plus_plus.or(Some(t.critical_high())),
            active_thresholds: self
                .active_thresholds
                .or_else(|| Some(current.active_thresholds.clone())),
            resolution_mode: self.resolution_mode.or(Some(current.resolution_mode)),
        }
    }

    /// Accept the form, producing a validated sensor configuration.
    ///
    /// The sensor entity and all four boundaries are required and the
    /// boundaries must be strictly increasing. Active thresholds and the
    /// resolution mode fall back to their defaults.
    pub fn validate(self) -> Result<SensorConfig> {
        let sensor_entity = self
            .sensor_entity
            .filter(|entity| !entity.trim().is_empty())
            .ok_or(ThresholdsError::MissingField("sensor_entity"))?;
        let required = |value: Option<f64>, name| value.ok_or(ThresholdsError::MissingField(name));
        let thresholds = Thresholds::new(
            required(self.s_minus_minus, "s_minus_minus")?,
            required(self.s_minus, "s_minus")?,
            required(self.s_plus, "s_plus")?,
            required(self.s_plus_plus, "s_plus_plus")?,
        )?;

        Ok(SensorConfig {
            sensor_entity: sensor_entity.trim().to_string(),
            thresholds,
            active_thresholds: self
                .active_thresholds
                .unwrap_or_else(|| ThresholdLevel::DEFAULT_ACTIVE.into_iter().collect()),
            resolution_mode: self.resolution_mode.unwrap_or_default(),
        })
    }
}
