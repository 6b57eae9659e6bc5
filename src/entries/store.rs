//! Ordered, file-backed collection of config entries.
//!
//! This is the configuration collaborator: it accepts or rejects new and
//! edited entries and persists the accepted set as JSON. The monitor receives
//! a full snapshot of the entries after every change.

use super::entry::{ConfigEntry, EntryData, SETUP_TITLE, SETUP_UNIQUE_ID, SensorForm};
use crate::error::{Result, ThresholdsError};
use crate::thresholds::{BinarySensorConfig, SensorConfig};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Current on-disk format version.
const STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntries {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: Vec<ConfigEntry>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            entries: Vec::new(),
        }
    }

    /// Load entries from file. A missing file is an empty configuration.
    ///
    /// Entries are re-validated while parsing, so a hand-edited file with
    /// unordered boundaries fails to load instead of reaching the monitor.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(bytes) => {
                let mut store: ConfigEntries = serde_json::from_slice(&bytes)?;
                store.version = STORE_VERSION;
                let count = store.entries.len();
                info!("Loaded {} config entries from {:?}", count, path);
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config entries found at {:?} (first run)", path);
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save to file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)?;
        let count = self.entries.len();
        info!("Saved {} config entries to {:?}", count, path);
        Ok(())
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn is_set_up(&self) -> bool {
        self.entries.iter().any(ConfigEntry::is_setup)
    }

    /// Create the setup marker entry. Only one may exist.
    pub fn setup(&mut self) -> Result<&ConfigEntry> {
        if self.is_set_up() {
            let unique_id = SETUP_UNIQUE_ID.to_string();
            return Err(ThresholdsError::AlreadyConfigured(unique_id));
        }
        let title = SETUP_TITLE.to_string();
        self.push(SETUP_UNIQUE_ID.to_string(), title, EntryData::Setup)
    }

    /// Accept a new numeric sensor from a submitted form.
    pub fn add_sensor(&mut self, form: SensorForm) -> Result<&ConfigEntry> {
        self.require_setup()?;
        let config = form.validate()?;
        self.require_unique(&config.sensor_entity)?;
        let entity = config.sensor_entity.clone();
        self.push(entity.clone(), entity, EntryData::Sensor(config))
    }

    /// Accept a new binary sensor.
    pub fn add_binary_sensor(
        &mut self,
        entity: impl Into<String>,
        name: Option<String>,
    ) -> Result<&ConfigEntry> {
        self.require_setup()?;
        let entity: String = entity.into();
        let entity = entity.trim().to_string();
        if entity.is_empty() {
            return Err(ThresholdsError::MissingField("binary_sensor_entity"));
        }
        self.require_unique(&entity)?;
        let config = BinarySensorConfig {
            binary_sensor_entity: entity.clone(),
            name: name.filter(|n| !n.trim().is_empty()),
        };
        let title = config.alarm_name().to_string();
        self.push(entity, title, EntryData::BinarySensor(config))
    }

    /// Options flow: replace a numeric sensor's configuration wholesale.
    ///
    /// Fields left empty in `options` keep their current value; the merged
    /// result is validated like a new entry.
    pub fn update_sensor(&mut self, unique_id: &str, options: SensorForm) -> Result<&ConfigEntry> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.unique_id == unique_id)
            .ok_or_else(|| ThresholdsError::EntryNotFound(unique_id.to_string()))?;

        let current = match &entry.data {
            EntryData::Sensor(config) => config,
            _ => return Err(ThresholdsError::NoOptions),
        };

        let updated = options.merged_over(current).validate()?;
        entry.data = EntryData::Sensor(updated);
        Ok(&*entry)
    }

    /// Delete an entry by unique id.
    pub fn remove(&mut self, unique_id: &str) -> Result<ConfigEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.unique_id == unique_id)
            .ok_or_else(|| ThresholdsError::EntryNotFound(unique_id.to_string()))?;
        Ok(self.entries.remove(index))
    }

    /// Numeric sensor configurations, in entry order.
    pub fn sensor_configs(&self) -> impl Iterator<Item = &SensorConfig> {
        self.entries.iter().filter_map(|e| match &e.data {
            EntryData::Sensor(config) => Some(config),
            _ => None,
        })
    }

    /// Binary sensor configurations, in entry order.
    pub fn binary_sensor_configs(&self) -> impl Iterator<Item = &BinarySensorConfig> {
        self.entries.iter().filter_map(|e| match &e.data {
            EntryData::BinarySensor(config) => Some(config),
            _ => None,
        })
    }

    fn require_setup(&self) -> Result<()> {
        if self.is_set_up() {
            Ok(())
        } else {
            Err(ThresholdsError::NotSetUp)
        }
    }

    fn require_unique(&self, unique_id: &str) -> Result<()> {
        if self.entries.iter().any(|e| e.unique_id == unique_id) {
            Err(ThresholdsError::AlreadyConfigured(unique_id.to_string()))
        } else {
            Ok(())
        }
    }

    fn push(&mut self, unique_id: String, title: String, data: EntryData) -> Result<&ConfigEntry> {
        let index = self.entries.len();
        self.entries.push(ConfigEntry {
            entry_id: Uuid::new_v4().simple().to_string(),
            unique_id,
            title,
            data,
        });
        Ok(&self.entries[index])
    }
}
