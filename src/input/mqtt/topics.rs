//! Topic layout and routing of incoming messages.
//!
//! ```text
//! {statestream_base}/{domain}/{object_id}/state   raw entity state (in)
//! {prefix}/clear_alarm                            {"alarm_name": "..."} (in)
//! {prefix}/config/reload                          affected sensor, may be empty (in)
//! {prefix}/alarm_monitor                          published monitor state, retained (out)
//! {prefix}/notification                           alarm notifications (out)
//! ```

use crate::config::MonitorConfig;
use crate::monitor::ClearAlarmRequest;
use log::warn;

/// A routed incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Entity state from the statestream. `None` means the entity is gone.
    Sensor {
        entity_id: String,
        new_state: Option<String>,
    },
    ClearAlarm(ClearAlarmRequest),
    ReloadConfig { changed: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Topics {
    prefix: String,
    statestream_base: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>, statestream_base: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            statestream_base: statestream_base.into(),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(&config.topic_prefix, &config.statestream_base)
    }

    pub fn monitor_state(&self) -> String {
        format!("{}/alarm_monitor", self.prefix)
    }

    pub fn notification(&self) -> String {
        format!("{}/notification", self.prefix)
    }

    pub fn clear_alarm(&self) -> String {
        format!("{}/clear_alarm", self.prefix)
    }

    pub fn config_reload(&self) -> String {
        format!("{}/config/reload", self.prefix)
    }

    pub fn entity_states(&self) -> String {
        format!("{}/+/+/state", self.statestream_base)
    }

    pub fn subscribe_topics(&self) -> Vec<String> {
        vec![
            self.entity_states(),
            self.clear_alarm(),
            self.config_reload(),
        ]
    }

    /// Map a message to what it means for the monitor.
    pub fn route(&self, topic: &str, payload: &str) -> Option<Inbound> {
        if topic == self.clear_alarm() {
            let request = serde_json::from_str::<ClearAlarmRequest>(payload).unwrap_or_else(|e| {
                warn!("[MQTT] Malformed clear_alarm payload {:?}: {}", payload, e);
                ClearAlarmRequest::default()
            });
            return Some(Inbound::ClearAlarm(request));
        }

        if topic == self.config_reload() {
            let changed = Some(payload.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            return Some(Inbound::ReloadConfig { changed });
        }

        let entity_id = self.entity_from_statestream(topic)?;
        let state = payload.trim();
        let state = state
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(state);
        let new_state = Some(state).filter(|s| !s.is_empty()).map(str::to_string);

        Some(Inbound::Sensor {
            entity_id,
            new_state,
        })
    }

    /// `{base}/sensor/kitchen_temp/state` -> `sensor.kitchen_temp`
    fn entity_from_statestream(&self, topic: &str) -> Option<String> {
        let rest = topic
            .strip_prefix(self.statestream_base.as_str())?
            .strip_prefix('/')?
            .strip_suffix("/state")?;
        let (domain, object_id) = rest.split_once('/')?;
        if domain.is_empty() || object_id.is_empty() || object_id.contains('/') {
            return None;
        }
        Some(format!("{}.{}", domain, object_id))
    }
}
