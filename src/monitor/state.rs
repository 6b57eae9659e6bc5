//! Published alarm monitor state.

use crate::alarms::AlarmRecord;
use serde::{Deserialize, Serialize};

/// Observable state of the alarm monitor entity.
///
/// `value` is the number of active alarms, as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub value: String,
    pub attributes: MonitorAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorAttributes {
    pub active_alarms: Vec<AlarmRecord>,
}

impl MonitorState {
    pub fn from_alarms(active_alarms: &[AlarmRecord]) -> Self {
        Self {
            value: active_alarms.len().to_string(),
            attributes: MonitorAttributes {
                active_alarms: active_alarms.to_vec(),
            },
        }
    }

    pub fn alarm_count(&self) -> usize {
        self.attributes.active_alarms.len()
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::from_alarms(&[])
    }
}
