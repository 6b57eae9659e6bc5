//! Clear-alarm service.

use super::events::ClearAlarmRequest;
use super::orchestrator::AlarmMonitor;
use log::{error, info, warn};

/// Result of a clear-alarm service call. Never surfaced as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    /// The guard refused: sensor unknown, unavailable or outside its safe range.
    Refused,
    /// The request carried no alarm name.
    Invalid,
}

impl AlarmMonitor {
    /// Handle a clear-alarm service call: validate, run the guard, clear.
    pub fn handle_clear_request(&mut self, request: &ClearAlarmRequest) -> ClearOutcome {
        let Some(alarm_name) = request
            .alarm_name
            .as_deref()
            .filter(|name| !name.is_empty())
        else {
            error!("[Monitor] clear_alarm service called without alarm_name");
            return ClearOutcome::Invalid;
        };

        if !self.can_clear_alarm(alarm_name) {
            warn!(
                "[Monitor] Cannot clear alarm {}: sensor not in safe range",
                alarm_name
            );
            return ClearOutcome::Refused;
        }

        if !self.has_alarm(alarm_name) {
            info!(
                "[Monitor] Alarm {} is not active, nothing to clear",
                alarm_name
            );
        }
        self.clear_alarm(alarm_name);
        ClearOutcome::Cleared
    }
}
