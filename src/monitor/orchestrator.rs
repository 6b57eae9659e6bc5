//! Alarm lifecycle engine.
//!
//! Per (sensor, level) pair an alarm is either absent or active; membership
//! in the registry is the whole state. Numeric sensors go through the band
//! evaluator, binary sensors through the binary evaluator, and both feed the
//! same create/notify/clear path.

use super::events::MonitorEvent;
use super::state::MonitorState;
use crate::alarms::{
    AlarmNotifier, AlarmRegistry, Notification, NotificationDebouncer, SensorMatch,
};
use crate::entries::ConfigEntries;
use crate::thresholds::{
    BinarySensorConfig, ResolutionMode, SensorConfig, ThresholdLevel, evaluate_band,
    evaluate_binary,
};
use chrono::Utc;
use log::{debug, info};
use std::collections::HashMap;

/// States a sensor reports while it has no usable reading.
const UNUSABLE_STATES: [&str; 2] = ["unknown", "unavailable"];

/// Parse a raw state as a numeric reading.
///
/// `unknown`, `unavailable`, anything that is not a float and non-finite
/// values yield `None`.
pub fn parse_numeric_state(state: &str) -> Option<f64> {
    let state = state.trim();
    if UNUSABLE_STATES.contains(&state) {
        return None;
    }
    state.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Registry, debouncer and notifier, mutated in lockstep.
struct AlarmBook {
    registry: AlarmRegistry,
    debouncer: NotificationDebouncer,
    notifier: AlarmNotifier,
}

impl AlarmBook {
    /// Create the alarm if absent, then notify once per create/clear cycle.
    fn raise(&mut self, alarm_name: &str, sensor_entity: &str, level: Option<ThresholdLevel>) {
        if !self.registry.create(alarm_name, Utc::now(), level) {
            return;
        }
        info!("[Monitor] Alarm raised: {}", alarm_name);

        if self.debouncer.should_notify(alarm_name) {
            self.notifier
                .notify(Notification::for_alarm(alarm_name, sensor_entity, level));
        }
    }

    fn clear(&mut self, alarm_name: &str) {
        if self.registry.clear_by_name(alarm_name) {
            info!("[Monitor] Alarm cleared: {}", alarm_name);
        }
        self.debouncer.forget(alarm_name);
    }

    fn clear_sensor(&mut self, sensor_id: &str) {
        for alarm_name in self.registry.clear_by_sensor_prefix(sensor_id) {
            info!("[Monitor] Alarm resolved: {}", alarm_name);
            self.debouncer.forget(&alarm_name);
        }
    }

    fn check_numeric(&mut self, config: &SensorConfig, value: f64) {
        let evaluation = evaluate_band(value, config);

        for level in &evaluation.triggered {
            let alarm_name = level.alarm_name(&config.sensor_entity);
            self.raise(&alarm_name, &config.sensor_entity, Some(*level));
        }

        if config.resolution_mode == ResolutionMode::Automatic && evaluation.in_safe_range {
            self.clear_sensor(&config.sensor_entity);
        }
    }

    fn check_binary(&mut self, config: &BinarySensorConfig, state: &str) {
        let alarm_name = config.alarm_name();
        if evaluate_binary(state) {
            self.raise(alarm_name, &config.binary_sensor_entity, None);
        } else {
            self.clear(alarm_name);
        }
    }
}

/// The monitor orchestrator.
///
/// Owns everything it mutates; see the module docs of [`crate::monitor`] for
/// how events reach it.
pub struct AlarmMonitor {
    sensors: Vec<SensorConfig>,
    binary_sensors: Vec<BinarySensorConfig>,
    /// Latest raw state per entity, as last reported by the host.
    states: HashMap<String, String>,
    alarms: AlarmBook,
}

impl AlarmMonitor {
    pub fn new(entries: &ConfigEntries, matching: SensorMatch, notifier: AlarmNotifier) -> Self {
        let mut monitor = Self {
            sensors: Vec::new(),
            binary_sensors: Vec::new(),
            states: HashMap::new(),
            alarms: AlarmBook {
                registry: AlarmRegistry::new(matching),
                debouncer: NotificationDebouncer::new(),
                notifier,
            },
        };
        monitor.load_entries(entries);
        monitor
    }

    /// Rebuild the configuration cache from the full set of entries.
    fn load_entries(&mut self, entries: &ConfigEntries) {
        self.sensors = entries.sensor_configs().cloned().collect();
        self.binary_sensors = entries.binary_sensor_configs().cloned().collect();
        debug!(
            "[Monitor] Monitoring {} numeric and {} binary sensor(s)",
            self.sensors.len(), self.binary_sensors.len()
        );
    }

    pub fn handle(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::SensorChanged {
                entity_id,
                new_state,
            } => self.on_sensor_changed(&entity_id, new_state.as_deref()),
            MonitorEvent::ConfigChanged { entries, changed } => {
                self.on_config_changed(&entries, changed.as_deref())
            }
            MonitorEvent::ClearRequested(request) => {
                self.handle_clear_request(&request);
            }
        }
    }

    /// A host entity changed state.
    pub fn on_sensor_changed(&mut self, entity_id: &str, new_state: Option<&str>) {
        let Some(new_state) = new_state else {
            self.states.remove(entity_id);
            return;
        };
        self.states
            .insert(entity_id.to_string(), new_state.to_string());
        self.evaluate(entity_id);
    }

    /// The configuration set changed.
    ///
    /// Sensors that are no longer configured lose their alarms. The changed
    /// sensor (or every sensor, if none is named) is re-checked against its
    /// new configuration using the latest known state.
    pub fn on_config_changed(&mut self, entries: &ConfigEntries, changed: Option<&str>) {
        let previous_sensors = std::mem::take(&mut self.sensors);
        let previous_binary = std::mem::take(&mut self.binary_sensors);
        self.load_entries(entries);

        let removed_sensors: Vec<&SensorConfig> = previous_sensors
            .iter()
            .filter(|old| self.sensor(&old.sensor_entity).is_none())
            .collect();
        let removed_binary: Vec<&BinarySensorConfig> = previous_binary
            .iter()
            .filter(|old| self.binary_sensor(&old.binary_sensor_entity).is_none())
            .collect();

        for removed in removed_sensors {
            info!("[Monitor] Sensor {} removed", removed.sensor_entity);
            self.alarms.clear_sensor(&removed.sensor_entity);
        }
        for removed in removed_binary {
            let entity = &removed.binary_sensor_entity;
            info!("[Monitor] Binary sensor {} removed", entity);
            self.alarms.clear(removed.alarm_name());
        }

        match changed {
            Some(entity_id) => self.evaluate(entity_id),
            None => {
                let entity_ids: Vec<String> = self
                    .sensors
                    .iter()
                    .map(|s| s.sensor_entity.clone())
                    .chain(
                        self.binary_sensors
                            .iter()
                            .map(|b| b.binary_sensor_entity.clone()),
                    )
                    .collect();
                for entity_id in entity_ids {
                    self.evaluate(&entity_id);
                }
            }
        }
    }

    /// Re-check one entity against its configuration using its cached state.
    fn evaluate(&mut self, entity_id: &str) {
        let Some(state) = self.states.get(entity_id) else {
            return;
        };

        if let Some(config) = self.sensors.iter().find(|s| s.sensor_entity == entity_id) {
            match parse_numeric_state(state) {
                Some(value) => self.alarms.check_numeric(config, value),
                None => debug!("[Monitor] Ignoring state {:?} of {}", state, entity_id),
            }
        } else if let Some(config) = self
            .binary_sensors
            .iter()
            .find(|b| b.binary_sensor_entity == entity_id)
        {
            self.alarms.check_binary(config, state);
        }
    }

    /// Guard for the clear-alarm service.
    ///
    /// Binary sensor alarms are always clearable. A numeric alarm is
    /// clearable only while its sensor's latest value is inside the safe
    /// range, whichever level the alarm represents. When several sensor ids
    /// match the name, the longest one is used.
    pub fn can_clear_alarm(&self, alarm_name: &str) -> bool {
        if self.binary_sensors.iter().any(|b| b.matches(alarm_name)) {
            return true;
        }

        let matching = self.alarms.registry.matching();
        let Some(config) = self
            .sensors
            .iter()
            .filter(|s| matching.matches(&s.sensor_entity, alarm_name))
            .max_by_key(|s| s.sensor_entity.len())
        else {
            return false;
        };

        self.latest_value(&config.sensor_entity)
            .is_some_and(|value| config.thresholds.in_safe_range(value))
    }

    /// Remove an alarm and forget its notification. Does not consult the
    /// guard; callers check [`can_clear_alarm`](Self::can_clear_alarm) first.
    pub fn clear_alarm(&mut self, alarm_name: &str) {
        self.alarms.clear(alarm_name);
    }

    pub fn state(&self) -> MonitorState {
        MonitorState::from_alarms(self.alarms.registry.list_active())
    }

    pub fn active_alarm_count(&self) -> usize {
        self.alarms.registry.len()
    }

    pub fn has_alarm(&self, alarm_name: &str) -> bool {
        self.alarms.registry.exists(alarm_name)
    }

    fn latest_value(&self, entity_id: &str) -> Option<f64> {
        self.states
            .get(entity_id)
            .and_then(|state| parse_numeric_state(state))
    }

    fn sensor(&self, entity_id: &str) -> Option<&SensorConfig> {
        self.sensors.iter().find(|s| s.sensor_entity == entity_id)
    }

    fn binary_sensor(&self, entity_id: &str) -> Option<&BinarySensorConfig> {
        self.binary_sensors
            .iter()
            .find(|b| b.binary_sensor_entity == entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::SensorForm;
    use crate::monitor::{ClearAlarmRequest, ClearOutcome};
    use std::collections::BTreeSet;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_test::assert_ok;

    const TEMP: &str = "sensor.temp";
    const DOOR: &str = "binary_sensor.door";

    fn form(mode: ResolutionMode) -> SensorForm {
        SensorForm {
            resolution_mode: Some(mode),
            ..SensorForm::with_defaults(TEMP)
        }
    }

    fn entries_with(form: SensorForm) -> ConfigEntries {
        let mut entries = ConfigEntries::new();
        assert_ok!(entries.setup());
        assert_ok!(entries.add_sensor(form));
        let name = Some("Front door".to_string());
        assert_ok!(entries.add_binary_sensor(DOOR, name));
        entries
    }

    fn monitor(mode: ResolutionMode) -> (AlarmMonitor, UnboundedReceiver<Notification>) {
        let (notifier, rx) = AlarmNotifier::channel();
        let monitor = AlarmMonitor::new(&entries_with(form(mode)), SensorMatch::Prefix, notifier);
        (monitor, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[test]
    fn test_parse_numeric_state() {
        assert_eq!(parse_numeric_state("21.5"), Some(21.5));
        assert_eq!(parse_numeric_state(" -3 "), Some(-3.0));
        assert_eq!(parse_numeric_state("unknown"), None);
        assert_eq!(parse_numeric_state("unavailable"), None);
        assert_eq!(parse_numeric_state("on"), None);
        assert_eq!(parse_numeric_state("NaN"), None);
        assert_eq!(parse_numeric_state("inf"), None);
    }

    #[test]
    fn test_scenario_automatic_resolution() {
        let (mut monitor, mut rx) = monitor(ResolutionMode::Automatic);

        // Critical low is not active: no alarm, not safe, nothing cleared.
        monitor.on_sensor_changed(TEMP, Some("-15"));
        assert_eq!(monitor.active_alarm_count(), 0);
        assert!(drain(&mut rx).is_empty());

        monitor.on_sensor_changed(TEMP, Some("-5"));
        assert!(monitor.has_alarm("sensor.temp_s_minus"));
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].notification_id,
            "easy_thresholds_sensor.temp_s_minus"
        );

        // Still breached: no duplicate record, no second notification.
        monitor.on_sensor_changed(TEMP, Some("-6"));
        assert_eq!(monitor.active_alarm_count(), 1);
        assert!(drain(&mut rx).is_empty());

        monitor.on_sensor_changed(TEMP, Some("50"));
        assert_eq!(monitor.active_alarm_count(), 0);

        // Debounce was forgotten on resolution.
        monitor.on_sensor_changed(TEMP, Some("-5"));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_scenario_manual_resolution() {
        let (mut monitor, mut rx) = monitor(ResolutionMode::Manual);

        monitor.on_sensor_changed(TEMP, Some("-5"));
        assert!(monitor.has_alarm("sensor.temp_s_minus"));

        for value in ["50", "0", "100", "120", "-20"] {
            monitor.on_sensor_changed(TEMP, Some(value));
            assert!(monitor.has_alarm("sensor.temp_s_minus"), "value {}", value);
        }
        drain(&mut rx);

        monitor.on_sensor_changed(TEMP, Some("50"));
        let request = ClearAlarmRequest::new("sensor.temp_s_minus");
        let outcome = monitor.handle_clear_request(&request);
        assert_eq!(outcome, ClearOutcome::Cleared);
        assert_eq!(monitor.active_alarm_count(), 0);

        // The clear also forgot the debounce entry: a new breach notifies.
        monitor.on_sensor_changed(TEMP, Some("-5"));
        assert!(monitor.has_alarm("sensor.temp_s_minus"));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_scenario_guard_refuses_unsafe_value() {
        let (mut monitor, _rx) = monitor(ResolutionMode::Manual);

        monitor.on_sensor_changed(TEMP, Some("-5"));
        assert!(!monitor.can_clear_alarm("sensor.temp_s_minus"));

        let request = ClearAlarmRequest::new("sensor.temp_s_minus");
        let outcome = monitor.handle_clear_request(&request);
        assert_eq!(outcome, ClearOutcome::Refused);
        assert!(monitor.has_alarm("sensor.temp_s_minus"));
    }

    #[test]
    fn test_scenario_binary_cycle() {
        let (mut monitor, mut rx) = monitor(ResolutionMode::Automatic);

        monitor.on_sensor_changed(DOOR, Some("off"));
        assert_eq!(monitor.active_alarm_count(), 0);

        monitor.on_sensor_changed(DOOR, Some("on"));
        monitor.on_sensor_changed(DOOR, Some("on"));
        assert!(monitor.has_alarm("Front door"));
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].message,
            "Sensor: binary_sensor.door\nThreshold: binary_alert"
        );

        monitor.on_sensor_changed(DOOR, Some("off"));
        assert!(!monitor.has_alarm("Front door"));

        monitor.on_sensor_changed(DOOR, Some("on"));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_binary_alarms_always_clearable() {
        let (mut monitor, _rx) = monitor(ResolutionMode::Automatic);
        monitor.on_sensor_changed(DOOR, Some("on"));

        assert!(monitor.can_clear_alarm("Front door"));
        assert!(monitor.can_clear_alarm(DOOR));
        monitor.clear_alarm("Front door");
        assert_eq!(monitor.active_alarm_count(), 0);
    }

    #[test]
    fn test_unparseable_states_change_nothing() {
        let (mut monitor, mut rx) = monitor(ResolutionMode::Automatic);
        monitor.on_sensor_changed(TEMP, Some("-5"));
        drain(&mut rx);

        monitor.on_sensor_changed(TEMP, Some("unavailable"));
        monitor.on_sensor_changed(TEMP, Some("garbage"));
        monitor.on_sensor_changed(TEMP, None);
        assert!(monitor.has_alarm("sensor.temp_s_minus"));
        assert!(drain(&mut rx).is_empty());

        // No usable value: the guard refuses.
        assert!(!monitor.can_clear_alarm("sensor.temp_s_minus"));
    }

    #[test]
    fn test_guard_for_unknown_alarm() {
        let (monitor, _rx) = monitor(ResolutionMode::Manual);
        assert!(!monitor.can_clear_alarm("sensor.humidity_s_plus"));
        assert!(!monitor.can_clear_alarm("sensor.temp_s_minus"));
    }

    #[test]
    fn test_auto_resolution_ignores_deactivated_warnings() {
        let form = SensorForm {
            active_thresholds: Some(BTreeSet::from([
                ThresholdLevel::CriticalLow,
                ThresholdLevel::CriticalHigh,
            ])),
            ..SensorForm::with_defaults(TEMP)
        };
        let (notifier, _rx) = AlarmNotifier::channel();
        let mut monitor = AlarmMonitor::new(&entries_with(form), SensorMatch::Prefix, notifier);

        monitor.on_sensor_changed(TEMP, Some("150"));
        assert!(monitor.has_alarm("sensor.temp_s_plus_plus"));

        // Warning band: not safe yet, and warning high is inactive.
        monitor.on_sensor_changed(TEMP, Some("105"));
        assert_eq!(monitor.active_alarm_count(), 1);

        monitor.on_sensor_changed(TEMP, Some("99"));
        assert_eq!(monitor.active_alarm_count(), 0);
    }

    #[test]
    fn test_config_change_rechecks_current_value() {
        let (mut monitor, mut rx) = monitor(ResolutionMode::Automatic);
        monitor.on_sensor_changed(TEMP, Some("-5"));
        drain(&mut rx);

        // Widen the safe range so -5 is safe: alarm resolves immediately.
        let mut entries = entries_with(form(ResolutionMode::Automatic));
        let options = SensorForm {
            s_minus_minus: Some(-20.0),
            s_minus: Some(-10.0),
            ..Default::default()
        };
        assert_ok!(entries.update_sensor(TEMP, options));
        monitor.on_config_changed(&entries, Some(TEMP));
        assert_eq!(monitor.active_alarm_count(), 0);

        // Narrow it again: -5 breaches warning low without a new reading.
        let options = SensorForm {
            s_minus: Some(0.0),
            ..Default::default()
        };
        assert_ok!(entries.update_sensor(TEMP, options));
        monitor.on_config_changed(&entries, None);
        assert!(monitor.has_alarm("sensor.temp_s_minus"));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_removed_sensor_loses_alarms() {
        let (mut monitor, _rx) = monitor(ResolutionMode::Manual);
        monitor.on_sensor_changed(TEMP, Some("-5"));
        monitor.on_sensor_changed(DOOR, Some("on"));
        assert_eq!(monitor.active_alarm_count(), 2);

        let mut entries = entries_with(form(ResolutionMode::Manual));
        assert_ok!(entries.remove(TEMP));
        assert_ok!(entries.remove(DOOR));
        monitor.on_config_changed(&entries, Some(TEMP));
        assert_eq!(monitor.active_alarm_count(), 0);

        // No longer configured: further readings are ignored.
        monitor.on_sensor_changed(TEMP, Some("-5"));
        assert_eq!(monitor.active_alarm_count(), 0);
    }

    #[test]
    fn test_new_sensor_uses_cached_state() {
        let (notifier, mut rx) = AlarmNotifier::channel();
        let mut entries = ConfigEntries::new();
        assert_ok!(entries.setup());
        let mut monitor = AlarmMonitor::new(&entries, SensorMatch::Prefix, notifier);

        monitor.on_sensor_changed(TEMP, Some("120"));
        assert_eq!(monitor.active_alarm_count(), 0);

        let form = SensorForm {
            active_thresholds: Some(BTreeSet::from([ThresholdLevel::CriticalHigh])),
            ..SensorForm::with_defaults(TEMP)
        };
        assert_ok!(entries.add_sensor(form));
        monitor.on_config_changed(&entries, Some(TEMP));
        assert!(monitor.has_alarm("sensor.temp_s_plus_plus"));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_guard_prefers_longest_sensor_id() {
        let (notifier, _rx) = AlarmNotifier::channel();
        let mut entries = ConfigEntries::new();
        assert_ok!(entries.setup());
        assert_ok!(entries.add_sensor(SensorForm::with_defaults("sensor.temp")));
        let sibling = SensorForm::with_defaults("sensor.temp_2");
        assert_ok!(entries.add_sensor(sibling));
        let mut monitor = AlarmMonitor::new(&entries, SensorMatch::Prefix, notifier);

        monitor.on_sensor_changed("sensor.temp", Some("50"));
        monitor.on_sensor_changed("sensor.temp_2", Some("-5"));
        assert!(monitor.has_alarm("sensor.temp_2_s_minus"));

        assert!(!monitor.can_clear_alarm("sensor.temp_2_s_minus"));
    }

    #[test]
    fn test_prefix_matching_over_clears_sibling_sensor() {
        let mut entries = ConfigEntries::new();
        assert_ok!(entries.setup());
        assert_ok!(entries.add_sensor(SensorForm::with_defaults("sensor.temp")));
        let sibling = SensorForm::with_defaults("sensor.temp_2");
        assert_ok!(entries.add_sensor(sibling));

        let (notifier, _rx) = AlarmNotifier::channel();
        let mut prefix = AlarmMonitor::new(&entries, SensorMatch::Prefix, notifier);
        prefix.on_sensor_changed("sensor.temp_2", Some("-5"));
        prefix.on_sensor_changed("sensor.temp", Some("50"));
        assert_eq!(prefix.active_alarm_count(), 0);

        let (notifier, _rx) = AlarmNotifier::channel();
        let mut strict = AlarmMonitor::new(&entries, SensorMatch::Strict, notifier);
        strict.on_sensor_changed("sensor.temp_2", Some("-5"));
        strict.on_sensor_changed("sensor.temp", Some("50"));
        assert!(strict.has_alarm("sensor.temp_2_s_minus"));
    }
}
