//! Alarm monitor.
//!
//! The [`AlarmMonitor`] owns the sensor configuration cache, the alarm
//! registry and the notification debouncer. It runs on a single task and
//! consumes [`MonitorEvent`]s one at a time, so none of its state needs
//! locking. Updated [`MonitorState`] is published through a watch channel.

pub mod events;
pub mod orchestrator;
pub mod service;
pub mod state;

pub use events::{ClearAlarmRequest, MonitorEvent, MonitorHandle, spawn_monitor};
pub use orchestrator::{AlarmMonitor, parse_numeric_state};
pub use service::ClearOutcome;
pub use state::MonitorState;
