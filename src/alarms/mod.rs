//! Alarm state: the registry of active alarms, notification debouncing and
//! the one-way notification channel.

pub mod debounce;
pub mod notifier;
pub mod registry;

pub use debounce::NotificationDebouncer;
pub use notifier::{AlarmNotifier, Notification, NotificationSink, spawn_dispatcher};
pub use registry::{AlarmRecord, AlarmRegistry, SensorMatch};
