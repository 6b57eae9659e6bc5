//! Notification debouncing.

use std::collections::HashSet;

/// Alarm names that already fired a notification since their last clear.
#[derive(Debug, Default)]
pub struct NotificationDebouncer {
    notified: HashSet<String>,
}

impl NotificationDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-mark: true the first time `name` is seen after a clear.
    pub fn should_notify(&mut self, name: &str) -> bool {
        if self.notified.contains(name) {
            return false;
        }
        self.notified.insert(name.to_string());
        true
    }

    /// Forget `name`, so the next trigger notifies again.
    pub fn forget(&mut self, name: &str) {
        self.notified.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifies_once_per_cycle() {
        let mut debouncer = NotificationDebouncer::new();

        assert!(debouncer.should_notify("sensor.temp_s_minus"));
        assert!(!debouncer.should_notify("sensor.temp_s_minus"));
        assert!(!debouncer.should_notify("sensor.temp_s_minus"));

        debouncer.forget("sensor.temp_s_minus");
        assert!(debouncer.should_notify("sensor.temp_s_minus"));
        assert!(!debouncer.should_notify("sensor.temp_s_minus"));
    }

    #[test]
    fn test_forget_unknown_is_noop() {
        let mut debouncer = NotificationDebouncer::new();
        debouncer.forget("never");
        assert!(debouncer.should_notify("other"));
    }
}
