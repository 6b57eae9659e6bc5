//! Alarm notifications.
//!
//! The monitor hands notifications to an [`AlarmNotifier`] and moves on; it
//! never waits for delivery. A dispatcher task drains the channel into a
//! [`NotificationSink`] (MQTT in the daemon), so a slow or failing sink has
//! no effect on alarm state.

use crate::error::Result;
use crate::thresholds::ThresholdLevel;
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Prefix of the notification dedupe key.
pub const NOTIFICATION_ID_PREFIX: &str = "easy_thresholds_";

/// Message shown for alarms without a threshold level.
const BINARY_ALERT: &str = "binary_alert";

/// A persistent notification about a newly triggered alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Dedupe key: a host showing persistent notifications replaces any
    /// earlier notification with the same id.
    pub notification_id: String,
}

impl Notification {
    pub fn for_alarm(
        alarm_name: &str,
        sensor_entity: &str,
        threshold_value: Option<ThresholdLevel>,
    ) -> Self {
        let threshold = threshold_value
            .map(|level| level.to_string())
            .unwrap_or_else(|| BINARY_ALERT.to_string());
        Self {
            title: format!("Alarm: {}", alarm_name),
            message: format!("Sensor: {}\nThreshold: {}", sensor_entity, threshold),
            notification_id: format!("{}{}", NOTIFICATION_ID_PREFIX, alarm_name),
        }
    }
}

/// Destination for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<()>;
}

/// Fire-and-forget handle the monitor sends notifications through.
#[derive(Debug, Clone)]
pub struct AlarmNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl AlarmNotifier {
    /// Create a notifier and the receiving end for the dispatcher.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a notification. Never blocks; a closed channel only logs.
    pub fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            warn!(
                "[Notify] Dispatcher gone, dropping notification {}",
                e.0.notification_id
            );
        }
    }
}

/// Spawn a task that delivers queued notifications to `sink`.
///
/// Delivery failures are logged and dropped. The task ends once every
/// [`AlarmNotifier`] clone has been dropped.
pub fn spawn_dispatcher(
    sink: Arc<dyn NotificationSink>,
    mut rx: mpsc::UnboundedReceiver<Notification>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let id = notification.notification_id.clone();
            match sink.deliver(notification).await {
                Ok(()) => debug!("[Notify] Delivered {}", id),
                Err(e) => warn!("[Notify] Failed to deliver {}: {}", id, e),
            }
        }
        debug!("[Notify] Dispatcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThresholdsError;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: Notification) -> Result<()> {
            if notification.title.contains("fail") {
                return Err(ThresholdsError::ChannelClosed("test sink"));
            }
            self.delivered.lock().await.push(notification);
            Ok(())
        }
    }

    #[test]
    fn test_notification_format() {
        let n = Notification::for_alarm(
            "sensor.temp_s_minus",
            "sensor.temp",
            Some(ThresholdLevel::WarningLow),
        );
        assert_eq!(n.title, "Alarm: sensor.temp_s_minus");
        assert_eq!(n.message, "Sensor: sensor.temp\nThreshold: s_minus");
        assert_eq!(n.notification_id, "easy_thresholds_sensor.temp_s_minus");

        let n = Notification::for_alarm("Front door", "binary_sensor.door", None);
        assert_eq!(
            n.message,
            "Sensor: binary_sensor.door\nThreshold: binary_alert"
        );
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_and_survives_failures() {
        let sink = Arc::new(RecordingSink::default());
        let (notifier, rx) = AlarmNotifier::channel();
        let handle = spawn_dispatcher(sink.clone(), rx);

        notifier.notify(Notification::for_alarm("first", "sensor.a", None));
        notifier.notify(Notification::for_alarm("fail", "sensor.b", None));
        notifier.notify(Notification::for_alarm("second", "sensor.c", None));
        drop(notifier);

        handle.await.unwrap();
        let delivered = sink.delivered.lock().await;
        let titles: Vec<&str> = delivered.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["Alarm: first", "Alarm: second"]);
    }

    #[test]
    fn test_notify_without_dispatcher_does_not_panic() {
        let (notifier, rx) = AlarmNotifier::channel();
        drop(rx);
        notifier.notify(Notification::for_alarm("x", "sensor.x", None));
    }
}
