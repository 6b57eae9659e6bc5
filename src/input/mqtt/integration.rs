//! MQTT integration orchestrator.
//!
//! Wires the broker to a running monitor: routes incoming messages to
//! [`MonitorEvent`](crate::monitor::MonitorEvent)s, publishes the monitor
//! state whenever it changes and delivers notifications.

use super::client::{MqttClient, MqttMessage};
use super::topics::{Inbound, Topics};
use crate::alarms::{Notification, NotificationSink, spawn_dispatcher};
use crate::config::Config;
use crate::entries::ConfigEntries;
use crate::error::{Result, ThresholdsError};
use crate::monitor::{MonitorHandle, MonitorState};
use async_trait::async_trait;
use log::{error, info, warn};
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

/// How long to wait for the first ConnAck.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Publishes notifications to the notification topic.
pub struct MqttNotificationSink {
    client: AsyncClient,
    topic: String,
}

impl MqttNotificationSink {
    pub fn new(client: AsyncClient, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for MqttNotificationSink {
    async fn deliver(&self, notification: Notification) -> Result<()> {
        let payload = serde_json::to_string(&notification)?;
        self.client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload.into_bytes())
            .await?;
        info!("[MQTT] Notification sent: {}", notification.title);
        Ok(())
    }
}

/// MQTT integration for a running monitor.
pub struct MqttIntegration {
    config: Config,
    topics: Topics,
}

impl MqttIntegration {
    pub fn new(config: Config) -> Self {
        let topics = Topics::from_config(&config.monitor);
        Self { config, topics }
    }

    /// Start the integration on a background task.
    ///
    /// The task stops when `shutdown` is cancelled, dropping its
    /// [`MonitorHandle`] so the monitor task can finish too.
    pub fn start(
        self,
        monitor: MonitorHandle,
        state_rx: watch::Receiver<MonitorState>,
        notifications: mpsc::UnboundedReceiver<Notification>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let result = tokio::select! {
                result = self.run(monitor, state_rx, notifications) => result,
                _ = shutdown.cancelled() => {
                    info!("[MQTT] Shutting down");
                    Ok(())
                }
            };
            if let Err(e) = result {
                error!("[MQTT] Integration stopped: {}", e);
            }
        })
    }

    async fn run(
        self,
        monitor: MonitorHandle,
        state_rx: watch::Receiver<MonitorState>,
        notifications: mpsc::UnboundedReceiver<Notification>,
    ) -> Result<()> {
        info!(
            "[MQTT] Connecting to {}:{}",
            self.config.mqtt.broker_host, self.config.mqtt.broker_port
        );

        let mqtt_client = MqttClient::new(&self.config.mqtt);
        let client = mqtt_client.client();

        let (msg_tx, mut msg_rx) = mpsc::channel::<MqttMessage>(64);
        let (connected_tx, connected_rx) = oneshot::channel();

        // Start the event loop first so it can establish the connection.
        // Every task spawned here is aborted once this future ends or is dropped.
        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(msg_tx, Some(connected_tx)).await;
        });
        let _mqtt_loop = AbortOnDropHandle::new(mqtt_loop);

        match tokio::time::timeout(CONNECT_TIMEOUT, connected_rx).await {
            Ok(Ok(())) => info!("[MQTT] Connection established, subscribing to topics"),
            Ok(Err(_)) => {
                return Err(ThresholdsError::ChannelClosed("mqtt connection signal"));
            }
            Err(_) => {
                return Err(ThresholdsError::MqttConnection(format!(
                    "no connection after {} seconds",
                    CONNECT_TIMEOUT.as_secs()
                )));
            }
        }

        for topic in self.topics.subscribe_topics() {
            if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce).await {
                warn!("[MQTT] Failed to subscribe to {}: {:?}", topic, e);
            }
        }

        let notification_topic = self.topics.notification();
        let sink = MqttNotificationSink::new(client.clone(), notification_topic);
        let dispatcher = spawn_dispatcher(Arc::new(sink), notifications);
        let _dispatcher = AbortOnDropHandle::new(dispatcher);

        let state_topic = self.topics.monitor_state();
        let publisher = spawn_state_publisher(client, state_topic, state_rx);
        let _publisher = AbortOnDropHandle::new(publisher);

        info!("[MQTT] Integration started");

        while let Some(msg) = msg_rx.recv().await {
            let Some(inbound) = self.topics.route(&msg.topic, &msg.payload) else {
                continue;
            };
            if let Err(e) = self.forward(&monitor, inbound).await {
                error!("[MQTT] {}", e);
                break;
            }
        }

        Ok(())
    }

    async fn forward(&self, monitor: &MonitorHandle, inbound: Inbound) -> Result<()> {
        match inbound {
            Inbound::Sensor {
                entity_id,
                new_state,
            } => monitor.sensor_changed(entity_id, new_state).await,
            Inbound::ClearAlarm(request) => monitor.clear_alarm(request).await,
            Inbound::ReloadConfig { changed } => {
                match ConfigEntries::load(&self.config.monitor.entries_path) {
                    Ok(entries) => {
                        info!(
                            "[MQTT] Config reloaded ({})",
                            changed.as_deref().unwrap_or("all sensors")
                        );
                        monitor.config_changed(entries, changed).await
                    }
                    Err(e) => {
                        warn!("[MQTT] Keeping current config, reload failed: {}", e);
                        Ok(())
                    }
                }
            }
        }
    }
}

/// Publish the monitor state (retained) now and on every change.
fn spawn_state_publisher(
    client: AsyncClient,
    topic: String,
    mut state_rx: watch::Receiver<MonitorState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let state = state_rx.borrow_and_update().clone();
            match serde_json::to_vec(&state) {
                Ok(payload) => {
                    let publish = client.publish(&topic, QoS::AtLeastOnce, true, payload);
                    if let Err(e) = publish.await {
                        warn!("[MQTT] Failed to publish monitor state: {:?}", e);
                    }
                }
                Err(e) => warn!("[MQTT] Failed to encode monitor state: {}", e),
            }

            if state_rx.changed().await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::{AlarmNotifier, SensorMatch};
    use crate::monitor::{AlarmMonitor, spawn_monitor};

    #[tokio::test]
    async fn test_cancel_while_connecting_stops_spawned_tasks() {
        let mut config = Config::default();
        config.mqtt.broker_host = "127.0.0.1".to_string();
        config.mqtt.broker_port = 1;

        let entries = ConfigEntries::new();
        let (notifier, notifications) = AlarmNotifier::channel();
        let monitor = AlarmMonitor::new(&entries, SensorMatch::Prefix, notifier);
        let (handle, state_rx, monitor_task) = spawn_monitor(monitor, 4);

        let metrics = tokio::runtime::Handle::current().metrics();
        let shutdown = CancellationToken::new();
        let integration = MqttIntegration::new(config);
        let task = integration.start(handle, state_rx, notifications, shutdown.clone());

        // Let the integration spawn its event loop before cancelling.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let stopped = tokio::time::timeout(Duration::from_secs(3), async {
            task.await.unwrap();
            monitor_task.await.unwrap();
            while metrics.num_alive_tasks() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(stopped.is_ok(), "tasks still alive after shutdown");
    }
}
