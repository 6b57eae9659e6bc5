//! MQTT client wrapper.

use crate::config::MqttConfig;
use crate::error::{Result, ThresholdsError};
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long one-shot publishes wait for the broker.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// MQTT client plus its event loop.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    ///
    /// The session is persistent so subscriptions survive reconnects.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options = mqtt_options(config);
        options.set_clean_session(false);

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Run the MQTT event loop and forward messages to the provided channel.
    ///
    /// `connected` fires on the first ConnAck. Runs until the channel closes.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<MqttMessage>,
        mut connected: Option<oneshot::Sender<()>>,
    ) {
        info!("[MQTT] Starting event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[MQTT] Connected");
                    if let Some(signal) = connected.take() {
                        let _ = signal.send(());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.clone();
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 payload on {}: {}", topic, e);
                            continue;
                        }
                    };

                    debug!("[MQTT] Received on {}: {}", topic, payload);

                    if tx.send(MqttMessage { topic, payload }).await.is_err() {
                        info!("[MQTT] Message channel closed, stopping event loop");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    /// Connect, publish a single message and wait until the broker has it.
    ///
    /// Used by command-line tools that have no long-running event loop.
    pub async fn publish_once(config: &MqttConfig, topic: &str, payload: &str) -> Result<()> {
        let (client, mut event_loop) = AsyncClient::new(mqtt_options(config), 10);

        client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes())
            .await?;

        let delivered = tokio::time::timeout(PUBLISH_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::PubAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(ThresholdsError::MqttConnection(e.to_string())),
                }
            }
        })
        .await
        .map_err(|_| ThresholdsError::MqttConnection("timed out waiting for broker".to_string()))?;
        delivered?;

        debug!("[MQTT] Published to {}: {}", topic, payload);
        let _ = client.disconnect().await;
        Ok(())
    }
}

fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(Duration::from_secs(30));

    // Set credentials if provided
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }

    options
}
