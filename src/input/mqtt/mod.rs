//! MQTT transport between the alarm monitor and its host.
//!
//! Sensor states arrive via Home Assistant's `mqtt_statestream`; service
//! calls and config reloads on the monitor's own topics. Published alarm
//! state and notifications go back out on the same broker.

mod client;
mod integration;
mod topics;

pub use client::{MqttClient, MqttMessage};
pub use integration::{MqttIntegration, MqttNotificationSink};
pub use topics::{Inbound, Topics};
