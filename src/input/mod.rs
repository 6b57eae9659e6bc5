//! Input sources feeding the alarm monitor.
//!
//! Current input sources:
//! - `mqtt`: Home Assistant `mqtt_statestream` sensor states and the
//!   monitor's service topics

pub mod mqtt;
