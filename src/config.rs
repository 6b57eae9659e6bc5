use crate::alarms::SensorMatch;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the home directory holding the entries file.
const DATA_DIR: &str = ".easy-thresholds";

/// Default entries file name.
const ENTRIES_FILE: &str = "entries.json";

/// Load environment variables from a .env file.
/// Existing environment variables win over the file.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var(&key).is_err() {
            // SAFETY: Called from `main` before the async runtime starts its worker threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Parse `KEY=value` lines, skipping blanks and `#` comments.
/// Values may contain spaces and may be wrapped in single or double quotes.
fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let value = unquote(value.trim());
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Strip one pair of matching single or double quotes.
fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}

/// Default path of the entries file: `~/.easy-thresholds/entries.json`.
pub fn default_entries_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR)
        .join(ENTRIES_FILE)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// JSON file holding the config entries.
    pub entries_path: PathBuf,
    /// Prefix for the monitor's own topics (state, notifications, services).
    pub topic_prefix: String,
    /// Base topic of Home Assistant's `mqtt_statestream`.
    pub statestream_base: String,
    /// Require `{sensor_id}_` when attributing alarms to a sensor.
    pub strict_prefix_match: bool,
    /// Capacity of the monitor's event queue.
    pub event_queue: usize,
}

impl MonitorConfig {
    pub fn sensor_match(&self) -> SensorMatch {
        if self.strict_prefix_match {
            SensorMatch::Strict
        } else {
            SensorMatch::Prefix
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "easy-thresholds".to_string(),
                username: None,
                password: None,
            },
            monitor: MonitorConfig {
                entries_path: default_entries_path(),
                topic_prefix: "easy_thresholds".to_string(),
                statestream_base: "homeassistant/statestream".to_string(),
                strict_prefix_match: false,
                event_queue: 256,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        // Monitor configuration
        if let Ok(path) = std::env::var("THRESHOLDS_ENTRIES_PATH") {
            config.monitor.entries_path = PathBuf::from(path);
        }
        if let Ok(prefix) = std::env::var("THRESHOLDS_TOPIC_PREFIX") {
            config.monitor.topic_prefix = prefix.trim_end_matches('/').to_string();
        }
        if let Ok(base) = std::env::var("THRESHOLDS_STATESTREAM_BASE") {
            config.monitor.statestream_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(strict) = std::env::var("THRESHOLDS_STRICT_PREFIX") {
            let matching = SensorMatch::from_flag(&strict);
            config.monitor.strict_prefix_match = matching == SensorMatch::Strict;
        }
        if let Ok(capacity) = std::env::var("THRESHOLDS_EVENT_QUEUE")
            && let Ok(c) = capacity.parse::<usize>()
            && c > 0
        {
            config.monitor.event_queue = c;
        }

        config
    }
}
