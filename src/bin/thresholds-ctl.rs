//! Command-line configuration and service tool for Easy Thresholds.
//!
//! Edits the config entries file and tells the running monitor to reload it,
//! or sends clear-alarm service calls.
//!
//! Usage:
//!   cargo run --bin thresholds-ctl -- setup
//!   cargo run --bin thresholds-ctl -- add-sensor sensor.freezer --s-minus-minus -30 --s-minus -25 --s-plus -15 --s-plus-plus -10
//!   cargo run --bin thresholds-ctl -- add-binary-sensor binary_sensor.leak --name "Basement leak"
//!   cargo run --bin thresholds-ctl -- edit-sensor sensor.freezer --mode manual
//!   cargo run --bin thresholds-ctl -- clear-alarm sensor.freezer_s_plus

use clap::{Args, Parser, Subcommand};
use easy_thresholds::config::{Config, MqttConfig, default_entries_path, load_dotenv};
use easy_thresholds::entries::{ConfigEntries, ConfigEntry, EntryData, SensorForm};
use easy_thresholds::input::mqtt::{MqttClient, Topics};
use easy_thresholds::monitor::ClearAlarmRequest;
use easy_thresholds::thresholds::{ResolutionMode, ThresholdLevel};
use std::collections::BTreeSet;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "thresholds-ctl")]
#[command(about = "Configure Easy Thresholds sensors and clear alarms")]
struct Cli {
    /// Config entries file
    #[arg(long, env = "THRESHOLDS_ENTRIES_PATH", default_value_os_t = default_entries_path())]
    entries: PathBuf,

    /// Do not ask the running monitor to reload after a change
    #[arg(long)]
    no_reload: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the setup entry (required once before adding sensors)
    Setup,
    /// Monitor a numeric sensor
    AddSensor {
        /// Sensor entity id, e.g. sensor.freezer
        sensor_entity: String,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Monitor a binary sensor; "on" raises an alarm
    AddBinarySensor {
        /// Binary sensor entity id, e.g. binary_sensor.leak
        binary_sensor_entity: String,

        /// Alarm name (defaults to the entity id)
        #[arg(long)]
        name: Option<String>,
    },
    /// Change a numeric sensor's configuration; omitted values are kept
    EditSensor {
        sensor_entity: String,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Stop monitoring a sensor
    Remove { entity: String },
    /// Show all config entries
    List,
    /// Ask the monitor to clear an alarm (refused unless the sensor is safe)
    ClearAlarm { alarm_name: String },
}

#[derive(Args)]
struct ThresholdArgs {
    /// Critical low boundary
    #[arg(long, allow_negative_numbers = true)]
    s_minus_minus: Option<f64>,

    /// Warning low boundary
    #[arg(long, allow_negative_numbers = true)]
    s_minus: Option<f64>,

    /// Warning high boundary
    #[arg(long, allow_negative_numbers = true)]
    s_plus: Option<f64>,

    /// Critical high boundary
    #[arg(long, allow_negative_numbers = true)]
    s_plus_plus: Option<f64>,

    /// Active threshold levels, comma separated (s_minus_minus,s_minus,s_plus,s_plus_plus)
    #[arg(long, value_delimiter = ',')]
    active: Option<Vec<ThresholdLevel>>,

    /// Resolution mode: automatic or manual
    #[arg(long)]
    mode: Option<ResolutionMode>,
}

impl ThresholdArgs {
    /// Overlay the given values on `form`.
    fn apply(self, mut form: SensorForm) -> SensorForm {
        form.s_minus_minus = self.s_minus_minus.or(form.s_minus_minus);
        form.s_minus = self.s_minus.or(form.s_minus);
        form.s_plus = self.s_plus.or(form.s_plus);
        form.s_plus_plus = self.s_plus_plus.or(form.s_plus_plus);
        if let Some(active) = self.active {
            form.active_thresholds = Some(active.into_iter().collect::<BTreeSet<_>>());
        }
        form.resolution_mode = self.mode.or(form.resolution_mode);
        form
    }
}

fn describe(entry: &ConfigEntry) -> String {
    match &entry.data {
        EntryData::Setup => format!("{} (setup)", entry.title),
        EntryData::Sensor(config) => {
            let t = &config.thresholds;
            let active: Vec<String> = config
                .active_thresholds
                .iter()
                .map(ToString::to_string)
                .collect();
            format!(
                "{}: {} < {} .. {} < {} active=[{}] mode={}",
                config.sensor_entity,
                t.critical_low(),
                t.warning_low(),
                t.warning_high(),
                t.critical_high(),
                active.join(","),
                config.resolution_mode
            )
        }
        EntryData::BinarySensor(config) => {
            let entity = &config.binary_sensor_entity;
            format!("{}: binary, alarm \"{}\"", entity, config.alarm_name())
        }
    }
}

/// MQTT settings with a one-off client id so the daemon's session is untouched.
fn ctl_mqtt_config(config: &Config) -> MqttConfig {
    MqttConfig {
        client_id: format!("thresholds-ctl-{}", Uuid::new_v4().simple()),
        ..config.mqtt.clone()
    }
}

async fn request_reload(config: &Config, changed: Option<&str>) {
    let topics = Topics::from_config(&config.monitor);
    match MqttClient::publish_once(
        &ctl_mqtt_config(config),
        &topics.config_reload(),
        changed.unwrap_or_default(),
    )
    .await
    {
        Ok(()) => println!("Monitor asked to reload"),
        Err(e) => {
            eprintln!("Saved, but could not reach the monitor: {}", e);
            eprintln!("It will pick up the change on its next start.");
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    tokio::runtime::Runtime::new()?.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    let mut entries = ConfigEntries::load(&cli.entries)?;

    let changed: Option<String> = match cli.command {
        Commands::Setup => {
            let entry = entries.setup()?;
            println!("Created {}", describe(entry));
            None
        }
        Commands::AddSensor {
            sensor_entity,
            thresholds,
        } => {
            let form = thresholds.apply(SensorForm::with_defaults(sensor_entity));
            let entry = entries.add_sensor(form)?;
            println!("Added {}", describe(entry));
            entry.sensor_entity().map(str::to_string)
        }
        Commands::AddBinarySensor {
            binary_sensor_entity,
            name,
        } => {
            let entry = entries.add_binary_sensor(binary_sensor_entity, name)?;
            println!("Added {}", describe(entry));
            entry.sensor_entity().map(str::to_string)
        }
        Commands::EditSensor {
            sensor_entity,
            thresholds,
        } => {
            let options = thresholds.apply(SensorForm::default());
            let entry = entries.update_sensor(&sensor_entity, options)?;
            println!("Updated {}", describe(entry));
            Some(sensor_entity)
        }
        Commands::Remove { entity } => {
            let entry = entries.remove(&entity)?;
            println!("Removed {}", describe(&entry));
            Some(entity)
        }
        Commands::List => {
            if entries.entries().is_empty() {
                println!("No entries in {:?}", cli.entries);
            }
            for entry in entries.entries() {
                println!("{}", describe(entry));
            }
            return Ok(());
        }
        Commands::ClearAlarm { alarm_name } => {
            let topics = Topics::from_config(&config.monitor);
            let payload = serde_json::to_string(&ClearAlarmRequest::new(alarm_name.clone()))?;
            MqttClient::publish_once(&ctl_mqtt_config(&config), &topics.clear_alarm(), &payload)
                .await?;
            println!("Clear requested for {}", alarm_name);
            println!("The monitor refuses it while the sensor is outside its safe range.");
            return Ok(());
        }
    };

    entries.save(&cli.entries)?;

    if !cli.no_reload {
        request_reload(&config, changed.as_deref()).await;
    }

    Ok(())
}
