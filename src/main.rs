use easy_thresholds::alarms::AlarmNotifier;
use easy_thresholds::config::{Config, load_dotenv};
use easy_thresholds::entries::ConfigEntries;
use easy_thresholds::input::mqtt::MqttIntegration;
use easy_thresholds::monitor::{AlarmMonitor, spawn_monitor};
use log::{error, info};
use tokio::signal;
use tokio_util::sync::CancellationToken;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Load .env file before the runtime spawns any threads
    load_dotenv();
    init_logger();
    info!("Starting Easy Thresholds");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run());
}

async fn run() {
    let config = Config::from_env();
    info!("Configuration loaded:");
    info!("  Entries: {:?}", config.monitor.entries_path);
    info!("  Topic prefix: {}", config.monitor.topic_prefix);
    info!("  Statestream base: {}", config.monitor.statestream_base);
    info!("  Sensor matching: {}", config.monitor.sensor_match());

    let entries = match ConfigEntries::load(&config.monitor.entries_path) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to load config entries: {}", e);
            std::process::exit(1);
        }
    };
    if !entries.is_set_up() {
        info!("No setup entry yet, run `thresholds-ctl setup` to add one");
    }

    let (notifier, notifications) = AlarmNotifier::channel();
    let monitor = AlarmMonitor::new(&entries, config.monitor.sensor_match(), notifier);
    let (handle, state_rx, monitor_task) = spawn_monitor(monitor, config.monitor.event_queue);

    let shutdown = CancellationToken::new();
    let integration =
        MqttIntegration::new(config).start(handle, state_rx, notifications, shutdown.clone());

    info!("Easy Thresholds is running, press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    // Stopping the integration drops the last monitor handle
    shutdown.cancel();
    if let Err(e) = integration.await {
        error!("Integration task failed: {}", e);
    }
    if let Err(e) = monitor_task.await {
        error!("Monitor task failed: {}", e);
    }

    info!("Easy Thresholds stopped");
}
