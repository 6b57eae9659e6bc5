//! Events consumed by the monitor and the task that serializes them.

use super::orchestrator::AlarmMonitor;
use super::state::MonitorState;
use crate::entries::ConfigEntries;
use crate::error::{Result, ThresholdsError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Clear-alarm service call payload.
///
/// `alarm_name` is required; a request without it is rejected before the
/// guard runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearAlarmRequest {
    #[serde(default)]
    pub alarm_name: Option<String>,
}

impl ClearAlarmRequest {
    pub fn new(alarm_name: impl Into<String>) -> Self {
        Self {
            alarm_name: Some(alarm_name.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A host entity changed state. `None` means the entity was removed.
    SensorChanged {
        entity_id: String,
        new_state: Option<String>,
    },
    /// The configuration set changed. `changed` names the affected sensor,
    /// `None` re-checks every configured sensor.
    ConfigChanged {
        entries: ConfigEntries,
        changed: Option<String>,
    },
    ClearRequested(ClearAlarmRequest),
}

/// Sending side of the monitor's event queue.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorEvent>,
}

impl MonitorHandle {
    pub async fn send(&self, event: MonitorEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ThresholdsError::ChannelClosed("monitor events"))
    }

    pub async fn sensor_changed(
        &self,
        entity_id: impl Into<String>,
        new_state: Option<String>,
    ) -> Result<()> {
        self.send(MonitorEvent::SensorChanged {
            entity_id: entity_id.into(),
            new_state,
        })
        .await
    }

    pub async fn config_changed(
        &self,
        entries: ConfigEntries,
        changed: Option<String>,
    ) -> Result<()> {
        let event = MonitorEvent::ConfigChanged { entries, changed };
        self.send(event).await
    }

    pub async fn clear_alarm(&self, request: ClearAlarmRequest) -> Result<()> {
        self.send(MonitorEvent::ClearRequested(request)).await
    }
}

/// Move the monitor onto its own task.
///
/// Returns the event handle, a receiver of the published state and the task
/// handle. The task ends when every [`MonitorHandle`] has been dropped.
pub fn spawn_monitor(
    monitor: AlarmMonitor,
    capacity: usize,
) -> (MonitorHandle, watch::Receiver<MonitorState>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let (state_tx, state_rx) = watch::channel(monitor.state());
    let task = tokio::spawn(run(monitor, rx, state_tx));
    (MonitorHandle { tx }, state_rx, task)
}

async fn run(
    mut monitor: AlarmMonitor,
    mut rx: mpsc::Receiver<MonitorEvent>,
    state_tx: watch::Sender<MonitorState>,
) {
    info!("[Monitor] Event loop started");

    while let Some(event) = rx.recv().await {
        monitor.handle(event);

        let published = state_tx.send_if_modified(|current| {
            let next = monitor.state();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if published {
            let count = state_tx.borrow().alarm_count();
            debug!("[Monitor] Published {} active alarm(s)", count);
        }
    }

    info!("[Monitor] Event loop stopped");
}
