//! # Core subsystem
//!
//! Tracks whether an autopilot is present on the link. The vehicle is considered connected
//! as soon as one autopilot heartbeat is received, and disconnected when no heartbeat has
//! been received for [HEARTBEAT_TIMEOUT].
//!
//! The core also announces this ground station to the vehicle with a 1 Hz heartbeat.

use crate::broadcast::Topic;
use crate::link::is_autopilot;
use flume::{Receiver, Sender};
use futures::Stream;
use log::info;
use mavlink::common::{MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Silence after which the vehicle is declared disconnected
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(3);

const GCS_HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

/// Connection state of the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    /// True while autopilot heartbeats are received
    pub is_connected: bool,
}

/// # Access to the core subsystem
///
/// See the [core module documentation](crate::subsystems::core) for more context and information.
pub struct Core {
    connection_state: Topic<ConnectionState>,
    tasks: Vec<JoinHandle<()>>,
}

impl Core {
    pub(crate) fn new(uplink: Sender<MavMessage>, downlink: Receiver<MavMessage>) -> Self {
        let connection_state = Topic::new();

        let monitor_task = tokio::spawn(monitor_heartbeats(downlink, connection_state.clone()));
        let heartbeat_task = tokio::spawn(async move {
            let mut period = tokio::time::interval(GCS_HEARTBEAT_PERIOD);
            loop {
                period.tick().await;
                if uplink.send_async(gcs_heartbeat()).await.is_err() {
                    return;
                }
            }
        });

        Self {
            connection_state,
            tasks: vec![monitor_task, heartbeat_task],
        }
    }

    /// Stream of connection state updates
    ///
    /// The stream starts with the current state when it is known.
    pub fn connection_state(&self) -> impl Stream<Item = ConnectionState> + Send + Unpin + 'static {
        self.connection_state.subscribe()
    }

    /// Last known connection state
    pub fn is_connected(&self) -> bool {
        self.connection_state
            .latest()
            .map(|state| state.is_connected)
            .unwrap_or(false)
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn gcs_heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 0x3,
    })
}

async fn monitor_heartbeats(downlink: Receiver<MavMessage>, state: Topic<ConnectionState>) {
    let mut connected = false;
    loop {
        match tokio::time::timeout(HEARTBEAT_TIMEOUT, downlink.recv_async()).await {
            Ok(Ok(MavMessage::HEARTBEAT(heartbeat))) if is_autopilot(&heartbeat) => {
                if !connected {
                    info!("Autopilot discovered ({:?})", heartbeat.autopilot);
                    connected = true;
                    state.publish(ConnectionState { is_connected: true });
                }
            }
            // Heartbeats from other ground stations do not count
            Ok(Ok(_)) => (),
            Err(_) => {
                if connected {
                    info!("No heartbeat for {:?}, vehicle lost", HEARTBEAT_TIMEOUT);
                    connected = false;
                }
                state.publish(ConnectionState { is_connected: false });
            }
            Ok(Err(flume::RecvError::Disconnected)) => {
                state.publish(ConnectionState { is_connected: false });
                return;
            }
        }
    }
}
