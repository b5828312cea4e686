use crate::command::CommandClient;
use crate::link::{parse_system_address, spawn_uplink, Connection, MessageDispatch, Route, Target};
use crate::subsystems::action::Action;
use crate::subsystems::core::Core;
use crate::subsystems::mission::Mission;
use crate::subsystems::param::Param;
use crate::subsystems::telemetry::Telemetry;
use crate::{Error, Result};
use futures::lock::Mutex;
use log::{info, warn};
use mavlink::common::MavMessage;
use mavlink::MavlinkVersion;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Longest time [Drone::disconnect()] waits for the link reader
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// # The Drone
///
/// This struct is one-time use: creating it opens the link to a vehicle and once
/// disconnected, the object cannot be reconnected. A new one needs to be created to connect
/// again.
///
/// Creating a `Drone` does not wait for the vehicle to be present, use the
/// [core subsystem](crate::subsystems::core) connection state for that.
///
/// See the [mavdrone crate root documentation](crate) for more context and information.
pub struct Drone {
    /// Connection state
    pub core: Core,
    /// Telemetry streams
    pub telemetry: Telemetry,
    /// Arming, take-off and landing
    pub action: Action,
    /// Mission upload, start and progress
    pub mission: Mission,
    /// Parameter access
    pub param: Arc<Param>,
    target: Arc<Target>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
    disconnect: Arc<AtomicBool>,
}

impl Drone {
    /// Open a link to a vehicle
    ///
    /// The system address is for example `udp://:14540` to listen for a simulator, see
    /// [parse_system_address()](crate::parse_system_address) for the supported forms.
    ///
    /// An error is returned if the address is invalid or the link cannot be opened.
    pub async fn connect(system_address: &str) -> Result<Self> {
        let address = parse_system_address(system_address)?;
        info!("Opening MAVLink link {}", address);

        let connection =
            tokio::task::spawn_blocking(move || mavlink::connect::<MavMessage>(&address))
                .await?
                .map_err(|e| Error::ConnectionError(format!("{}: {}", system_address, e)))?;

        Ok(Self::connect_from_connection(connection))
    }

    /// Use an already opened MAVLink connection
    pub fn connect_from_connection(
        mut connection: Box<dyn mavlink::MavConnection<MavMessage> + Sync + Send>,
    ) -> Self {
        connection.set_protocol_version(MavlinkVersion::V2);
        let connection: Connection = Arc::new(connection);

        let disconnect = Arc::new(AtomicBool::new(false));
        let target = Arc::new(Target::default());

        let mut dispatcher =
            MessageDispatch::new(connection.clone(), target.clone(), disconnect.clone());
        // The writer stops by itself once every subsystem, holding an uplink, is dropped
        let (uplink, _uplink_task) = spawn_uplink(connection);

        // Each route is requested once so a receiver is always returned
        let mut downlink = |route| {
            dispatcher
                .get_route_receiver(route)
                .unwrap_or_else(|| flume::unbounded().1)
        };
        let core_downlink = downlink(Route::Core);
        let telemetry_downlink = downlink(Route::Telemetry);
        let command_downlink = downlink(Route::Command);
        let mission_transfer_downlink = downlink(Route::MissionTransfer);
        let mission_status_downlink = downlink(Route::MissionStatus);
        let param_downlink = downlink(Route::Param);

        let commands = CommandClient::new(uplink.clone(), command_downlink, target.clone());
        let param = Arc::new(Param::new(uplink.clone(), param_downlink, target.clone()));

        let core = Core::new(uplink.clone(), core_downlink);
        let telemetry = Telemetry::new(telemetry_downlink, commands.clone());
        let action = Action::new(commands.clone(), param.clone());
        let mission = Mission::new(
            uplink,
            mission_transfer_downlink,
            mission_status_downlink,
            commands,
            target.clone(),
        );

        // Start the downlink message dispatcher
        let dispatch_task = dispatcher.run();

        Drone {
            core,
            telemetry,
            action,
            mission,
            param,
            target,
            dispatch_task: Mutex::new(Some(dispatch_task)),
            disconnect,
        }
    }

    /// System id of the vehicle, 1 until its heartbeat is received
    pub fn system_id(&self) -> u8 {
        self.target.system_id()
    }

    /// Disconnect from the vehicle
    ///
    /// The blocking link reader only notices the request when the next message arrives, it
    /// is waited for at most [DISCONNECT_TIMEOUT]. The uplink is flushed and closed when the
    /// `Drone` is dropped.
    ///
    /// Once disconnected, the telemetry streams end and requests return
    /// [Error::Disconnected] or [Error::Timeout].
    pub async fn disconnect(&self) {
        self.disconnect.store(true, Relaxed);

        if let Some(dispatch_task) = self.dispatch_task.lock().await.take() {
            if tokio::time::timeout(DISCONNECT_TIMEOUT, dispatch_task).await.is_err() {
                warn!(
                    "Link reader still blocked after {:?}, leaving it behind",
                    DISCONNECT_TIMEOUT
                );
            }
        }
        info!("Disconnected");
    }
}

impl Drop for Drone {
    fn drop(&mut self) {
        self.disconnect.store(true, Relaxed);
    }
}
