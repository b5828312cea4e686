//! MAVLink link plumbing used by the lib
//!
//! The MAVLink connection from the `mavlink` crate is blocking, both directions are
//! therefore served by dedicated blocking threads. Incoming messages are dispatched to the
//! subsystems through one channel per [Route], the same way a radio link would be split
//! per port.

use crate::{Error, Result};
use async_trait::async_trait;
use flume as channel;
use flume::{Receiver, Sender};
use log::{debug, info, warn};
use mavlink::common::{MavAutopilot, MavMessage, MavType, HEARTBEAT_DATA};
use mavlink::{MavConnection, MavHeader};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicU8};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// System id used by this ground station, the MAVSDK default
pub const GCS_SYSTEM_ID: u8 = 245;
/// Component id used by this ground station (MAV_COMP_ID_MISSIONPLANNER)
pub const GCS_COMPONENT_ID: u8 = 190;

const DEFAULT_SERIAL_BAUD: u32 = 57600;

pub(crate) type Connection = Arc<Box<dyn MavConnection<MavMessage> + Sync + Send>>;

/// Translate a system address into a `mavlink` crate connection string
///
/// Accepted forms are:
///  - `udp://:14540` listens on all interfaces, `udp://host:port` listens on the given interface
///  - `tcp://host:port` connects to a TCP server
///  - `serial:///dev/ttyUSB0` or `serial:///dev/ttyUSB0:921600` opens a serial port
///
/// ```
/// assert_eq!(mavdrone::parse_system_address("udp://:14540").unwrap(), "udpin:0.0.0.0:14540");
/// ```
pub fn parse_system_address(address: &str) -> Result<String> {
    let invalid = || Error::AddressError(address.to_owned());

    if let Some(rest) = address.strip_prefix("udp://") {
        let (host, port) = split_host_port(rest).ok_or_else(invalid)?;
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        Ok(format!("udpin:{}:{}", host, port))
    } else if let Some(rest) = address.strip_prefix("tcp://") {
        let (host, port) = split_host_port(rest).ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(format!("tcpout:{}:{}", host, port))
    } else if let Some(rest) = address.strip_prefix("serial://") {
        if rest.is_empty() {
            return Err(invalid());
        }
        match rest.rsplit_once(':') {
            Some((path, baud)) if !path.is_empty() => {
                let baud: u32 = baud.parse().map_err(|_| invalid())?;
                Ok(format!("serial:{}:{}", path, baud))
            }
            Some(_) => Err(invalid()),
            None => Ok(format!("serial:{}:{}", rest, DEFAULT_SERIAL_BAUD)),
        }
    } else {
        Err(invalid())
    }
}

fn split_host_port(rest: &str) -> Option<(&str, u16)> {
    let (host, port) = rest.rsplit_once(':')?;
    Some((host, port.parse().ok()?))
}

/// Logical destination of an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Route {
    Core,
    Telemetry,
    Command,
    MissionTransfer,
    MissionStatus,
    Param,
}

/// Routes a message is delivered to, empty for messages nobody listens to
pub(crate) fn routes(msg: &MavMessage) -> &'static [Route] {
    match msg {
        MavMessage::HEARTBEAT(_) => &[Route::Core, Route::Telemetry],
        MavMessage::SYS_STATUS(_)
        | MavMessage::GPS_RAW_INT(_)
        | MavMessage::HOME_POSITION(_)
        | MavMessage::EXTENDED_SYS_STATE(_)
        | MavMessage::GLOBAL_POSITION_INT(_)
        | MavMessage::LOCAL_POSITION_NED(_) => &[Route::Telemetry],
        MavMessage::COMMAND_ACK(_) => &[Route::Command],
        MavMessage::MISSION_REQUEST(_)
        | MavMessage::MISSION_REQUEST_INT(_)
        | MavMessage::MISSION_ACK(_) => &[Route::MissionTransfer],
        MavMessage::MISSION_CURRENT(_) | MavMessage::MISSION_ITEM_REACHED(_) => {
            &[Route::MissionStatus]
        }
        MavMessage::PARAM_VALUE(_) => &[Route::Param],
        _ => &[],
    }
}

/// System and component id of the autopilot we talk to
///
/// PX4 and ArduPilot both default to 1/1, the values are updated from the autopilot
/// heartbeat once the vehicle is discovered.
#[derive(Debug)]
pub struct Target {
    system_id: AtomicU8,
    component_id: AtomicU8,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            system_id: AtomicU8::new(1),
            component_id: AtomicU8::new(1),
        }
    }
}

impl Target {
    pub(crate) fn set(&self, system_id: u8, component_id: u8) {
        self.system_id.store(system_id, Relaxed);
        self.component_id.store(component_id, Relaxed);
    }

    /// Target system id
    pub fn system_id(&self) -> u8 {
        self.system_id.load(Relaxed)
    }

    /// Target component id
    pub fn component_id(&self) -> u8 {
        self.component_id.load(Relaxed)
    }
}

/// True for heartbeats sent by a flight controller, as opposed to ground stations
pub(crate) fn is_autopilot(heartbeat: &HEARTBEAT_DATA) -> bool {
    heartbeat.autopilot != MavAutopilot::MAV_AUTOPILOT_INVALID
        && heartbeat.mavtype != MavType::MAV_TYPE_GCS
}

pub(crate) struct MessageDispatch {
    connection: Connection,
    route_channels: BTreeMap<Route, Sender<MavMessage>>,
    target: Arc<Target>,
    disconnect: Arc<AtomicBool>,
}

impl MessageDispatch {
    pub(crate) fn new(
        connection: Connection,
        target: Arc<Target>,
        disconnect: Arc<AtomicBool>,
    ) -> Self {
        MessageDispatch {
            connection,
            route_channels: BTreeMap::new(),
            target,
            disconnect,
        }
    }

    #[allow(clippy::map_entry)]
    pub(crate) fn get_route_receiver(&mut self, route: Route) -> Option<Receiver<MavMessage>> {
        if self.route_channels.contains_key(&route) {
            None
        } else {
            let (tx, rx) = channel::unbounded();
            self.route_channels.insert(route, tx);
            Some(rx)
        }
    }

    /// Start the downlink reader
    ///
    /// The reader blocks on the connection, the disconnect flag is therefore only observed
    /// when the next message arrives.
    pub(crate) fn run(self) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || {
            while !self.disconnect.load(Relaxed) {
                match self.connection.recv() {
                    Ok((header, msg)) => {
                        if header.system_id == GCS_SYSTEM_ID {
                            continue;
                        }
                        if let MavMessage::HEARTBEAT(heartbeat) = &msg {
                            if is_autopilot(heartbeat) {
                                self.target.set(header.system_id, header.component_id);
                            }
                        }
                        for route in routes(&msg) {
                            if let Some(channel) = self.route_channels.get(route) {
                                let _ = channel.send(msg.clone());
                            }
                        }
                    }
                    Err(mavlink::error::MessageReadError::Io(e)) => match e.kind() {
                        std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::Interrupted => continue,
                        _ => {
                            info!("MAVLink link closed: {}", e);
                            return;
                        }
                    },
                    Err(e) => debug!("Dropping malformed MAVLink frame: {:?}", e),
                }
            }
        })
    }
}

/// Start the uplink writer
///
/// Every message queued on the returned sender is written with the ground station header.
/// The writer stops once every sender has been dropped.
pub(crate) fn spawn_uplink(connection: Connection) -> (Sender<MavMessage>, JoinHandle<()>) {
    let (uplink, rx) = channel::unbounded::<MavMessage>();
    let header = MavHeader {
        system_id: GCS_SYSTEM_ID,
        component_id: GCS_COMPONENT_ID,
        sequence: 0,
    };

    let task = tokio::task::spawn_blocking(move || {
        while let Ok(msg) = rx.recv() {
            if let Err(e) = connection.send(&header, &msg) {
                warn!("Failed to send MAVLink message: {:?}", e);
            }
        }
    });

    (uplink, task)
}

#[async_trait]
pub(crate) trait WaitForMessage {
    /// Wait for the first message accepted by `select`, or [Error::Timeout]
    async fn wait_message<T, F>(&self, timeout: Duration, select: F) -> Result<T>
    where
        T: Send,
        F: FnMut(MavMessage) -> Option<T> + Send;
}

#[async_trait]
impl WaitForMessage for channel::Receiver<MavMessage> {
    async fn wait_message<T, F>(&self, timeout: Duration, mut select: F) -> Result<T>
    where
        T: Send,
        F: FnMut(MavMessage) -> Option<T> + Send,
    {
        let wait = async {
            loop {
                let msg = self.recv_async().await?;
                if let Some(selected) = select(msg) {
                    break Ok::<T, Error>(selected);
                }
            }
        };

        tokio::time::timeout(timeout, wait).await?
    }
}
