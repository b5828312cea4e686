//! # Telemetry subsystem
//!
//! Decodes the status messages streamed by the autopilot and exposes them as streams. Every
//! stream starts with the last value received, if any, and then yields each new sample as it
//! arrives from the vehicle. Streams are independent: each call returns a new subscription
//! and dropping it releases it.
//!
//! ``` no_run
//! # use futures::StreamExt;
//! # async fn wait_landed(drone: &mavdrone::Drone) {
//! let mut in_air = drone.telemetry.in_air();
//! while let Some(flying) = in_air.next().await {
//!     if !flying {
//!         break;
//!     }
//! }
//! # }
//! ```

use crate::broadcast::Topic;
use crate::command::CommandClient;
use crate::link::is_autopilot;
use crate::Result;
use flume::Receiver;
use futures::Stream;
use mavlink::common::{
    GpsFixType, MavCmd, MavLandedState, MavMessage, MavModeFlag, MavSysStatusSensor,
    SYS_STATUS_DATA,
};
use tokio::task::JoinHandle;

const HOME_POSITION_MESSAGE_ID: f32 = 242.0;

/// Global position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees
    pub latitude_deg: f64,
    /// Longitude in degrees
    pub longitude_deg: f64,
    /// Altitude above mean sea level, in meters
    pub absolute_altitude_m: f32,
    /// Altitude above home, in meters
    pub relative_altitude_m: f32,
}

/// Readiness of the vehicle estimators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Health {
    /// A 3D GPS fix is available and the GPS sensor is healthy
    pub is_global_position_ok: bool,
    /// A local position estimate is being published
    pub is_local_position_ok: bool,
    /// The home position has been set
    pub is_home_position_ok: bool,
    /// Global position and home are both ok
    pub is_armable: bool,
}

#[derive(Debug, Default)]
struct HealthTracker {
    gps_fix_3d: bool,
    gps_sensor_failed: bool,
    local_position: bool,
    home_position: bool,
}

impl HealthTracker {
    fn sys_status(&mut self, status: &SYS_STATUS_DATA) {
        let gps = MavSysStatusSensor::MAV_SYS_STATUS_SENSOR_GPS;
        // Autopilots not reporting the GPS sensor are trusted on the fix alone
        self.gps_sensor_failed = status.onboard_control_sensors_present.contains(gps)
            && !status.onboard_control_sensors_health.contains(gps);
    }

    fn health(&self) -> Health {
        let is_global_position_ok = self.gps_fix_3d && !self.gps_sensor_failed;
        Health {
            is_global_position_ok,
            is_local_position_ok: self.local_position,
            is_home_position_ok: self.home_position,
            is_armable: is_global_position_ok && self.home_position,
        }
    }
}

fn is_3d_fix(fix_type: GpsFixType) -> bool {
    matches!(
        fix_type,
        GpsFixType::GPS_FIX_TYPE_3D_FIX
            | GpsFixType::GPS_FIX_TYPE_DGPS
            | GpsFixType::GPS_FIX_TYPE_RTK_FLOAT
            | GpsFixType::GPS_FIX_TYPE_RTK_FIXED
            | GpsFixType::GPS_FIX_TYPE_STATIC
            | GpsFixType::GPS_FIX_TYPE_PPP
    )
}

/// Airborne state for a landed state, `None` when the autopilot does not know
pub(crate) fn in_air_from_landed_state(landed_state: MavLandedState) -> Option<bool> {
    match landed_state {
        MavLandedState::MAV_LANDED_STATE_UNDEFINED => None,
        MavLandedState::MAV_LANDED_STATE_ON_GROUND => Some(false),
        MavLandedState::MAV_LANDED_STATE_IN_AIR
        | MavLandedState::MAV_LANDED_STATE_TAKEOFF
        | MavLandedState::MAV_LANDED_STATE_LANDING => Some(true),
    }
}

fn degrees(e7: i32) -> f64 {
    e7 as f64 / 1e7
}

#[derive(Clone)]
struct Topics {
    health: Topic<Health>,
    home: Topic<Position>,
    in_air: Topic<bool>,
    armed: Topic<bool>,
    position: Topic<Position>,
}

/// # Access to the telemetry subsystem
///
/// See the [telemetry module documentation](crate::subsystems::telemetry) for more context and
/// information.
pub struct Telemetry {
    topics: Topics,
    commands: CommandClient,
    _telemetry_task: AbortOnDrop,
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Telemetry {
    pub(crate) fn new(downlink: Receiver<MavMessage>, commands: CommandClient) -> Self {
        let topics = Topics {
            health: Topic::new(),
            home: Topic::new(),
            in_air: Topic::new(),
            armed: Topic::new(),
            position: Topic::new(),
        };

        let task_topics = topics.clone();
        let telemetry_task = tokio::spawn(async move {
            let mut tracker = HealthTracker::default();
            while let Ok(msg) = downlink.recv_async().await {
                process_message(&task_topics, &mut tracker, msg);
            }
        });

        Self {
            topics,
            commands,
            _telemetry_task: AbortOnDrop(telemetry_task),
        }
    }

    /// Stream of estimator health
    pub fn health(&self) -> impl Stream<Item = Health> + Send + Unpin + 'static {
        self.topics.health.subscribe()
    }

    /// Stream of home positions
    ///
    /// The home position is only sent occasionally by autopilots, it is requested from the
    /// vehicle when not already known.
    pub async fn home(&self) -> Result<impl Stream<Item = Position> + Send + Unpin + 'static> {
        if self.topics.home.latest().is_none() {
            self.commands
                .send_command_no_ack(
                    MavCmd::MAV_CMD_REQUEST_MESSAGE,
                    [HOME_POSITION_MESSAGE_ID, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                )
                .await?;
        }
        Ok(self.topics.home.subscribe())
    }

    /// Stream of airborne state, true from take-off until touchdown
    pub fn in_air(&self) -> impl Stream<Item = bool> + Send + Unpin + 'static {
        self.topics.in_air.subscribe()
    }

    /// Stream of the motors armed state
    pub fn armed(&self) -> impl Stream<Item = bool> + Send + Unpin + 'static {
        self.topics.armed.subscribe()
    }

    /// Stream of global positions
    pub fn position(&self) -> impl Stream<Item = Position> + Send + Unpin + 'static {
        self.topics.position.subscribe()
    }
}

fn process_message(topics: &Topics, tracker: &mut HealthTracker, msg: MavMessage) {
    match msg {
        MavMessage::HEARTBEAT(heartbeat) if is_autopilot(&heartbeat) => {
            topics
                .armed
                .publish(heartbeat.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED));
        }
        MavMessage::EXTENDED_SYS_STATE(state) => {
            if let Some(in_air) = in_air_from_landed_state(state.landed_state) {
                topics.in_air.publish(in_air);
            }
        }
        MavMessage::SYS_STATUS(status) => {
            tracker.sys_status(&status);
            topics.health.publish(tracker.health());
        }
        MavMessage::GPS_RAW_INT(gps) => {
            tracker.gps_fix_3d = is_3d_fix(gps.fix_type);
            topics.health.publish(tracker.health());
        }
        MavMessage::LOCAL_POSITION_NED(_) => {
            if !tracker.local_position {
                tracker.local_position = true;
                topics.health.publish(tracker.health());
            }
        }
        MavMessage::HOME_POSITION(home) => {
            topics.home.publish(Position {
                latitude_deg: degrees(home.latitude),
                longitude_deg: degrees(home.longitude),
                absolute_altitude_m: home.altitude as f32 / 1e3,
                relative_altitude_m: 0.0,
            });
            if !tracker.home_position {
                tracker.home_position = true;
                topics.health.publish(tracker.health());
            }
        }
        MavMessage::GLOBAL_POSITION_INT(position) => {
            topics.position.publish(Position {
                latitude_deg: degrees(position.lat),
                longitude_deg: degrees(position.lon),
                absolute_altitude_m: position.alt as f32 / 1e3,
                relative_altitude_m: position.relative_alt as f32 / 1e3,
            });
        }
        _ => (),
    }
}
