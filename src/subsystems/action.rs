//! # Action subsystem
//!
//! Simple vehicle actions: arming, take-off, landing and return to launch. Each action is
//! a `COMMAND_LONG` acknowledged by the vehicle; a rejected command is returned as
//! [Error::CommandDenied](crate::Error::CommandDenied) and is never retried.
//!
//! ``` no_run
//! # async fn hop(drone: &mavdrone::Drone) -> mavdrone::Result<()> {
//! drone.action.arm().await?;
//! drone.action.set_takeoff_altitude(1.5).await?;
//! drone.action.takeoff().await?;
//! tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//! drone.action.land().await?;
//! # Ok(())
//! # }
//! ```

use crate::command::CommandClient;
use crate::subsystems::param::Param;
use crate::Result;
use mavlink::common::MavCmd;
use std::sync::Arc;

/// PX4 parameter holding the take-off altitude above home, in meters
pub const TAKEOFF_ALTITUDE_PARAM: &str = "MIS_TAKEOFF_ALT";

const ARM: f32 = 1.0;
const DISARM: f32 = 0.0;
const NO_PARAMS: [f32; 7] = [f32::NAN; 7];

/// # Access to the action subsystem
///
/// See the [action module documentation](crate::subsystems::action) for more context and
/// information.
pub struct Action {
    commands: CommandClient,
    param: Arc<Param>,
}

impl Action {
    pub(crate) fn new(commands: CommandClient, param: Arc<Param>) -> Self {
        Self { commands, param }
    }

    /// Arm the motors
    pub async fn arm(&self) -> Result<()> {
        self.commands
            .send_command(
                MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
                [ARM, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            )
            .await
    }

    /// Disarm the motors
    pub async fn disarm(&self) -> Result<()> {
        self.commands
            .send_command(
                MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
                [DISARM, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            )
            .await
    }

    /// Take off to the configured take-off altitude
    ///
    /// The altitude is set with [Action::set_takeoff_altitude()].
    pub async fn takeoff(&self) -> Result<()> {
        self.commands.send_command(MavCmd::MAV_CMD_NAV_TAKEOFF, NO_PARAMS).await
    }

    /// Land at the current position
    pub async fn land(&self) -> Result<()> {
        self.commands.send_command(MavCmd::MAV_CMD_NAV_LAND, NO_PARAMS).await
    }

    /// Fly back to the launch position and land
    pub async fn return_to_launch(&self) -> Result<()> {
        self.commands
            .send_command(MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH, [0.0; 7])
            .await
    }

    /// Set the take-off altitude, in meters above home
    pub async fn set_takeoff_altitude(&self, altitude_m: f32) -> Result<()> {
        self.param.set_param_float(TAKEOFF_ALTITUDE_PARAM, altitude_m).await
    }

    /// Get the take-off altitude, in meters above home
    pub async fn get_takeoff_altitude(&self) -> Result<f32> {
        self.param.get_param_float(TAKEOFF_ALTITUDE_PARAM).await
    }
}
