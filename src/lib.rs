//! # MAVLink drone library
//!
//! This crate allows to connect, communicate with and control a MAVLink autopilot, such as PX4
//! running in a simulator, using the [mavlink] crate to open the communication link. UDP, TCP
//! and serial links are supported.
//!
//! ## Status
//!
//! The crate implements the small part of the MAVLink protocol needed to fly simple scripted
//! flights. The vehicle functionalities are implemented in subsystems. The current status is:
//!
//! | Subsystem | Support |
//! |-----------|---------|
//! | Core | Heartbeat and connection state |
//! | Telemetry | Partial (health, home, in-air, armed, position) |
//! | Action | Partial (arm, disarm, take-off, land, return to launch) |
//! | Mission | Partial (upload, clear, start, progress) |
//! | Param | Partial (float parameters) |
//!
//! ## Usage
//!
//! The basic procedure to use the lib is:
//!  - Create a [Drone] object from a system address, this opens the link and initializes
//!    the subsystems
//!  - Wait for the vehicle to be discovered and ready using the [preflight] functions
//!  - Use the subsystems, available as public fields of the [Drone] struct, to control it
//!  - Observe the end of the flight with a [watcher::FlightCompletionWatcher]
//!  - Drop the Drone object or call [Drone::disconnect()]
//!
//! All subsystems functions are only taking an un-mutable reference to self (`&self`), the
//! intention is for the Drone object to be shared between tasks using `Arc<>`.
//!
//! For example:
//! ``` no_run
//! # async fn test() -> Result<(), Box<dyn std::error::Error>> {
//! use futures::StreamExt;
//!
//! let drone = mavdrone::Drone::connect(mavdrone::DEFAULT_SYSTEM_ADDRESS).await?;
//! mavdrone::preflight::wait_until_connected(&drone).await?;
//!
//! drone.action.arm().await?;
//! drone.action.takeoff().await?;
//!
//! let mut in_air = drone.telemetry.in_air();
//! while let Some(flying) = in_air.next().await {
//!     println!("In air: {}", flying);
//! }
//!
//! drone.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod broadcast;
mod command;
mod drone;
mod error;
mod link;

pub mod preflight;
pub mod subsystems;
pub mod watcher;

pub use crate::drone::{Drone, DISCONNECT_TIMEOUT};
pub use crate::error::{Error, Result};
pub use crate::link::{parse_system_address, Target, GCS_COMPONENT_ID, GCS_SYSTEM_ID};

/// System address of a PX4 simulator on the local machine
pub const DEFAULT_SYSTEM_ADDRESS: &str = "udp://:14540";
