//! # Vehicle subsystems
//!
//! The vehicle API is organized in logical subsystems, each with one role. They are all
//! fed by the same MAVLink link: incoming messages are dispatched to the subsystem
//! interested in them and every subsystem sends its requests on the shared uplink.
//!
//! Modules here implement the Rust API for the different subsystems, they are the main way
//! to communicate and interact with the vehicle.

pub mod action;
pub mod core;
pub mod mission;
pub mod param;
pub mod telemetry;
