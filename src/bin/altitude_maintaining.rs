//! Take off to 1.5m, hold the altitude for 30s and land.
use mavdrone::preflight::{wait_for_global_position, wait_until_connected};
use mavdrone::Drone;
use std::time::Duration;

const SYSTEM_ADDRESS: &str = mavdrone::DEFAULT_SYSTEM_ADDRESS;
const TAKEOFF_ALTITUDE_M: f32 = 1.5;
const HOVER_TIME: Duration = Duration::from_secs(30);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let drone = Drone::connect(SYSTEM_ADDRESS).await?;

    println!("Waiting for drone to connect...");
    wait_until_connected(&drone).await?;
    println!("Drone discovered!");

    println!("Waiting for drone to have a global position estimate...");
    wait_for_global_position(&drone).await?;
    println!("Global position estimate ok");

    println!("-- Arming");
    drone.action.arm().await?;

    drone.action.set_takeoff_altitude(TAKEOFF_ALTITUDE_M).await?;
    println!("{}", drone.action.get_takeoff_altitude().await?);

    println!("-- Taking off");
    drone.action.takeoff().await?;

    println!("-- Waiting for {}s", HOVER_TIME.as_secs());
    tokio::time::sleep(HOVER_TIME).await;

    println!("-- Landing");
    drone.action.land().await?;

    drone.disconnect().await;

    Ok(())
}
