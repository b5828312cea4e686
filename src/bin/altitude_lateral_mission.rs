//! Scripted mission: take off to 1.5m and hover 5s, hop ~2.2m north, come back, return to
//! launch and land.
use futures::StreamExt;
use mavdrone::preflight::{fetch_home, wait_for_global_position, wait_until_connected};
use mavdrone::subsystems::mission::{MissionItem, MissionPlan};
use mavdrone::watcher::FlightCompletionWatcher;
use mavdrone::Drone;

const SYSTEM_ADDRESS: &str = mavdrone::DEFAULT_SYSTEM_ADDRESS;
const ALTITUDE_M: f32 = 1.5;
const SPEED_M_S: f32 = 1.0;
const TAKEOFF_HOVER_S: f32 = 5.0;
const WAYPOINT_HOLD_S: f32 = 1.0;
// ~2.22m north
const LATERAL_OFFSET_DEG: f64 = 0.00002;

fn waypoint(latitude_deg: f64, longitude_deg: f64, loiter_time_s: f32) -> MissionItem {
    MissionItem {
        speed_m_s: SPEED_M_S,
        loiter_time_s,
        ..MissionItem::new(latitude_deg, longitude_deg, ALTITUDE_M)
    }
}

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

    println!("Fetching info at home location....");
    let home = fetch_home(&drone).await?;

    let mut progress = drone.mission.mission_progress();
    let print_mission_progress = tokio::spawn(async move {
        while let Some(progress) = progress.next().await {
            println!("Mission progress: {}/{}", progress.current, progress.total);
        }
    });
    let termination = tokio::spawn(
        FlightCompletionWatcher::new(vec![print_mission_progress]).run(drone.telemetry.in_air()),
    );

    let mission_plan = MissionPlan::new(vec![
        // Take off and hover at home
        waypoint(home.latitude_deg, home.longitude_deg, TAKEOFF_HOVER_S),
        waypoint(home.latitude_deg + LATERAL_OFFSET_DEG, home.longitude_deg, WAYPOINT_HOLD_S),
        waypoint(home.latitude_deg, home.longitude_deg, WAYPOINT_HOLD_S),
    ]);

    drone.mission.set_return_to_launch_after_mission(true);

    println!("-- Uploading mission");
    drone.mission.upload_mission(&mission_plan).await?;

    println!("-- Arming");
    drone.action.arm().await?;

    println!("-- Starting mission");
    drone.mission.start_mission().await?;

    termination.await??;

    drone.disconnect().await;

    Ok(())
}
