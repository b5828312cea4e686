//! # Mission subsystem
//!
//! A mission is an ordered list of [MissionItem]s flown autonomously by the vehicle. Each
//! item is a position with optional speed, gimbal, camera and loiter directives. Before the
//! upload, the items are assembled into the MAVLink mission items understood by the
//! autopilot, a single mission item can produce several MAVLink items (waypoint, speed
//! change, gimbal control, delay, camera command).
//!
//! Progress is reported in mission items, not MAVLink items: `current` is the index of the
//! mission item being flown and equals `total` once the mission is complete.
//!
//! ``` no_run
//! # async fn fly(drone: &mavdrone::Drone, lat: f64, lon: f64) -> mavdrone::Result<()> {
//! use mavdrone::subsystems::mission::{MissionItem, MissionPlan};
//!
//! let plan = MissionPlan::new(vec![
//!     MissionItem::new(lat, lon, 10.0),
//!     MissionItem { loiter_time_s: 5.0, ..MissionItem::new(lat + 0.0001, lon, 10.0) },
//! ]);
//! drone.mission.set_return_to_launch_after_mission(true);
//! drone.mission.upload_mission(&plan).await?;
//! drone.action.arm().await?;
//! drone.mission.start_mission().await?;
//! # Ok(())
//! # }
//! ```

use crate::broadcast::Topic;
use crate::command::CommandClient;
use crate::link::{Target, WaitForMessage};
use crate::{Error, Result};
use flume::{Receiver, Sender};
use futures::lock::Mutex;
use futures::Stream;
use log::{debug, info};
use mavlink::common::{
    MavCmd, MavFrame, MavMessage, MavMissionResult, MavMissionType, MISSION_CLEAR_ALL_DATA,
    MISSION_COUNT_DATA, MISSION_ITEM_INT_DATA,
};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Time allowed for each step of a mission transfer
pub const MISSION_TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

// Hold time at waypoints that are not flown through
const WAYPOINT_HOLD_S: f32 = 0.5;

// MAV_CMD_DO_SET_MODE arguments selecting PX4 AUTO.MISSION
const MAV_MODE_FLAG_CUSTOM_MODE_ENABLED: f32 = 1.0;
const PX4_CUSTOM_MAIN_MODE_AUTO: f32 = 4.0;
const PX4_CUSTOM_SUB_MODE_AUTO_MISSION: f32 = 4.0;

const SPEED_TYPE_GROUND: f32 = 1.0;
const MAV_MOUNT_MODE_MAVLINK_TARGETING: f32 = 2.0;

/// Camera directive attached to a mission item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraAction {
    /// No camera action
    None,
    /// Take a single photo
    TakePhoto,
    /// Start taking photos every [MissionItem::camera_photo_interval_s]
    StartPhotoInterval,
    /// Stop the photo interval
    StopPhotoInterval,
    /// Start video recording
    StartVideo,
    /// Stop video recording
    StopVideo,
}

/// One waypoint of a mission
///
/// Optional floating point fields use NaN for "unset".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionItem {
    /// Latitude in degrees
    pub latitude_deg: f64,
    /// Longitude in degrees
    pub longitude_deg: f64,
    /// Altitude above home, in meters
    pub relative_altitude_m: f32,
    /// Speed to use after this item, in m/s
    pub speed_m_s: f32,
    /// Continue to the next item without stopping
    pub is_fly_through: bool,
    /// Gimbal pitch, in degrees
    pub gimbal_pitch_deg: f32,
    /// Gimbal yaw, in degrees
    pub gimbal_yaw_deg: f32,
    /// Camera action to trigger at this item
    pub camera_action: CameraAction,
    /// Time to wait at this item, in seconds
    pub loiter_time_s: f32,
    /// Photo interval used with [CameraAction::StartPhotoInterval], in seconds
    pub camera_photo_interval_s: f64,
    /// Radius around the item considered as reached, in meters
    pub acceptance_radius_m: f32,
    /// Heading at this item, in degrees
    pub yaw_deg: f32,
}

impl MissionItem {
    /// Fly-through waypoint with every optional directive unset
    pub fn new(latitude_deg: f64, longitude_deg: f64, relative_altitude_m: f32) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            relative_altitude_m,
            speed_m_s: f32::NAN,
            is_fly_through: true,
            gimbal_pitch_deg: f32::NAN,
            gimbal_yaw_deg: f32::NAN,
            camera_action: CameraAction::None,
            loiter_time_s: f32::NAN,
            camera_photo_interval_s: f64::NAN,
            acceptance_radius_m: f32::NAN,
            yaw_deg: f32::NAN,
        }
    }

    fn has_position(&self) -> bool {
        self.latitude_deg.is_finite() && self.longitude_deg.is_finite()
    }
}

/// Ordered list of mission items
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MissionPlan {
    /// Items in flight order
    pub mission_items: Vec<MissionItem>,
}

impl MissionPlan {
    /// Create a plan from its items
    pub fn new(mission_items: Vec<MissionItem>) -> Self {
        Self { mission_items }
    }
}

/// Mission progress, in mission items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionProgress {
    /// Index of the item being flown, equal to `total` once finished
    pub current: usize,
    /// Number of mission items
    pub total: usize,
}

/// MAVLink items of an uploaded mission and the mission item each one comes from
#[derive(Debug, Default, Clone)]
struct AssembledMission {
    items: Vec<MISSION_ITEM_INT_DATA>,
    item_index: Vec<usize>,
    total: usize,
}

impl AssembledMission {
    fn push(
        &mut self,
        index: usize,
        command: MavCmd,
        frame: MavFrame,
        params: [f32; 4],
        (x, y, z): (i32, i32, f32),
    ) {
        let [param1, param2, param3, param4] = params;
        let seq = self.items.len() as u16;
        self.items.push(MISSION_ITEM_INT_DATA {
            param1,
            param2,
            param3,
            param4,
            x,
            y,
            z,
            seq,
            command,
            target_system: 0,
            target_component: 0,
            frame,
            current: u8::from(seq == 0),
            autocontinue: 1,
            mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
        });
        self.item_index.push(index);
    }

    fn push_command(&mut self, index: usize, command: MavCmd, params: [f32; 4], z: f32) {
        self.push(index, command, MavFrame::MAV_FRAME_MISSION, params, (0, 0, z));
    }

    fn progress(&self, seq: u16) -> Option<MissionProgress> {
        if self.items.is_empty() {
            return None;
        }
        let current = self.item_index.get(seq as usize).copied().unwrap_or(self.total);
        Some(MissionProgress {
            current,
            total: self.total,
        })
    }

    fn is_last(&self, seq: u16) -> bool {
        !self.items.is_empty() && seq as usize == self.items.len() - 1
    }
}

fn or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn degrees_e7(degrees: f64) -> i32 {
    (degrees * 1e7).round() as i32
}

fn assemble_mission(plan: &MissionPlan, return_to_launch: bool) -> Result<AssembledMission> {
    let mut mission = AssembledMission {
        total: plan.mission_items.len(),
        ..Default::default()
    };

    for (index, item) in plan.mission_items.iter().enumerate() {
        if item.has_position() {
            if !item.relative_altitude_m.is_finite() {
                return Err(Error::InvalidArgument(format!(
                    "mission item {} has no altitude",
                    index
                )));
            }
            let hold_s = if item.is_fly_through { 0.0 } else { WAYPOINT_HOLD_S };
            mission.push(
                index,
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
                [hold_s, or_zero(item.acceptance_radius_m), 0.0, item.yaw_deg],
                (
                    degrees_e7(item.latitude_deg),
                    degrees_e7(item.longitude_deg),
                    item.relative_altitude_m,
                ),
            );
        }

        if item.speed_m_s.is_finite() {
            mission.push_command(
                index,
                MavCmd::MAV_CMD_DO_CHANGE_SPEED,
                [SPEED_TYPE_GROUND, item.speed_m_s, -1.0, 0.0],
                0.0,
            );
        }

        if item.gimbal_pitch_deg.is_finite() || item.gimbal_yaw_deg.is_finite() {
            mission.push_command(
                index,
                MavCmd::MAV_CMD_DO_MOUNT_CONTROL,
                [or_zero(item.gimbal_pitch_deg), 0.0, or_zero(item.gimbal_yaw_deg), 0.0],
                MAV_MOUNT_MODE_MAVLINK_TARGETING,
            );
        }

        if item.loiter_time_s.is_finite() {
            mission.push_command(
                index,
                MavCmd::MAV_CMD_NAV_DELAY,
                [item.loiter_time_s, -1.0, -1.0, -1.0],
                0.0,
            );
        }

        match item.camera_action {
            CameraAction::None => (),
            CameraAction::TakePhoto => mission.push_command(
                index,
                MavCmd::MAV_CMD_IMAGE_START_CAPTURE,
                [0.0, 0.0, 1.0, 0.0],
                0.0,
            ),
            CameraAction::StartPhotoInterval => {
                let interval_s = item.camera_photo_interval_s;
                if !interval_s.is_finite() || interval_s <= 0.0 {
                    return Err(Error::InvalidArgument(format!(
                        "mission item {} starts a photo interval without interval",
                        index
                    )));
                }
                mission.push_command(
                    index,
                    MavCmd::MAV_CMD_IMAGE_START_CAPTURE,
                    [0.0, interval_s as f32, 0.0, 0.0],
                    0.0,
                )
            }
            CameraAction::StopPhotoInterval => {
                mission.push_command(index, MavCmd::MAV_CMD_IMAGE_STOP_CAPTURE, [0.0; 4], 0.0)
            }
            CameraAction::StartVideo => {
                mission.push_command(index, MavCmd::MAV_CMD_VIDEO_START_CAPTURE, [0.0; 4], 0.0)
            }
            CameraAction::StopVideo => {
                mission.push_command(index, MavCmd::MAV_CMD_VIDEO_STOP_CAPTURE, [0.0; 4], 0.0)
            }
        }
    }

    if return_to_launch {
        let index = mission.total;
        mission.push_command(index, MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH, [0.0; 4], 0.0);
    }

    Ok(mission)
}

/// # Access to the mission subsystem
///
/// See the [mission module documentation](crate::subsystems::mission) for more context and
/// information.
pub struct Mission {
    uplink: Sender<MavMessage>,
    transfer_downlink: Mutex<Receiver<MavMessage>>,
    commands: CommandClient,
    target: Arc<Target>,
    return_to_launch: AtomicBool,
    uploaded: Arc<std::sync::Mutex<AssembledMission>>,
    progress: Topic<MissionProgress>,
    progress_task: JoinHandle<()>,
}

impl Mission {
    pub(crate) fn new(
        uplink: Sender<MavMessage>,
        transfer_downlink: Receiver<MavMessage>,
        status_downlink: Receiver<MavMessage>,
        commands: CommandClient,
        target: Arc<Target>,
    ) -> Self {
        let uploaded: Arc<std::sync::Mutex<AssembledMission>> = Arc::default();
        let progress = Topic::new();

        let progress_task = tokio::spawn(track_progress(
            status_downlink,
            uploaded.clone(),
            progress.clone(),
        ));

        Self {
            uplink,
            transfer_downlink: Mutex::new(transfer_downlink),
            commands,
            target,
            return_to_launch: AtomicBool::new(false),
            uploaded,
            progress,
            progress_task,
        }
    }

    /// Append a return to launch once the last item is reached
    ///
    /// Takes effect on the next [Mission::upload_mission()].
    pub fn set_return_to_launch_after_mission(&self, enable: bool) {
        self.return_to_launch.store(enable, Relaxed);
    }

    /// Whether uploaded missions end with a return to launch
    pub fn get_return_to_launch_after_mission(&self) -> bool {
        self.return_to_launch.load(Relaxed)
    }

    /// Upload a mission plan, replacing the mission on the vehicle
    pub async fn upload_mission(&self, plan: &MissionPlan) -> Result<()> {
        let mut mission = assemble_mission(plan, self.get_return_to_launch_after_mission())?;
        for item in mission.items.iter_mut() {
            item.target_system = self.target.system_id();
            item.target_component = self.target.component_id();
        }

        let downlink = self.transfer_downlink.lock().await;
        // Answers from an earlier, failed, transfer
        while downlink.try_recv().is_ok() {}

        let count = mission.items.len() as u16;
        info!("Uploading mission: {} items ({} MAVLink items)", mission.total, count);
        self.uplink
            .send_async(MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
                count,
                target_system: self.target.system_id(),
                target_component: self.target.component_id(),
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
                ..Default::default()
            }))
            .await?;

        loop {
            let answer = downlink
                .wait_message(MISSION_TRANSFER_TIMEOUT, |msg| match msg {
                    MavMessage::MISSION_REQUEST_INT(request) => {
                        Some(TransferAnswer::Request(request.seq))
                    }
                    MavMessage::MISSION_REQUEST(request) => {
                        Some(TransferAnswer::Request(request.seq))
                    }
                    MavMessage::MISSION_ACK(ack)
                        if ack.mission_type == MavMissionType::MAV_MISSION_TYPE_MISSION =>
                    {
                        Some(TransferAnswer::Ack(ack.mavtype))
                    }
                    _ => None,
                })
                .await?;

            match answer {
                TransferAnswer::Request(seq) => {
                    let item = mission.items.get(seq as usize).ok_or_else(|| {
                        Error::MissionError(format!("vehicle requested item {} of {}", seq, count))
                    })?;
                    debug!("Sending mission item {}", seq);
                    self.uplink.send_async(MavMessage::MISSION_ITEM_INT(item.clone())).await?;
                }
                TransferAnswer::Ack(MavMissionResult::MAV_MISSION_ACCEPTED) => break,
                TransferAnswer::Ack(result) => {
                    return Err(Error::MissionError(format!("upload rejected: {:?}", result)));
                }
            }
        }

        if let Ok(mut uploaded) = self.uploaded.lock() {
            *uploaded = mission;
        }
        info!("Mission uploaded");
        Ok(())
    }

    /// Remove the mission from the vehicle
    pub async fn clear_mission(&self) -> Result<()> {
        let downlink = self.transfer_downlink.lock().await;

        self.uplink
            .send_async(MavMessage::MISSION_CLEAR_ALL(MISSION_CLEAR_ALL_DATA {
                target_system: self.target.system_id(),
                target_component: self.target.component_id(),
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            }))
            .await?;

        let result = downlink
            .wait_message(MISSION_TRANSFER_TIMEOUT, |msg| match msg {
                MavMessage::MISSION_ACK(ack) => Some(ack.mavtype),
                _ => None,
            })
            .await?;

        if result != MavMissionResult::MAV_MISSION_ACCEPTED {
            return Err(Error::MissionError(format!("clear rejected: {:?}", result)));
        }
        if let Ok(mut uploaded) = self.uploaded.lock() {
            *uploaded = AssembledMission::default();
        }
        Ok(())
    }

    /// Start flying the uploaded mission
    ///
    /// The vehicle needs to be armed first.
    pub async fn start_mission(&self) -> Result<()> {
        self.commands
            .send_command(
                MavCmd::MAV_CMD_DO_SET_MODE,
                [
                    MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
                    PX4_CUSTOM_MAIN_MODE_AUTO,
                    PX4_CUSTOM_SUB_MODE_AUTO_MISSION,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                ],
            )
            .await
    }

    /// Stream of mission progress
    pub fn mission_progress(&self) -> impl Stream<Item = MissionProgress> + Send + Unpin + 'static {
        self.progress.subscribe()
    }
}

impl Drop for Mission {
    fn drop(&mut self) {
        self.progress_task.abort();
    }
}

enum TransferAnswer {
    Request(u16),
    Ack(MavMissionResult),
}

async fn track_progress(
    downlink: Receiver<MavMessage>,
    uploaded: Arc<std::sync::Mutex<AssembledMission>>,
    progress: Topic<MissionProgress>,
) {
    let mut last = None;
    while let Ok(msg) = downlink.recv_async().await {
        let update = match uploaded.lock() {
            Ok(mission) => match msg {
                MavMessage::MISSION_CURRENT(current) => mission.progress(current.seq),
                MavMessage::MISSION_ITEM_REACHED(reached) if mission.is_last(reached.seq) => {
                    Some(MissionProgress {
                        current: mission.total,
                        total: mission.total,
                    })
                }
                _ => None,
            },
            Err(_) => return,
        };

        if update.is_some() && update != last {
            last = update;
            if let Some(update) = update {
                progress.publish(update);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::tests::ack;
    use futures::StreamExt;
    use mavlink::common::{
        MavResult, MISSION_ACK_DATA, MISSION_CURRENT_DATA, MISSION_ITEM_REACHED_DATA,
        MISSION_REQUEST_INT_DATA,
    };

    const LAT: f64 = 47.3977418;
    const LON: f64 = 8.5455938;

    struct Vehicle {
        uplink_rx: Receiver<MavMessage>,
        transfer_tx: Sender<MavMessage>,
        status_tx: Sender<MavMessage>,
        ack_tx: Sender<MavMessage>,
    }

    fn mission() -> (Mission, Vehicle) {
        let target = Arc::new(Target::default());
        let (uplink, uplink_rx) = flume::unbounded();
        let (transfer_tx, transfer_rx) = flume::unbounded();
        let (status_tx, status_rx) = flume::unbounded();
        let (ack_tx, ack_rx) = flume::unbounded();
        let commands = CommandClient::new(uplink.clone(), ack_rx, target.clone());
        let mission = Mission::new(uplink, transfer_rx, status_rx, commands, target);
        (
            mission,
            Vehicle {
                uplink_rx,
                transfer_tx,
                status_tx,
                ack_tx,
            },
        )
    }

    fn mission_ack(result: MavMissionResult) -> MavMessage {
        MavMessage::MISSION_ACK(MISSION_ACK_DATA {
            mavtype: result,
            mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            ..Default::default()
        })
    }

    fn hop_plan() -> MissionPlan {
        let item = |lat: f64, loiter: f32| MissionItem {
            speed_m_s: 1.0,
            loiter_time_s: loiter,
            ..MissionItem::new(lat, LON, 1.5)
        };
        MissionPlan::new(vec![item(LAT, 5.0), item(LAT + 0.00002, 1.0), item(LAT, 1.0)])
    }

    #[test]
    fn waypoint_speed_and_delay_are_assembled_in_order() {
        let mission = assemble_mission(&hop_plan(), false).unwrap();
        let commands: Vec<MavCmd> = mission.items.iter().map(|item| item.command).collect();

        assert_eq!(mission.total, 3);
        assert_eq!(mission.items.len(), 9);
        assert_eq!(
            &commands[..3],
            &[
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavCmd::MAV_CMD_DO_CHANGE_SPEED,
                MavCmd::MAV_CMD_NAV_DELAY,
            ]
        );
        assert_eq!(mission.item_index, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);

        let waypoint = &mission.items[3];
        assert_eq!(waypoint.frame, MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT);
        assert_eq!(waypoint.x, 473_977_618);
        assert_eq!(waypoint.y, 85_455_938);
        assert_eq!(waypoint.z, 1.5);
        assert_eq!(waypoint.param1, 0.0);
        assert_eq!(mission.items[5].param1, 1.0);

        assert_eq!(mission.items[0].current, 1);
        assert!(mission.items[1..].iter().all(|item| item.current == 0));
        assert!(mission.items.iter().enumerate().all(|(i, item)| item.seq as usize == i));
    }

    #[test]
    fn return_to_launch_is_appended_after_last_item() {
        let mission = assemble_mission(&hop_plan(), true).unwrap();
        let last = mission.items.last().unwrap();

        assert_eq!(last.command, MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH);
        assert_eq!(*mission.item_index.last().unwrap(), 3);
        assert_eq!(mission.progress(last.seq), Some(MissionProgress { current: 3, total: 3 }));
    }

    #[test]
    fn optional_directives() {
        let item = MissionItem {
            is_fly_through: false,
            gimbal_pitch_deg: -90.0,
            camera_action: CameraAction::TakePhoto,
            ..MissionItem::new(LAT, LON, 10.0)
        };
        let mission = assemble_mission(&MissionPlan::new(vec![item]), false).unwrap();
        let commands: Vec<MavCmd> = mission.items.iter().map(|item| item.command).collect();

        assert_eq!(
            commands,
            vec![
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavCmd::MAV_CMD_DO_MOUNT_CONTROL,
                MavCmd::MAV_CMD_IMAGE_START_CAPTURE
            ]
        );
        assert_eq!(mission.items[0].param1, WAYPOINT_HOLD_S);
        assert_eq!(mission.items[1].param1, -90.0);
        assert_eq!(mission.items[1].param3, 0.0);
    }

    #[test]
    fn photo_interval_needs_an_interval() {
        let item = MissionItem {
            camera_action: CameraAction::StartPhotoInterval,
            ..MissionItem::new(LAT, LON, 10.0)
        };
        let result = assemble_mission(&MissionPlan::new(vec![item]), false);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let item = MissionItem {
            camera_photo_interval_s: 2.0,
            ..item
        };
        let mission = assemble_mission(&MissionPlan::new(vec![item]), false).unwrap();
        assert_eq!(mission.items[1].param2, 2.0);
    }

    #[tokio::test]
    async fn upload_answers_item_requests() {
        let (mission, vehicle) = mission();
        mission.set_return_to_launch_after_mission(true);

        let answer = tokio::spawn(async move {
            let count = match vehicle.uplink_rx.recv_async().await.unwrap() {
                MavMessage::MISSION_COUNT(data) => data.count,
                other => panic!("unexpected message {:?}", other),
            };
            let mut received = Vec::new();
            for seq in 0..count {
                vehicle
                    .transfer_tx
                    .send(MavMessage::MISSION_REQUEST_INT(MISSION_REQUEST_INT_DATA {
                        seq,
                        mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
                        ..Default::default()
                    }))
                    .unwrap();
                match vehicle.uplink_rx.recv_async().await.unwrap() {
                    MavMessage::MISSION_ITEM_INT(item) => received.push(item),
                    other => panic!("unexpected message {:?}", other),
                }
            }
            vehicle.transfer_tx.send(mission_ack(MavMissionResult::MAV_MISSION_ACCEPTED)).unwrap();
            (received, vehicle)
        });

        mission.upload_mission(&hop_plan()).await.unwrap();
        let (received, vehicle) = answer.await.unwrap();

        assert_eq!(received.len(), 10);
        assert_eq!(received[9].command, MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH);

        // Progress is reported in mission items
        let mut progress = mission.mission_progress();
        for seq in [0u16, 1, 3, 6] {
            vehicle
                .status_tx
                .send(MavMessage::MISSION_CURRENT(MISSION_CURRENT_DATA {
                    seq,
                    ..Default::default()
                }))
                .unwrap();
        }
        vehicle
            .status_tx
            .send(MavMessage::MISSION_ITEM_REACHED(MISSION_ITEM_REACHED_DATA { seq: 9 }))
            .unwrap();

        let reported: Vec<MissionProgress> = progress.by_ref().take(4).collect().await;
        assert_eq!(
            reported,
            vec![
                MissionProgress { current: 0, total: 3 },
                MissionProgress { current: 1, total: 3 },
                MissionProgress { current: 2, total: 3 },
                MissionProgress { current: 3, total: 3 },
            ]
        );
    }

    #[tokio::test]
    async fn rejected_upload_is_an_error() {
        let (mission, vehicle) = mission();

        // Answers queued before MISSION_COUNT are flushed, reply once the count is seen
        let transfer_tx = vehicle.transfer_tx.clone();
        let uplink_rx = vehicle.uplink_rx.clone();
        tokio::spawn(async move {
            let _ = uplink_rx.recv_async().await;
            transfer_tx.send(mission_ack(MavMissionResult::MAV_MISSION_NO_SPACE)).unwrap();
        });

        let result = mission.upload_mission(&hop_plan()).await;
        assert!(matches!(result, Err(Error::MissionError(_))));
    }

    #[tokio::test]
    async fn start_mission_switches_to_auto_mission() {
        let (mission, vehicle) = mission();
        vehicle
            .ack_tx
            .send(ack(MavCmd::MAV_CMD_DO_SET_MODE, MavResult::MAV_RESULT_ACCEPTED))
            .unwrap();

        mission.start_mission().await.unwrap();

        match vehicle.uplink_rx.try_recv().unwrap() {
            MavMessage::COMMAND_LONG(data) => {
                assert_eq!(data.command, MavCmd::MAV_CMD_DO_SET_MODE);
                assert_eq!(data.param2, PX4_CUSTOM_MAIN_MODE_AUTO);
                assert_eq!(data.param3, PX4_CUSTOM_SUB_MODE_AUTO_MISSION);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
