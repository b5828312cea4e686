//! COMMAND_LONG request/acknowledge client shared by the action and mission subsystems

use crate::link::{Target, WaitForMessage};
use crate::{Error, Result};
use flume::{Receiver, Sender};
use futures::lock::Mutex;
use log::debug;
use mavlink::common::{MavCmd, MavMessage, MavResult, COMMAND_LONG_DATA};
use std::sync::Arc;
use std::time::Duration;

/// Time allowed for the vehicle to acknowledge a command
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub(crate) struct CommandClient {
    uplink: Sender<MavMessage>,
    ack_downlink: Arc<Mutex<Receiver<MavMessage>>>,
    target: Arc<Target>,
}

impl CommandClient {
    pub(crate) fn new(
        uplink: Sender<MavMessage>,
        ack_downlink: Receiver<MavMessage>,
        target: Arc<Target>,
    ) -> Self {
        Self {
            uplink,
            ack_downlink: Arc::new(Mutex::new(ack_downlink)),
            target,
        }
    }

    /// Send a command and wait for it to be accepted
    ///
    /// Only one command is in flight at a time. Acknowledges for other commands, left over
    /// from earlier fire-and-forget requests, are skipped.
    pub(crate) async fn send_command(&self, command: MavCmd, params: [f32; 7]) -> Result<()> {
        let ack_downlink = self.ack_downlink.lock().await;
        // Late acknowledges of commands that already timed out
        while ack_downlink.try_recv().is_ok() {}

        self.uplink
            .send_async(self.command_long(command, params))
            .await
            .map_err(|_| Error::Disconnected)?;
        debug!("Sent {:?}", command);

        loop {
            let result = ack_downlink
                .wait_message(COMMAND_TIMEOUT, |msg| match msg {
                    MavMessage::COMMAND_ACK(ack) if ack.command == command => Some(ack.result),
                    _ => None,
                })
                .await?;

            match result {
                MavResult::MAV_RESULT_ACCEPTED => return Ok(()),
                MavResult::MAV_RESULT_IN_PROGRESS => continue,
                denied => {
                    return Err(Error::CommandDenied(format!("{:?}: {:?}", command, denied)));
                }
            }
        }
    }

    /// Send a command without waiting for its acknowledge
    pub(crate) async fn send_command_no_ack(
        &self,
        command: MavCmd,
        params: [f32; 7],
    ) -> Result<()> {
        self.uplink
            .send_async(self.command_long(command, params))
            .await
            .map_err(|_| Error::Disconnected)?;
        Ok(())
    }

    fn command_long(&self, command: MavCmd, params: [f32; 7]) -> MavMessage {
        let [param1, param2, param3, param4, param5, param6, param7] = params;
        MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1,
            param2,
            param3,
            param4,
            param5,
            param6,
            param7,
            command,
            target_system: self.target.system_id(),
            target_component: self.target.component_id(),
            confirmation: 0,
        })
    }
}
