//! # Parameter subsystem
//!
//! Autopilots expose their configuration as named parameters of at most 16 characters.
//! This subsystem reads and writes single float parameters, which is what the flight
//! scripts need (for example `MIS_TAKEOFF_ALT` on PX4).
//!
//! A write is confirmed by the vehicle echoing the new value in a `PARAM_VALUE` message.

use crate::link::{Target, WaitForMessage};
use crate::{Error, Result};
use flume::{Receiver, Sender};
use futures::lock::Mutex;
use log::debug;
use mavlink::common::{MavMessage, MavParamType, PARAM_REQUEST_READ_DATA, PARAM_SET_DATA};
use std::sync::Arc;
use std::time::Duration;

const PARAM_ID_LEN: usize = 16;
const PARAM_TIMEOUT: Duration = Duration::from_secs(3);

/// # Access to the parameter subsystem
///
/// See the [param module documentation](crate::subsystems::param) for more context and information.
pub struct Param {
    uplink: Sender<MavMessage>,
    downlink: Mutex<Receiver<MavMessage>>,
    target: Arc<Target>,
}

fn encode_param_id(name: &str) -> Result<[u8; PARAM_ID_LEN]> {
    if name.is_empty() || name.len() > PARAM_ID_LEN || !name.is_ascii() {
        return Err(Error::InvalidArgument(format!("invalid parameter name {:?}", name)));
    }
    let mut id = [0u8; PARAM_ID_LEN];
    id[..name.len()].copy_from_slice(name.as_bytes());
    Ok(id)
}

fn decode_param_id(id: &[u8]) -> String {
    id.iter().take_while(|&&c| c != 0).map(|&c| c as char).collect()
}

impl Param {
    pub(crate) fn new(
        uplink: Sender<MavMessage>,
        downlink: Receiver<MavMessage>,
        target: Arc<Target>,
    ) -> Self {
        Self {
            uplink,
            downlink: Mutex::new(downlink),
            target,
        }
    }

    /// Read a float parameter
    pub async fn get_param_float(&self, name: &str) -> Result<f32> {
        let param_id = encode_param_id(name)?;
        let downlink = self.downlink.lock().await;

        let request = MavMessage::PARAM_REQUEST_READ(PARAM_REQUEST_READ_DATA {
            param_index: -1,
            target_system: self.target.system_id(),
            target_component: self.target.component_id(),
            param_id,
        });
        self.uplink.send_async(request).await?;

        let value = self.wait_value(&downlink, name).await?;
        debug!("Param {} = {}", name, value);
        Ok(value)
    }

    /// Write a float parameter and wait for the vehicle to confirm it
    pub async fn set_param_float(&self, name: &str, value: f32) -> Result<()> {
        let param_id = encode_param_id(name)?;
        let downlink = self.downlink.lock().await;

        let request = MavMessage::PARAM_SET(PARAM_SET_DATA {
            param_value: value,
            target_system: self.target.system_id(),
            target_component: self.target.component_id(),
            param_id,
            param_type: MavParamType::MAV_PARAM_TYPE_REAL32,
        });
        self.uplink.send_async(request).await?;

        let confirmed = self.wait_value(&downlink, name).await?;
        if confirmed != value {
            return Err(Error::ParamError(format!(
                "{} set to {} but vehicle reports {}",
                name, value, confirmed
            )));
        }
        Ok(())
    }

    async fn wait_value(&self, downlink: &Receiver<MavMessage>, name: &str) -> Result<f32> {
        downlink
            .wait_message(PARAM_TIMEOUT, |msg| match msg {
                MavMessage::PARAM_VALUE(value) if decode_param_id(&value.param_id) == name => {
                    Some(value.param_value)
                }
                _ => None,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::PARAM_VALUE_DATA;

    fn param_value(name: &str, value: f32) -> MavMessage {
        MavMessage::PARAM_VALUE(PARAM_VALUE_DATA {
            param_value: value,
            param_id: encode_param_id(name).unwrap(),
            param_type: MavParamType::MAV_PARAM_TYPE_REAL32,
            ..Default::default()
        })
    }

    #[test]
    fn param_names_are_limited_to_16_ascii_characters() {
        assert!(encode_param_id("MIS_TAKEOFF_ALT").is_ok());
        assert!(encode_param_id("SIXTEEN_CHARS_OK").is_ok());
        assert!(matches!(encode_param_id("SEVENTEEN_CHARS_X"), Err(Error::InvalidArgument(_))));
        assert!(matches!(encode_param_id(""), Err(Error::InvalidArgument(_))));
        let id = encode_param_id("MIS_TAKEOFF_ALT").unwrap();
        assert_eq!(decode_param_id(&id), "MIS_TAKEOFF_ALT");
    }

    #[tokio::test]
    async fn get_skips_other_parameters() {
        let (uplink, uplink_rx) = flume::unbounded();
        let (tx, downlink) = flume::unbounded();
        let param = Param::new(uplink, downlink, Arc::new(Target::default()));

        tx.send(param_value("MPC_XY_VEL_MAX", 12.0)).unwrap();
        tx.send(param_value("MIS_TAKEOFF_ALT", 2.5)).unwrap();

        assert_eq!(param.get_param_float("MIS_TAKEOFF_ALT").await.unwrap(), 2.5);
        assert!(matches!(uplink_rx.try_recv().unwrap(), MavMessage::PARAM_REQUEST_READ(_)));
    }

    #[tokio::test]
    async fn set_is_confirmed_by_echo() {
        let (uplink, uplink_rx) = flume::unbounded();
        let (tx, downlink) = flume::unbounded();
        let param = Param::new(uplink, downlink, Arc::new(Target::default()));

        tx.send(param_value("MIS_TAKEOFF_ALT", 1.5)).unwrap();
        param.set_param_float("MIS_TAKEOFF_ALT", 1.5).await.unwrap();

        match uplink_rx.try_recv().unwrap() {
            MavMessage::PARAM_SET(data) => assert_eq!(data.param_value, 1.5),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejected_set_is_an_error() {
        let (uplink, _uplink_rx) = flume::unbounded();
        let (tx, downlink) = flume::unbounded();
        let param = Param::new(uplink, downlink, Arc::new(Target::default()));

        tx.send(param_value("MIS_TAKEOFF_ALT", 2.5)).unwrap();
        let result = param.set_param_float("MIS_TAKEOFF_ALT", 1.5).await;
        assert!(matches!(result, Err(Error::ParamError(_))));
    }
}
