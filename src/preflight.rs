//! # Pre-flight waits
//!
//! Helpers waiting for the vehicle to be ready before a flight: discovered on the link, with
//! a global position estimate and a home position.
//!
//! None of these waits has a timeout. They return only when the vehicle reaches the awaited
//! state, or with [Error::Disconnected](crate::Error::Disconnected) when the underlying stream
//! ends. Wrap them in [tokio::time::timeout()] to bound them.

use crate::subsystems::telemetry::Position;
use crate::{Drone, Error, Result};
use futures::{Stream, StreamExt};
use log::debug;

/// Wait for the first item of `stream` accepted by `predicate`
///
/// Returns [Error::Disconnected] if the stream ends first.
pub async fn first_matching<S, T, F>(mut stream: S, mut predicate: F) -> Result<T>
where
    S: Stream<Item = T> + Unpin,
    F: FnMut(&T) -> bool,
{
    while let Some(item) = stream.next().await {
        if predicate(&item) {
            return Ok(item);
        }
    }
    Err(Error::Disconnected)
}

/// Wait until the vehicle heartbeat is received
pub async fn wait_until_connected(drone: &Drone) -> Result<()> {
    first_matching(drone.core.connection_state(), |state| state.is_connected).await?;
    debug!("Vehicle {} connected", drone.system_id());
    Ok(())
}

/// Wait until the vehicle has a global position estimate
pub async fn wait_for_global_position(drone: &Drone) -> Result<()> {
    first_matching(drone.telemetry.health(), |health| health.is_global_position_ok).await?;
    Ok(())
}

/// Get the home position of the vehicle, waiting for it if not yet known
pub async fn fetch_home(drone: &Drone) -> Result<Position> {
    let home = drone.telemetry.home().await?;
    first_matching(home, |_| true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn first_matching_skips_rejected_items() {
        let found = first_matching(stream::iter(vec![1, 3, 4, 6]), |n| n % 2 == 0).await;
        assert_eq!(found.unwrap(), 4);
    }

    #[tokio::test]
    async fn first_matching_reports_end_of_stream() {
        let found = first_matching(stream::iter(vec![false, false]), |ok| *ok).await;
        assert!(matches!(found, Err(Error::Disconnected)));
    }

    #[tokio::test]
    async fn first_matching_waits_for_late_items() {
        let (tx, rx) = flume::unbounded();
        let waiter = tokio::spawn(first_matching(rx.into_stream(), |ok: &bool| *ok));

        tx.send_async(false).await.unwrap();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        tx.send_async(true).await.unwrap();
        assert!(waiter.await.unwrap().unwrap());
    }
}
