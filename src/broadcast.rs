//! Latest-value fan-out used by the telemetry streams
//!
//! Each telemetry topic keeps the last value received from the vehicle. A new subscriber
//! first gets that value, then every value published afterwards. Slow subscribers lose the
//! oldest values instead of blocking the publisher.

use async_broadcast::{broadcast, InactiveReceiver, Sender};
use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex};

const TOPIC_CAPACITY: usize = 100;

pub(crate) struct Topic<T> {
    latest: Arc<Mutex<Option<T>>>,
    sender: Sender<T>,
    receiver: InactiveReceiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Topic<T> {
    pub(crate) fn new() -> Self {
        let (mut sender, receiver) = broadcast(TOPIC_CAPACITY);
        sender.set_overflow(true);
        sender.set_await_active(false);

        Self {
            latest: Arc::default(),
            sender,
            receiver: receiver.deactivate(),
        }
    }

    pub(crate) fn publish(&self, value: T) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(value.clone());
        }
        // No active subscriber is not an error
        let _ = self.sender.try_broadcast(value);
    }

    pub(crate) fn latest(&self) -> Option<T> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    pub(crate) fn subscribe(&self) -> impl Stream<Item = T> + Send + Unpin + 'static {
        let mut updates = self.receiver.activate_cloned();
        let latest = self.latest();

        Box::pin(async_stream::stream! {
            if let Some(value) = latest {
                yield value;
            }
            while let Some(value) = updates.next().await {
                yield value;
            }
        })
    }
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            latest: self.latest.clone(),
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}
