//! # Flight completion watcher
//!
//! The watcher follows the in-air state of the vehicle and ends the monitoring phase of a
//! flight exactly once: when the vehicle has been seen flying and is then seen on the ground.
//!
//! At that point the auxiliary tasks registered with the watcher, for example a mission
//! progress printer, are cancelled one after the other in registration order. Each task is
//! awaited before the next one is cancelled. A task reporting its cancellation is the
//! expected outcome; a task that failed in another way, for example by panicking, is reported
//! as [Error::TaskFailed](crate::Error::TaskFailed) once all tasks have been handled.
//!
//! ``` no_run
//! # async fn fly(drone: &mavdrone::Drone) -> mavdrone::Result<()> {
//! use futures::StreamExt;
//! use mavdrone::watcher::FlightCompletionWatcher;
//!
//! let mut progress = drone.mission.mission_progress();
//! let printer = tokio::spawn(async move {
//!     while let Some(progress) = progress.next().await {
//!         println!("Mission progress: {}/{}", progress.current, progress.total);
//!     }
//! });
//!
//! drone.mission.start_mission().await?;
//!
//! FlightCompletionWatcher::new(vec![printer])
//!     .run(drone.telemetry.in_air())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use tokio::task::JoinHandle;

/// In-air state machine of the watcher
///
/// The state only ever moves from [FlightState::GroundOrUnknown] to
/// [FlightState::AirborneSeen], it is never reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    /// The vehicle has not been seen flying yet
    #[default]
    GroundOrUnknown,
    /// The vehicle has been seen flying at least once
    AirborneSeen,
}

impl FlightState {
    /// Feed one in-air sample to the state machine
    ///
    /// Returns `true` when the sample completes the flight: the vehicle is on the ground
    /// after having been seen flying.
    pub fn observe(&mut self, in_air: bool) -> bool {
        if in_air {
            *self = FlightState::AirborneSeen;
        }
        self.was_in_air() && !in_air
    }

    /// `true` once the vehicle has been seen flying
    pub fn was_in_air(&self) -> bool {
        *self == FlightState::AirborneSeen
    }
}

/// # Watcher of the end of a flight
///
/// See the [watcher module documentation](crate::watcher) for more context and information.
#[derive(Debug, Default)]
pub struct FlightCompletionWatcher {
    tasks: Vec<JoinHandle<()>>,
}

impl FlightCompletionWatcher {
    /// Create a watcher cancelling `tasks`, in this order, when the flight completes
    pub fn new(tasks: Vec<JoinHandle<()>>) -> Self {
        Self { tasks }
    }

    /// Register one more task to cancel when the flight completes
    pub fn register(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// Follow the in-air stream until the flight completes
    ///
    /// No sample is taken from the stream after the one completing the flight, the stream is
    /// dropped once all the tasks are stopped.
    ///
    /// If the stream ends before the flight completes the tasks are cancelled as well and
    /// [Error::Disconnected] is returned.
    pub async fn run<S>(self, mut in_air: S) -> Result<()>
    where
        S: Stream<Item = bool> + Unpin,
    {
        let mut state = FlightState::default();

        while let Some(sample) = in_air.next().await {
            if state.observe(sample) {
                info!("Vehicle landed, stopping {} task(s)", self.tasks.len());
                let stopped = self.stop_tasks().await;
                drop(in_air);
                return stopped;
            }
        }

        warn!("In-air stream ended before the flight completed");
        self.stop_tasks().await?;
        Err(Error::Disconnected)
    }

    async fn stop_tasks(self) -> Result<()> {
        let mut first_failure = None;

        for (index, task) in self.tasks.into_iter().enumerate() {
            task.abort();
            match task.await {
                Ok(()) => debug!("Task {} had already completed", index),
                Err(e) if e.is_cancelled() => debug!("Task {} cancelled", index),
                Err(e) => {
                    warn!("Task {} failed: {}", index, e);
                    let failure = Error::TaskFailed(format!("task {}: {}", index, e));
                    first_failure.get_or_insert(failure);
                }
            }
        }

        match first_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn completion_index(samples: &[bool]) -> Option<usize> {
        let first_true = samples.iter().position(|&sample| sample)?;
        samples[first_true..]
            .iter()
            .position(|&sample| !sample)
            .map(|offset| first_true + offset)
    }

    async fn consumed_until_completion(samples: Vec<bool>) -> (Result<()>, usize) {
        let consumed = AtomicUsize::new(0);
        let in_air = stream::iter(samples).inspect(|_| {
            consumed.fetch_add(1, Ordering::SeqCst);
        });
        let result = FlightCompletionWatcher::default().run(in_air).await;
        (result, consumed.load(Ordering::SeqCst))
    }

    struct DropRecorder {
        id: usize,
        dropped: Arc<Mutex<Vec<usize>>>,
    }

    impl Drop for DropRecorder {
        fn drop(&mut self) {
            self.dropped.lock().unwrap().push(self.id);
        }
    }

    // Takes a copy of the ids dropped so far when it is itself dropped, after `delay`
    struct DropSnapshot {
        dropped: Arc<Mutex<Vec<usize>>>,
        snapshot: Arc<Mutex<Option<Vec<usize>>>>,
        delay: Duration,
    }

    impl Drop for DropSnapshot {
        fn drop(&mut self) {
            std::thread::sleep(self.delay);
            *self.snapshot.lock().unwrap() = Some(self.dropped.lock().unwrap().clone());
        }
    }

    #[test]
    fn state_machine_never_resets() {
        let mut state = FlightState::default();
        assert!(!state.observe(false));
        assert!(!state.was_in_air());

        assert!(!state.observe(true));
        assert_eq!(state, FlightState::AirborneSeen);
        assert!(state.observe(false));
        assert!(state.was_in_air());
    }

    #[tokio::test]
    async fn completes_at_first_landing_after_flight_for_all_short_sequences() {
        for len in 0..=8 {
            for bits in 0..(1u32 << len) {
                let samples: Vec<bool> = (0..len).map(|i| bits & (1 << i) != 0).collect();
                let (result, consumed) = consumed_until_completion(samples.clone()).await;

                match completion_index(&samples) {
                    Some(index) => {
                        assert!(result.is_ok(), "{:?}", samples);
                        assert_eq!(consumed, index + 1, "{:?}", samples);
                    }
                    None => {
                        assert!(matches!(result, Err(Error::Disconnected)), "{:?}", samples);
                        assert_eq!(consumed, len, "{:?}", samples);
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn never_completes_on_the_ground() {
        let (result, consumed) = consumed_until_completion(vec![false; 20]).await;
        assert!(matches!(result, Err(Error::Disconnected)));
        assert_eq!(consumed, 20);
    }

    #[tokio::test]
    async fn completes_on_the_final_sample() {
        let (result, consumed) = consumed_until_completion(vec![true, true, false]).await;
        assert!(result.is_ok());
        assert_eq!(consumed, 3);
    }

    #[tokio::test]
    async fn stops_reading_after_the_first_landing() {
        let (result, consumed) = consumed_until_completion(vec![true, false, true, false]).await;
        assert!(result.is_ok());
        assert_eq!(consumed, 2);
    }

    #[tokio::test]
    async fn tasks_are_cancelled_in_registration_order() {
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let mut watcher = FlightCompletionWatcher::default();

        for id in 0..4 {
            let recorder = DropRecorder {
                id,
                dropped: dropped.clone(),
            };
            watcher.register(tokio::spawn(async move {
                let _recorder = recorder;
                futures::future::pending::<()>().await;
            }));
        }
        tokio::task::yield_now().await;

        watcher.run(stream::iter(vec![true, false])).await.unwrap();

        assert_eq!(*dropped.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn next_task_is_cancelled_only_once_the_previous_one_stopped() {
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let snapshot = Arc::new(Mutex::new(None));

        // The first task is slow to unwind
        let slow = DropSnapshot {
            dropped: dropped.clone(),
            snapshot: snapshot.clone(),
            delay: Duration::from_millis(100),
        };
        let first = tokio::spawn(async move {
            let _slow = slow;
            futures::future::pending::<()>().await;
        });
        let recorder = DropRecorder {
            id: 1,
            dropped: dropped.clone(),
        };
        let second = tokio::spawn(async move {
            let _recorder = recorder;
            futures::future::pending::<()>().await;
        });

        FlightCompletionWatcher::new(vec![first, second])
            .run(stream::iter(vec![true, false]))
            .await
            .unwrap();

        assert_eq!(*snapshot.lock().unwrap(), Some(vec![]));
        assert_eq!(*dropped.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn in_air_stream_is_released_after_all_tasks_stopped() {
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let snapshot = Arc::new(Mutex::new(None));

        let tasks = (0..3)
            .map(|id| {
                let recorder = DropRecorder {
                    id,
                    dropped: dropped.clone(),
                };
                tokio::spawn(async move {
                    let _recorder = recorder;
                    futures::future::pending::<()>().await;
                })
            })
            .collect();

        let release = DropSnapshot {
            dropped: dropped.clone(),
            snapshot: snapshot.clone(),
            delay: Duration::ZERO,
        };
        let in_air = stream::iter(vec![true, false]).map(move |sample| {
            let _release = &release;
            sample
        });

        FlightCompletionWatcher::new(tasks).run(in_air).await.unwrap();

        assert_eq!(*snapshot.lock().unwrap(), Some(vec![0, 1, 2]));
    }

    #[tokio::test]
    async fn task_failure_is_reported_after_all_tasks_stopped() {
        let dropped = Arc::new(Mutex::new(Vec::new()));

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let failing = tokio::spawn(async move {
            let _ = started_tx.send(());
            panic!("progress printer failed");
        });
        started_rx.await.unwrap();

        let recorder = DropRecorder {
            id: 1,
            dropped: dropped.clone(),
        };
        let pending = tokio::spawn(async move {
            let _recorder = recorder;
            futures::future::pending::<()>().await;
        });

        let result = FlightCompletionWatcher::new(vec![failing, pending])
            .run(stream::iter(vec![true, false]))
            .await;

        assert!(matches!(result, Err(Error::TaskFailed(_))));
        assert_eq!(*dropped.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn completed_task_is_not_a_failure() {
        let done = tokio::spawn(async {});
        tokio::task::yield_now().await;

        FlightCompletionWatcher::new(vec![done])
            .run(stream::iter(vec![false, true, false]))
            .await
            .unwrap();
    }
}
