//! Single-slot delayed round reset.

use derive_more::{Display, Error};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

#[derive(Debug)]
struct PendingReset {
    generation: u64,
    task: JoinHandle<()>,
}

/// Holds at most one pending reset timer.
///
/// Arming replaces any pending timer. Every arm gets a new generation
/// number, and the fire path must [`claim`](Self::claim) its generation
/// before acting: only the most recently armed generation can be claimed,
/// so a superseded timer that already woke up does nothing.
///
/// Timers run on the runtime that was current when the scheduler was
/// created, so arming works from plain threads as well. Without one, the
/// runtime current at arm time is used.
#[derive(Debug)]
pub struct RoundResetScheduler {
    pending: Option<PendingReset>,
    generation: u64,
    runtime: Option<Handle>,
}

impl Default for RoundResetScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundResetScheduler {
    /// Creates a scheduler bound to the current runtime, if any.
    pub fn new() -> Self {
        Self {
            pending: None,
            generation: 0,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Cancels any pending timer and arms a new one.
    ///
    /// `on_fire` runs on the Tokio runtime after `delay` with the generation
    /// returned here.
    ///
    /// # Errors
    ///
    /// Returns [`NoRuntime`] when no runtime is reachable; nothing is armed
    /// and any previously pending timer is cancelled.
    #[instrument(skip(self, on_fire))]
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F) -> Result<u64, NoRuntime>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        let runtime = match &self.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current().map_err(|_| NoRuntime)?,
        };
        self.generation += 1;
        let generation = self.generation;

        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation);
        });
        self.pending = Some(PendingReset { generation, task });

        debug!(generation, "Reset armed");
        Ok(generation)
    }

    /// Takes ownership of a firing timer.
    ///
    /// Returns true and clears the slot only if `generation` is the one
    /// currently armed.
    pub fn claim(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
                true
            }
            _ => {
                debug!(generation, "Stale reset ignored");
                false
            }
        }
    }

    /// Cancels the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.task.abort();
                debug!(generation = pending.generation, "Reset cancelled");
                true
            }
            None => false,
        }
    }

    /// True while a timer is armed and not yet claimed.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Generation of the most recent arm.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// No Tokio runtime was available to run the timer on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("No Tokio runtime available for the reset timer")]
pub struct NoRuntime;

impl Drop for RoundResetScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn() -> Box<dyn FnOnce(u64) + Send>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let make = move || {
            let sink = sink.clone();
            Box::new(move |generation| sink.lock().unwrap().push(generation))
                as Box<dyn FnOnce(u64) + Send>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let (fired, make) = recorder();
        let mut scheduler = RoundResetScheduler::new();
        let generation = scheduler.arm(Duration::from_secs(2), make()).unwrap();

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec![generation]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_timer() {
        let (fired, make) = recorder();
        let mut scheduler = RoundResetScheduler::new();
        scheduler.arm(Duration::from_secs(2), make()).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = scheduler.arm(Duration::from_secs(2), make()).unwrap();

        // The first timer would have fired at 2s.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*fired.lock().unwrap(), vec![second]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let (fired, make) = recorder();
        let mut scheduler = RoundResetScheduler::new();
        scheduler.arm(Duration::from_secs(2), make()).unwrap();
        assert!(scheduler.cancel());
        assert!(!scheduler.is_pending());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(fired.lock().unwrap().is_empty());
        assert!(!scheduler.cancel());
    }

    #[tokio::test]
    async fn test_only_latest_generation_can_be_claimed() {
        let mut scheduler = RoundResetScheduler::new();
        let first = scheduler.arm(Duration::from_secs(60), |_| {}).unwrap();
        let second = scheduler.arm(Duration::from_secs(60), |_| {}).unwrap();

        assert!(!scheduler.claim(first));
        assert!(scheduler.is_pending());
        assert!(scheduler.claim(second));
        assert!(!scheduler.is_pending());
        assert!(!scheduler.claim(second));
    }

    #[test]
    fn test_arm_without_runtime_fails_cleanly() {
        let mut scheduler = RoundResetScheduler::new();
        assert_eq!(scheduler.arm(Duration::from_secs(2), |_| {}), Err(NoRuntime));
        assert!(!scheduler.is_pending());
        assert_eq!(scheduler.generation(), 0);
    }

    #[test]
    fn test_timer_runs_on_runtime_captured_at_creation() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let mut scheduler = {
            let _entered = runtime.enter();
            RoundResetScheduler::new()
        };
        let (fired, make) = recorder();

        let generation = scheduler.arm(Duration::from_secs(2), make()).unwrap();
        runtime.block_on(async { tokio::time::sleep(Duration::from_secs(3)).await });
        assert_eq!(*fired.lock().unwrap(), vec![generation]);
    }
}
