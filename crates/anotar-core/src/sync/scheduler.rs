//! Recurring sync timer

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Fires a tick callback at a fixed interval
///
/// Each tick runs in its own task, so a tick that stalls on the network never
/// delays the next one. Overlap protection belongs to the callback.
#[derive(Debug, Default)]
pub struct SyncScheduler {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the timer
    ///
    /// Returns `false` without doing anything if a timer is already running.
    /// The first tick fires one full `period` after starting. Must be called
    /// from within a Tokio runtime.
    pub fn start<F, Fut>(&self, period: Duration, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut handle = self.handle();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Sync timer already running");
            return false;
        }

        debug!(?period, "Starting sync timer");
        *handle = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tokio::spawn(tick());
            }
        }));
        true
    }

    /// Stop the timer; ticks already spawned run to completion
    pub fn stop(&self) {
        if let Some(handle) = self.handle().take() {
            debug!("Stopping sync timer");
            handle.abort();
        }
    }

    /// Whether a timer is active
    pub fn is_running(&self) -> bool {
        self.handle().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
