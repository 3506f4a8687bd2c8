// ABOUTME: Polling scheduler that keeps the reconciler fresh while a view is active
// ABOUTME: Activation returns a handle; deactivating or dropping it stops the timer and ends the session

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::reconciler::{Reconciler, RefreshOutcome};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct PollingScheduler {
    interval: Duration,
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollingScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Opens a new reconciler session, refreshes once right away and then on
    /// every interval until the returned handle is deactivated or dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn activate(&self, reconciler: Reconciler) -> PollHandle {
        reconciler.begin_session();

        let token = CancellationToken::new();
        let task = tokio::spawn(poll_loop(reconciler.clone(), self.interval, token.clone()));
        debug!("Polling every {:?}", self.interval);

        PollHandle {
            reconciler,
            token,
            task: Some(task),
        }
    }
}

async fn poll_loop(reconciler: Reconciler, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Not raced against cancellation: a poll in flight at deactivation
        // completes and its snapshot is discarded by the closed session.
        if let Err(e) = reconciler.refresh().await {
            warn!("Status poll failed, keeping last known state: {}", e);
        }
    }

    debug!("Polling stopped");
}

/// Keeps polling alive. Released with [`PollHandle::deactivate`] or on drop.
pub struct PollHandle {
    reconciler: Reconciler,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// User-triggered refresh. Goes through the same path as a timer tick and
    /// leaves the timer alone.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, RemoteError> {
        self.reconciler.refresh().await
    }

    /// Stops the timer and ends the session. Does not wait for a poll that
    /// is already in flight; its result is discarded when it lands.
    pub fn deactivate(mut self) {
        self.release();
        self.task.take();
    }

    fn release(&self) {
        self.token.cancel();
        self.reconciler.end_session();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.release();
        }
    }
}
