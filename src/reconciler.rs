// ABOUTME: Status reconciler: merges worker snapshots with locally applied stop transitions
// ABOUTME: Snapshot decides which jobs exist, local state decides whether they are stopping

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{JobConfig, JobDraft};
use crate::error::{RemoteError, RequestError};
use crate::remote::{LifecycleApi, ServerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Active,
    Stopping,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Active => "active",
            Phase::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub target: String,
    pub phase: Phase,
}

/// The merged view handed to the presentation layer, plus the bookkeeping
/// needed to reject late results.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    records: Vec<JobRecord>,
    epoch: u64,
    open: bool,
    last_applied: u64,
}

impl JobTable {
    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn phase_of(&self, target: &str) -> Option<Phase> {
        self.records
            .iter()
            .find(|r| r.target == target)
            .map(|r| r.phase)
    }
}

/// What happened to a successfully fetched snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A newer snapshot was already applied, or the session it was fetched
    /// for has ended.
    Discarded,
}

/// Existence comes from the snapshot, phase from the current records: a
/// target still listed keeps its Stopping phase, anything unlisted is gone.
pub fn merge(current: &[JobRecord], snapshot: &ServerSnapshot) -> Vec<JobRecord> {
    let mut seen = HashSet::new();
    snapshot
        .targets()
        .iter()
        .filter(|target| seen.insert(target.as_str()))
        .map(|target| {
            let stopping = current
                .iter()
                .any(|r| &r.target == target && r.phase == Phase::Stopping);
            JobRecord {
                target: target.clone(),
                phase: if stopping {
                    Phase::Stopping
                } else {
                    Phase::Active
                },
            }
        })
        .collect()
}

struct Inner {
    api: Arc<dyn LifecycleApi>,
    table: watch::Sender<JobTable>,
    next_ticket: AtomicU64,
}

/// Owns the set of running and stopping jobs. Cheap to clone; clones share
/// the same table.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn LifecycleApi>) -> Self {
        let table = JobTable {
            open: true,
            ..JobTable::default()
        };
        let (tx, _rx) = watch::channel(table);

        Self {
            inner: Arc::new(Inner {
                api,
                table: tx,
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    pub fn records(&self) -> Vec<JobRecord> {
        self.inner.table.borrow().records.clone()
    }

    pub fn phase_of(&self, target: &str) -> Option<Phase> {
        self.inner.table.borrow().phase_of(target)
    }

    /// Receiver notified whenever the record set changes.
    pub fn subscribe(&self) -> watch::Receiver<JobTable> {
        self.inner.table.subscribe()
    }

    pub fn session_open(&self) -> bool {
        self.inner.table.borrow().open
    }

    /// Starts a fresh session with an empty table. Results of requests issued
    /// before this point are discarded when they arrive.
    pub fn begin_session(&self) {
        self.inner.table.send_modify(|table| {
            table.epoch += 1;
            table.open = true;
            table.records.clear();
        });
        debug!("Reconciler session opened");
    }

    /// Closes the session. The last known records stay readable but nothing
    /// in flight may change them any more.
    pub fn end_session(&self) {
        self.inner.table.send_if_modified(|table| {
            table.epoch += 1;
            table.open = false;
            false
        });
        debug!("Reconciler session closed");
    }

    /// Validates a draft and submits it.
    pub async fn submit(&self, draft: &JobDraft) -> Result<JobConfig, RequestError> {
        let config = draft.validate()?;
        self.request_start(&config).await?;
        Ok(config)
    }

    /// Asks the worker to start a job. Nothing is added locally; the job
    /// shows up once a snapshot lists it.
    pub async fn request_start(&self, config: &JobConfig) -> Result<(), RemoteError> {
        if let Err(e) = self.inner.api.start(config).await {
            warn!("Failed to start job for {}: {}", config.target(), e);
            return Err(e);
        }

        info!(
            "Started job for {}:{} (max_connections={}, threads={})",
            config.target(),
            config.port(),
            config.max_connections(),
            config.thread_count()
        );

        if let Err(e) = self.refresh().await {
            warn!("Status refresh after start failed: {}", e);
        }
        Ok(())
    }

    /// Marks `target` as stopping right away, then asks the worker to stop
    /// it and refreshes whatever the outcome.
    ///
    /// The Stopping transition is applied when this method is called, not
    /// when the returned future is first polled. A failed stop does not
    /// revert it; the next snapshot is authoritative.
    pub fn request_stop(
        &self,
        target: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send + 'static {
        self.mark_stopping(target);

        let this = self.clone();
        let target = target.to_string();
        async move {
            let result = this.inner.api.stop(&target).await;
            match &result {
                Ok(()) => info!("Stop requested for {}", target),
                Err(e) => warn!("Failed to stop job for {}: {}", target, e),
            }

            if let Err(e) = this.refresh().await {
                warn!("Status refresh after stop failed: {}", e);
            }
            result
        }
    }

    fn mark_stopping(&self, target: &str) {
        let marked = self.inner.table.send_if_modified(|table| {
            if !table.open {
                return false;
            }
            match table.records.iter_mut().find(|r| r.target == target) {
                Some(record) if record.phase == Phase::Active => {
                    record.phase = Phase::Stopping;
                    true
                }
                _ => false,
            }
        });
        if marked {
            debug!("Marked {} as stopping", target);
        }
    }

    /// Fetches a snapshot and merges it. On failure the table is untouched
    /// and the error is handed back for logging.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RemoteError> {
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = self.inner.table.borrow().epoch;

        let snapshot = self.inner.api.list_status().await?;
        Ok(self.apply_snapshot(ticket, epoch, &snapshot))
    }

    fn apply_snapshot(&self, ticket: u64, epoch: u64, snapshot: &ServerSnapshot) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::Discarded;
        self.inner.table.send_if_modified(|table| {
            if !table.open || table.epoch != epoch || ticket <= table.last_applied {
                return false;
            }
            table.last_applied = ticket;
            outcome = RefreshOutcome::Applied;

            let merged = merge(&table.records, snapshot);
            if merged == table.records {
                return false;
            }
            table.records = merged;
            true
        });

        match outcome {
            RefreshOutcome::Applied => debug!(
                "Applied snapshot #{} with {} running target(s)",
                ticket,
                snapshot.targets().len()
            ),
            RefreshOutcome::Discarded => debug!("Discarded stale snapshot #{}", ticket),
        }
        outcome
    }
}
