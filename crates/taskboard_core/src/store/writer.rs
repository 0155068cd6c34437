//! Background snapshot writer.
//!
//! # Responsibility
//! - Accept snapshots from the store without blocking the caller.
//! - Write them to the gateway one at a time on a spawned task.
//! - Publish the outcome of each attempt as a `SaveStatus`.
//!
//! # Invariants
//! - Scheduling is synchronous and never awaits I/O.
//! - Snapshots scheduled while a write is in flight are coalesced; only the
//!   newest one is written next (last write wins).
//! - With a debounce, a write happens once no new snapshot arrived for the
//!   whole debounce period; each new snapshot restarts the wait.
//! - A failed write is reported and never retried; the next scheduled
//!   snapshot supersedes it.

use crate::gateway::PersistenceGateway;
use crate::model::snapshot::Snapshot;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Progress of write-through persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStatus {
    /// Generation of the newest snapshot handed to the writer.
    pub scheduled: u64,
    /// Generation of the newest snapshot whose write attempt finished.
    pub completed: u64,
    /// Generation of the newest snapshot written successfully.
    pub persisted: u64,
    /// Number of writes attempted. Coalesced snapshots share one attempt.
    pub attempts: u64,
    pub failures: u64,
    /// Message of the most recent failed attempt, cleared by a success.
    pub last_error: Option<String>,
}

impl SaveStatus {
    pub fn is_settled(&self) -> bool {
        self.completed >= self.scheduled
    }
}

#[derive(Debug, Clone, Default)]
struct PendingSave {
    generation: u64,
    snapshot: Option<Arc<Snapshot>>,
}

pub(crate) struct SnapshotWriter {
    pending: watch::Sender<PendingSave>,
    status: watch::Receiver<SaveStatus>,
    worker: JoinHandle<()>,
    scheduled: u64,
}

impl SnapshotWriter {
    /// Spawns the writer task on the current tokio runtime.
    pub fn spawn(gateway: Arc<PersistenceGateway>, debounce: Duration) -> Self {
        let (pending_tx, pending_rx) = watch::channel(PendingSave::default());
        let (status_tx, status_rx) = watch::channel(SaveStatus::default());
        let worker = tokio::spawn(run_writer(gateway, pending_rx, status_tx, debounce));
        Self {
            pending: pending_tx,
            status: status_rx,
            worker,
            scheduled: 0,
        }
    }

    /// Hands `snapshot` to the writer and returns its generation.
    pub fn schedule(&mut self, snapshot: Snapshot) -> u64 {
        self.scheduled += 1;
        let generation = self.scheduled;
        self.pending.send_replace(PendingSave {
            generation,
            snapshot: Some(Arc::new(snapshot)),
        });
        generation
    }

    pub fn status(&self) -> SaveStatus {
        let mut status = self.status.borrow().clone();
        status.scheduled = self.scheduled;
        status
    }

    /// Waits until the newest scheduled snapshot has been attempted.
    pub async fn flush(&self) {
        let target = self.scheduled;
        let mut status = self.status.clone();
        if status.wait_for(|report| report.completed >= target).await.is_err() {
            warn!("event=save_flush module=store status=error reason=writer_stopped");
        }
    }

    /// Flushes, then stops the writer task.
    pub async fn shutdown(self) {
        self.flush().await;
        let Self {
            pending, worker, ..
        } = self;
        drop(pending);
        if let Err(err) = worker.await {
            warn!(
                "event=save_writer_stop module=store status=error error={}",
                err
            );
        }
    }
}

async fn run_writer(
    gateway: Arc<PersistenceGateway>,
    mut pending: watch::Receiver<PendingSave>,
    status: watch::Sender<SaveStatus>,
    debounce: Duration,
) {
    while pending.changed().await.is_ok() {
        if !debounce.is_zero() {
            wait_until_quiet(&mut pending, debounce).await;
        }

        let (generation, snapshot) = {
            let latest = pending.borrow_and_update();
            (latest.generation, latest.snapshot.clone())
        };
        let Some(snapshot) = snapshot else {
            continue;
        };

        let result = gateway.save(&snapshot).await;
        status.send_modify(|report| {
            report.attempts += 1;
            report.completed = generation;
            match &result {
                Ok(()) => {
                    report.persisted = generation;
                    report.last_error = None;
                }
                Err(err) => {
                    report.failures += 1;
                    report.last_error = Some(err.to_string());
                }
            }
        });

        match result {
            Ok(()) => debug!(
                "event=save_committed module=store status=ok generation={}",
                generation
            ),
            Err(err) => warn!(
                "event=save_failed module=store status=error generation={} error_code={} {}",
                generation,
                err.kind().as_str(),
                err.log_detail()
            ),
        }
    }
    debug!("event=save_writer_stop module=store status=ok");
}

/// Returns once `debounce` passed without a new snapshot, or the store side
/// hung up.
async fn wait_until_quiet(pending: &mut watch::Receiver<PendingSave>, debounce: Duration) {
    loop {
        tokio::select! {
            changed = pending.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            () = tokio::time::sleep(debounce) => return,
        }
    }
}
