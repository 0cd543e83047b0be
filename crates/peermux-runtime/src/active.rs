//! Active set - the table of running peer workers
//!
//! The set is owned by the multiplexer loop and only ever mutated through
//! `&mut self`, so there is exactly one writer by construction. Each entry
//! holds the cancellation scope of one live worker.
//!
//! Reconciliation against a freshly resolved peer list is minimal:
//! - present before and now: handle moved over untouched, no restart
//! - new: child scope of the parent lifetime, worker spawned
//! - gone: handle canceled exactly once and dropped
//!
//! A peer listed twice in one resolution is only started once; later
//! occurrences are reported as duplicates and otherwise ignored.

use std::collections::HashMap;
use std::fmt;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use peermux_core::{PeerAddr, StreamOpener};

use crate::{run_worker, Delay, RecordSink, WorkerContext};

/// Identity of one spawned worker, unique within an [`ActiveSet`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Worker({})", self.0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cancellation capability for one running worker.
///
/// Dropping the handle cancels the worker too, so a worker can never
/// outlive the entry that owns it.
pub struct WorkerHandle {
    id: WorkerId,
    lifetime: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// The worker's own scope, a child of the run's root lifetime
    pub fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    pub fn is_cancelled(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Request termination of the current and all future read attempts
    pub fn cancel(self) {
        self.lifetime.cancel();
    }

    /// Cancel and wait for the worker task to finish
    pub async fn join(mut self) {
        self.lifetime.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if err.is_panic() {
                    tracing::error!(worker = %self.id, "peer worker panicked");
                }
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Actions taken by one reconciliation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Peers that got a new worker, in resolution order
    pub started: Vec<PeerAddr>,
    /// Peers whose worker was canceled, sorted
    pub stopped: Vec<PeerAddr>,
    /// Workers carried over untouched
    pub retained: usize,
    /// Repeated entries skipped within this resolution
    pub duplicates: Vec<PeerAddr>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}

/// Running workers keyed by peer address
#[derive(Debug, Default)]
pub struct ActiveSet {
    workers: HashMap<PeerAddr, WorkerHandle>,
    next_id: u64,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn contains(&self, addr: &PeerAddr) -> bool {
        self.workers.contains_key(addr)
    }

    pub fn get(&self, addr: &PeerAddr) -> Option<&WorkerHandle> {
        self.workers.get(addr)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerAddr> {
        self.workers.keys()
    }

    /// Bring the set in line with `desired`.
    ///
    /// New workers run on child scopes of `parent`, so canceling `parent`
    /// stops every worker this set ever started.
    pub fn reconcile<O, S, D, I>(
        &mut self,
        parent: &CancellationToken,
        desired: I,
        ctx: &WorkerContext<O, S, D>,
    ) -> ReconcileReport
    where
        O: StreamOpener,
        S: RecordSink,
        D: Delay,
        I: IntoIterator<Item = PeerAddr>,
    {
        let mut previous = std::mem::take(&mut self.workers);
        let mut next = HashMap::with_capacity(previous.len());
        let mut report = ReconcileReport::default();

        for addr in desired {
            if next.contains_key(&addr) {
                tracing::warn!(peer = %addr, "duplicate peer in resolution, ignoring");
                report.duplicates.push(addr);
                continue;
            }

            match previous.remove(&addr) {
                Some(handle) => {
                    next.insert(addr, handle);
                    report.retained += 1;
                }
                None => {
                    let handle = self.spawn(parent, addr.clone(), ctx);
                    tracing::info!(peer = %addr, worker = %handle.id(), "peer worker started");
                    next.insert(addr.clone(), handle);
                    report.started.push(addr);
                }
            }
        }

        for (addr, handle) in previous {
            tracing::info!(peer = %addr, worker = %handle.id(), "peer worker stopped");
            handle.cancel();
            report.stopped.push(addr);
        }
        report.stopped.sort();

        self.workers = next;
        report
    }

    fn spawn<O, S, D>(
        &mut self,
        parent: &CancellationToken,
        addr: PeerAddr,
        ctx: &WorkerContext<O, S, D>,
    ) -> WorkerHandle
    where
        O: StreamOpener,
        S: RecordSink,
        D: Delay,
    {
        self.next_id += 1;
        let lifetime = parent.child_token();
        let task = tokio::spawn(run_worker(lifetime.clone(), ctx.clone(), addr));

        WorkerHandle {
            id: WorkerId(self.next_id),
            lifetime,
            task: Some(task),
        }
    }

    /// Cancel every worker and wait until all of them have returned
    pub async fn shutdown(mut self) {
        let handles: Vec<WorkerHandle> = self.workers.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.lifetime.cancel();
        }
        for handle in handles {
            handle.join().await;
        }
    }
}
