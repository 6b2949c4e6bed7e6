use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::queue::WorkerState;

/// Point-in-time view of a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Items accepted by `enqueue`.
    pub enqueued: u64,
    /// Items rejected by `enqueue` (paused with `enqueue_when_stopped = false`, or shut down).
    pub dropped: u64,
    /// Handler calls that returned `Ok`.
    pub processed: u64,
    /// Handler calls that failed or panicked.
    pub failed: u64,
    /// Items discarded by `clear`, explicit or on pause.
    pub cleared: u64,
    /// Items buffered right now.
    pub backlog: usize,
    pub running: bool,
    pub worker: WorkerState,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) enqueued: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) processed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) cleared: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, backlog: usize, running: bool, worker: WorkerState) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
            backlog,
            running,
            worker,
        }
    }
}
