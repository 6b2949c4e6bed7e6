//! Worker state machine.

use serde::{Deserialize, Serialize};

/// Where the worker loop currently is.
///
/// State transitions:
/// - Draining <-> WaitingForWork (queue empties / an item arrives)
/// - Draining | WaitingForWork -> Paused (stop)
/// - Paused -> Draining (start)
/// - any -> Terminated (shutdown)
/// - WaitingForWork | Paused -> Terminated (handle dropped, nothing left to deliver)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    /// Running, an item was just taken off the queue.
    Draining,

    /// Running, queue empty, blocked on `has_work`.
    WaitingForWork,

    /// Not running, blocked on `is_running`.
    Paused,

    /// Shut down. The worker thread has exited or is about to.
    Terminated,
}

impl WorkerState {
    /// Next state given what the loop observed.
    ///
    /// `running` is the current flag and `took_item` whether a pop succeeded.
    /// A detached worker still drains accepted items, but never blocks again.
    pub fn next(self, closed: bool, detached: bool, running: bool, took_item: bool) -> Self {
        if closed || self.is_terminal() {
            WorkerState::Terminated
        } else if running && took_item {
            WorkerState::Draining
        } else if detached {
            WorkerState::Terminated
        } else if !running {
            WorkerState::Paused
        } else {
            WorkerState::WaitingForWork
        }
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Terminated)
    }
}
