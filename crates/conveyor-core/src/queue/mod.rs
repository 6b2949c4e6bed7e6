//! Queue module: the shared FIFO, the running-state controller and the `WorkQueue` handle.
//!
//! # 同期プロトコル
//! - `items` は queue lock の下でのみ触る
//! - `running` は transition lock の下でのみ書き換える（読みは lock-free）
//! - 2 つの lock を同時に保持することはない（enqueue と set_running のデッドロック防止）
//! - `has_work` / `is_running` は auto-reset の二値 signal。reset/set の順序が肝

mod signal;
mod state;

pub use state::WorkerState;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::debug;
use ulid::Ulid;

use self::signal::Signal;
use crate::config::{QueueConfig, QueueOptions};
use crate::error::{ConveyorError, Result};
use crate::handler::{Handler, from_fn};
use crate::observability::{Counters, QueueStats};
use crate::worker;

/// Identifies one queue instance in logs.
pub type QueueId = Ulid;

/// State shared between the `WorkQueue` handle and its worker thread.
pub(crate) struct Shared<T> {
    pub(crate) id: QueueId,
    pub(crate) name: String,
    items: Mutex<VecDeque<T>>,
    transition: Mutex<()>,
    running: AtomicBool,
    closed: AtomicBool,
    detached: AtomicBool,
    pub(crate) has_work: Signal,
    pub(crate) is_running: Signal,
    pub(crate) enqueue_when_stopped: bool,
    pub(crate) clear_on_stop: bool,
    worker_state: Mutex<WorkerState>,
    pub(crate) counters: Counters,
}

// None of these locks is held while user code runs, so poisoning never leaves
// the protected data half-updated.
fn relock<G>(res: std::result::Result<G, PoisonError<G>>) -> G {
    res.unwrap_or_else(PoisonError::into_inner)
}

impl<T> Shared<T> {
    fn new(options: &QueueOptions) -> Self {
        Self {
            id: Ulid::new(),
            name: options.name.clone(),
            items: Mutex::new(VecDeque::new()),
            transition: Mutex::new(()),
            running: AtomicBool::new(options.start_immediately),
            closed: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            has_work: Signal::new(),
            is_running: Signal::new(),
            enqueue_when_stopped: options.enqueue_when_stopped,
            clear_on_stop: options.clear_on_stop,
            worker_state: Mutex::new(if options.start_immediately {
                WorkerState::WaitingForWork
            } else {
                WorkerState::Paused
            }),
            counters: Counters::default(),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        relock(self.items.lock())
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The handle is gone: nobody can enqueue, start or stop any more.
    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Serialized transition between running and paused.
    ///
    /// Returns `true` when the state actually changed.
    pub(crate) fn set_running(&self, desired: bool) -> bool {
        let _transition = relock(self.transition.lock());
        if self.is_closed() || self.is_running() == desired {
            return false;
        }

        if desired {
            // has_work must be armed (non-signaled) before the worker can observe running = true,
            // and running must be true before is_running wakes it.
            self.has_work.reset();
            self.running.store(true, Ordering::Release);
            self.is_running.set();
        } else {
            // is_running must block before running flips, and the flip must be visible
            // before has_work wakes a worker waiting for items.
            self.is_running.reset();
            self.running.store(false, Ordering::Release);
            self.has_work.set();
        }

        debug!(queue = %self.name, queue_id = %self.id, running = desired, "running state changed");
        true
    }

    pub(crate) fn enqueue(&self, item: T) -> bool {
        let mut items = self.items();
        if !self.is_closed() && (self.is_running() || self.enqueue_when_stopped) {
            items.push_back(item);
            self.has_work.set();
            Counters::bump(&self.counters.enqueued, 1);
            true
        } else {
            Counters::bump(&self.counters.dropped, 1);
            false
        }
    }

    /// Remove the head item. The emptiness check and the removal happen under one lock.
    pub(crate) fn pop(&self) -> Option<T> {
        self.items().pop_front()
    }

    pub(crate) fn clear(&self) -> usize {
        let drained: Vec<T> = self.items().drain(..).collect();
        self.discard(drained)
    }

    /// Clear on behalf of a worker that saw the queue paused.
    ///
    /// `running` is re-read under the queue lock: an item enqueued after a
    /// concurrent `start()` returned is never discarded.
    pub(crate) fn clear_if_paused(&self) -> usize {
        let drained: Vec<T> = {
            let mut items = self.items();
            if self.is_running() {
                return 0;
            }
            items.drain(..).collect()
        };
        self.discard(drained)
    }

    // drop the items after releasing the lock; their destructors are user code
    fn discard(&self, drained: Vec<T>) -> usize {
        let n = drained.len();
        drop(drained);
        if n > 0 {
            Counters::bump(&self.counters.cleared, n as u64);
            debug!(queue = %self.name, queue_id = %self.id, discarded = n, "backlog cleared");
        }
        n
    }

    pub(crate) fn len(&self) -> usize {
        self.items().len()
    }

    pub(crate) fn worker_state(&self) -> WorkerState {
        *relock(self.worker_state.lock())
    }

    pub(crate) fn set_worker_state(&self, state: WorkerState) {
        *relock(self.worker_state.lock()) = state;
    }

    /// The handle was dropped without `shutdown`.
    ///
    /// A running worker drains what was already accepted and then exits; a
    /// paused one exits right away, since nothing can resume it.
    pub(crate) fn detach(&self) {
        if self.is_closed() || self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        self.has_work.set();
        self.is_running.set();
        debug!(queue = %self.name, queue_id = %self.id, "handle dropped, worker detached");
    }

    /// Mark the queue closed and wake the worker wherever it is blocked.
    pub(crate) fn close(&self) {
        let _transition = relock(self.transition.lock());
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.has_work.close();
        self.is_running.close();
        debug!(queue = %self.name, queue_id = %self.id, "shutdown requested");
    }
}

/// A single-consumer work queue.
///
/// Any number of threads may `enqueue`; one dedicated worker thread hands items
/// to the handler in FIFO order. The worker can be paused (`stop`) and resumed
/// (`start`) without being torn down.
///
/// # 使用例
/// ```ignore
/// let queue = WorkQueue::new(from_fn(|n: u32| println!("{n}")))?;
/// queue.enqueue(1);
/// queue.stop();
/// queue.enqueue(2); // buffered, delivered after start()
/// queue.start();
/// queue.shutdown()?;
/// ```
///
/// Dropping the handle detaches the worker: it keeps delivering the items it
/// already accepted (while running) and exits once the queue is empty. Call
/// [`WorkQueue::shutdown`] to stop it immediately and join it.
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Queue with default options.
    pub fn new<H: Handler<T> + 'static>(handler: H) -> Result<Self> {
        Self::from_config(QueueConfig::new(handler))
    }

    /// Queue with inline options and the default (discarding) error handler.
    pub fn with_options<H: Handler<T> + 'static>(handler: H, options: QueueOptions) -> Result<Self> {
        Self::from_config(QueueConfig::new(handler).with_options(options))
    }

    /// Queue from a prepared configuration value.
    pub fn from_config(config: QueueConfig<T>) -> Result<Self> {
        let QueueConfig {
            handler,
            error_handler,
            options,
        } = config;

        let shared = Arc::new(Shared::new(&options));
        let worker = thread::Builder::new()
            .name(format!("conveyor-{}", options.name))
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker::run(shared, handler, error_handler)
            })?;

        debug!(
            queue = %shared.name,
            queue_id = %shared.id,
            running = options.start_immediately,
            "worker spawned"
        );

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Convenience for handlers that cannot fail.
    pub fn from_fn<F>(f: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        Self::new(from_fn(f))
    }
}

impl<T> WorkQueue<T> {
    /// Add an item to the tail of the queue.
    ///
    /// Returns `false` when the item was dropped: paused with
    /// `enqueue_when_stopped = false`, or shut down. Never waits on the worker.
    pub fn enqueue(&self, item: T) -> bool {
        self.shared.enqueue(item)
    }

    /// Resume delivery. No-op (returns `false`) when already running.
    pub fn start(&self) -> bool {
        self.shared.set_running(true)
    }

    /// Pause delivery. No-op (returns `false`) when already paused.
    ///
    /// The item currently inside the handler, if any, still completes.
    pub fn stop(&self) -> bool {
        self.shared.set_running(false)
    }

    pub fn set_running(&self, running: bool) -> bool {
        self.shared.set_running(running)
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Discard the backlog. Returns how many items were dropped.
    pub fn clear(&self) -> usize {
        self.shared.clear()
    }

    /// Number of items buffered and not yet handed to the handler.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn id(&self) -> QueueId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn worker_state(&self) -> WorkerState {
        self.shared.worker_state()
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.counters.snapshot(
            self.shared.len(),
            self.shared.is_running(),
            self.shared.worker_state(),
        )
    }

    /// Stop the worker permanently and wait for it to exit.
    ///
    /// An item already inside the handler completes; the backlog is dropped.
    /// Called from the worker thread itself (e.g. inside the handler), this only
    /// requests shutdown.
    pub fn shutdown(mut self) -> Result<()> {
        self.shared.close();
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        if worker.thread().id() == thread::current().id() {
            return Ok(());
        }
        worker.join().map_err(|_| ConveyorError::WorkerPanicked)
    }
}

impl<T> Drop for WorkQueue<T> {
    fn drop(&mut self) {
        self.shared.detach();
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("running", &self.shared.is_running())
            .field("backlog", &self.shared.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(start: bool, enqueue_when_stopped: bool) -> Shared<u32> {
        Shared::new(&QueueOptions {
            start_immediately: start,
            enqueue_when_stopped,
            ..QueueOptions::default()
        })
    }

    #[test]
    fn start_arms_has_work_then_signals_is_running() {
        let s = shared(false, true);
        s.has_work.set();

        assert!(s.set_running(true));
        assert!(s.is_running());
        assert!(!s.has_work.is_set());
        assert!(s.is_running.is_set());
    }

    #[test]
    fn stop_arms_is_running_then_signals_has_work() {
        let s = shared(true, true);
        s.is_running.set();

        assert!(s.set_running(false));
        assert!(!s.is_running());
        assert!(!s.is_running.is_set());
        assert!(s.has_work.is_set());
    }

    #[test]
    fn redundant_transitions_issue_no_signal() {
        let s = shared(true, true);
        assert!(!s.set_running(true));
        assert!(!s.is_running.is_set());
        assert!(!s.has_work.is_set());

        let s = shared(false, true);
        assert!(!s.set_running(false));
        assert!(!s.is_running.is_set());
        assert!(!s.has_work.is_set());
    }

    #[test]
    fn enqueue_while_paused_respects_flag() {
        let s = shared(false, false);
        assert!(!s.enqueue(1));
        assert_eq!(s.len(), 0);
        assert!(!s.has_work.is_set());

        let s = shared(false, true);
        assert!(s.enqueue(1));
        assert_eq!(s.len(), 1);
        assert!(s.has_work.is_set());
    }

    #[test]
    fn pop_is_fifo_and_clear_counts() {
        let s = shared(true, true);
        for n in 1..=4 {
            s.enqueue(n);
        }
        assert_eq!(s.pop(), Some(1));
        assert_eq!(s.pop(), Some(2));
        assert_eq!(s.clear(), 2);
        assert_eq!(s.pop(), None);
        assert_eq!(s.clear(), 0);

        let stats = s.counters.snapshot(s.len(), s.is_running(), s.worker_state());
        assert_eq!(stats.enqueued, 4);
        assert_eq!(stats.cleared, 2);
        assert_eq!(stats.backlog, 0);
    }

    #[test]
    fn paused_clear_spares_items_enqueued_after_start() {
        let s = shared(false, true);
        s.enqueue(1);
        assert_eq!(s.clear_if_paused(), 1);

        // worker saw running == false, then start() + enqueue() ran before it cleared
        s.enqueue(2);
        assert!(s.set_running(true));
        s.enqueue(3);
        assert_eq!(s.clear_if_paused(), 0);
        assert_eq!(s.pop(), Some(2));
        assert_eq!(s.pop(), Some(3));
    }

    #[test]
    fn detach_wakes_both_signals_once() {
        let s = shared(true, true);
        s.detach();
        assert!(s.is_detached());
        assert!(s.has_work.is_set());
        assert!(s.is_running.is_set());

        s.has_work.reset();
        s.detach();
        assert!(!s.has_work.is_set());
        // still accepts items until the worker notices
        assert!(s.enqueue(1));
    }

    #[test]
    fn closed_queue_rejects_everything() {
        let s = shared(true, true);
        s.close();
        assert!(!s.enqueue(1));
        assert!(!s.set_running(false));
        assert!(s.is_running());
        assert!(!s.has_work.wait());
        assert!(!s.is_running.wait());
    }
}
