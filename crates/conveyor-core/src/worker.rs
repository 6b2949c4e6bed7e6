//! Worker loop - dedicated thread that drains the queue.
//!
//! # フロー
//! 1. shutdown 済み、または handle が drop されて配送するものが無ければ抜ける
//! 2. running なら先頭を pop（lock の外で handler 実行）。空なら `has_work` で待つ
//! 3. paused なら（clear_on_stop のとき）clear して `is_running` で待つ
//!
//! handler / error handler の失敗で worker が止まることはない。

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::handler::{self, ErrorHandler, Handler};
use crate::observability::Counters;
use crate::queue::{Shared, WorkerState};

pub(crate) fn run<T>(
    shared: Arc<Shared<T>>,
    mut handler: Box<dyn Handler<T>>,
    mut error_handler: Box<dyn ErrorHandler>,
) {
    let mut state = shared.worker_state();

    loop {
        let closed = shared.is_closed();
        let detached = shared.is_detached();
        let running = shared.is_running();
        let item = if !closed && running { shared.pop() } else { None };

        let next = state.next(closed, detached, running, item.is_some());
        if next != state {
            trace!(queue = %shared.name, from = ?state, to = ?next, "worker state");
            shared.set_worker_state(next);
            state = next;
        }

        match state {
            WorkerState::Terminated => break,
            WorkerState::Draining => {
                if let Some(item) = item {
                    process(&shared, handler.as_mut(), error_handler.as_mut(), item);
                }
            }
            WorkerState::WaitingForWork => {
                // woken by enqueue, by a pause, by close or by the handle being dropped
                shared.has_work.wait();
            }
            WorkerState::Paused => {
                if shared.clear_on_stop {
                    shared.clear_if_paused();
                }
                shared.is_running.wait();
            }
        }
    }

    debug!(queue = %shared.name, queue_id = %shared.id, "worker exited");
}

fn process<T>(
    shared: &Shared<T>,
    handler: &mut dyn Handler<T>,
    error_handler: &mut dyn ErrorHandler,
    item: T,
) {
    match handler::invoke(handler, item) {
        Ok(()) => Counters::bump(&shared.counters.processed, 1),
        Err(e) => {
            Counters::bump(&shared.counters.failed, 1);
            warn!(queue = %shared.name, queue_id = %shared.id, error = %e, "handler failed");
            handler::report(error_handler, e);
        }
    }
}
