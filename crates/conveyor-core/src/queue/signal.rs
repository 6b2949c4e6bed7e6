//! Signal - 自動リセットの二値イベント
//!
//! # 実装詳細
//! - `Mutex<SignalState>` + `Condvar`
//! - `set()` で signaled にし、待機中の 1 スレッドを起こす
//! - `wait()` は signaled を消費して戻る（auto-reset）
//! - `close()` は永続的。以後の `wait()` は即座に `false` を返す

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct SignalState {
    signaled: bool,
    closed: bool,
}

/// Auto-resetting binary event with a permanent closed state.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // No user code runs under this lock, so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signal the event, waking one waiter. Setting an already signaled event is a no-op.
    pub(crate) fn set(&self) {
        let mut state = self.lock();
        state.signaled = true;
        self.condvar.notify_one();
    }

    /// Put the event back into the non-signaled state.
    pub(crate) fn reset(&self) {
        self.lock().signaled = false;
    }

    /// Block until signaled, consuming the signal.
    ///
    /// Returns `false` once the signal has been closed.
    pub(crate) fn wait(&self) -> bool {
        let mut state = self.lock();
        loop {
            if state.closed {
                return false;
            }
            if state.signaled {
                state.signaled = false;
                return true;
            }
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close the event permanently and wake every waiter.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.condvar.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn is_set(&self) -> bool {
        self.lock().signaled
    }
}
