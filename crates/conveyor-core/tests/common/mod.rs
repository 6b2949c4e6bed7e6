#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Collects every item the handler sees.
#[derive(Clone)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn handler(&self) -> impl FnMut(T) + Send + 'static {
        let seen = Arc::clone(&self.seen);
        move |item| seen.lock().unwrap().push(item)
    }

    pub fn seen(&self) -> Vec<T> {
        self.seen.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Wait until at least `n` items arrived.
    pub fn wait_for_len(&self, n: usize) -> Vec<T> {
        assert!(
            wait_until(TIMEOUT, || self.len() >= n),
            "timed out waiting for {n} items, got {}",
            self.len()
        );
        self.seen()
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Give the worker a moment to (not) do something.
pub fn settle() {
    thread::sleep(Duration::from_millis(50));
}
