//! engine::progress
//!
//! Progress reporting and cooperative cancellation for workflows.
//!
//! A workflow receives a [`ProgressSink`] and a [`CancellationToken`]
//! explicitly. The token is polled before every progress emission and
//! before every substrate call; once set, the workflow makes no further
//! substrate calls and finishes as cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Receives workflow progress.
pub trait ProgressSink: Send {
    /// A phase started or advanced. `percent` is within `0..=100`.
    fn progress(&mut self, message: &str, percent: u8);

    /// A workflow failed; called once with the full error text.
    fn error(&mut self, _message: &str) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&mut self, _message: &str, _percent: u8) {}
}

/// Keeps every event, for tests and for callers that render afterwards.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<(String, u8)>,
    pub errors: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in emission order.
    pub fn messages(&self) -> Vec<&str> {
        self.events.iter().map(|(m, _)| m.as_str()).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn progress(&mut self, message: &str, percent: u8) {
        self.events.push((message.to_string(), percent));
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a UI thread can cancel a workflow
/// running on a worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns `false` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(50);
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLICE));
        }
    }
}
