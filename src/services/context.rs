use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Mutable state shared by every call of one run.
///
/// One instance per run, passed by reference. The cursor and error counter are
/// atomics so concurrently resolving batches never reuse a credential slot or
/// lose a count. Once any call aborts the run it is marked halted, and calls still
/// in flight stop before their next attempt.
#[derive(Debug)]
pub struct RunContext {
    credentials: Vec<String>,
    cursor: AtomicUsize,
    errors: AtomicUsize,
    max_errors: usize,
    halted: AtomicBool,
    cancelled: Arc<AtomicBool>,
}

/// Cloneable handle that can stop a run from outside.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl RunContext {
    pub fn new(credentials: Vec<String>, max_errors: usize) -> Self {
        Self::with_cancel(credentials, max_errors, Arc::new(AtomicBool::new(false)))
    }

    pub fn with_cancel(credentials: Vec<String>, max_errors: usize, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            credentials,
            cursor: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            max_errors,
            halted: AtomicBool::new(false),
            cancelled,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    /// Claims the next credential round-robin. `None` when none are configured.
    pub fn next_credential(&self) -> Option<&str> {
        if self.credentials.is_empty() {
            return None;
        }
        let slot = self.cursor.fetch_add(1, Ordering::SeqCst);
        Some(self.credentials[slot % self.credentials.len()].as_str())
    }

    /// Counts one failed attempt and returns the new total.
    pub fn record_error(&self) -> usize {
        self.errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub fn budget_exhausted(&self) -> bool {
        self.error_count() >= self.max_errors
    }

    /// Marks the run as aborted by a fatal backend failure.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
