//! Call-scoped process termination control.
//!
//! Endpoint code asks to terminate through a [`ProcessHandle`]. While an
//! [`ExitSuppression`] guard is held the request is recorded and ignored;
//! once the guard is dropped the previous behaviour is restored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Debug, Default)]
pub struct ExitControl {
    suppressed: AtomicBool,
    requests: Mutex<Vec<i32>>,
}

impl ExitControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst)
    }

    /// Exit codes requested while suppression was active.
    pub fn requests(&self) -> Vec<i32> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Suppress termination until the returned guard is dropped.
    pub fn suppress(self: &Arc<Self>) -> ExitSuppression {
        let previous = self.suppressed.swap(true, Ordering::SeqCst);
        ExitSuppression {
            control: Arc::clone(self),
            previous,
        }
    }

    pub fn handle(self: &Arc<Self>) -> ProcessHandle {
        ProcessHandle {
            control: Arc::clone(self),
        }
    }

    fn record(&self, code: i32) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(code);
        }
    }
}

/// Restores the previous suppression state on drop.
#[must_use = "suppression ends when the guard is dropped"]
#[derive(Debug)]
pub struct ExitSuppression {
    control: Arc<ExitControl>,
    previous: bool,
}

impl Drop for ExitSuppression {
    fn drop(&mut self) {
        self.control.suppressed.store(self.previous, Ordering::SeqCst);
    }
}

/// Termination primitive given to endpoint code.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    control: Arc<ExitControl>,
}

impl ProcessHandle {
    /// Terminate the process with `code`.
    ///
    /// During a run this only records the request. A handle that outlives
    /// its run terminates the host process for real.
    pub fn exit(&self, code: i32) {
        if self.control.is_suppressed() {
            warn!(code, "Suppressed process exit requested by endpoint");
            self.control.record(code);
            return;
        }
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_is_recorded_while_suppressed() {
        let control = ExitControl::new();
        let handle = control.handle();
        {
            let _guard = control.suppress();
            handle.exit(3);
            handle.exit(0);
        }
        assert_eq!(control.requests(), vec![3, 0]);
        assert!(!control.is_suppressed());
    }

    #[test]
    fn guard_restores_previous_state() {
        let control = ExitControl::new();
        let outer = control.suppress();
        {
            let _inner = control.suppress();
            assert!(control.is_suppressed());
        }
        assert!(control.is_suppressed());
        drop(outer);
        assert!(!control.is_suppressed());
    }

    #[test]
    fn guard_released_on_panic() {
        let control = ExitControl::new();
        let inner = Arc::clone(&control);
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.suppress();
            panic!("endpoint blew up");
        });
        assert!(result.is_err());
        assert!(!control.is_suppressed());
    }
}
