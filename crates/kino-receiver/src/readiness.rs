//! Readiness gate for the playback engine
//!
//! A single-assignment latch: armed once, completed at most once (first
//! completion wins), and awaitable by any number of callers before or
//! after completion. Pending waiters are one-shot continuations drained
//! when the gate completes.

use crate::types::ReadinessState;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Outcome observed by a waiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Failed(String),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

struct GateInner {
    state: ReadinessState,
    failure: Option<String>,
    waiters: Vec<oneshot::Sender<Readiness>>,
}

impl GateInner {
    fn outcome(&self) -> Option<Readiness> {
        match self.state {
            ReadinessState::Ready => Some(Readiness::Ready),
            ReadinessState::Failed => Some(Readiness::Failed(
                self.failure.clone().unwrap_or_default(),
            )),
            _ => None,
        }
    }
}

/// Tracks whether the engine is initialized and releases waiters once
pub struct ReadinessGate {
    inner: Mutex<GateInner>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                state: ReadinessState::Uninitialized,
                failure: None,
                waiters: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ReadinessState {
        self.lock().state
    }

    /// Create the pending signal. No-op once armed.
    pub fn arm(&self) {
        let mut inner = self.lock();
        if inner.state == ReadinessState::Uninitialized {
            inner.state = ReadinessState::Initializing;
            debug!("Readiness gate armed");
        }
    }

    /// Mark the engine usable. Later calls are ignored.
    pub fn signal_ready(&self) {
        if self.complete(ReadinessState::Ready, None) {
            info!("Playback engine ready");
        }
    }

    /// Mark initialization as permanently failed. Ignored once completed.
    pub fn signal_failed(&self, cause: impl Into<String>) {
        let cause = cause.into();
        if self.complete(ReadinessState::Failed, Some(cause.clone())) {
            warn!(cause = %cause, "Playback engine failed to initialize");
        }
    }

    /// Returns true when this call completed the gate
    fn complete(&self, state: ReadinessState, failure: Option<String>) -> bool {
        let outcome = match state {
            ReadinessState::Ready => Readiness::Ready,
            _ => Readiness::Failed(failure.clone().unwrap_or_default()),
        };
        let waiters = {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                debug!(state = %inner.state, "Readiness gate already completed");
                return false;
            }
            inner.state = state;
            inner.failure = failure;
            std::mem::take(&mut inner.waiters)
        };

        debug!(waiters = waiters.len(), "Releasing readiness waiters");
        for waiter in waiters {
            // Waiter may have been dropped
            let _ = waiter.send(outcome.clone());
        }
        true
    }

    /// Wait until the gate completes; resolves immediately if it already has
    pub async fn await_ready(&self) -> Readiness {
        let rx = {
            let mut inner = self.lock();
            if let Some(outcome) = inner.outcome() {
                return outcome;
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push(tx);
            rx
        };

        rx.await
            .unwrap_or_else(|_| Readiness::Failed("readiness gate dropped".to_string()))
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_state_machine() {
        let gate = ReadinessGate::new();
        assert_eq!(gate.state(), ReadinessState::Uninitialized);

        gate.arm();
        assert_eq!(gate.state(), ReadinessState::Initializing);

        gate.signal_ready();
        assert_eq!(gate.state(), ReadinessState::Ready);

        gate.signal_failed("late");
        assert_eq!(gate.state(), ReadinessState::Ready);
    }

    #[test]
    fn test_waiter_suspends_until_signal() {
        let gate = ReadinessGate::new();
        gate.arm();

        let mut waiter = task::spawn(gate.await_ready());
        assert_pending!(waiter.poll());

        gate.signal_ready();
        assert!(waiter.is_woken());
        assert_ready_eq!(waiter.poll(), Readiness::Ready);
    }

    #[tokio::test]
    async fn test_many_waiters_released() {
        let gate = Arc::new(ReadinessGate::new());
        gate.arm();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.await_ready().await })
            })
            .collect();

        tokio::task::yield_now().await;
        gate.signal_failed("no surface");

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Readiness::Failed("no surface".into()));
        }
    }

    #[tokio::test]
    async fn test_late_waiter_resolves_immediately() {
        let gate = ReadinessGate::new();
        gate.arm();
        gate.signal_ready();

        assert_eq!(gate.await_ready().await, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_double_ready_is_idempotent() {
        let gate = ReadinessGate::new();
        gate.arm();
        gate.signal_ready();
        gate.signal_ready();

        assert_eq!(gate.state(), ReadinessState::Ready);
        assert_eq!(gate.await_ready().await, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_failure_is_sticky() {
        let gate = ReadinessGate::new();
        gate.arm();
        gate.signal_failed("unsupported");
        gate.signal_ready();

        assert_eq!(gate.state(), ReadinessState::Failed);
        assert_eq!(gate.await_ready().await, Readiness::Failed("unsupported".into()));
    }
}
