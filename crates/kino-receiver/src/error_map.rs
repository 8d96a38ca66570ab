//! Engine error mapping
//!
//! The engine's error stream is not tied to the call that caused an error.
//! A single in-flight slot holds the completion handle of the active load;
//! each engine error is broadcast outward and, when the slot is occupied,
//! also completes that load.

use crate::{
    broadcast::{BroadcastKind, ErrorBroadcaster, ErrorReason},
    error::EngineError,
    events::{EventBus, ReceiverEvent},
    types::LoadId,
};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

struct InFlight {
    id: LoadId,
    tx: oneshot::Sender<EngineError>,
}

/// Routes engine errors to the broadcaster and the active load
pub struct ErrorMapper {
    in_flight: Mutex<Option<InFlight>>,
    broadcaster: Arc<dyn ErrorBroadcaster>,
    events: EventBus,
}

impl ErrorMapper {
    pub fn new(broadcaster: Arc<dyn ErrorBroadcaster>, events: EventBus) -> Self {
        Self {
            in_flight: Mutex::new(None),
            broadcaster,
            events,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `id` as the active load, superseding any previous one.
    ///
    /// The returned future resolves with the first engine error routed while
    /// `id` holds the slot, and never resolves otherwise.
    pub fn begin(&self, id: LoadId) -> impl Future<Output = EngineError> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self.slot().replace(InFlight { id, tx }) {
            debug!(previous = %previous.id, current = %id, "Load superseded");
        }
        async move {
            match rx.await {
                Ok(error) => error,
                // Superseded or finished
                Err(_) => std::future::pending::<EngineError>().await,
            }
        }
    }

    /// Clear the slot if `id` still holds it
    pub fn finish(&self, id: LoadId) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|current| current.id == id) {
            *slot = None;
        }
    }

    pub fn active(&self) -> Option<LoadId> {
        self.slot().as_ref().map(|current| current.id)
    }

    /// Forward an error to the broadcast surface only
    pub fn broadcast(&self, error: &EngineError) {
        self.broadcaster
            .broadcast_error(BroadcastKind::Error, ErrorReason::Generic, error);
    }

    /// Handle an error from the engine's error stream
    pub fn route(&self, error: EngineError) {
        self.broadcast(&error);

        let pending = self.slot().take();
        let correlated = match pending {
            Some(InFlight { id, tx }) => {
                debug!(load = %id, code = error.code, "Engine error correlated with load");
                tx.send(error.clone()).is_ok()
            }
            None => false,
        };

        self.events.emit(ReceiverEvent::EngineError { error, correlated });
    }

    /// Consume an engine error stream until the engine goes away
    pub async fn run(self: Arc<Self>, mut errors: broadcast::Receiver<EngineError>) {
        loop {
            match errors.recv().await {
                Ok(error) => self.route(error),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Engine error stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Engine error stream closed");
                    break;
                }
            }
        }
    }
}
