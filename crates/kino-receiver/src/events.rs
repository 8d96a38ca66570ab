//! Receiver lifecycle events
//!
//! Every event is logged at debug level as it is emitted, and fanned out to
//! any subscribers.

use crate::{
    error::{EngineError, ErrorResult},
    types::LoadId,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Receiver event types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReceiverEvent {
    /// Host environment signalled readiness
    EnvironmentReady,

    /// Engine initialized and configured
    EngineReady,

    /// Engine could not be initialized
    EngineFailed {
        cause: String,
    },

    /// Load command received
    LoadRequested {
        id: LoadId,
        content_ref: Option<String>,
    },

    /// Load handed to the engine
    LoadStarted {
        id: LoadId,
        uri: String,
        mime_type: String,
    },

    /// Load answered with a normalized command
    LoadComplete {
        id: LoadId,
        content_id: Option<String>,
    },

    /// Load answered with an error
    LoadError {
        id: LoadId,
        result: ErrorResult,
    },

    /// Engine raised an error on its error stream
    EngineError {
        error: EngineError,
        correlated: bool,
    },
}

/// Fan-out of [`ReceiverEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReceiverEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: ReceiverEvent) {
        debug!(?event, "Receiver event");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReceiverEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(ReceiverEvent::EnvironmentReady);
        bus.emit(ReceiverEvent::EngineReady);

        assert!(matches!(rx.recv().await.unwrap(), ReceiverEvent::EnvironmentReady));
        assert!(matches!(rx.recv().await.unwrap(), ReceiverEvent::EngineReady));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ReceiverEvent::EngineFailed { cause: "unsupported".into() })
            .unwrap();
        assert_eq!(json["event"], "engine_failed");
        assert_eq!(json["cause"], "unsupported");
    }
}
