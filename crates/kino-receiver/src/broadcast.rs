//! Outward error broadcast
//!
//! Every engine error is forwarded here, whether or not a load was waiting
//! on it, so failures outside the request/response cycle stay visible.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Broadcast message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastKind {
    Error,
}

/// Reason attached to a broadcast error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReason {
    Generic,
}

/// Error-broadcast surface of the control channel
pub trait ErrorBroadcaster: Send + Sync {
    fn broadcast_error(&self, kind: BroadcastKind, reason: ErrorReason, detail: &EngineError);
}

/// Logs broadcasts through tracing
#[derive(Debug, Clone, Default)]
pub struct TracingBroadcaster;

impl ErrorBroadcaster for TracingBroadcaster {
    fn broadcast_error(&self, kind: BroadcastKind, reason: ErrorReason, detail: &EngineError) {
        warn!(
            ?kind,
            ?reason,
            code = detail.code,
            category = ?detail.category,
            message = %detail.message,
            "Broadcasting engine error"
        );
    }
}

/// Broadcast record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: BroadcastKind,
    pub reason: ErrorReason,
    pub detail: EngineError,
    pub timestamp: DateTime<Utc>,
}

/// Sends broadcasts as [`ErrorReport`]s over a channel
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: mpsc::UnboundedSender<ErrorReport>,
}

impl ChannelBroadcaster {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ErrorReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ErrorBroadcaster for ChannelBroadcaster {
    fn broadcast_error(&self, kind: BroadcastKind, reason: ErrorReason, detail: &EngineError) {
        let report = ErrorReport {
            kind,
            reason,
            detail: detail.clone(),
            timestamp: Utc::now(),
        };
        if self.tx.send(report).is_err() {
            warn!(code = detail.code, "Error report dropped, receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineErrorCategory;

    #[tokio::test]
    async fn test_channel_broadcaster_records_report() {
        let (broadcaster, mut rx) = ChannelBroadcaster::new();
        let error = EngineError::new(3016, EngineErrorCategory::Media, "decode failed");

        broadcaster.broadcast_error(BroadcastKind::Error, ErrorReason::Generic, &error);

        let report = rx.recv().await.unwrap();
        assert_eq!(report.reason, ErrorReason::Generic);
        assert_eq!(report.detail.code, 3016);
    }

    #[test]
    fn test_report_serialization() {
        let report = ErrorReport {
            kind: BroadcastKind::Error,
            reason: ErrorReason::Generic,
            detail: EngineError::new(1001, EngineErrorCategory::Network, "404"),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["reason"], "GENERIC");
        assert_eq!(json["detail"]["code"], 1001);
    }
}
