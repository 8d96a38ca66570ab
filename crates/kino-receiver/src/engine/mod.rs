//! Playback engine surface consumed by the bridge
//!
//! The engine itself (fetching, decoding, ABR, buffering) lives behind
//! these traits. An engine reports failures two ways: as the rejection of
//! a `load` call, and on an error stream that is not tied to any call.

mod probe;

pub use probe::{codes, ProbeEngine, ProbeInitializer};

use crate::{config::EngineOptions, error::EngineError, types::PlaybackSurface, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

/// Capacity of an engine's error stream
pub const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Handle to an initialized playback engine
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Apply engine options
    fn configure(&self, options: &EngineOptions) -> Result<()>;

    /// Load a manifest; resolves once the engine accepts the source
    async fn load(&self, uri: &Url, mime_type: &str) -> std::result::Result<(), EngineError>;

    /// Subscribe to errors raised outside of a `load` call's result
    fn subscribe_errors(&self) -> broadcast::Receiver<EngineError>;
}

/// Factory producing the engine for a playback surface
#[async_trait]
pub trait EngineInitializer: Send + Sync {
    /// Whether this host can run the engine at all
    fn is_supported(&self) -> bool {
        true
    }

    async fn initialize(&self, surface: &PlaybackSurface) -> Result<Arc<dyn PlaybackEngine>>;
}
