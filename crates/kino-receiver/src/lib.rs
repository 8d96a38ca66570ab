//! Kino Receiver - load bridge between a remote control channel and the
//! Kino playback engine
//!
//! This crate provides:
//! - A readiness gate holding load commands until the engine is initialized
//! - Content resolution from direct URIs or a remote catalog
//! - Engine load invocation with asynchronous error correlation
//! - Normalization of commands into externally buffered media
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Kino Receiver                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  environment ready ──► ┌──────────────┐                        │
//! │                        │  Readiness   │                        │
//! │                        │     Gate     │                        │
//! │                        └──────┬───────┘                        │
//! │                               │                                 │
//! │  load command ───────► ┌──────┴───────┐   ┌──────────────┐     │
//! │                        │     Load     │──►│   Catalog    │     │
//! │  ◄── normalized /      │    Bridge    │   └──────────────┘     │
//! │      ErrorResult       └──────┬───────┘                        │
//! │                               │                                 │
//! │                        ┌──────┴───────┐   ┌──────────────┐     │
//! │                        │   Playback   │──►│    Error     │──►  │
//! │                        │    Engine    │   │    Mapper    │     │
//! │                        └──────────────┘   └──────────────┘     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod readiness;
pub mod engine;
pub mod catalog;
pub mod broadcast;
pub mod events;
pub mod error_map;
pub mod bridge;
pub mod receiver;

pub use error::{EngineError, EngineErrorCategory, Error, ErrorKind, ErrorResult, Result};
pub use types::*;
pub use config::{EngineOptions, LoadPolicy, ReceiverConfig};
pub use readiness::{Readiness, ReadinessGate};
pub use engine::{EngineInitializer, PlaybackEngine, ProbeEngine, ProbeInitializer};
pub use catalog::{CachedCatalog, Catalog, CatalogSource, HttpCatalog};
pub use broadcast::{BroadcastKind, ChannelBroadcaster, ErrorBroadcaster, ErrorReason, ErrorReport, TracingBroadcaster};
pub use events::{EventBus, ReceiverEvent};
pub use bridge::{LoadBridge, LoadOutcome};
pub use receiver::{Receiver, ReceiverBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
