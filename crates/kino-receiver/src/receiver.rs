//! Receiver - composition root for one receiver process
//!
//! Arms the readiness gate at construction, starts engine initialization on
//! the host's "environment ready" event, and routes load commands to the
//! bridge.

use crate::{
    bridge::{LoadBridge, LoadOutcome},
    broadcast::{ErrorBroadcaster, TracingBroadcaster},
    catalog::{CatalogSource, HttpCatalog},
    config::ReceiverConfig,
    engine::{EngineInitializer, ProbeInitializer},
    events::{EventBus, ReceiverEvent},
    readiness::ReadinessGate,
    types::{LoadCommand, PlaybackSurface, ReadinessState},
    Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Builder for [`Receiver`]
pub struct ReceiverBuilder {
    config: ReceiverConfig,
    initializer: Option<Arc<dyn EngineInitializer>>,
    catalog: Option<Arc<dyn CatalogSource>>,
    broadcaster: Option<Arc<dyn ErrorBroadcaster>>,
    surface: PlaybackSurface,
}

impl ReceiverBuilder {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config,
            initializer: None,
            catalog: None,
            broadcaster: None,
            surface: PlaybackSurface::default(),
        }
    }

    pub fn initializer(mut self, initializer: Arc<dyn EngineInitializer>) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogSource>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn ErrorBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn surface(mut self, surface: PlaybackSurface) -> Self {
        self.surface = surface;
        self
    }

    /// Build the receiver. Unset collaborators default to the probe engine,
    /// the HTTP catalog and the tracing broadcaster.
    pub fn build(self) -> Result<Receiver> {
        let initializer = match self.initializer {
            Some(initializer) => initializer,
            None => Arc::new(ProbeInitializer),
        };
        let catalog: Arc<dyn CatalogSource> = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(HttpCatalog::new()?),
        };
        let broadcaster = self
            .broadcaster
            .unwrap_or_else(|| Arc::new(TracingBroadcaster));

        let events = EventBus::new();
        let gate = Arc::new(ReadinessGate::new());
        gate.arm();

        let bridge = LoadBridge::new(
            self.config,
            Arc::clone(&gate),
            Some(catalog),
            broadcaster,
            events.clone(),
        )?;

        info!(version = crate::VERSION, "Kino receiver created");

        Ok(Receiver {
            bridge,
            initializer,
            surface: self.surface,
            events,
            environment_ready: AtomicBool::new(false),
        })
    }
}

/// One receiver process: readiness gate plus load bridge
pub struct Receiver {
    bridge: LoadBridge,
    initializer: Arc<dyn EngineInitializer>,
    surface: PlaybackSurface,
    events: EventBus,
    environment_ready: AtomicBool,
}

impl Receiver {
    pub fn builder(config: ReceiverConfig) -> ReceiverBuilder {
        ReceiverBuilder::new(config)
    }

    /// Host framework's "environment ready" event; starts engine
    /// initialization the first time it fires.
    pub async fn on_environment_ready(&self) -> Result<()> {
        if self.environment_ready.swap(true, Ordering::AcqRel) {
            debug!("Environment ready already handled");
            return Ok(());
        }
        self.events.emit(ReceiverEvent::EnvironmentReady);
        self.bridge
            .initialize_engine(self.initializer.as_ref(), &self.surface)
            .await
    }

    /// Answer a load command
    pub async fn handle_load(&self, command: LoadCommand) -> LoadOutcome {
        self.bridge.handle_load(command).await
    }

    pub fn readiness(&self) -> ReadinessState {
        self.bridge.readiness()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ReceiverEvent> {
        self.events.subscribe()
    }

    pub fn bridge(&self) -> &LoadBridge {
        &self.bridge
    }
}
