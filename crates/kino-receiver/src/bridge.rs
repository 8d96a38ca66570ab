//! Load Bridge - the interceptor for load commands
//!
//! Per command:
//! - wait for the readiness gate
//! - resolve the content reference (direct URI or catalog id)
//! - drive the engine's load, correlating stream errors with it
//! - rewrite the command as externally buffered
//!
//! Every command is answered exactly once, with either the rewritten
//! command or an [`ErrorResult`].

use crate::{
    broadcast::ErrorBroadcaster,
    catalog::{CachedCatalog, CatalogSource},
    config::{LoadPolicy, ReceiverConfig},
    engine::{EngineInitializer, PlaybackEngine},
    error::{Error, ErrorResult},
    error_map::ErrorMapper,
    events::{EventBus, ReceiverEvent},
    readiness::{Readiness, ReadinessGate},
    types::*,
    Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Answer to a load command
pub type LoadOutcome = std::result::Result<LoadCommand, ErrorResult>;

/// Content reference resolved to something the engine can load
#[derive(Debug, Clone)]
struct Resolution {
    uri: Url,
    mime_type: String,
    /// Value for `contentId` when the command has none
    content_id: String,
    catalog_metadata: Option<MediaMetadata>,
}

/// Fails the gate if initialization is abandoned mid-flight
struct PendingInit<'a> {
    gate: &'a ReadinessGate,
    events: &'a EventBus,
    completed: bool,
}

impl Drop for PendingInit<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let cause = "initialization cancelled";
        self.gate.signal_failed(cause);
        self.events.emit(ReceiverEvent::EngineFailed { cause: cause.to_string() });
    }
}

/// Clears the busy flag when a rejecting-policy load finishes
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sole handler for load commands; owns the engine handle
pub struct LoadBridge {
    config: ReceiverConfig,
    gate: Arc<ReadinessGate>,
    engine: OnceLock<Arc<dyn PlaybackEngine>>,
    initializing: AtomicBool,
    busy: AtomicBool,
    catalog: Option<CachedCatalog>,
    errors: Arc<ErrorMapper>,
    events: EventBus,
}

impl LoadBridge {
    /// Create a bridge. With no catalog source, catalog mode always fails.
    pub fn new(
        config: ReceiverConfig,
        gate: Arc<ReadinessGate>,
        catalog_source: Option<Arc<dyn CatalogSource>>,
        broadcaster: Arc<dyn ErrorBroadcaster>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        let catalog = match (catalog_source, config.catalog_url.as_deref()) {
            (Some(source), Some(url)) => {
                let url = Url::parse(url).map_err(|e| Error::InvalidConfig(e.to_string()))?;
                Some(CachedCatalog::new(source, url))
            }
            _ => None,
        };

        Ok(Self {
            config,
            gate,
            engine: OnceLock::new(),
            initializing: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            catalog,
            errors: Arc::new(ErrorMapper::new(broadcaster, events.clone())),
            events,
        })
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn readiness(&self) -> ReadinessState {
        self.gate.state()
    }

    /// Load currently holding the error-correlation slot
    pub fn active_load(&self) -> Option<LoadId> {
        self.errors.active()
    }

    /// Initialize, configure and adopt the engine, then open the gate.
    ///
    /// Any failure opens the gate as failed, including the returned future
    /// being dropped before initialization finishes. Calls after the first
    /// are no-ops.
    #[instrument(skip(self, initializer))]
    pub async fn initialize_engine(
        &self,
        initializer: &dyn EngineInitializer,
        surface: &PlaybackSurface,
    ) -> Result<()> {
        if self.initializing.swap(true, Ordering::AcqRel) {
            debug!("Engine initialization already triggered");
            return Ok(());
        }
        self.gate.arm();
        let mut pending = PendingInit {
            gate: &self.gate,
            events: &self.events,
            completed: false,
        };

        let created = self.create_engine(initializer, surface).await;
        pending.completed = true;

        match created {
            Ok(engine) => {
                // Subscribe before opening the gate so no error is missed
                let errors = engine.subscribe_errors();
                tokio::spawn(Arc::clone(&self.errors).run(errors));

                if self.engine.set(engine).is_err() {
                    warn!("Engine handle already set");
                }
                self.gate.signal_ready();
                self.events.emit(ReceiverEvent::EngineReady);
                info!(surface = %surface.id, "Engine initialized");
                Ok(())
            }
            Err(e) => {
                self.gate.signal_failed(e.to_string());
                self.events.emit(ReceiverEvent::EngineFailed { cause: e.to_string() });
                Err(e)
            }
        }
    }

    async fn create_engine(
        &self,
        initializer: &dyn EngineInitializer,
        surface: &PlaybackSurface,
    ) -> Result<Arc<dyn PlaybackEngine>> {
        if !initializer.is_supported() {
            return Err(Error::EngineUnsupported);
        }
        let engine = initializer.initialize(surface).await?;
        engine.configure(&self.config.engine)?;
        Ok(engine)
    }

    /// Handle one load command
    #[instrument(skip(self, command), fields(content_ref = ?command.content_ref))]
    pub async fn handle_load(&self, command: LoadCommand) -> LoadOutcome {
        let id = LoadId::new();
        self.events.emit(ReceiverEvent::LoadRequested {
            id,
            content_ref: command.content_ref.clone(),
        });

        match self.process(id, command).await {
            Ok(normalized) => {
                info!(load = %id, content_id = ?normalized.content_id, "Load complete");
                self.events.emit(ReceiverEvent::LoadComplete {
                    id,
                    content_id: normalized.content_id.clone(),
                });
                Ok(normalized)
            }
            Err(e) => {
                let result = ErrorResult::from(&e);
                warn!(load = %id, error = %e, result = %result, "Load failed");
                self.events.emit(ReceiverEvent::LoadError {
                    id,
                    result: result.clone(),
                });
                Err(result)
            }
        }
    }

    async fn process(&self, id: LoadId, command: LoadCommand) -> Result<LoadCommand> {
        if let Readiness::Failed(cause) = self.gate.await_ready().await {
            return Err(Error::InitializationFailed(cause));
        }
        let engine = self.engine.get().cloned().ok_or(Error::EngineUnavailable)?;

        let _guard = match self.config.load_policy {
            LoadPolicy::Reject => Some(BusyGuard::acquire(&self.busy).ok_or(Error::LoadInProgress)?),
            LoadPolicy::Supersede => None,
        };

        let resolution = self.resolve(&command).await?;
        self.invoke(id, engine.as_ref(), &resolution).await?;
        Ok(self.normalize(command, resolution))
    }

    async fn resolve(&self, command: &LoadCommand) -> Result<Resolution> {
        let reference = command.reference().ok_or(Error::MissingContentRef)?;

        if let Some(uri) = as_direct_uri(reference) {
            let mime_type = command
                .mime_type
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .ok_or(Error::MissingMimeType)?;
            debug!(uri = %uri, mime_type, "Direct load");
            return Ok(Resolution {
                uri,
                mime_type: mime_type.to_string(),
                content_id: reference.to_string(),
                catalog_metadata: None,
            });
        }

        let catalog = self.catalog.as_ref().ok_or(Error::CatalogNotConfigured)?;
        let entry = catalog.lookup(reference).await?;
        let protocol = self.config.protocol;
        let manifest = entry
            .stream_uris
            .for_protocol(protocol)
            .ok_or_else(|| Error::ManifestUnavailable {
                id: reference.to_string(),
                protocol: protocol.to_string(),
            })?;

        // Relative manifest paths resolve against the catalog location
        let uri = catalog
            .url()
            .join(manifest)
            .map_err(|e| Error::InvalidManifestUri(format!("{}: {}", manifest, e)))?;
        debug!(id = reference, uri = %uri, %protocol, "Catalog load");

        Ok(Resolution {
            content_id: uri.to_string(),
            uri,
            mime_type: protocol.mime_type().to_string(),
            catalog_metadata: Some(entry.metadata()),
        })
    }

    async fn invoke(
        &self,
        id: LoadId,
        engine: &dyn PlaybackEngine,
        resolution: &Resolution,
    ) -> Result<()> {
        self.events.emit(ReceiverEvent::LoadStarted {
            id,
            uri: resolution.uri.to_string(),
            mime_type: resolution.mime_type.clone(),
        });

        let correlated = self.errors.begin(id);
        let settle = async {
            tokio::select! {
                result = engine.load(&resolution.uri, &resolution.mime_type) => {
                    result.map_err(|e| {
                        self.errors.broadcast(&e);
                        Error::Engine(e)
                    })
                }
                error = correlated => Err(Error::Engine(error)),
            }
        };

        let outcome = match self.config.load_timeout_ms {
            Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), settle)
                .await
                .unwrap_or(Err(Error::LoadTimeout { timeout_ms })),
            None => settle.await,
        };

        self.errors.finish(id);
        outcome
    }

    fn normalize(&self, mut command: LoadCommand, resolution: Resolution) -> LoadCommand {
        command.content_url = None;
        if command.content_id.as_deref().map_or(true, str::is_empty) {
            command.content_id = Some(resolution.content_id);
        }
        command.mime_type = Some(resolution.mime_type);
        command.stream_kind = Some(StreamKind::ExternallyBuffered);

        let mut metadata = command.metadata.take().unwrap_or_default();
        if let Some(catalog) = resolution.catalog_metadata {
            metadata.title = metadata.title.or(catalog.title);
            metadata.subtitle = metadata.subtitle.or(catalog.subtitle);
            if metadata.images.is_empty() {
                metadata.images = catalog.images;
            }
        }
        if metadata.title.as_deref().map_or(true, str::is_empty) {
            metadata.title = Some(self.config.default_title.clone());
        }
        command.metadata = Some(metadata);

        command
    }
}
