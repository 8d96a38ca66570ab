//! Headless probe engine
//!
//! "Plays" a source by fetching and validating its manifest:
//! - HLS playlists through m3u8-rs
//! - DASH MPDs by root element detection
//!
//! After an HLS master playlist is accepted, its first variant is probed in
//! the background; failures there surface on the error stream only. Starting
//! another load cancels the previous variant check.

use super::{EngineInitializer, PlaybackEngine, ERROR_CHANNEL_CAPACITY};
use crate::{
    config::EngineOptions,
    error::{EngineError, EngineErrorCategory},
    types::PlaybackSurface,
    Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use m3u8_rs::Playlist;
use reqwest::Client;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Numeric engine error codes
pub mod codes {
    pub const BAD_HTTP_STATUS: u32 = 1001;
    pub const HTTP_ERROR: u32 = 1002;
    pub const TIMEOUT: u32 = 1003;
    pub const UNABLE_TO_GUESS_MANIFEST_TYPE: u32 = 4000;
    pub const DASH_INVALID_XML: u32 = 4001;
    pub const HLS_INVALID_PLAYLIST: u32 = 4015;
    pub const HLS_NO_VARIANTS: u32 = 4016;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestFormat {
    Hls,
    Dash,
}

impl ManifestFormat {
    fn from_mime(mime_type: &str) -> Option<Self> {
        let mime = mime_type.to_lowercase();
        if mime.contains("mpegurl") {
            Some(ManifestFormat::Hls)
        } else if mime.contains("dash+xml") {
            Some(ManifestFormat::Dash)
        } else {
            None
        }
    }

    fn sniff(body: &[u8]) -> Option<Self> {
        let head = String::from_utf8_lossy(&body[..body.len().min(1024)]);
        if head.contains("#EXTM3U") {
            Some(ManifestFormat::Hls)
        } else if head.contains("<MPD") {
            Some(ManifestFormat::Dash)
        } else {
            None
        }
    }
}

struct ProbeSettings {
    client: Client,
    retry_attempts: u32,
}

/// Engine that validates manifests without rendering them
pub struct ProbeEngine {
    surface: PlaybackSurface,
    settings: RwLock<ProbeSettings>,
    errors: broadcast::Sender<EngineError>,
    variant_check: Mutex<Option<AbortHandle>>,
}

impl ProbeEngine {
    pub fn new(surface: PlaybackSurface) -> Result<Self> {
        let options = EngineOptions::default();
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Ok(Self {
            surface,
            settings: RwLock::new(ProbeSettings {
                client: build_client(&options)?,
                retry_attempts: options.retry_attempts,
            }),
            errors,
            variant_check: Mutex::new(None),
        })
    }

    pub fn surface(&self) -> &PlaybackSurface {
        &self.surface
    }

    fn settings(&self) -> (Client, u32) {
        let settings = self.settings.read().unwrap_or_else(|p| p.into_inner());
        (settings.client.clone(), settings.retry_attempts)
    }

    /// Track the running variant check, cancelling the one it replaces
    fn track_variant_check(&self, handle: AbortHandle) {
        let previous = self
            .variant_check
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_variant_check(&self) {
        let previous = self.variant_check.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(previous) = previous {
            debug!("Cancelling variant check of previous load");
            previous.abort();
        }
    }

    async fn probe_variant(client: Client, uri: Url, errors: broadcast::Sender<EngineError>) {
        let result = match fetch(&client, &uri, 0).await {
            Ok(body) => validate(&body, ManifestFormat::Hls).map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => debug!(uri = %uri, "Variant playlist reachable"),
            Err(e) => {
                warn!(uri = %uri, code = e.code, "Variant playlist failed");
                // No subscribers is fine
                let _ = errors.send(e);
            }
        }
    }
}

#[async_trait]
impl PlaybackEngine for ProbeEngine {
    fn configure(&self, options: &EngineOptions) -> Result<()> {
        let client = build_client(options)?;
        let mut settings = self.settings.write().unwrap_or_else(|p| p.into_inner());
        settings.client = client;
        settings.retry_attempts = options.retry_attempts;
        debug!(retry_attempts = options.retry_attempts, "Probe engine configured");
        Ok(())
    }

    #[instrument(skip(self), fields(surface = %self.surface.id))]
    async fn load(&self, uri: &Url, mime_type: &str) -> std::result::Result<(), EngineError> {
        self.cancel_variant_check();
        let (client, retries) = self.settings();
        let body = fetch(&client, uri, retries).await?;

        let format = ManifestFormat::from_mime(mime_type)
            .or_else(|| ManifestFormat::sniff(&body))
            .ok_or_else(|| {
                EngineError::new(
                    codes::UNABLE_TO_GUESS_MANIFEST_TYPE,
                    EngineErrorCategory::Manifest,
                    format!("cannot determine manifest type for {}", mime_type),
                )
            })?;

        if let Some(variant) = validate(&body, format)? {
            let variant = uri.join(&variant).map_err(|e| {
                EngineError::new(codes::HLS_INVALID_PLAYLIST, EngineErrorCategory::Manifest, e.to_string())
            })?;
            let check = tokio::spawn(Self::probe_variant(client, variant, self.errors.clone()));
            self.track_variant_check(check.abort_handle());
        }

        info!(uri = %uri, ?format, "Manifest accepted");
        Ok(())
    }

    fn subscribe_errors(&self) -> broadcast::Receiver<EngineError> {
        self.errors.subscribe()
    }
}

/// Initializer for [`ProbeEngine`]
#[derive(Debug, Clone, Default)]
pub struct ProbeInitializer;

#[async_trait]
impl EngineInitializer for ProbeInitializer {
    async fn initialize(&self, surface: &PlaybackSurface) -> Result<Arc<dyn PlaybackEngine>> {
        Ok(Arc::new(ProbeEngine::new(surface.clone())?))
    }
}

fn build_client(options: &EngineOptions) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_millis(options.request_timeout_ms))
        .build()?)
}

async fn fetch(client: &Client, uri: &Url, retries: u32) -> std::result::Result<Bytes, EngineError> {
    let mut attempt = 0;
    loop {
        match client.get(uri.clone()).send().await {
            Ok(response) if !response.status().is_success() => {
                return Err(EngineError::new(
                    codes::BAD_HTTP_STATUS,
                    EngineErrorCategory::Network,
                    format!("{} returned {}", uri, response.status()),
                ));
            }
            Ok(response) => {
                return response.bytes().await.map_err(|e| {
                    EngineError::new(codes::HTTP_ERROR, EngineErrorCategory::Network, e.to_string())
                });
            }
            Err(e) if attempt < retries => {
                attempt += 1;
                debug!(uri = %uri, attempt, error = %e, "Retrying manifest fetch");
            }
            Err(e) => {
                let code = if e.is_timeout() { codes::TIMEOUT } else { codes::HTTP_ERROR };
                return Err(EngineError::new(code, EngineErrorCategory::Network, e.to_string()));
            }
        }
    }
}

/// Validate a manifest body; returns the first variant URI of an HLS master
fn validate(body: &[u8], format: ManifestFormat) -> std::result::Result<Option<String>, EngineError> {
    match format {
        ManifestFormat::Hls => match m3u8_rs::parse_playlist_res(body) {
            Ok(Playlist::MasterPlaylist(master)) => master
                .variants
                .first()
                .map(|v| Some(v.uri.clone()))
                .ok_or_else(|| {
                    EngineError::new(
                        codes::HLS_NO_VARIANTS,
                        EngineErrorCategory::Manifest,
                        "master playlist has no variants",
                    )
                }),
            Ok(Playlist::MediaPlaylist(_)) => Ok(None),
            Err(e) => Err(EngineError::new(
                codes::HLS_INVALID_PLAYLIST,
                EngineErrorCategory::Manifest,
                format!("invalid HLS playlist: {:?}", e),
            )),
        },
        ManifestFormat::Dash => {
            if ManifestFormat::sniff(body) == Some(ManifestFormat::Dash) {
                Ok(None)
            } else {
                Err(EngineError::new(
                    codes::DASH_INVALID_XML,
                    EngineErrorCategory::Manifest,
                    "document has no MPD root",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\nvideo/720p.m3u8\n";
    const MEDIA: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg0.ts\n#EXT-X-ENDLIST\n";

    #[test]
    fn test_format_from_mime() {
        assert_eq!(ManifestFormat::from_mime("application/x-mpegURL"), Some(ManifestFormat::Hls));
        assert_eq!(ManifestFormat::from_mime("application/dash+xml"), Some(ManifestFormat::Dash));
        assert_eq!(ManifestFormat::from_mime("video/mp4"), None);
    }

    #[test]
    fn test_master_playlist_yields_variant() {
        let variant = validate(MASTER.as_bytes(), ManifestFormat::Hls).unwrap();
        assert_eq!(variant.as_deref(), Some("video/720p.m3u8"));
    }

    #[test]
    fn test_media_playlist_accepted() {
        assert_eq!(validate(MEDIA.as_bytes(), ManifestFormat::Hls).unwrap(), None);
    }

    #[test]
    fn test_dash_requires_mpd_root() {
        let mpd = r#"<?xml version="1.0"?><MPD xmlns="urn:mpeg:dash:schema:mpd:2011"></MPD>"#;
        assert!(validate(mpd.as_bytes(), ManifestFormat::Dash).is_ok());

        let err = validate(b"<html></html>", ManifestFormat::Dash).unwrap_err();
        assert_eq!(err.code, codes::DASH_INVALID_XML);
    }

    #[tokio::test]
    async fn test_new_load_cancels_stale_variant_check() {
        let engine = ProbeEngine::new(PlaybackSurface::new("video")).unwrap();
        let mut errors = engine.subscribe_errors();

        let sender = engine.errors.clone();
        let stale = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = sender.send(EngineError::new(
                codes::BAD_HTTP_STATUS,
                EngineErrorCategory::Network,
                "variant 404",
            ));
        });
        engine.track_variant_check(stale.abort_handle());

        // What a subsequent load does before fetching its own manifest
        engine.cancel_variant_check();

        assert!(stale.await.unwrap_err().is_cancelled());
        assert!(errors.try_recv().is_err());
    }

    #[test]
    fn test_sniff_unknown() {
        assert_eq!(ManifestFormat::sniff(b"plain text"), None);
    }
}
