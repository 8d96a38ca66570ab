//! Core types for Kino Receiver

use crate::error::Error;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Identifier assigned to each load handled by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadId(pub Uuid);

impl LoadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LoadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Streaming protocol a manifest is served in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    #[default]
    Dash,
    Hls,
}

impl StreamProtocol {
    /// MIME type handed to the engine for this protocol
    pub fn mime_type(&self) -> &'static str {
        match self {
            StreamProtocol::Dash => "application/dash+xml",
            StreamProtocol::Hls => "application/x-mpegurl",
        }
    }
}

impl std::str::FromStr for StreamProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dash" => Ok(StreamProtocol::Dash),
            "hls" => Ok(StreamProtocol::Hls),
            _ => Err(Error::InvalidConfig(format!("unknown protocol '{}'", s))),
        }
    }
}

impl std::fmt::Display for StreamProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamProtocol::Dash => write!(f, "DASH"),
            StreamProtocol::Hls => write!(f, "HLS"),
        }
    }
}

/// How the control channel should treat the media stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamKind {
    Buffered,
    Live,
    /// Media is fetched and rendered by the playback engine, not the channel
    ExternallyBuffered,
}

/// Artwork reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}

/// Display metadata attached to a load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
}

/// Inbound load request, rewritten in place by the bridge on success
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadCommand {
    /// Opaque catalog id or a direct playable URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Raw URL that would trigger the channel's default fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_kind: Option<StreamKind>,
}

impl LoadCommand {
    /// Direct-mode command for a playable URI
    pub fn direct(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content_ref: Some(uri.into()),
            mime_type: Some(mime_type.into()),
            ..Default::default()
        }
    }

    /// Catalog-mode command for an opaque content id
    pub fn catalog(id: impl Into<String>) -> Self {
        Self {
            content_ref: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The reference to resolve: `contentRef`, falling back to a raw
    /// `contentUrl`. Blank values count as absent.
    pub fn reference(&self) -> Option<&str> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }
        present(&self.content_ref).or_else(|| present(&self.content_url))
    }
}

/// Returns the parsed URL when `reference` is a directly playable URI
pub fn as_direct_uri(reference: &str) -> Option<Url> {
    Url::parse(reference)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https" | "file"))
}

/// Manifest URIs per streaming protocol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUris {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls: Option<String>,
}

impl StreamUris {
    pub fn for_protocol(&self, protocol: StreamProtocol) -> Option<&str> {
        match protocol {
            StreamProtocol::Dash => self.dash.as_deref(),
            StreamProtocol::Hls => self.hls.as_deref(),
        }
        .filter(|s| !s.is_empty())
    }
}

/// Catalog record for one piece of content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "stream", default)]
    pub stream_uris: StreamUris,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

impl CatalogEntry {
    /// Display metadata derived from this entry
    pub fn metadata(&self) -> MediaMetadata {
        MediaMetadata {
            title: Some(self.title.clone()).filter(|t| !t.is_empty()),
            subtitle: self.author.clone(),
            images: self
                .poster
                .iter()
                .map(|url| Image { url: url.clone() })
                .collect(),
        }
    }
}

/// Surface the engine renders onto
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSurface {
    /// Element or window identifier on the host
    pub id: String,
}

impl PlaybackSurface {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for PlaybackSurface {
    fn default() -> Self {
        Self::new("media-element")
    }
}

/// Lifecycle of the playback engine's initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadinessState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl ReadinessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::Failed)
    }
}

impl std::fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessState::Uninitialized => write!(f, "uninitialized"),
            ReadinessState::Initializing => write!(f, "initializing"),
            ReadinessState::Ready => write!(f, "ready"),
            ReadinessState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_uri_detection() {
        assert!(as_direct_uri("https://x/video.mpd").is_some());
        assert!(as_direct_uri("abc123").is_none());
        assert!(as_direct_uri("urn:content:abc").is_none());
    }

    #[test]
    fn test_reference_falls_back_to_content_url() {
        let command = LoadCommand {
            content_url: Some("https://x/video.m3u8".into()),
            ..Default::default()
        };
        assert_eq!(command.reference(), Some("https://x/video.m3u8"));

        let blank = LoadCommand::catalog("   ");
        assert_eq!(blank.reference(), None);
    }

    #[test]
    fn test_blank_content_ref_falls_back_to_content_url() {
        let command = LoadCommand {
            content_ref: Some("  ".into()),
            content_url: Some("https://x/video.mpd".into()),
            ..Default::default()
        };
        assert_eq!(command.reference(), Some("https://x/video.mpd"));
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!("HLS".parse::<StreamProtocol>().unwrap(), StreamProtocol::Hls);
        assert_eq!("dash".parse::<StreamProtocol>().unwrap(), StreamProtocol::Dash);
        assert!(matches!(
            "smooth".parse::<StreamProtocol>(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_command_deserializes_camel_case() {
        let command: LoadCommand = serde_json::from_str(
            r#"{"contentRef":"https://x/video.mpd","mimeType":"application/dash+xml"}"#,
        )
        .unwrap();
        assert_eq!(command, LoadCommand::direct("https://x/video.mpd", "application/dash+xml"));
    }

    #[test]
    fn test_stream_kind_wire_name() {
        let json = serde_json::to_string(&StreamKind::ExternallyBuffered).unwrap();
        assert_eq!(json, r#""externally-buffered""#);
    }

    #[test]
    fn test_catalog_entry_shape() {
        let entry: CatalogEntry = serde_json::from_str(
            r#"{"title":"Big Buck Bunny","author":"Blender","poster":"https://x/bbb.jpg",
                "stream":{"dash":"https://x/bbb.mpd","hls":""}}"#,
        )
        .unwrap();
        assert_eq!(entry.stream_uris.for_protocol(StreamProtocol::Dash), Some("https://x/bbb.mpd"));
        assert_eq!(entry.stream_uris.for_protocol(StreamProtocol::Hls), None);

        let metadata = entry.metadata();
        assert_eq!(metadata.subtitle.as_deref(), Some("Blender"));
        assert_eq!(metadata.images.len(), 1);
    }
}
