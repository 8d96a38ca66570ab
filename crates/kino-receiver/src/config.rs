//! Receiver configuration
//!
//! Loaded from a JSON file, then overridden by `KINO_RECEIVER_*`
//! environment variables.

use crate::{error::Error, types::StreamProtocol, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default sample catalog consulted in catalog mode
pub const DEFAULT_CATALOG_URL: &str = "https://storage.googleapis.com/cpe-sample-media/content.json";

/// Title used when neither the command nor the catalog supplies one
pub const DEFAULT_TITLE: &str = "Untitled";

/// What to do with a load that arrives while another is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// The new load takes over error correlation; the old one still runs
    #[default]
    Supersede,
    /// The new load is answered with `LoadFailed` immediately
    Reject,
}

impl std::str::FromStr for LoadPolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supersede" => Ok(LoadPolicy::Supersede),
            "reject" => Ok(LoadPolicy::Reject),
            _ => Err(Error::InvalidConfig(format!("unknown load policy '{}'", s))),
        }
    }
}

/// Options applied to the playback engine right after initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Buffer ahead of the playhead (seconds)
    pub buffering_goal_secs: f64,
    /// Buffer required to resume after a stall (seconds)
    pub rebuffering_goal_secs: f64,
    /// Retry attempts for failed requests
    pub retry_attempts: u32,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            buffering_goal_secs: 30.0,
            rebuffering_goal_secs: 2.0,
            retry_attempts: 3,
            request_timeout_ms: 10000,
        }
    }
}

/// Receiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Protocol whose manifest is picked from catalog entries
    pub protocol: StreamProtocol,
    /// Catalog consulted for opaque content ids (`None` disables catalog mode)
    pub catalog_url: Option<String>,
    /// Placeholder title for loads without metadata
    pub default_title: String,
    /// Handling of overlapping loads
    pub load_policy: LoadPolicy,
    /// Optional bound on a single engine load
    pub load_timeout_ms: Option<u64>,
    pub engine: EngineOptions,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            protocol: StreamProtocol::Dash,
            catalog_url: Some(DEFAULT_CATALOG_URL.to_string()),
            default_title: DEFAULT_TITLE.to_string(),
            load_policy: LoadPolicy::Supersede,
            load_timeout_ms: None,
            engine: EngineOptions::default(),
        }
    }
}

impl ReceiverConfig {
    /// Read a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ReceiverConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KINO_RECEIVER_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("KINO_RECEIVER_PROTOCOL") {
            self.protocol = value.parse::<StreamProtocol>()?;
        }
        if let Some(value) = lookup("KINO_RECEIVER_CATALOG_URL") {
            self.catalog_url = Some(value).filter(|v| !v.is_empty());
        }
        if let Some(value) = lookup("KINO_RECEIVER_DEFAULT_TITLE") {
            self.default_title = value;
        }
        if let Some(value) = lookup("KINO_RECEIVER_LOAD_POLICY") {
            self.load_policy = value.parse()?;
        }
        if let Some(value) = lookup("KINO_RECEIVER_LOAD_TIMEOUT_MS") {
            let timeout = value
                .parse::<u64>()
                .map_err(|e| Error::InvalidConfig(format!("load timeout: {}", e)))?;
            self.load_timeout_ms = Some(timeout).filter(|t| *t > 0);
        }
        self.validate()
    }

    /// Check invariants the bridge relies on
    pub fn validate(&self) -> Result<()> {
        if let Some(ref catalog) = self.catalog_url {
            Url::parse(catalog)
                .map_err(|e| Error::InvalidConfig(format!("catalog_url '{}': {}", catalog, e)))?;
        }
        if self.default_title.trim().is_empty() {
            return Err(Error::InvalidConfig("default_title must not be empty".into()));
        }
        if self.load_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig("load_timeout_ms must be positive".into()));
        }
        if self.engine.buffering_goal_secs <= 0.0 {
            return Err(Error::InvalidConfig("buffering_goal_secs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = ReceiverConfig::default();
        assert_eq!(config.protocol, StreamProtocol::Dash);
        assert_eq!(config.default_title, "Untitled");
        assert_eq!(config.load_policy, LoadPolicy::Supersede);
        assert!(config.load_timeout_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ReceiverConfig =
            serde_json::from_str(r#"{"protocol":"hls","engine":{"retry_attempts":5}}"#).unwrap();
        assert_eq!(config.protocol, StreamProtocol::Hls);
        assert_eq!(config.engine.retry_attempts, 5);
        assert_eq!(config.engine.buffering_goal_secs, 30.0);
        assert_eq!(config.catalog_url.as_deref(), Some(DEFAULT_CATALOG_URL));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("KINO_RECEIVER_PROTOCOL", "HLS"),
            ("KINO_RECEIVER_LOAD_POLICY", "reject"),
            ("KINO_RECEIVER_LOAD_TIMEOUT_MS", "2500"),
            ("KINO_RECEIVER_CATALOG_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ReceiverConfig::default();
        config
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.protocol, StreamProtocol::Hls);
        assert_eq!(config.load_policy, LoadPolicy::Reject);
        assert_eq!(config.load_timeout_ms, Some(2500));
        assert!(config.catalog_url.is_none());
    }

    #[test]
    fn test_invalid_env_rejected() {
        let mut config = ReceiverConfig::default();
        let result = config.apply_env_from(|key| {
            (key == "KINO_RECEIVER_PROTOCOL").then(|| "smooth".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_policy_parse() {
        assert_eq!(" Reject ".parse::<LoadPolicy>().unwrap(), LoadPolicy::Reject);

        let mut config = ReceiverConfig::default();
        let result = config.apply_env_from(|key| {
            (key == "KINO_RECEIVER_LOAD_POLICY").then(|| "queue".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert_eq!(config.load_policy, LoadPolicy::Supersede);
    }

    #[test]
    fn test_invalid_catalog_url() {
        let config = ReceiverConfig {
            catalog_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
