//! Configuration, figment-deserialized from defaults / config.toml / env vars.
//!
//! Three equivalent ways to configure:
//!
//!   config.toml:     base_url = "https://sync.example.com"
//!
//!   env var:         CONVO_BASE_URL=https://sync.example.com
//!
//!   code:            SyncFileConfig { base_url, .. } → SyncConfig::from_file

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::transport::http::DEFAULT_IDENTITY_HEADER;

/// Tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncFileConfig {
    /// Base URL of the sync service. Required for runtime use.
    #[serde(default)]
    pub base_url: String,
    /// Header name carrying the identity token.
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    /// Connect-phase timeout in seconds. The open response itself is
    /// never timed out.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SyncFileConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            identity_header: default_identity_header(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_identity_header() -> String {
    DEFAULT_IDENTITY_HEADER.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Build a figment that layers: defaults → config.toml → CONVO_* env vars.
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(SyncFileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("CONVO_").split("__"))
}

/// Resolved configuration (runtime view).
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Base URL with any trailing slash trimmed.
    pub base_url: String,
    pub identity_header: String,
    pub connect_timeout: Duration,
}

impl SyncConfig {
    pub fn from_file(fc: &SyncFileConfig) -> Result<Self, ChannelError> {
        let base_url = fc.base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ChannelError::InvalidBaseUrl(fc.base_url.clone()));
        }
        Ok(Self {
            base_url: base_url.to_string(),
            identity_header: fc.identity_header.clone(),
            connect_timeout: Duration::from_secs(fc.connect_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_defaults() {
        let fc = SyncFileConfig::default();
        assert!(fc.base_url.is_empty());
        assert_eq!(fc.identity_header, "X-Identity-Token");
        assert_eq!(fc.connect_timeout_secs, 30);
    }

    #[test]
    fn test_from_file_valid() {
        let fc = SyncFileConfig {
            base_url: "https://sync.example.com/".to_string(),
            ..Default::default()
        };
        let config = SyncConfig::from_file(&fc).unwrap();
        assert_eq!(config.base_url, "https://sync.example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_file_rejects_empty_base_url() {
        let fc = SyncFileConfig::default();
        let err = SyncConfig::from_file(&fc).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidBaseUrl(_)));
    }

    #[test]
    fn test_from_file_rejects_relative_base_url() {
        let fc = SyncFileConfig {
            base_url: "sync.example.com".to_string(),
            ..Default::default()
        };
        assert!(SyncConfig::from_file(&fc).is_err());
    }

    #[test]
    fn test_load_config_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: SyncFileConfig = load_config(tmp.path()).extract().unwrap();
        assert!(fc.base_url.is_empty());
        assert_eq!(fc.identity_header, "X-Identity-Token");
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "base_url = \"https://sync.example.com\"\nconnect_timeout_secs = 5\n",
        )
        .unwrap();
        let fc: SyncFileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.base_url, "https://sync.example.com");
        assert_eq!(fc.connect_timeout_secs, 5);
        // Untouched fields keep their defaults
        assert_eq!(fc.identity_header, "X-Identity-Token");
    }

    #[test]
    fn test_load_config_custom_identity_header() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "identity_header = \"X-Org-Identity\"\n",
        )
        .unwrap();
        let fc: SyncFileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.identity_header, "X-Org-Identity");
    }
}
