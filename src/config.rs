//! Configuration file parser for feedmerge.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`,
//! which points at the original public and personalized podcast feeds.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
use crate::feed::{FetchLimits, DEFAULT_MAX_FEED_SIZE, DEFAULT_TIMEOUT};
use crate::merge::SourceLabels;

/// Placeholder in `personal_feed_url` replaced by the caller's credential.
pub const AUTH_PLACEHOLDER: &str = "{auth}";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but cannot be used.
    #[error("Invalid config value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,

    /// URL of the public feed.
    pub public_feed_url: String,

    /// URL template of the personalized feed; must contain `{auth}`.
    pub personal_feed_url: String,

    /// Default title for links taken over from the public feed.
    pub public_label: String,

    /// Title of the link pointing at the personalized feed.
    pub personal_label: String,

    /// Value of the merged feed's `<generator>`.
    pub generator: String,

    /// Seconds a merged feed is served from cache (also the `max-age`).
    pub cache_ttl_secs: u64,

    /// Maximum number of distinct credentials cached at once.
    pub cache_capacity: usize,

    /// Per-request timeout for upstream fetches, in seconds.
    pub fetch_timeout_secs: u64,

    /// Maximum accepted size of an upstream feed body, in bytes.
    pub max_feed_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        let labels = SourceLabels::default();
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            public_feed_url: "https://feeds.acast.com/public/shows/erdbeerkaesepodcast".to_string(),
            personal_feed_url:
                "https://www.patreon.com/rss/erdbeerkaese?auth={auth}&show=875519".to_string(),
            public_label: labels.public,
            personal_label: labels.personal,
            generator: labels.generator,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            fetch_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_feed_bytes: DEFAULT_MAX_FEED_SIZE,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "bind_addr",
        "public_feed_url",
        "personal_feed_url",
        "public_label",
        "personal_label",
        "generator",
        "cache_ttl_secs",
        "cache_capacity",
        "fetch_timeout_secs",
        "max_feed_bytes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    ///
    /// The result is not validated; call [`Config::validate`] before use.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), bind = %config.bind_addr, "Loaded configuration");
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.public_feed_url)
            .map_err(|e| ConfigError::invalid("public_feed_url", e.to_string()))?;

        if !self.personal_feed_url.contains(AUTH_PLACEHOLDER) {
            return Err(ConfigError::invalid(
                "personal_feed_url",
                format!("template must contain {AUTH_PLACEHOLDER}"),
            ));
        }
        Url::parse(&self.personal_feed_url.replace(AUTH_PLACEHOLDER, "x"))
            .map_err(|e| ConfigError::invalid("personal_feed_url", e.to_string()))?;

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::invalid("cache_ttl_secs", "must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::invalid("cache_capacity", "must be at least 1"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid("fetch_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn labels(&self) -> SourceLabels {
        SourceLabels {
            public: self.public_label.clone(),
            personal: self.personal_label.clone(),
            generator: self.generator.clone(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_bytes: self.max_feed_bytes,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), 8000);
        assert!(config.public_feed_url.starts_with("https://feeds.acast.com/"));
        assert!(config.personal_feed_url.contains(AUTH_PLACEHOLDER));
        assert_eq!(config.public_label, "Acast Feed");
        assert_eq!(config.personal_label, "Patreon Feed");
        assert_eq!(config.generator, "Acast and Patreon");
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.cache_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedmerge_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.cache_ttl_secs, 60);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("feedmerge_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  ").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.generator, "Acast and Patreon");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("feedmerge_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "cache_ttl_secs = 120\nbind_addr = \"127.0.0.1:9000\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.cache_ttl_secs, 120);
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.cache_capacity, 1024); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("feedmerge_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("feedmerge_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "generator = \"x\"\ntotally_fake_key = 42\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.generator, "x");

        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedmerge_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_requires_auth_placeholder() {
        let config = Config {
            personal_feed_url: "https://example.com/rss?auth=fixed".into(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "personal_feed_url",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_bad_public_url() {
        let config = Config {
            public_feed_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "public_feed_url",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = Config {
            cache_ttl_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_settings() {
        let config = Config {
            fetch_timeout_secs: 5,
            max_feed_bytes: 1024,
            public_label: "Main".into(),
            ..Config::default()
        };
        let limits = config.fetch_limits();
        assert_eq!(limits.timeout, Duration::from_secs(5));
        assert_eq!(limits.max_bytes, 1024);
        assert_eq!(config.labels().public, "Main");
        assert_eq!(config.cache_capacity().get(), 1024);
    }
}
