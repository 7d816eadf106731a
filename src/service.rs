//! The merge pipeline: fetch both feeds, reconcile, merge, cache.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::cache::FeedCache;
use crate::config::{Config, ConfigError, AUTH_PLACEHOLDER};
use crate::feed::{fetch_feed, FetchError, FetchLimits};
use crate::merge::{FeedOrigin, MergedFeed, SourceLabels};

#[derive(Debug, Error)]
pub enum MergeError {
    /// One of the upstream feeds could not be fetched or parsed.
    #[error("Failed to fetch {origin} feed: {error}")]
    Upstream {
        origin: FeedOrigin,
        #[source]
        error: FetchError,
    },
    /// The personalized feed URL did not parse after inserting the credential.
    #[error("Invalid personal feed URL: {0}")]
    InvalidSourceUrl(#[from] url::ParseError),
}

impl MergeError {
    /// Upstream HTTP status to pass through to the caller, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            MergeError::Upstream { error, .. } => error.upstream_status(),
            _ => None,
        }
    }
}

/// Where the two upstream feeds live.
#[derive(Debug, Clone)]
pub struct FeedSources {
    public_url: Url,
    personal_template: String,
}

impl FeedSources {
    /// `personal_template` must contain `{auth}`, which is replaced by the
    /// percent-encoded credential on every build.
    pub fn new(public_url: Url, personal_template: impl Into<String>) -> Self {
        Self {
            public_url,
            personal_template: personal_template.into(),
        }
    }

    pub fn public_url(&self) -> &Url {
        &self.public_url
    }

    /// The personalized feed URL for one credential.
    pub fn personal_url(&self, credential: &SecretString) -> Result<Url, url::ParseError> {
        let encoded: String =
            form_urlencoded::byte_serialize(credential.expose_secret().as_bytes()).collect();
        Url::parse(&self.personal_template.replace(AUTH_PLACEHOLDER, &encoded))
    }
}

/// Owns the HTTP client and the cache; one instance per process.
pub struct MergeService {
    client: reqwest::Client,
    sources: FeedSources,
    labels: SourceLabels,
    limits: FetchLimits,
    cache: FeedCache<MergedFeed>,
}

impl MergeService {
    pub fn new(
        client: reqwest::Client,
        sources: FeedSources,
        labels: SourceLabels,
        limits: FetchLimits,
        cache: FeedCache<MergedFeed>,
    ) -> Self {
        Self {
            client,
            sources,
            labels,
            limits,
            cache,
        }
    }

    /// Builds the service from a configuration.
    ///
    /// Validates the configuration first.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let public_url = Url::parse(&config.public_feed_url).map_err(|e| ConfigError::Invalid {
            key: "public_feed_url",
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "http_client",
                reason: e.to_string(),
            })?;

        Ok(Self::new(
            client,
            FeedSources::new(public_url, config.personal_feed_url.clone()),
            config.labels(),
            config.fetch_limits(),
            FeedCache::new(config.cache_ttl(), config.cache_capacity()),
        ))
    }

    pub fn labels(&self) -> &SourceLabels {
        &self.labels
    }

    /// How long a merged feed stays fresh; also used for `Cache-Control`.
    pub fn cache_ttl(&self) -> std::time::Duration {
        self.cache.ttl()
    }

    /// The merged feed for `credential`, from cache when fresh.
    ///
    /// # Errors
    ///
    /// [`MergeError::Upstream`] names the feed that failed. When both fail,
    /// the public feed's error is reported. Failed builds are not cached.
    pub async fn merged_feed(
        &self,
        credential: &SecretString,
    ) -> Result<Arc<MergedFeed>, MergeError> {
        self.cache
            .get_or_build(credential.expose_secret(), || self.build(credential))
            .await
    }

    async fn build(&self, credential: &SecretString) -> Result<MergedFeed, MergeError> {
        let personal_url = self.sources.personal_url(credential)?;

        let (public, personal) = futures::join!(
            fetch_feed(&self.client, self.sources.public_url.as_str(), self.limits),
            fetch_feed(&self.client, personal_url.as_str(), self.limits),
        );

        let public = public.map_err(|error| {
            tracing::warn!(error = %error, "Public feed fetch failed");
            MergeError::Upstream {
                origin: FeedOrigin::Public,
                error,
            }
        })?;
        let personal = personal.map_err(|error| {
            tracing::warn!(error = %error, "Personal feed fetch failed");
            MergeError::Upstream {
                origin: FeedOrigin::Personal,
                error,
            }
        })?;

        let merged = MergedFeed::build(public, personal, &self.labels, Utc::now());
        tracing::info!(entries = merged.entries.len(), "Built merged feed");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> FeedSources {
        FeedSources::new(
            Url::parse("https://public.example.com/rss").unwrap(),
            "https://personal.example.com/rss?auth={auth}&show=1",
        )
    }

    #[test]
    fn test_personal_url_substitutes_credential() {
        let url = sources()
            .personal_url(&SecretString::from("abc123".to_string()))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://personal.example.com/rss?auth=abc123&show=1"
        );
    }

    #[test]
    fn test_personal_url_encodes_credential() {
        let url = sources()
            .personal_url(&SecretString::from("a&b=c d".to_string()))
            .unwrap();
        let auth = url
            .query_pairs()
            .find(|(k, _)| k == "auth")
            .map(|(_, v)| v.into_owned());
        assert_eq!(auth.as_deref(), Some("a&b=c d"));
        assert_eq!(url.query_pairs().count(), 2);
    }

    #[test]
    fn test_upstream_status_passthrough() {
        let err = MergeError::Upstream {
            origin: FeedOrigin::Personal,
            error: FetchError::HttpStatus(401),
        };
        assert_eq!(err.upstream_status(), Some(401));
        assert_eq!(
            err.to_string(),
            "Failed to fetch personal feed: HTTP error: status 401"
        );

        let err = MergeError::Upstream {
            origin: FeedOrigin::Public,
            error: FetchError::Timeout,
        };
        assert_eq!(err.upstream_status(), None);
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = Config {
            personal_feed_url: "https://example.com/no-placeholder".into(),
            ..Config::default()
        };
        assert!(MergeService::from_config(&config).is_err());
    }
}
