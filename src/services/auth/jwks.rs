//! Signing key set retrieval from the identity provider.
//!
//! - `KeyProvider` is the seam the gate depends on; tests swap in their own.
//! - `RemoteKeyProvider` fetches the JWKS discovery document and caches it.
//!   A refresh replaces the whole `Arc<JwkSet>`, so concurrent readers see
//!   either the old set or the new one, never a mix.
//! - `invalidate` is throttled by a minimum refresh interval, so tokens
//!   naming made-up key identifiers cannot drive one outbound fetch each.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum KeyProviderError {
    #[error("key set request timed out")]
    Timeout,
    #[error("key set request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("key set endpoint returned HTTP {0}")]
    Status(u16),
    #[error("key set document is malformed: {0}")]
    Document(String),
}

impl From<reqwest::Error> for KeyProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Document(e.to_string())
        } else {
            Self::Transport(e)
        }
    }
}

#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Current signing keys. Every published key is returned, unfiltered.
    async fn fetch_keys(&self) -> Result<Arc<JwkSet>, KeyProviderError>;

    /// Forget any cached key set so the next `fetch_keys` goes to the source.
    async fn invalidate(&self) {}
}

/// Default for `RemoteKeyProvider::with_min_refresh_interval`.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

struct CachedKeys {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// JWKS-over-HTTPS key provider with a TTL cache.
pub struct RemoteKeyProvider {
    client: reqwest::Client,
    jwks_url: Url,
    ttl: Duration,
    // A cache younger than this survives `invalidate`.
    min_refresh_interval: Duration,
    cache: RwLock<Option<CachedKeys>>,
    // Serializes refreshes so a cold cache triggers one fetch, not one per request.
    refresh: Mutex<()>,
}

impl std::fmt::Debug for RemoteKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteKeyProvider")
            .field("jwks_url", &self.jwks_url.as_str())
            .field("ttl", &self.ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}

impl RemoteKeyProvider {
    pub fn new(jwks_url: Url, ttl: Duration, timeout: Duration) -> Result<Self, KeyProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KeyProviderError::Transport)?;

        Ok(Self {
            client,
            jwks_url,
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        })
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    async fn cached(&self) -> Option<Arc<JwkSet>> {
        let guard = self.cache.read().await;
        guard
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| Arc::clone(&c.keys))
    }

    async fn download(&self) -> Result<JwkSet, KeyProviderError> {
        let response = self
            .client
            .get(self.jwks_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyProviderError::Status(status.as_u16()));
        }

        // A body that is not a key set surfaces as a decode error (-> Document).
        Ok(response.json::<JwkSet>().await?)
    }
}

#[async_trait]
impl KeyProvider for RemoteKeyProvider {
    async fn fetch_keys(&self) -> Result<Arc<JwkSet>, KeyProviderError> {
        if let Some(keys) = self.cached().await {
            return Ok(keys);
        }

        let _refresh = self.refresh.lock().await;

        // Another request may have refreshed while we waited.
        if let Some(keys) = self.cached().await {
            return Ok(keys);
        }

        let keys = match self.download().await {
            Ok(keys) => Arc::new(keys),
            Err(err) => {
                warn!(error = %err, url = %self.jwks_url, "failed to fetch signing keys");
                return Err(err);
            }
        };
        debug!(count = keys.keys.len(), url = %self.jwks_url, "signing keys refreshed");

        *self.cache.write().await = Some(CachedKeys {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }

    async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        match cache.as_ref() {
            Some(c) if c.fetched_at.elapsed() < self.min_refresh_interval => {
                debug!(url = %self.jwks_url, "signing keys refreshed recently; keeping cache");
            }
            _ => *cache = None,
        }
    }
}
