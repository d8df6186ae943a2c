//! Verification key-set resolution.
//!
//! A token's issuer claim locates its published key set at a well-known
//! URL. Fetched sets are memoized per issuer for the life of the process:
//! a bounded read-through cache with no invalidation short of restart.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use moka::future::Cache;
use tracing::debug;

/// Well-known path appended to an issuer URL to locate its key set.
pub const JWKS_SUFFIX: &str = "/.well-known/jwks.json";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_CACHED_ISSUERS: u64 = 64;

/// Errors resolving a key set.
#[derive(Debug, Clone)]
pub enum KeyProviderError {
    /// The key set could not be fetched.
    Fetch(String),
    /// The fetched document was not a valid key set.
    InvalidKeySet(String),
}

impl std::fmt::Display for KeyProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyProviderError::Fetch(e) => write!(f, "Failed to fetch key set: {}", e),
            KeyProviderError::InvalidKeySet(e) => write!(f, "Invalid key set: {}", e),
        }
    }
}

impl std::error::Error for KeyProviderError {}

/// Source of verification key sets, injected into the verifier so tests
/// can supply a deterministic fake.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Resolve the key set published by `issuer`.
    async fn key_set(&self, issuer: &str) -> Result<Arc<JwkSet>, KeyProviderError>;
}

/// Fetches key sets over HTTPS with a per-issuer process-lifetime cache.
pub struct HttpKeyProvider {
    client: reqwest::Client,
    cache: Cache<String, Arc<JwkSet>>,
}

impl HttpKeyProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            cache: Cache::new(MAX_CACHED_ISSUERS),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Arc<JwkSet>, KeyProviderError> {
        debug!(url = %url, "Fetching key set");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KeyProviderError::Fetch(e.to_string()))?;
        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| KeyProviderError::InvalidKeySet(e.to_string()))?;
        Ok(Arc::new(set))
    }
}

impl Default for HttpKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyProvider for HttpKeyProvider {
    async fn key_set(&self, issuer: &str) -> Result<Arc<JwkSet>, KeyProviderError> {
        let issuer = issuer.trim_end_matches('/').to_string();
        let url = format!("{}{}", issuer, JWKS_SUFFIX);
        // Concurrent lookups for the same issuer coalesce into one fetch.
        self.cache
            .try_get_with(issuer, self.fetch(&url))
            .await
            .map_err(|e: Arc<KeyProviderError>| (*e).clone())
    }
}
