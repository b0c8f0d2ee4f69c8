//! Presigned Token Cache
//!
//! Caches short-lived signing tokens per scope (for example per collection
//! of a presigned-URL service). New tokens are requested through a
//! [`TokenProvider`], at most one request per scope at a time and never
//! faster than the configured minimum interval.

use crate::cache::inflight::InFlight;
use crate::clock::{system_clock, ClockRef};
use crate::error::{Error, NetworkError, Result};
use async_trait::async_trait;
use chrono::DateTime;
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

// =============================================================================
// Tokens
// =============================================================================

/// A signing token valid for one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    pub scope: String,
    /// Query string to append to URLs in this scope
    pub token: String,
    /// Expiration (Unix millis)
    pub expires_at: u64,
}

impl SignedToken {
    /// Check if the token can still be handed out at `now_ms`
    pub fn is_fresh(&self, now_ms: u64, refresh_margin: Duration) -> bool {
        now_ms.saturating_add(refresh_margin.as_millis() as u64) < self.expires_at
    }
}

/// Issues tokens for a scope
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn request_token(&self, scope: &str) -> std::result::Result<SignedToken, NetworkError>;
}

pub type SharedTokenProvider = Arc<dyn TokenProvider>;

// =============================================================================
// Rate Limiter
// =============================================================================

/// Enforces a minimum interval between provider requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait until a request is allowed
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

// =============================================================================
// Token Cache
// =============================================================================

/// Configuration for the token cache
#[derive(Debug, Clone)]
pub struct TokenCacheConfig {
    /// Minimum time between two provider requests
    pub min_interval: Duration,
    /// Tokens this close to expiry are refreshed
    pub refresh_margin: Duration,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(250),
            refresh_margin: Duration::from_secs(60),
        }
    }
}

/// Rate-limited, coalescing token cache
pub struct PresignedTokenCache {
    config: TokenCacheConfig,
    provider: SharedTokenProvider,
    tokens: Arc<DashMap<String, SignedToken>>,
    limiter: Arc<RateLimiter>,
    inflight: InFlight<SignedToken, NetworkError>,
    clock: ClockRef,
}

impl PresignedTokenCache {
    pub fn new(config: TokenCacheConfig, provider: SharedTokenProvider) -> Self {
        Self::with_clock(config, provider, system_clock())
    }

    pub fn with_clock(config: TokenCacheConfig, provider: SharedTokenProvider, clock: ClockRef) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config.min_interval)),
            config,
            provider,
            tokens: Arc::new(DashMap::new()),
            inflight: InFlight::new(),
            clock,
        }
    }

    /// Get a fresh token for `scope`, requesting one if needed
    pub async fn acquire(&self, scope: &str) -> Result<String> {
        let now = self.clock.now_ms();
        let cached = self
            .tokens
            .get(scope)
            .filter(|token| token.is_fresh(now, self.config.refresh_margin))
            .map(|token| token.token.clone());
        if let Some(token) = cached {
            debug!(scope = %scope, "Token cache hit");
            return Ok(token);
        }

        let provider = Arc::clone(&self.provider);
        let limiter = Arc::clone(&self.limiter);
        let tokens = Arc::clone(&self.tokens);
        let scope_owned = scope.to_string();
        let flight = self.inflight.join_or_start(scope, move || async move {
            limiter.acquire().await;
            let result = provider.request_token(&scope_owned).await;
            if let Ok(token) = &result {
                info!(scope = %scope_owned, expires_at = token.expires_at, "Acquired signing token");
                tokens.insert(scope_owned.clone(), token.clone());
            }
            result
        });

        let result = flight.wait().await;
        result.map(|token| token.token).map_err(Error::from)
    }

    /// Append the scope's token to `url` as query string
    pub async fn sign_url(&self, url: &str, scope: &str) -> Result<String> {
        let token = self.acquire(scope).await?;
        let token = token.trim_start_matches('?');
        let separator = if url.contains('?') { '&' } else { '?' };
        Ok(format!("{}{}{}", url, separator, token))
    }

    /// Drop the cached token for `scope`
    pub fn invalidate(&self, scope: &str) -> bool {
        self.tokens.remove(scope).is_some()
    }

    pub fn clear(&self) {
        self.tokens.clear();
    }

    /// Number of cached tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// =============================================================================
// HTTP Token Provider
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(rename = "msft:expiry")]
    expiry: String,
}

/// Requests tokens with `GET {endpoint}/{scope}`
pub struct HttpTokenProvider {
    client: Client,
    endpoint: String,
}

impl HttpTokenProvider {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("{}/{}", crate::NAME, crate::VERSION))
            .timeout(Duration::from_secs(30))
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn token_url(&self, scope: &str) -> String {
        format!("{}/{}", self.endpoint, scope)
    }
}

/// Parse a token endpoint response body
pub(crate) fn parse_token_response(
    url: &str,
    scope: &str,
    body: &str,
) -> std::result::Result<SignedToken, NetworkError> {
    let invalid = |message: String| NetworkError {
        url: url.to_string(),
        status: Some(200),
        message,
    };

    let response: TokenResponse =
        serde_json::from_str(body).map_err(|e| invalid(format!("invalid token response: {}", e)))?;
    let expiry = DateTime::parse_from_rfc3339(&response.expiry)
        .map_err(|e| invalid(format!("invalid token expiry {:?}: {}", response.expiry, e)))?;

    Ok(SignedToken {
        scope: scope.to_string(),
        token: response.token,
        expires_at: expiry.timestamp_millis().max(0) as u64,
    })
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn request_token(&self, scope: &str) -> std::result::Result<SignedToken, NetworkError> {
        let url = self.token_url(scope);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkError::transport(&url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::status(&url, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::transport(&url, e.to_string()))?;
        parse_token_response(&url, scope, &body)
    }
}
