//! HTTP Fetcher
//!
//! reqwest-backed [`NetworkFetcher`] with per-request timeouts and
//! exponential-backoff retries of transient failures.

use crate::cache::entry::CachedValue;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, NetworkError, Result};
use crate::network::{FetchResult, NetworkFetcher, RequestOptions, ResponseMetadata};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use bytes::Bytes;
use reqwest::{header, Client};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub user_agent: String,
    /// Default per-request timeout
    pub timeout: Duration,
    /// First retry delay
    pub initial_retry_interval: Duration,
    /// Give up retrying after this long (zero disables retries)
    pub max_retry_elapsed: Duration,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
            timeout: Duration::from_secs(30),
            initial_retry_interval: Duration::from_millis(200),
            max_retry_elapsed: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// HTTP Fetcher
// =============================================================================

/// Fetches catalog resources over HTTP
pub struct HttpFetcher {
    client: Client,
    config: HttpFetcherConfig,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpFetcherConfig::default())
    }

    pub fn with_config(config: HttpFetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpFetcherConfig {
        &self.config
    }

    async fn fetch_once(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> std::result::Result<FetchResult, NetworkError> {
        let mut request = self
            .client
            .get(url)
            .query(&options.params)
            .timeout(options.timeout.unwrap_or(self.config.timeout));
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::transport(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::status(url, status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::transport(url, e.to_string()))?;
        let data = decode_body(url, status.as_u16(), content_type.as_deref(), body)?;

        Ok(FetchResult {
            data,
            metadata: ResponseMetadata {
                url: url.to_string(),
                content_type,
                status: status.as_u16(),
                headers,
                timestamp: SystemClock.now_ms(),
            },
        })
    }
}

/// Decode a response body according to its content type
pub(crate) fn decode_body(
    url: &str,
    status: u16,
    content_type: Option<&str>,
    body: Bytes,
) -> std::result::Result<CachedValue, NetworkError> {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        serde_json::from_slice(&body)
            .map(CachedValue::Json)
            .map_err(|e| NetworkError {
                url: url.to_string(),
                status: Some(status),
                message: format!("invalid JSON body: {}", e),
            })
    } else if mime.starts_with("text/") {
        Ok(CachedValue::Text(String::from_utf8_lossy(&body).into_owned()))
    } else {
        Ok(CachedValue::Binary(body))
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> std::result::Result<FetchResult, NetworkError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_retry_interval)
            .with_max_elapsed_time(Some(self.config.max_retry_elapsed))
            .build();

        let result = backoff::future::retry(policy, || async {
            self.fetch_once(url, options).await.map_err(|e| {
                if e.is_transient() {
                    warn!(url = %url, error = %e, "Transient fetch failure, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await;

        if let Ok(fetched) = &result {
            debug!(url = %url, status = fetched.metadata.status, "Fetched from network");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_variants() {
        let body = Bytes::from_static(br#"{"type":"FeatureCollection","features":[]}"#);
        for ct in ["application/json", "application/geo+json; charset=utf-8", "Application/JSON"] {
            let value = decode_body("u", 200, Some(ct), body.clone()).unwrap();
            assert_eq!(value, CachedValue::Json(json!({"type": "FeatureCollection", "features": []})));
        }
    }

    #[test]
    fn test_decode_text_and_binary() {
        let text = decode_body("u", 200, Some("text/html"), Bytes::from_static(b"<p>hi</p>")).unwrap();
        assert_eq!(text, CachedValue::Text("<p>hi</p>".into()));

        let png = decode_body("u", 200, Some("image/png"), Bytes::from_static(b"\x89PNG")).unwrap();
        assert_eq!(png, CachedValue::Binary(Bytes::from_static(b"\x89PNG")));

        let unknown = decode_body("u", 200, None, Bytes::from_static(b"raw")).unwrap();
        assert_eq!(unknown.data_type(), crate::cache::entry::DataType::Binary);
    }

    #[test]
    fn test_invalid_json_is_permanent() {
        let err = decode_body("u", 200, Some("application/json"), Bytes::from_static(b"{oops")).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message.starts_with("invalid JSON body"));
    }

    #[test]
    fn test_default_config() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.config().timeout, Duration::from_secs(30));
        assert!(fetcher.config().user_agent.starts_with("stac-cache/"));
    }
}
