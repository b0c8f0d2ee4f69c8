//! Network Collaborator
//!
//! The tiered cache reaches the origin only through [`NetworkFetcher`].

mod http;

pub use http::{HttpFetcher, HttpFetcherConfig};

use crate::cache::entry::CachedValue;
use crate::error::NetworkError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Request Options
// =============================================================================

/// Per-request options for cache lookups and network fetches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query parameters (part of the cache key)
    pub params: Vec<(String, String)>,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// Network timeout, overriding the fetcher default
    pub timeout: Option<Duration>,
    /// Entry lifetime, overriding the cache default
    pub max_age: Option<Duration>,
    /// Neither read nor write the memory tier
    pub skip_memory: bool,
    /// Neither read nor write the disk tier
    pub skip_disk: bool,
    /// Request issued by the prefetcher (excluded from latency metrics)
    pub prefetch: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn skip_memory(mut self) -> Self {
        self.skip_memory = true;
        self
    }

    pub fn skip_disk(mut self) -> Self {
        self.skip_disk = true;
        self
    }

    /// Tag as a prefetch request
    pub fn for_prefetch(mut self) -> Self {
        self.prefetch = true;
        self
    }
}

// =============================================================================
// Fetch Result
// =============================================================================

/// Metadata of an origin response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMetadata {
    pub url: String,
    pub content_type: Option<String>,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Time the response was received (Unix millis)
    pub timestamp: u64,
}

impl ResponseMetadata {
    /// Metadata for a plain 200 response
    pub fn ok(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: None,
            status: 200,
            headers: BTreeMap::new(),
            timestamp: 0,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A fetched payload and its response metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub data: CachedValue,
    pub metadata: ResponseMetadata,
}

impl FetchResult {
    pub fn new(data: CachedValue, metadata: ResponseMetadata) -> Self {
        Self { data, metadata }
    }

    /// A 200 JSON response
    pub fn json(url: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(
            CachedValue::Json(value),
            ResponseMetadata::ok(url).with_content_type("application/json"),
        )
    }
}

// =============================================================================
// NetworkFetcher Trait
// =============================================================================

/// Issues network requests on behalf of the cache
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Fetch `url` with the given options
    async fn fetch(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> std::result::Result<FetchResult, NetworkError>;
}

/// Shared fetcher handle
pub type SharedFetcher = Arc<dyn NetworkFetcher>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_options_builder() {
        let options = RequestOptions::new()
            .with_param("limit", "10")
            .with_header("Accept", "application/geo+json")
            .with_max_age(Duration::from_secs(60))
            .skip_disk()
            .for_prefetch();

        assert_eq!(options.params, vec![("limit".to_string(), "10".to_string())]);
        assert_eq!(options.headers.get("Accept").map(String::as_str), Some("application/geo+json"));
        assert_eq!(options.max_age, Some(Duration::from_secs(60)));
        assert!(options.skip_disk);
        assert!(!options.skip_memory);
        assert!(options.prefetch);
    }

    #[test]
    fn test_fetch_result_json() {
        let result = FetchResult::json("https://stac/collections", json!({"collections": []}));
        assert_eq!(result.metadata.status, 200);
        assert_eq!(result.metadata.content_type.as_deref(), Some("application/json"));
        assert_eq!(result.data, CachedValue::Json(json!({"collections": []})));
    }
}
