//! Cache Entry Types
//!
//! Defines cache keys, cached values, entries and their metadata.

use crate::error::{Error, Result};
use crate::network::ResponseMetadata;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Cache Key
// =============================================================================

/// Compute the cache key for a URL and its query parameters.
///
/// Parameters are URL-encoded and sorted, so any permutation of the same
/// pairs yields the same key. Without parameters the key is the URL itself.
pub fn generate_cache_key(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let mut pairs: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    pairs.sort_unstable();

    format!("{}|{}", url, pairs.join("&"))
}

// =============================================================================
// Cached Value
// =============================================================================

/// Shape of a cached payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Binary,
    Array,
    Object,
    #[default]
    Unknown,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Text => write!(f, "text"),
            DataType::Binary => write!(f, "binary"),
            DataType::Array => write!(f, "array"),
            DataType::Object => write!(f, "object"),
            DataType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A decoded payload as handed to and returned from the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// Textual body
    Text(String),
    /// Opaque bytes (imagery, thumbnails)
    Binary(Bytes),
    /// Structured JSON document
    Json(serde_json::Value),
}

impl CachedValue {
    /// Get the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            CachedValue::Text(_) => DataType::Text,
            CachedValue::Binary(_) => DataType::Binary,
            CachedValue::Json(serde_json::Value::Array(_)) => DataType::Array,
            CachedValue::Json(serde_json::Value::Object(_)) => DataType::Object,
            CachedValue::Json(_) => DataType::Unknown,
        }
    }

    /// Encode to the byte form that is sized, compressed and persisted
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            CachedValue::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            CachedValue::Binary(bytes) => Ok(bytes.clone()),
            CachedValue::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
        }
    }

    /// Decode from the persisted byte form
    pub fn from_bytes(data_type: DataType, bytes: Bytes) -> Result<Self> {
        match data_type {
            DataType::Text => String::from_utf8(bytes.to_vec())
                .map(CachedValue::Text)
                .map_err(|e| Error::Serialization(format!("invalid UTF-8 text: {}", e))),
            DataType::Binary => Ok(CachedValue::Binary(bytes)),
            DataType::Array | DataType::Object | DataType::Unknown => {
                Ok(CachedValue::Json(serde_json::from_slice(&bytes)?))
            }
        }
    }

    /// Borrow the JSON document, if any
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            CachedValue::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the text, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CachedValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for CachedValue {
    fn from(value: serde_json::Value) -> Self {
        CachedValue::Json(value)
    }
}

impl From<String> for CachedValue {
    fn from(text: String) -> Self {
        CachedValue::Text(text)
    }
}

impl From<&str> for CachedValue {
    fn from(text: &str) -> Self {
        CachedValue::Text(text.to_string())
    }
}

impl From<Bytes> for CachedValue {
    fn from(bytes: Bytes) -> Self {
        CachedValue::Binary(bytes)
    }
}

// =============================================================================
// Cache Data
// =============================================================================

/// Wrapper for cached bytes with compression info
#[derive(Debug, Clone, PartialEq)]
pub struct CacheData {
    /// The stored bytes (compressed when `compressed`)
    pub bytes: Bytes,
    /// Size before compression (same as bytes.len() if uncompressed)
    pub original_size: u64,
    /// Whether the bytes are compressed
    pub compressed: bool,
    /// Compression algorithm used (if compressed)
    pub compression_algorithm: Option<CompressionAlgorithm>,
}

impl CacheData {
    /// Create uncompressed cache data
    pub fn uncompressed(bytes: Bytes) -> Self {
        let size = bytes.len() as u64;
        Self {
            bytes,
            original_size: size,
            compressed: false,
            compression_algorithm: None,
        }
    }

    /// Create compressed cache data
    pub fn compressed(bytes: Bytes, original_size: u64, algorithm: CompressionAlgorithm) -> Self {
        Self {
            bytes,
            original_size,
            compressed: true,
            compression_algorithm: Some(algorithm),
        }
    }

    /// Get the stored size (compressed size if compressed)
    pub fn stored_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Get compression ratio (stored_size / original_size)
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            1.0
        } else {
            self.stored_size() as f64 / self.original_size as f64
        }
    }

    /// Algorithm needed to read the bytes back
    pub fn algorithm(&self) -> CompressionAlgorithm {
        if self.compressed {
            self.compression_algorithm.unwrap_or_default()
        } else {
            CompressionAlgorithm::None
        }
    }
}

/// Compression algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    #[default]
    None,
    Lz4,
    Zstd,
    Snappy,
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionAlgorithm::None => write!(f, "none"),
            CompressionAlgorithm::Lz4 => write!(f, "lz4"),
            CompressionAlgorithm::Zstd => write!(f, "zstd"),
            CompressionAlgorithm::Snappy => write!(f, "snappy"),
        }
    }
}

// =============================================================================
// Entry Metadata
// =============================================================================

/// Response and bookkeeping metadata stored with every entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Source URL
    pub url: String,
    /// Content type reported by the origin
    pub content_type: Option<String>,
    /// HTTP status of the origin response
    pub status: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Time the entry was created (Unix millis)
    pub timestamp: u64,
    /// Absolute expiry (Unix millis)
    pub expires: u64,
    /// Stored size in bytes
    pub size: u64,
    /// Size before compression in bytes
    pub original_size: u64,
    /// Whether the stored bytes are compressed
    pub compressed: bool,
    /// Stored size / original size, when compressed
    pub compression_ratio: Option<f64>,
    /// Shape of the payload
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl EntryMetadata {
    /// Build metadata for freshly stored data
    pub fn new(
        response: &ResponseMetadata,
        data: &CacheData,
        data_type: DataType,
        now_ms: u64,
        max_age_ms: u64,
    ) -> Self {
        Self {
            url: response.url.clone(),
            content_type: response.content_type.clone(),
            status: response.status,
            headers: response.headers.clone(),
            timestamp: now_ms,
            expires: now_ms.saturating_add(max_age_ms),
            size: data.stored_size(),
            original_size: data.original_size,
            compressed: data.compressed,
            compression_ratio: data.compressed.then(|| data.compression_ratio()),
            data_type,
        }
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A cached entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cache key
    pub key: String,
    /// The stored data
    pub data: Arc<CacheData>,
    /// Response and expiry metadata
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(key: impl Into<String>, data: CacheData, metadata: EntryMetadata) -> Self {
        Self {
            key: key.into(),
            data: Arc::new(data),
            metadata,
        }
    }

    /// Check if the entry has expired at `now_ms`
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.metadata.expires
    }

    /// Get the stored size in bytes
    pub fn stored_size(&self) -> u64 {
        self.metadata.size
    }

    /// Get the raw bytes (may be compressed)
    pub fn bytes(&self) -> &Bytes {
        &self.data.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_cache_key_without_params() {
        assert_eq!(
            generate_cache_key("https://stac.example/collections", &[]),
            "https://stac.example/collections"
        );
    }

    #[test]
    fn test_cache_key_param_order() {
        let a = generate_cache_key(
            "https://stac.example/search",
            &params(&[("limit", "10"), ("bbox", "1,2,3,4"), ("collections", "sentinel-2")]),
        );
        let b = generate_cache_key(
            "https://stac.example/search",
            &params(&[("collections", "sentinel-2"), ("limit", "10"), ("bbox", "1,2,3,4")]),
        );
        assert_eq!(a, b);
        assert_eq!(
            a,
            "https://stac.example/search|bbox=1%2C2%2C3%2C4&collections=sentinel-2&limit=10"
        );
    }

    #[test]
    fn test_cache_key_distinct_values() {
        let a = generate_cache_key("u", &params(&[("limit", "10")]));
        let b = generate_cache_key("u", &params(&[("limit", "20")]));
        assert_ne!(a, b);

        // An encoded separator in a value cannot collide with two parameters
        let c = generate_cache_key("u", &params(&[("a", "1&b=2")]));
        let d = generate_cache_key("u", &params(&[("a", "1"), ("b", "2")]));
        assert_ne!(c, d);
    }

    #[test]
    fn test_data_types() {
        assert_eq!(CachedValue::from("x").data_type(), DataType::Text);
        assert_eq!(CachedValue::from(Bytes::from_static(b"x")).data_type(), DataType::Binary);
        assert_eq!(CachedValue::from(json!([1, 2])).data_type(), DataType::Array);
        assert_eq!(CachedValue::from(json!({"id": "a"})).data_type(), DataType::Object);
        assert_eq!(CachedValue::from(json!(42)).data_type(), DataType::Unknown);
    }

    #[test]
    fn test_value_byte_form() {
        let value = CachedValue::from(json!({"id": "sentinel-2-l2a", "links": []}));
        let bytes = value.to_bytes().unwrap();
        let decoded = CachedValue::from_bytes(value.data_type(), bytes).unwrap();
        assert_eq!(decoded, value);

        let text = CachedValue::from("héllo");
        assert_eq!(text.to_bytes().unwrap().len(), 6);

        let invalid = CachedValue::from_bytes(DataType::Text, Bytes::from_static(&[0xff, 0xfe]));
        assert!(matches!(invalid, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_cache_data_compression() {
        let data = CacheData::uncompressed(Bytes::from("hello world"));
        assert!(!data.compressed);
        assert_eq!(data.original_size, 11);
        assert_eq!(data.stored_size(), 11);
        assert_eq!(data.algorithm(), CompressionAlgorithm::None);
        assert!((data.compression_ratio() - 1.0).abs() < 0.001);

        let compressed = CacheData::compressed(Bytes::from("abc"), 100, CompressionAlgorithm::Lz4);
        assert!(compressed.compressed);
        assert_eq!(compressed.algorithm(), CompressionAlgorithm::Lz4);
        assert!((compressed.compression_ratio() - 0.03).abs() < 0.001);
    }

    #[test]
    fn test_cache_entry_expiry() {
        let response = ResponseMetadata::ok("https://stac.example/collections");
        let data = CacheData::uncompressed(Bytes::from("data"));
        let metadata = EntryMetadata::new(&response, &data, DataType::Text, 1_000, 100);
        let entry = CacheEntry::new("k", data, metadata);

        assert_eq!(entry.metadata.expires, 1_100);
        assert_eq!(entry.stored_size(), 4);
        assert!(!entry.is_expired(1_099));
        assert!(entry.is_expired(1_100));
        assert_eq!(entry.metadata.compression_ratio, None);
    }

    proptest! {
        #[test]
        fn prop_cache_key_ignores_param_order(
            pairs in proptest::collection::btree_map("[a-z_]{1,8}", "[ -~]{0,12}", 0..8),
            seed in any::<u64>(),
        ) {
            let ordered: Vec<(String, String)> = pairs.into_iter().collect();
            let mut shuffled = ordered.clone();
            // Deterministic permutation from the seed
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                shuffled.swap(i, (state % (i as u64 + 1)) as usize);
            }

            prop_assert_eq!(
                generate_cache_key("https://stac.example/search", &ordered),
                generate_cache_key("https://stac.example/search", &shuffled)
            );
        }
    }
}
