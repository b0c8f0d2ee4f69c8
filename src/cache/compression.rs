//! Compression Support
//!
//! The compressor is selected once at construction. A compressed form is
//! kept only when it beats the configured ratio; any failure falls back to
//! the original bytes.

use crate::cache::entry::CacheData;
use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use crate::cache::entry::CompressionAlgorithm;

// =============================================================================
// Compression Configuration
// =============================================================================

/// Configuration for compression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Whether payloads are compressed at all
    pub enabled: bool,
    /// Algorithm to compress with
    pub algorithm: CompressionAlgorithm,
    /// Minimum size to compress (smaller objects are stored uncompressed)
    pub min_size_bytes: u64,
    /// Keep the compressed form only if `compressed < max_ratio * original`
    pub max_ratio: f64,
    /// Compression level (algorithm-specific)
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: CompressionAlgorithm::Lz4,
            min_size_bytes: 1024, // 1KB minimum
            max_ratio: 0.8,
            level: 3,
        }
    }
}

impl CompressionConfig {
    /// A configuration that never compresses
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Get the algorithm identifier
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

// =============================================================================
// No-Op Compressor
// =============================================================================

/// Pass-through compressor (no compression)
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

// =============================================================================
// Stream Compressor
// =============================================================================

/// Block compressor over lz4, zstd or snappy
pub struct StreamCompressor {
    algorithm: CompressionAlgorithm,
    level: i32,
}

impl StreamCompressor {
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self::with_level(algorithm, 3)
    }

    pub fn with_level(algorithm: CompressionAlgorithm, level: i32) -> Self {
        Self { algorithm, level }
    }

    fn failure(&self, op: &str, reason: impl std::fmt::Display) -> Error {
        Error::Serialization(format!("{} {} failed: {}", self.algorithm, op, reason))
    }
}

impl Compressor for StreamCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            CompressionAlgorithm::None => Ok(data.to_vec()),
            CompressionAlgorithm::Lz4 => lz4::block::compress(
                data,
                Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
                true,
            )
            .map_err(|e| self.failure("compression", e)),
            CompressionAlgorithm::Zstd => {
                zstd::encode_all(data, self.level).map_err(|e| self.failure("compression", e))
            }
            CompressionAlgorithm::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| self.failure("compression", e)),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            CompressionAlgorithm::None => Ok(data.to_vec()),
            CompressionAlgorithm::Lz4 => {
                lz4::block::decompress(data, None).map_err(|e| self.failure("decompression", e))
            }
            CompressionAlgorithm::Zstd => {
                zstd::decode_all(data).map_err(|e| self.failure("decompression", e))
            }
            CompressionAlgorithm::Snappy => snap::raw::Decoder::new()
                .decompress_vec(data)
                .map_err(|e| self.failure("decompression", e)),
        }
    }
}

// =============================================================================
// Compression Manager
// =============================================================================

/// Outcome of preparing a payload for storage
#[derive(Debug, Clone)]
pub struct Encoded {
    pub data: CacheData,
    /// Compression was attempted but the original bytes were kept
    pub skipped: bool,
}

/// Manager for compression operations with fallback support
pub struct CompressionManager {
    config: CompressionConfig,
    compressor: Box<dyn Compressor>,
}

impl CompressionManager {
    /// Create a new compression manager
    pub fn new() -> Self {
        Self::with_config(CompressionConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: CompressionConfig) -> Self {
        let compressor: Box<dyn Compressor> =
            if config.enabled && config.algorithm != CompressionAlgorithm::None {
                Box::new(StreamCompressor::with_level(config.algorithm, config.level))
            } else {
                Box::new(NoopCompressor)
            };
        Self { config, compressor }
    }

    /// Prepare bytes for storage, compressing when it pays off
    pub fn encode(&self, original: Bytes) -> Encoded {
        let original_size = original.len() as u64;
        let algorithm = self.compressor.algorithm();

        if algorithm == CompressionAlgorithm::None || original_size < self.config.min_size_bytes {
            return Encoded {
                data: CacheData::uncompressed(original),
                skipped: false,
            };
        }

        match self.compressor.compress(&original) {
            Ok(compressed) => {
                let limit = self.config.max_ratio * original_size as f64;
                if (compressed.len() as f64) < limit {
                    Encoded {
                        data: CacheData::compressed(Bytes::from(compressed), original_size, algorithm),
                        skipped: false,
                    }
                } else {
                    Encoded {
                        data: CacheData::uncompressed(original),
                        skipped: true,
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Compression failed, storing uncompressed");
                Encoded {
                    data: CacheData::uncompressed(original),
                    skipped: true,
                }
            }
        }
    }

    /// Recover the original bytes of stored data
    pub fn decode(&self, data: &CacheData) -> Result<Bytes> {
        match data.algorithm() {
            CompressionAlgorithm::None => Ok(data.bytes.clone()),
            algorithm => {
                let decompressed = StreamCompressor::new(algorithm).decompress(&data.bytes)?;
                if decompressed.len() as u64 != data.original_size {
                    return Err(Error::Serialization(format!(
                        "decompressed {} bytes, expected {}",
                        decompressed.len(),
                        data.original_size
                    )));
                }
                Ok(Bytes::from(decompressed))
            }
        }
    }

    /// Get configuration
    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Algorithm new entries are compressed with
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.compressor.algorithm()
    }
}

impl Default for CompressionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stac_like(len: usize) -> Bytes {
        let item = br#"{"type":"Feature","stac_version":"1.0.0","properties":{"datetime":"2024-01-01T00:00:00Z"}},"#;
        Bytes::from(item.iter().copied().cycle().take(len).collect::<Vec<u8>>())
    }

    fn noise(len: usize) -> Bytes {
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        let bytes: Vec<u8> = (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect();
        Bytes::from(bytes)
    }

    #[test]
    fn test_stream_roundtrips() {
        let data = stac_like(4096);
        for algorithm in [
            CompressionAlgorithm::Lz4,
            CompressionAlgorithm::Zstd,
            CompressionAlgorithm::Snappy,
        ] {
            let compressor = StreamCompressor::new(algorithm);
            let compressed = compressor.compress(&data).unwrap();
            assert!(compressed.len() < data.len(), "{} should compress", algorithm);
            assert_eq!(compressor.decompress(&compressed).unwrap(), data.as_ref());
        }
    }

    #[test]
    fn test_noop_roundtrip() {
        let compressor = NoopCompressor;
        let compressed = compressor.compress(b"abc").unwrap();
        assert_eq!(compressed, b"abc");
        assert_eq!(compressor.decompress(&compressed).unwrap(), b"abc");
    }

    #[test]
    fn test_encode_compresses_large_payloads() {
        let manager = CompressionManager::new();
        let original = stac_like(8192);

        let encoded = manager.encode(original.clone());
        assert!(encoded.data.compressed);
        assert!(!encoded.skipped);
        assert_eq!(encoded.data.original_size, 8192);
        assert!(encoded.data.compression_ratio() < 0.8);
        assert_eq!(manager.decode(&encoded.data).unwrap(), original);
    }

    #[test]
    fn test_encode_skips_small_payloads() {
        let manager = CompressionManager::new();
        let encoded = manager.encode(Bytes::from_static(b"tiny"));
        assert!(!encoded.data.compressed);
        assert!(!encoded.skipped);
    }

    #[test]
    fn test_incompressible_payload_kept_original() {
        for algorithm in [
            CompressionAlgorithm::Lz4,
            CompressionAlgorithm::Zstd,
            CompressionAlgorithm::Snappy,
        ] {
            let manager = CompressionManager::with_config(CompressionConfig {
                algorithm,
                ..Default::default()
            });
            let original = noise(4096);

            let encoded = manager.encode(original.clone());
            assert!(!encoded.data.compressed);
            assert!(encoded.skipped);
            assert_eq!(encoded.data.stored_size(), 4096);
            assert_eq!(manager.decode(&encoded.data).unwrap(), original);
        }
    }

    #[test]
    fn test_disabled_uses_noop() {
        let manager = CompressionManager::with_config(CompressionConfig::disabled());
        assert_eq!(manager.algorithm(), CompressionAlgorithm::None);

        let encoded = manager.encode(stac_like(8192));
        assert!(!encoded.data.compressed);
    }

    #[test]
    fn test_decode_corrupt_data() {
        let manager = CompressionManager::new();
        let data = CacheData::compressed(Bytes::from_static(b"\x05\x00"), 100, CompressionAlgorithm::Zstd);
        let err = manager.decode(&data).unwrap_err();
        assert!(err.is_corruption());
    }
}
