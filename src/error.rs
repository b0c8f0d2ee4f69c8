//! Error types for the STAC cache
//!
//! Provides structured error types for the tiered cache, the durable
//! key-value cache, the presigned token cache and their collaborators.

use thiserror::Error;

// =============================================================================
// Network Error
// =============================================================================

/// Failure reported by a network collaborator.
///
/// Cloneable so that every caller joined on a de-duplicated request can
/// observe the same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Network request to {url} failed{}: {message}", status_suffix(.status))]
pub struct NetworkError {
    /// URL that was requested
    pub url: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Human readable reason
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" with status {}", status),
        None => String::new(),
    }
}

impl NetworkError {
    /// A transport-level failure (no response received)
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    /// A non-success HTTP status
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            message: "non-success status".to_string(),
        }
    }

    /// Check if a retry could succeed (transport failure, 5xx or 429)
    pub fn is_transient(&self) -> bool {
        match self.status {
            None => true,
            Some(status) => status == 429 || status >= 500,
        }
    }
}

// =============================================================================
// Crate Error
// =============================================================================

/// Unified error type for the cache layer
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Network Errors
    // =========================================================================
    #[error(transparent)]
    Network(#[from] NetworkError),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage unavailable: {store} - {reason}")]
    StorageUnavailable { store: String, reason: String },

    #[error("Storage quota exceeded: requested {requested} bytes, available {available} bytes")]
    QuotaExceeded { requested: u64, available: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // =========================================================================
    // Parse / IO Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a caller of the cache should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHandling {
    /// Affects correctness of the returned value; surface to the caller
    Propagate,
    /// Affects only a storage tier; skip the tier for this operation
    DegradeTier,
    /// Cached payload is unusable; treat as a miss and delete it
    TreatAsMiss,
}

impl Error {
    /// Convenience constructor for an unavailable store
    pub fn unavailable(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::StorageUnavailable {
            store: store.into(),
            reason: reason.into(),
        }
    }

    /// Determine how this error should be handled
    pub fn handling(&self) -> ErrorHandling {
        match self {
            Error::Network(_) | Error::Configuration(_) | Error::YamlParse(_) => {
                ErrorHandling::Propagate
            }

            Error::StorageUnavailable { .. } | Error::QuotaExceeded { .. } | Error::Io(_) => {
                ErrorHandling::DegradeTier
            }

            Error::Serialization(_) | Error::JsonParse(_) => ErrorHandling::TreatAsMiss,

            Error::Internal(_) => ErrorHandling::DegradeTier,
        }
    }

    /// Check if this error only affects performance, never correctness
    pub fn is_soft(&self) -> bool {
        !matches!(self.handling(), ErrorHandling::Propagate)
    }

    /// Check if the offending cache entry should be deleted
    pub fn is_corruption(&self) -> bool {
        matches!(self.handling(), ErrorHandling::TreatAsMiss)
    }
}

/// Result type alias for the cache layer
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_handling() {
        let err = Error::Network(NetworkError::status("https://example.com", 500));
        assert_eq!(err.handling(), ErrorHandling::Propagate);
        assert!(!err.is_soft());

        let err = Error::QuotaExceeded {
            requested: 1000,
            available: 500,
        };
        assert_eq!(err.handling(), ErrorHandling::DegradeTier);
        assert!(err.is_soft());

        let err = Error::Serialization("truncated".into());
        assert_eq!(err.handling(), ErrorHandling::TreatAsMiss);
        assert!(err.is_corruption());
    }

    #[test]
    fn test_network_error_transient() {
        assert!(NetworkError::transport("u", "connection reset").is_transient());
        assert!(NetworkError::status("u", 503).is_transient());
        assert!(NetworkError::status("u", 429).is_transient());
        assert!(!NetworkError::status("u", 404).is_transient());
    }

    #[test]
    fn test_network_error_display() {
        let err = NetworkError::status("https://example.com/collections", 404);
        assert_eq!(
            err.to_string(),
            "Network request to https://example.com/collections failed with status 404: non-success status"
        );

        let err = NetworkError::transport("https://example.com", "timed out");
        assert_eq!(err.to_string(), "Network request to https://example.com failed: timed out");
    }
}
