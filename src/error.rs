//! Error handling for Strata
//!
//! Nothing in this core is fatal at runtime: a missing resource is the
//! documented first-run condition and malformed data degrades to defaults.
//! The error type exists so stores and codecs can report *why* something
//! was rejected; callers decide whether to surface or swallow it.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Strata operations
pub type Result<T> = std::result::Result<T, StrataError>;

/// Main error type for Strata operations
#[derive(Error, Debug)]
pub enum StrataError {
    // Resource Errors
    #[error("Resource read failed: {path}")]
    ResourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource write failed: {path}")]
    ResourceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed resource '{name}': expected {expected} bytes, got {actual}")]
    MalformedResource {
        name: String,
        expected: usize,
        actual: usize,
    },

    // Command Stream Errors
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Unknown layer tag: {tag}")]
    UnknownLayerTag { tag: u8 },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrataError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            StrataError::ResourceRead { .. } => "RESOURCE_READ",
            StrataError::ResourceWrite { .. } => "RESOURCE_WRITE",
            StrataError::MalformedResource { .. } => "MALFORMED_RESOURCE",
            StrataError::MalformedFrame { .. } => "MALFORMED_FRAME",
            StrataError::UnknownLayerTag { .. } => "UNKNOWN_LAYER_TAG",
            StrataError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the surface may treat the condition as "resource absent"
    /// and fall back to hardcoded defaults.
    pub fn degrades_to_defaults(&self) -> bool {
        matches!(
            self,
            StrataError::MalformedResource { .. }
                | StrataError::MalformedFrame { .. }
                | StrataError::UnknownLayerTag { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = StrataError::MalformedResource {
            name: "patch.prm".to_string(),
            expected: 20,
            actual: 7,
        };
        assert_eq!(err.error_code(), "MALFORMED_RESOURCE");
        assert!(err.degrades_to_defaults());
    }

    #[test]
    fn test_io_errors_are_not_default_fallback() {
        let err = StrataError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(!err.degrades_to_defaults());
    }
}
