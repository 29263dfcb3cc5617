//! Error types for native library loading.
//!
//! Each variant carries enough context (offending path, partially detected
//! platform values) to diagnose a failed load without reading the source.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the loader entry points.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The operating system is neither macOS nor Linux.
    #[error("unsupported operating system {os}")]
    UnsupportedPlatform {
        /// OS name as reported by the runtime.
        os: String,
    },

    /// The Linux distribution or its release could not be determined.
    #[error(
        "cannot determine Linux distribution release (distro: {}, release: {})",
        .distro.as_deref().unwrap_or("<unknown>"),
        .release.as_deref().unwrap_or("<unknown>")
    )]
    DistroDetectionFailed {
        /// Distribution label, if it was found.
        distro: Option<String>,
        /// Release major version, if it was found.
        release: Option<String>,
    },

    /// The resource path is malformed.
    #[error("invalid resource path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The archive has no resource at the given path.
    #[error("resource {path} was not found in the archive")]
    NotFound {
        /// The missing resource path.
        path: String,
    },

    /// Creating or filling the temporary file failed.
    #[error("I/O failure at {}: {reason}", .path.display())]
    Io {
        /// File being written, or the temp directory.
        path: PathBuf,
        /// Description of the underlying I/O error.
        reason: String,
    },

    /// The native loader rejected the extracted file.
    #[error("failed to load native library {}: {reason}", .path.display())]
    LoadFailure {
        /// Absolute path of the extracted library.
        path: PathBuf,
        /// Loader diagnostic.
        reason: String,
    },
}

impl LoadError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }
}
