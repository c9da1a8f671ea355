//! Error types and error code constants for regolith.
//!
//! Each subsystem owns a small `thiserror` enum describing its own failure
//! modes ([`CacheError`], [`FixError`](crate::fixer::FixError),
//! [`ConfigError`](crate::config::ConfigError)). Front doors convert those into
//! the unified [`RegolithError`] through `From` bridges, and
//! [`OutputErrorCode`] maps every unified variant onto a stable process exit code.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Resolution errors (file not found)
//! - `4`: Apply errors (conflicts or failed write-back)
//! - `10`: Internal errors (bugs, unexpected state)
//!
//! Stale diagnostic locations and rename/delete of unknown URIs are never
//! errors; they are skipped or treated as no-ops where they occur.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::fixer::FixError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes used as CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed request).
    InvalidArguments = 2,
    /// Resolution errors (file not found).
    ResolutionError = 3,
    /// Apply errors (conflicting fixes, failed write-back).
    ApplyError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Cache Errors
// ============================================================================

/// Errors raised by [`StateCache`](crate::cache::StateCache) operations.
///
/// Only disk-backed operations can fail; every in-memory accessor is infallible.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading a file from disk failed. The cache is left unchanged.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for front doors.
#[derive(Debug, Error)]
pub enum RegolithError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Fixes could not be applied (conflicts, failed writes).
    #[error("apply error: {message}")]
    ApplyError {
        message: String,
        file: Option<String>,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl From<&RegolithError> for OutputErrorCode {
    fn from(err: &RegolithError) -> Self {
        match err {
            RegolithError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            RegolithError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            RegolithError::ApplyError { .. } => OutputErrorCode::ApplyError,
            RegolithError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<RegolithError> for OutputErrorCode {
    fn from(err: RegolithError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<CacheError> for RegolithError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io { path, source } if source.kind() == io::ErrorKind::NotFound => {
                RegolithError::FileNotFound {
                    path: path.to_string_lossy().into_owned(),
                }
            }
            CacheError::Io { path, source } => RegolithError::InternalError {
                message: format!("IO error reading {}: {}", path.display(), source),
            },
        }
    }
}

impl From<FixError> for RegolithError {
    fn from(err: FixError) -> Self {
        match err {
            FixError::MissingOptions { .. } | FixError::TypeMismatch { .. } => {
                RegolithError::InvalidArguments {
                    message: err.to_string(),
                }
            }
            FixError::UnknownFixer { .. } => RegolithError::InvalidArguments {
                message: err.to_string(),
            },
        }
    }
}

impl From<ConfigError> for RegolithError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io { .. } => RegolithError::InternalError {
                message: err.to_string(),
            },
            ConfigError::Json { .. } | ConfigError::InvalidGlob { .. } => {
                RegolithError::InvalidArguments {
                    message: err.to_string(),
                }
            }
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl RegolithError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        RegolithError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        RegolithError::FileNotFound { path: path.into() }
    }

    /// Create an apply error for a specific file.
    pub fn apply(message: impl Into<String>, file: Option<String>) -> Self {
        RegolithError::ApplyError {
            message: message.into(),
            file,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        RegolithError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
