//! Error types for h264-config-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for h264-config-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for parameter set discovery
#[derive(Error, Debug)]
pub enum Error {
    /// Capture device or encoder could not be acquired or configured
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Read budget exhausted without both parameter sets
    #[error("Could not determine the SPS & PPS after {reads} reads")]
    ParameterSetsNotFound { reads: u32 },

    /// Backing storage for the recorder's throwaway file is not ready
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A resource could not be released after the main attempt
    #[error("Cleanup failed: {0}")]
    CleanupFailure(String),

    /// Malformed parameter sets, cache text or container data
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert to FFI error code
    pub fn to_ffi_code(&self) -> i32 {
        match self {
            Error::DeviceUnavailable(_) => 1,
            Error::ParameterSetsNotFound { .. } => 2,
            Error::StorageUnavailable(_) => 3,
            Error::CleanupFailure(_) => 4,
            Error::InvalidFormat(_) => 5,
            Error::FileNotFound(_) => 6,
            Error::Io(_) => 6,
        }
    }

    /// Whether this error was produced while releasing resources
    pub fn is_cleanup(&self) -> bool {
        matches!(self, Error::CleanupFailure(_))
    }

    pub(crate) fn unavailable(what: &str, cause: impl std::fmt::Display) -> Self {
        Error::DeviceUnavailable(format!("{}: {}", what, cause))
    }

    pub(crate) fn cleanup(what: &str, cause: impl std::fmt::Display) -> Self {
        Error::CleanupFailure(format!("{}: {}", what, cause))
    }
}
