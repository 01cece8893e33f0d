//! Error types for ambience-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Playback-path errors are terminal for the failing operation only; callers log
//! them and leave prior playback state untouched.

use thiserror::Error;

/// Main error type for ambience-ap
#[derive(Error, Debug)]
pub enum Error {
    /// The host provides no audio capability; playback degrades to a silent no-op
    #[error("Audio environment unsupported: {0}")]
    EnvironmentUnsupported(String),

    /// Asset fetch failed (non-success status or transport failure)
    #[error("Failed to load asset '{asset}'{}", status_suffix(.status))]
    AssetLoad {
        /// Asset (loop) name
        asset: String,
        /// HTTP-equivalent status, when the source reported one
        status: Option<u16>,
    },

    /// Malformed audio data
    #[error("Failed to decode asset '{asset}': {reason}")]
    Decode {
        /// Asset name
        asset: String,
        /// Decoder message
        reason: String,
    },

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Invalid state for operation (e.g. starting a source twice)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] ambience_common::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(": HTTP {}", s)).unwrap_or_default()
}

impl Error {
    /// True for errors that mean "no audio here" rather than a failed operation
    pub fn is_environment_unsupported(&self) -> bool {
        matches!(self, Error::EnvironmentUnsupported(_))
    }
}

/// Convenience Result type using ambience-ap Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_load_display_includes_status() {
        let err = Error::AssetLoad {
            asset: "create".to_string(),
            status: Some(404),
        };
        assert_eq!(err.to_string(), "Failed to load asset 'create': HTTP 404");

        let err = Error::AssetLoad {
            asset: "create".to_string(),
            status: None,
        };
        assert_eq!(err.to_string(), "Failed to load asset 'create'");
    }

    #[test]
    fn test_environment_unsupported_flag() {
        assert!(Error::EnvironmentUnsupported("none".into()).is_environment_unsupported());
        assert!(!Error::InvalidState("x".into()).is_environment_unsupported());
    }
}
