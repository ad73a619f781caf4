//! Error handling for Overdub
//!
//! Every failure is reported once, at the boundary of the operation that
//! caused it (decode, render, encode). Nothing is retried inside the core.

use thiserror::Error;

/// Result type alias for Overdub operations
pub type Result<T> = std::result::Result<T, MixError>;

/// Main error type for Overdub operations
#[derive(Error, Debug)]
pub enum MixError {
    // Buffer Errors
    #[error("Frame index {index} out of range (buffer has {frame_count} frames)")]
    OutOfRange { index: usize, frame_count: usize },

    #[error("Unsupported channel layout: {channels} channels")]
    UnsupportedChannelLayout { channels: usize },

    #[error("Invalid buffer: {reason}")]
    InvalidBuffer { reason: String },

    // Render Errors
    #[error("Invalid render duration: {frames} output frames")]
    InvalidDuration { frames: i64 },

    #[error("Missing input: no {input} buffer supplied")]
    MissingInput { input: String },

    #[error("Invalid parameter '{param}': {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Invalid graph: {reason}")]
    InvalidGraph { reason: String },

    // Decode / Encode Errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Could not decode audio: {reason}")]
    DecodeFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Encode failed: {reason}")]
    EncodeFailure { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MixError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixError::OutOfRange { .. } => "OUT_OF_RANGE",
            MixError::UnsupportedChannelLayout { .. } => "UNSUPPORTED_CHANNEL_LAYOUT",
            MixError::InvalidBuffer { .. } => "INVALID_BUFFER",
            MixError::InvalidDuration { .. } => "INVALID_DURATION",
            MixError::MissingInput { .. } => "MISSING_INPUT",
            MixError::InvalidParameter { .. } => "INVALID_PARAMETER",
            MixError::InvalidGraph { .. } => "INVALID_GRAPH",
            MixError::FileNotFound { .. } => "FILE_NOT_FOUND",
            MixError::DecodeFailure { .. } => "DECODE_FAILURE",
            MixError::EncodeFailure { .. } => "ENCODE_FAILURE",
            MixError::Io(_) => "IO_ERROR",
            MixError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller can recover by supplying different input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MixError::FileNotFound { .. }
                | MixError::DecodeFailure { .. }
                | MixError::MissingInput { .. }
                | MixError::InvalidParameter { .. }
                | MixError::InvalidDuration { .. }
                | MixError::UnsupportedChannelLayout { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MixError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            MixError::DecodeFailure { .. } => vec![
                "Try another file format (WAV)",
                "Check if the file plays in another application",
            ],
            MixError::MissingInput { .. } => vec![
                "Load a backing track first",
                "Record a vocal take before previewing or exporting",
            ],
            MixError::InvalidDuration { .. } => vec![
                "Both the backing track and the vocal take are empty",
                "Record a longer take",
            ],
            MixError::UnsupportedChannelLayout { .. } => {
                vec!["Re-export the source with at least one channel"]
            }
            MixError::InvalidParameter { .. } => vec![
                "Effect amounts must be zero or positive",
                "Monitor gain must be zero or positive",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = MixError::MissingInput {
            input: "vocal".to_string(),
        };
        assert_eq!(err.error_code(), "MISSING_INPUT");
        assert_eq!(err.to_string(), "Missing input: no vocal buffer supplied");
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = MixError::DecodeFailure {
            reason: "not a RIFF file".to_string(),
            source: None,
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_encode_failure_is_not_recoverable() {
        let err = MixError::EncodeFailure {
            reason: "data chunk exceeds 4 GiB".to_string(),
        };
        assert!(!err.is_recoverable());
        assert!(err.recovery_suggestions().is_empty());
    }
}
