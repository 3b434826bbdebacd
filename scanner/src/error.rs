//! Error types for scanner operations.

use thiserror::Error;

/// Errors surfaced by the loader, handle construction and payload fetches.
///
/// Scan failures are not errors: they are reported through
/// [`ScanOutcome`](crate::ScanOutcome).
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("native scanner library unavailable: {0}")]
    Load(String),

    #[error("scanner '{0}' not found or already in use")]
    DeviceNotFound(String),

    #[error("failed to turn on scanner '{name}' ({code})")]
    Open { name: String, code: i32 },

    #[error("failed to obtain capabilities of scanner '{name}' ({code})")]
    Capabilities { name: String, code: i32 },

    #[error("failed to get {what} ({code})")]
    Fetch { what: &'static str, code: i32 },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("driver check failed: {0}")]
    Conformance(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScannerError>;
