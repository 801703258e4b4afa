use std::path::PathBuf;

use thiserror::Error;

/// Central error type for the unmix crate.
#[derive(Debug, Error)]
pub enum UnmixError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Domain-specific variants
    #[error("Audio file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid band {low_hz}..{high_hz} Hz at {sample_rate} Hz sample rate")]
    InvalidBand {
        low_hz: f64,
        high_hz: f64,
        sample_rate: u32,
    },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Checksum mismatch for {path}")]
    Checksum { path: String },

    #[error("Cache dir not available")]
    CacheDirUnavailable,
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for UnmixError {
    fn from(e: std::io::Error) -> Self {
        UnmixError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for UnmixError {
    fn from(e: serde_json::Error) -> Self {
        UnmixError::Anyhow(e.into())
    }
}

impl From<reqwest::Error> for UnmixError {
    fn from(e: reqwest::Error) -> Self {
        UnmixError::Anyhow(e.into())
    }
}

impl From<hex::FromHexError> for UnmixError {
    fn from(e: hex::FromHexError) -> Self {
        UnmixError::Anyhow(e.into())
    }
}

impl From<hound::Error> for UnmixError {
    fn from(e: hound::Error) -> Self {
        UnmixError::Anyhow(e.into())
    }
}

impl From<symphonia::core::errors::Error> for UnmixError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        UnmixError::Anyhow(e.into())
    }
}

impl From<ort::Error> for UnmixError {
    fn from(e: ort::Error) -> Self {
        UnmixError::Anyhow(e.into())
    }
}

pub type Result<T> = std::result::Result<T, UnmixError>;
