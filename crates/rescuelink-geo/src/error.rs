use std::time::Duration;

use thiserror::Error;

/// Reasons a device position could not be acquired.
///
/// Callers recover from all three the same way; the variant only changes
/// what gets logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("position request timed out after {0:?}")]
    Timeout(Duration),
}

impl PositionError {
    /// Short machine-friendly name, used as a structured log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PositionError::PermissionDenied => "permission_denied",
            PositionError::Unavailable(_) => "unavailable",
            PositionError::Timeout(_) => "timeout",
        }
    }
}

/// Errors returned by a reverse geocoder.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("geocoder returned no usable place name")]
    NoLabel,

    #[error("invalid geocoder URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}
