//! Error types for Refiner.

use thiserror::Error;

/// Default result type for Refiner.
pub type RefinerResult<T> = Result<T, RefinerError>;

/// Errors that can surface from a refinement run or its collaborators.
#[derive(Error, Debug)]
pub enum RefinerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The completion backend rejected the call (network, auth, rate limit).
    #[error("Transport failure on model '{model}': {message}")]
    Transport { model: String, message: String },

    /// The wall-clock budget of a refinement run was exceeded.
    #[error("Refinement timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Primary transport failed and no usable fallback produced a result.
    #[error("Upstream failure on model '{model}': {message}")]
    Upstream { model: String, message: String },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Backend '{0}' not found or not available")]
    BackendNotFound(String),

    #[error("Backend '{backend}' does not support {capability}")]
    UnsupportedCapability { backend: String, capability: String },

    #[cfg(feature = "cli")]
    #[error("Interactive prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(String),
}

impl RefinerError {
    /// Creates a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a transport error for the given model.
    pub fn transport(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the completion transport.
    ///
    /// Only transport-level failures are eligible for model fallback.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::BackendNotFound(_) | Self::Io(_)
        )
    }

    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
