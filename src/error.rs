//! Error types and handling for the Skyboard dashboard core

use thiserror::Error;

/// Stable classification of a [`DashboardError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Configuration could not be loaded or failed validation
    ConfigInvalid,
    /// Caller supplied input outside the accepted domain
    InvalidInput,
    /// The operation was aborted by its cancellation token
    Cancelled,
    /// The network call failed or the provider answered with a non-success status
    TransportFailure,
    /// Anything not recognised as one of the above
    Unexpected,
}

/// Main error type for the dashboard core.
///
/// Cloneable so a single coalesced failure can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Operation aborted through its cancellation token
    #[error("Request cancelled")]
    Cancelled,

    /// Network or provider status failure
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// Unrecognised failure, including malformed provider payloads
    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

impl DashboardError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new transport error without a status code
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Create a new transport error for a non-success HTTP status
    pub fn transport_status<S: Into<String>>(message: S, status: u16) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a new unexpected error
    pub fn unexpected<S: Into<String>>(message: S) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            DashboardError::Config { .. } => ErrorCode::ConfigInvalid,
            DashboardError::Validation { .. } => ErrorCode::InvalidInput,
            DashboardError::Cancelled => ErrorCode::Cancelled,
            DashboardError::Transport { .. } => ErrorCode::TransportFailure,
            DashboardError::Unexpected { .. } => ErrorCode::Unexpected,
        }
    }

    /// Cancelled results are meant to be dropped silently by callers
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DashboardError::Cancelled)
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            DashboardError::Config { .. } => {
                "Configuration error. Please check your config file and API key.".to_string()
            }
            DashboardError::Validation { message } => format!("Invalid input: {message}"),
            DashboardError::Cancelled => "Request cancelled.".to_string(),
            DashboardError::Transport { message, .. } => message.clone(),
            DashboardError::Unexpected { .. } => {
                "Something went wrong while loading weather data.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DashboardError::unexpected(format!("malformed provider payload: {err}"))
        } else {
            DashboardError::Transport {
                message: "request failed".to_string(),
                status: err.status().map(|s| s.as_u16()),
            }
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::unexpected(format!("malformed provider payload: {err}"))
    }
}
