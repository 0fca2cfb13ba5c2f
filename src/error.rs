//! Error handling for the relay
//!
//! Every backend call, credential lookup and configuration step reports failures
//! through [`RelayError`]. The orchestrator never lets one escape to the chat
//! surface: errors are either turned into a fallback to the next backend or into a
//! fixed user-facing reply (see [`crate::replies`]).
//!
//! # Error Categories
//!
//! - **Input Validation** - malformed action payloads
//! - **Configuration** - missing endpoints, keys or credentials
//! - **Authentication** - no credential provider produced a token
//! - **Transport** - connection failures and unexpected HTTP status codes
//! - **Backend** - malformed or unexpected backend payloads
//!
//! ```rust
//! use fabric_relay::error::RelayError;
//!
//! fn describe(error: &RelayError) -> &'static str {
//!     if error.is_network_error() {
//!         "check connectivity"
//!     } else if error.is_auth_error() {
//!         "check credentials"
//!     } else {
//!         "unexpected"
//!     }
//! }
//!
//! assert_eq!(describe(&RelayError::network_error("reset")), "check connectivity");
//! ```

use thiserror::Error;

/// Main error type for the relay
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    /// Input validation errors (action payload is invalid)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors (endpoints, keys, identifiers)
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// No usable credential could be obtained
    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    /// Connection-level failures
    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// A backend answered with an unexpected HTTP status
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Backend payload did not have the expected shape
    #[error("Backend error: {message}")]
    BackendError { message: String },

    /// Request exceeded the configured HTTP timeout
    #[error("Timeout error: {message}")]
    TimeoutError { message: String },

    /// Action dispatch errors
    #[error("Action error: {message}")]
    ActionError { message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl RelayError {
    /// Create a simple InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a simple ConfigurationError
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create an AuthenticationError
    pub fn authentication_error(message: impl Into<String>) -> Self {
        Self::AuthenticationError {
            message: message.into(),
        }
    }

    /// Create a NetworkError
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Create an HttpStatus error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a BackendError
    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::BackendError {
            message: message.into(),
        }
    }

    /// Create a TimeoutError
    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::TimeoutError {
            message: message.into(),
        }
    }

    /// Create an ActionError
    pub fn action_error(message: impl Into<String>) -> Self {
        Self::ActionError {
            message: message.into(),
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Check if this error came from the transport layer
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            RelayError::NetworkError { .. } | RelayError::TimeoutError { .. }
        )
    }

    /// Check if this error is due to credentials or missing configuration
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            RelayError::AuthenticationError { .. } | RelayError::ConfigurationError { .. }
        ) || matches!(self, RelayError::HttpStatus { status, .. } if *status == 401 || *status == 403)
    }

    /// Check if this error is due to user input
    pub fn is_user_error(&self) -> bool {
        matches!(self, RelayError::InvalidInput { .. })
    }

    /// HTTP status carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RelayError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return RelayError::serialization_error(format!("Failed to decode response: {}", error));
        }
        if error.is_timeout() {
            return RelayError::timeout_error(error.to_string());
        }
        if let Some(status) = error.status() {
            return RelayError::http_status(status.as_u16(), error.to_string());
        }
        RelayError::network_error(error.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        RelayError::serialization_error(format!("JSON serialization failed: {}", error))
    }
}

impl From<crate::config::ConfigError> for RelayError {
    fn from(error: crate::config::ConfigError) -> Self {
        RelayError::configuration_error(error.to_string())
    }
}
