//! Error types for wkmp-sc
//!
//! `ApiError` is the protocol-facing error: every variant knows its Subsonic
//! error code and a message that is safe to show the client. Internal detail
//! (database errors and the like) is logged, never sent.

use thiserror::Error;
use tracing::error;

use crate::subsonic::ErrorCode;

/// Main error type for wkmp-sc request handling
#[derive(Error, Debug)]
pub enum ApiError {
    /// Code 10
    #[error("Required parameter is missing: {0}")]
    MissingParameter(String),

    /// Code 40; deliberately carries no detail
    #[error("Wrong username or password.")]
    AuthenticationFailed,

    /// Code 43
    #[error("Multiple conflicting authentication mechanisms provided.")]
    ConflictingAuth,

    /// Code 70
    #[error("{0} not found")]
    NotFound(String),

    /// Code 0: invalid value for an otherwise present parameter
    #[error("Invalid value for parameter {0}")]
    InvalidParameter(String),

    /// Code 0
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Code 0
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Protocol error code for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::MissingParameter(_) => ErrorCode::MissingParameter,
            ApiError::AuthenticationFailed => ErrorCode::WrongCredentials,
            ApiError::ConflictingAuth => ErrorCode::ConflictingParameters,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::InvalidParameter(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                ErrorCode::Generic
            }
        }
    }

    /// Message placed in the error envelope
    ///
    /// Internal failures are logged here with full detail and surface to the
    /// client only as the generic message.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Database(_) | ApiError::Internal(_) => {
                error!("Request failed: {}", self);
                ErrorCode::Generic.default_message().to_string()
            }
            ApiError::NotFound(_) => ErrorCode::NotFound.default_message().to_string(),
            other => other.to_string(),
        }
    }
}

impl From<wkmp_common::Error> for ApiError {
    fn from(err: wkmp_common::Error) -> Self {
        match err {
            wkmp_common::Error::Database(e) => ApiError::Database(e),
            wkmp_common::Error::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Convenience Result type using ApiError
pub type Result<T> = std::result::Result<T, ApiError>;
