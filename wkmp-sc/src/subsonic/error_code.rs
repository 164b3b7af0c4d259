//! Subsonic protocol error codes
//!
//! The numeric values are part of the wire contract and must never be
//! renumbered. Each code also fixes the HTTP status the response carries.

use axum::http::StatusCode;
use serde::Serialize;

/// Closed set of protocol error codes this server can signal
///
/// 41, 42 and 44 are reserved: defined for completeness, never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// 0: generic failure (store or codec error, unexpected state)
    Generic,
    /// 10: a required parameter is missing
    MissingParameter,
    /// 40: wrong username or password, bad token, bad API key
    WrongCredentials,
    /// 41: reserved
    TokenAuthNotSupported,
    /// 42: reserved
    AuthMechanismNotSupported,
    /// 43: conflicting or disallowed parameter combination
    ConflictingParameters,
    /// 44: reserved
    InvalidApiKey,
    /// 70: requested entity not found
    NotFound,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::Generic,
        ErrorCode::MissingParameter,
        ErrorCode::WrongCredentials,
        ErrorCode::TokenAuthNotSupported,
        ErrorCode::AuthMechanismNotSupported,
        ErrorCode::ConflictingParameters,
        ErrorCode::InvalidApiKey,
        ErrorCode::NotFound,
    ];

    /// Numeric code as sent on the wire
    pub fn code(self) -> u32 {
        match self {
            ErrorCode::Generic => 0,
            ErrorCode::MissingParameter => 10,
            ErrorCode::WrongCredentials => 40,
            ErrorCode::TokenAuthNotSupported => 41,
            ErrorCode::AuthMechanismNotSupported => 42,
            ErrorCode::ConflictingParameters => 43,
            ErrorCode::InvalidApiKey => 44,
            ErrorCode::NotFound => 70,
        }
    }

    /// HTTP status for an error envelope carrying this code
    pub fn http_status(self) -> StatusCode {
        http_status_for_code(self.code())
    }

    /// Default client-facing message
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::Generic => "A generic error.",
            ErrorCode::MissingParameter => "Required parameter is missing.",
            ErrorCode::WrongCredentials => "Wrong username or password.",
            ErrorCode::TokenAuthNotSupported => "Token authentication not supported.",
            ErrorCode::AuthMechanismNotSupported => {
                "Provided authentication mechanism not supported."
            }
            ErrorCode::ConflictingParameters => {
                "Multiple conflicting authentication mechanisms provided."
            }
            ErrorCode::InvalidApiKey => "Invalid API key.",
            ErrorCode::NotFound => "The requested data was not found.",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

/// Fixed code → HTTP status table
///
/// 10 → 400, 40..=44 → 401, 70 → 404, anything else → 500.
pub fn http_status_for_code(code: u32) -> StatusCode {
    match code {
        10 => StatusCode::BAD_REQUEST,
        40..=44 => StatusCode::UNAUTHORIZED,
        70 => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_are_fixed() {
        let codes: Vec<u32> = ErrorCode::ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec![0, 10, 40, 41, 42, 43, 44, 70]);
    }

    #[test]
    fn test_http_status_table() {
        assert_eq!(http_status_for_code(10), StatusCode::BAD_REQUEST);
        for code in 40..=44 {
            assert_eq!(http_status_for_code(code), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(http_status_for_code(70), StatusCode::NOT_FOUND);

        assert_eq!(http_status_for_code(0), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(http_status_for_code(50), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(http_status_for_code(45), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_every_code_has_a_status_and_message() {
        for code in ErrorCode::ALL {
            assert_eq!(code.http_status(), http_status_for_code(code.code()));
            assert!(!code.default_message().is_empty());
        }
    }

    #[test]
    fn test_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ErrorCode::ConflictingParameters).unwrap(), "43");
    }
}
