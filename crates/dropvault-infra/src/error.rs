//! HTTP error body
//!
//! `IntoResponse` for `AppError` lives in the API crate: neither the trait nor
//! the error type is local to this crate.

use dropvault_core::ErrorMetadata;
use serde::{Deserialize, Serialize};

/// Standard error response format for HTTP APIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Build the body for an error. Details are omitted for sensitive errors
    /// and always in production.
    pub fn from_error<E>(err: &E, is_production: bool) -> Self
    where
        E: ErrorMetadata + std::fmt::Display,
    {
        let details = if is_production || err.is_sensitive() {
            None
        } else {
            Some(err.to_string())
        };

        Self {
            error: err.client_message(),
            code: err.error_code().to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action().map(str::to_string),
            details,
        }
    }
}
