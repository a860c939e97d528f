//! Client for the admin endpoints of the Kala REST API.
//!
//! # Architecture
//!
//! - Thin `reqwest` wrapper over `/admin/*` plus the public catalog reads
//! - Every call carries the admin bearer token
//! - Bodies are normalized through [`kala_core::ApiEnvelope`]
//! - Product saves go out as multipart: a JSON `payload` part plus one
//!   `images` part per new upload

mod client;

pub use client::{AdminApiClient, ImageUpload};

use kala_core::EnvelopeError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when calling the REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The bearer token was missing, expired or rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// The token is valid but the role may not do this.
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        code: Option<String>,
        message: String,
    },

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The API rejected the request.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<EnvelopeError> for ApiError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Api { code, message } => Self::Api {
                status: StatusCode::OK.as_u16(),
                code,
                message,
            },
            EnvelopeError::Decode(e) => Self::Parse(e.to_string()),
            other @ EnvelopeError::MissingList => Self::Parse(other.to_string()),
        }
    }
}

impl ApiError {
    /// Whether the admin needs to sign in again.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Whether the API rejected the input (4xx other than auth, not-found
    /// and rate limiting).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status) || *status == 200)
    }

    /// Message that is safe to show in the back-office.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } if self.is_client_error() && !message.is_empty() => {
                message.clone()
            }
            Self::NotFound { message, .. } if !message.is_empty() => message.clone(),
            Self::NotFound { .. } => "Not found.".to_string(),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
            Self::Forbidden => "Your role does not allow this action.".to_string(),
            Self::RateLimited(secs) => format!("Too many requests. Try again in {secs} seconds."),
            _ => "The API request failed. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        let err = ApiError::Api {
            status: 422,
            code: None,
            message: "Price is required".to_string(),
        };
        assert_eq!(err.user_message(), "Price is required");

        let err = ApiError::Api {
            status: 503,
            code: None,
            message: "upstream down".to_string(),
        };
        assert_eq!(err.user_message(), "The API request failed. Please try again.");
        assert_eq!(
            ApiError::Forbidden.user_message(),
            "Your role does not allow this action."
        );
    }
}
