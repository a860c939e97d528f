//! Client for the remote Kala REST API.
//!
//! # Architecture
//!
//! - Thin `reqwest` wrapper; the API is the source of truth for everything
//! - Every response body is normalized through [`kala_core::ApiEnvelope`]
//!   before anything else looks at it
//! - Categories and slider content are cached via `moka` (5 minute TTL)
//!
//! # Example
//!
//! ```rust,ignore
//! use kala_storefront::api::ApiClient;
//!
//! let client = ApiClient::new(&config.api)?;
//! let page = client.get_all_products(PageRequest::new(1, 12)).await?;
//! ```

mod cache;
mod client;

pub use client::{AddToCart, ApiClient};

use kala_core::EnvelopeError;
use reqwest::StatusCode;
use thiserror::Error;

/// API error code for a missing order.
pub const ORDER_NOT_FOUND: &str = "ORDER_NOT_FOUND";

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
    /// Machine-readable error code from the API, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::NotFound { code, .. } | Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the order could not be found.
    #[must_use]
    pub fn is_order_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. }) || self.code() == Some(ORDER_NOT_FOUND)
    }

    /// Whether the session token needs to be replaced.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Whether the request was rejected as invalid input (4xx other than
    /// auth, not-found and rate limiting).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status) || *status == 200)
    }

    /// Message that is safe to show to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } if self.is_client_error() && !message.is_empty() => {
                message.clone()
            }
            Self::NotFound { .. } => "We couldn't find what you were looking for.".to_string(),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
            Self::RateLimited(secs) => format!("Too many requests. Try again in {secs} seconds."),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}
