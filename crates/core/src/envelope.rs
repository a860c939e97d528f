//! Normalized API response envelope.
//!
//! The REST API wraps payloads inconsistently:
//!
//! ```json
//! { "success": true, "data": { ... } }
//! { "data": { "data": [ ... ], "pagination": { ... } } }
//! [ ... ]
//! ```
//!
//! Every body goes through [`ApiEnvelope::from_value`] once, at the client
//! boundary. Callers then ask for a typed value ([`ApiEnvelope::into_data`])
//! or a typed page ([`ApiEnvelope::into_page`]) and never look at the raw
//! shape again.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pagination::Pagination;

/// Keys that may sit next to `data` in a wrapper object.
const META_KEYS: &[&str] = &[
    "success",
    "message",
    "code",
    "status",
    "statusCode",
    "error",
    "errors",
    "pagination",
    "meta",
    "traceId",
    "trace_id",
    "timestamp",
];

/// Keys under which a list payload may appear.
const LIST_KEYS: &[&str] = &[
    "items",
    "products",
    "orders",
    "categories",
    "banners",
    "data",
    "results",
];

/// Maximum wrapper depth that is unwrapped.
const MAX_DEPTH: usize = 3;

/// Errors raised while turning an envelope into a typed value.
#[derive(thiserror::Error, Debug)]
pub enum EnvelopeError {
    /// The body said `success: false`.
    #[error("API error: {message}")]
    Api {
        code: Option<String>,
        message: String,
    },
    /// The payload did not match the expected type.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
    /// A list was expected but none of the known list keys were present.
    #[error("response does not contain a list")]
    MissingList,
}

/// A normalized response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEnvelope {
    pub success: bool,
    pub code: Option<String>,
    pub message: Option<String>,
    pub data: Value,
    pub pagination: Option<Pagination>,
}

/// A page of items plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination::single_page(0),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl ApiEnvelope {
    /// Normalize any response body.
    #[must_use]
    pub fn from_value(body: Value) -> Self {
        let mut envelope = Self {
            success: true,
            code: None,
            message: None,
            data: Value::Null,
            pagination: None,
        };

        // `{ "success": false, "message": ... }` without a `data` key
        if let Value::Object(map) = &body
            && matches!(map.get("success"), Some(Value::Bool(false)))
        {
            envelope.absorb_meta(map);
        }

        let mut current = body;
        for _ in 0..MAX_DEPTH {
            match current {
                Value::Object(mut map) if is_wrapper(&map) => {
                    envelope.absorb_meta(&map);
                    current = map.remove("data").unwrap_or(Value::Null);
                }
                other => {
                    current = other;
                    break;
                }
            }
        }

        envelope.data = current;
        envelope
    }

    /// Parse a body from raw bytes.
    ///
    /// An empty body becomes `data: null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::from_value(Value::Null));
        }
        Ok(Self::from_value(serde_json::from_slice(bytes)?))
    }

    fn absorb_meta(&mut self, map: &Map<String, Value>) {
        if let Some(Value::Bool(success)) = map.get("success") {
            self.success &= *success;
        }
        if let Some(code) = map.get("code").and_then(scalar_to_string) {
            self.code = Some(code);
        }
        if let Some(Value::String(message)) = map.get("message") {
            self.message = Some(message.clone());
        }
        if self.pagination.is_none() {
            self.pagination = map
                .get("pagination")
                .or_else(|| map.get("meta"))
                .and_then(|v| Pagination::deserialize(v).ok());
        }
    }

    fn check_success(&self) -> Result<(), EnvelopeError> {
        if self.success {
            Ok(())
        } else {
            Err(EnvelopeError::Api {
                code: self.code.clone(),
                message: self
                    .message
                    .clone()
                    .unwrap_or_else(|| "request failed".to_owned()),
            })
        }
    }

    /// Deserialize the payload as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Api`] for `success: false` bodies and
    /// [`EnvelopeError::Decode`] if the payload does not match `T`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, EnvelopeError> {
        self.check_success()?;
        Ok(serde_json::from_value(self.data)?)
    }

    /// Deserialize the payload as a page of `T`.
    ///
    /// Accepts a raw array, or an object holding the list under one of the
    /// known list keys (`items`, `products`, `data`, ...) with optional
    /// `pagination`/`meta` alongside.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingList`] if no list is found.
    pub fn into_page<T: DeserializeOwned>(self) -> Result<Page<T>, EnvelopeError> {
        self.check_success()?;

        match self.data {
            Value::Array(items) => {
                let len = items.len();
                let items: Vec<T> = serde_json::from_value(Value::Array(items))?;
                Ok(Page {
                    items,
                    pagination: self
                        .pagination
                        .unwrap_or_else(|| Pagination::single_page(len)),
                })
            }
            Value::Object(mut map) => {
                let list = LIST_KEYS
                    .iter()
                    .find_map(|key| match map.remove(*key) {
                        Some(Value::Array(items)) => Some(items),
                        _ => None,
                    })
                    .ok_or(EnvelopeError::MissingList)?;

                let pagination = map
                    .get("pagination")
                    .or_else(|| map.get("meta"))
                    .and_then(|v| Pagination::deserialize(v).ok())
                    .or(self.pagination)
                    .unwrap_or_else(|| Pagination::single_page(list.len()));

                Ok(Page {
                    items: serde_json::from_value(Value::Array(list))?,
                    pagination,
                })
            }
            Value::Null => Ok(Page::empty()),
            _ => Err(EnvelopeError::MissingList),
        }
    }

    /// Deserialize a payload where only success matters.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Api`] for `success: false` bodies.
    pub fn into_unit(self) -> Result<(), EnvelopeError> {
        self.check_success()
    }
}

/// An object is a wrapper when it has `data` and nothing but metadata
/// alongside it.
fn is_wrapper(map: &Map<String, Value>) -> bool {
    map.contains_key("data")
        && map
            .keys()
            .all(|key| key == "data" || META_KEYS.contains(&key.as_str()))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
