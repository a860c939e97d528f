//! Newtype IDs for type-safe entity references.
//!
//! The remote API is not consistent about identifier encoding: some
//! endpoints return numeric ids, others return string ids (`"_id"` style).
//! Every ID type here accepts either on the way in and always carries a
//! string internally, so the rest of the code has one representation.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize` as a plain string
/// - `Deserialize` from either a JSON string or a JSON integer
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Display`
/// - `new()` / `as_str()` and `From<&str>` / `From<String>`
///
/// # Example
///
/// ```rust
/// # use kala_core::define_id;
/// define_id!(WidgetId);
///
/// let a: WidgetId = serde_json::from_str("42").unwrap();
/// let b: WidgetId = serde_json::from_str("\"42\"").unwrap();
/// assert_eq!(a, b);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from anything string-like.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                <$crate::types::id::RawId as ::serde::Deserialize>::deserialize(deserializer)
                    .map(|raw| Self(raw.into_string()))
            }
        }
    };
}

/// Wire representation of an identifier before normalization.
#[doc(hidden)]
#[derive(serde::Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    #[doc(hidden)]
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Signed(n) => n.to_string(),
            Self::Unsigned(n) => n.to_string(),
        }
    }
}

define_id!(UserId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(CategoryId);
define_id!(OrderId);
define_id!(CartItemId);
define_id!(ImageId);
define_id!(BannerId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_number_and_string() {
        let numeric: OrderId = serde_json::from_str("1024").unwrap();
        let text: OrderId = serde_json::from_str("\"1024\"").unwrap();
        assert_eq!(numeric, text);
        assert_eq!(numeric.as_str(), "1024");
    }

    #[test]
    fn test_deserialize_object_id_style() {
        let id: ProductId = serde_json::from_str("\"64f1a2b3c4d5e6f7a8b9c0d1\"").unwrap();
        assert_eq!(id.to_string(), "64f1a2b3c4d5e6f7a8b9c0d1");
    }

    #[test]
    fn test_serializes_as_string() {
        let id = CategoryId::new("7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7\"");
    }

    #[test]
    fn test_rejects_non_scalar() {
        assert!(serde_json::from_str::<UserId>("{\"id\": 1}").is_err());
    }
}
