//! Session models for the storefront.
//!
//! Catalog, cart and order types come from `kala_core::models`.

pub mod session;

pub use session::{CurrentCustomer, keys as session_keys};
