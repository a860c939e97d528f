//! Session models for the admin panel.
//!
//! Catalog, order and banner types come from `kala_core::models`.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
