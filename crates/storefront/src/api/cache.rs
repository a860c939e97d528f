//! Cache types for catalog responses.

use kala_core::models::{Banner, Category};

/// Cache key for shared catalog reads.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Categories,
    Slider,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Vec<Category>),
    Slider(Vec<Banner>),
}
