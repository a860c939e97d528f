//! Core types for Kala.
//!
//! Type-safe wrappers for ids, money, phone numbers and statuses.

pub mod id;
pub mod phone;
pub mod price;
pub mod status;

pub use id::*;
pub use phone::{OtpCode, OtpCodeError, PhoneError, PhoneNumber};
pub use price::{Discount, DiscountKind, DiscountedPrice, Toman, discounted};
pub use status::*;
