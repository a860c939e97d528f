//! Kala Core - Shared types and view-model logic.
//!
//! This crate provides the domain types used by both web crates:
//! - `storefront` - Public-facing shop
//! - `admin` - Back-office for orders, products and banners
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Everything durable lives behind the remote REST API; what is
//! here is the logic that turns its responses into what pages render.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, phone numbers and statuses
//! - [`models`] - Wire models for API responses
//! - [`envelope`] - Response envelope normalization
//! - [`pagination`] - Page requests and page navigation
//! - [`order`] - Order progress view-model
//! - [`otp`] - OTP sign-in state machine
//! - [`cart`] - Cart snapshot
//! - [`payment`] - Payment gateway return parsing
//! - [`redirect`] - Return-URL validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod envelope;
pub mod models;
pub mod order;
pub mod otp;
pub mod pagination;
pub mod payment;
pub mod redirect;
pub mod types;

pub use cart::CartSnapshot;
pub use envelope::{ApiEnvelope, EnvelopeError, Page};
pub use order::{OrderProgress, Stage, Step, StepState};
pub use otp::{Challenge, OtpError, SignInStep};
pub use pagination::{PageRequest, Pagination};
pub use payment::{PaymentReturn, PaymentReturnQuery, ReportedOutcome};
pub use types::*;
