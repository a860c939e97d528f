//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiClient, ApiError};
use crate::cart::CartStore;
use crate::config::StorefrontConfig;
use crate::verify_gate::VerifyGate;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    cart: CartStore,
    verify_gate: VerifyGate,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;
        let cart = CartStore::new(api.clone());
        let verify_gate = VerifyGate::new(config.api.timeout + Duration::from_secs(5));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                cart,
                verify_gate,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the REST API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the OTP verify gate.
    #[must_use]
    pub fn verify_gate(&self) -> &VerifyGate {
        &self.inner.verify_gate
    }
}
