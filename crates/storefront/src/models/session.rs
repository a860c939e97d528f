//! Session-related types.
//!
//! Everything the browser used to keep in local storage lives in the
//! server-side session under these keys.

use secrecy::SecretString;

use kala_core::PhoneNumber;

/// The signed-in customer, rebuilt from session values on each request.
#[derive(Debug, Clone)]
pub struct CurrentCustomer {
    /// Bearer token for the REST API.
    pub token: SecretString,
    /// Phone number the customer signed in with.
    pub phone: Option<PhoneNumber>,
}

/// Session keys for storefront state.
pub mod keys {
    /// Bearer token issued by `verify-code`.
    pub const AUTH_TOKEN: &str = "auth_token";

    /// Phone number of the signed-in customer.
    pub const CUSTOMER_PHONE: &str = "customer_phone";

    /// Where to go after signing in.
    pub const LOGIN_REDIRECT: &str = "login_redirect";

    /// OTP sign-in state machine.
    pub const SIGN_IN_FLOW: &str = "sign_in_flow";

    /// Key of this session's cart snapshot in the cart store.
    pub const CART_KEY: &str = "cart_key";

    /// One-shot message shown on the next rendered page.
    pub const FLASH: &str = "flash";
}
