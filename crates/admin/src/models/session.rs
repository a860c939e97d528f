//! Session-related types for admin authentication.
//!
//! The admin is signed in while the session holds an API bearer token. The
//! role comes from the login response and only gates what the UI offers;
//! the API enforces it again on every call.

use kala_core::AdminRole;
use secrecy::SecretString;

/// The signed-in admin, rebuilt from session values on each request.
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    /// Bearer token for the REST API.
    pub token: SecretString,
    /// Permission level returned by the login call.
    pub role: AdminRole,
    /// Username typed at login, for display and logs.
    pub username: String,
}

/// Session keys for admin state.
pub mod keys {
    /// Bearer token issued by `admin/auth/login`.
    pub const ADMIN_TOKEN: &str = "admin_token";

    /// Role of the signed-in admin.
    pub const ADMIN_ROLE: &str = "admin_role";

    /// Username of the signed-in admin.
    pub const ADMIN_USERNAME: &str = "admin_username";

    /// Where to go after signing in.
    pub const LOGIN_REDIRECT: &str = "login_redirect";

    /// One-shot message shown on the next rendered page.
    pub const FLASH: &str = "flash";

    /// Product form being edited.
    pub const PRODUCT_DRAFT: &str = "product_draft";
}
