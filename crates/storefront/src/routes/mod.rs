//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (slider, categories, latest products)
//! GET  /health                 - Health check
//! GET  /health/ready           - Readiness check (API reachable)
//!
//! # Catalog
//! GET  /products               - All products (paged)
//! GET  /categories/{id}        - Products in a category
//! GET  /labels/{label}         - Products with a label
//! GET  /search?q=              - Product search
//!
//! # Cart
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (redirects back)
//! POST /cart/update            - Update quantity (redirects to /cart)
//! POST /cart/remove            - Remove line (redirects to /cart)
//! GET  /cart/count             - Cart count badge (fragment)
//! POST /cart/refresh           - Refetch cart, return badge
//! GET  /cart/events            - Cart count stream (SSE)
//!
//! # Auth (OTP)
//! GET  /auth/login             - Phone or code step
//! POST /auth/send-code         - Request a code (rate limited)
//! POST /auth/resend-code       - Request another code (rate limited)
//! POST /auth/verify            - Check the code (rate limited)
//! POST /auth/change-phone      - Back to the phone step
//! POST /auth/logout            - Sign out
//!
//! # Orders (requires auth)
//! GET  /orders/{id}            - Order detail with progress
//! POST /orders/{id}/pay        - Hand off to the payment gateway
//!
//! # Payment
//! GET  /result                 - Gateway return page
//! ```

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod home;
pub mod layout;
pub mod orders;
pub mod payment;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/send-code", post(auth::send_code))
        .route("/resend-code", post(auth::resend_code))
        .route("/verify", post(auth::verify))
        .route_layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/change-phone", post(auth::change_phone))
        .route("/logout", post(auth::logout))
        .merge(limited)
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .route("/refresh", post(cart::refresh_count))
        .route("/events", get(cart::events))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(orders::show))
        .route("/{id}/pay", post(payment::pay))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Catalog
        .route("/products", get(catalog::index))
        .route("/categories/{id}", get(catalog::category))
        .route("/labels/{label}", get(catalog::label))
        .route("/search", get(catalog::search))
        // Cart routes
        .nest("/cart", cart_routes())
        // Auth routes
        .nest("/auth", auth_routes())
        // Orders and payment
        .nest("/orders", order_routes())
        .route("/result", get(payment::result))
}
