//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Health check
//! GET  /health/ready                  - Readiness check (API reachable)
//!
//! # Auth
//! GET  /login                         - Login page
//! POST /login                         - Sign in (rate limited)
//! POST /logout                        - Sign out
//!
//! # Dashboard (requires auth)
//! GET  /                              - Order counters and latest orders
//!
//! # Orders (requires auth; changes need an editor role)
//! GET  /orders                        - Order list (status, search, page)
//! GET  /orders/{id}                   - Order detail
//! POST /orders/{id}/status            - Change status
//! POST /orders/{id}/tracking          - Set tracking code
//! POST /orders/{id}/cancel            - Cancel order
//!
//! # Products (requires auth; changes need an editor role)
//! GET  /products                      - Product list
//! GET  /products/new                  - Create form
//! POST /products/new                  - Apply form edits or save
//! GET  /products/{id}/edit            - Edit form
//! POST /products/{id}/edit            - Apply form edits or save
//! GET  /products/uploads/{id}         - Preview of an unsaved image
//!
//! # Banners (requires auth; kind is sliders, small-banners or products-banners)
//! GET  /banners/{kind}                - Banner list
//! POST /banners/{kind}                - Upload banners
//! POST /banners/{kind}/{id}/status    - Show or hide
//! POST /banners/{kind}/{id}/delete    - Delete (super admin)
//! ```

pub mod auth;
pub mod banners;
pub mod dashboard;
pub mod layout;
pub mod multipart;
pub mod orders;
pub mod products;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_sessions::Session;

use crate::api::ApiError;
use crate::error::Result;
use crate::middleware::{expire_session, login_rate_limiter, set_flash};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route_layer(login_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/logout", post(auth::logout))
        .merge(limited)
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::update_status))
        .route("/{id}/tracking", post(orders::update_tracking))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/new", get(products::new_form).post(products::submit_new))
        .route("/{id}/edit", get(products::edit_form).post(products::submit_edit))
        .route("/uploads/{id}", get(products::upload_preview))
}

/// Create the banner routes router.
pub fn banner_routes() -> Router<AppState> {
    Router::new()
        .route("/{kind}", get(banners::index).post(banners::upload))
        .route("/{kind}/{id}/status", post(banners::update_status))
        .route("/{kind}/{id}/delete", post(banners::delete))
}

/// Create all routes for the admin panel.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .merge(auth_routes())
        .nest("/orders", order_routes())
        .nest("/products", product_routes())
        .nest("/banners", banner_routes())
}

/// Outcome of a failed change: an expired token signs the admin out,
/// anything else becomes a flash message on `return_to`.
pub(crate) async fn redirect_after_failure(
    session: &Session,
    err: &ApiError,
    return_to: &str,
) -> Result<Response> {
    if err.is_unauthorized() {
        return Ok(expire_session(session, return_to).await?.into_response());
    }
    tracing::warn!(error = %err, return_to, "Admin change rejected");
    set_flash(session, err.user_message()).await;
    Ok(Redirect::to(return_to).into_response())
}
