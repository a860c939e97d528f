//! Test harness for end-to-end tests.
//!
//! Each test starts a fake REST API (an axum router on an ephemeral port),
//! builds the storefront or admin app against it, serves that on another
//! ephemeral port and drives it with a cookie-keeping [`reqwest::Client`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kala-integration-tests
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use reqwest::Client;
use reqwest::redirect::Policy;

/// Serve `router` on `127.0.0.1:0` and return its address.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// A client that keeps cookies and does not follow redirects, so tests can
/// assert on `Location`.
#[must_use]
pub fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .unwrap()
}

/// The `Location` header of a response.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

fn crate_dir(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(name)
        .join("static")
}

/// Start the storefront against the fake API at `api` and return its base URL.
pub async fn start_storefront(api: SocketAddr) -> String {
    use kala_storefront::config::{ApiConfig, SentryConfig, StorefrontConfig, parse_base_url};

    let config = StorefrontConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://127.0.0.1".to_owned(),
        api: ApiConfig {
            base_url: parse_base_url(&format!("http://{api}/api")).unwrap(),
            timeout: Duration::from_secs(5),
        },
        static_dir: crate_dir("storefront"),
        json_logs: false,
        sentry: SentryConfig::default(),
    };
    let state = kala_storefront::state::AppState::new(config).unwrap();
    let addr = serve(kala_storefront::app(state)).await;
    format!("http://{addr}")
}

/// Start the admin panel against the fake API at `api` and return its base URL.
pub async fn start_admin(api: SocketAddr) -> String {
    use kala_admin::config::{AdminConfig, ApiConfig, SentryConfig, parse_base_url};

    let config = AdminConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://127.0.0.1".to_owned(),
        api: ApiConfig {
            base_url: parse_base_url(&format!("http://{api}/api")).unwrap(),
            timeout: Duration::from_secs(5),
        },
        static_dir: crate_dir("admin"),
        max_upload_bytes: 1024 * 1024,
        json_logs: false,
        sentry: SentryConfig::default(),
    };
    let state = kala_admin::state::AppState::new(config).unwrap();
    let addr = serve(kala_admin::app(state)).await;
    format!("http://{addr}")
}
