//! Storefront end-to-end: browse, sign in with a code, fill the cart.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use kala_integration_tests::{browser, location, serve, start_storefront};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Api {
    cart: Arc<Mutex<Vec<Value>>>,
    verify_calls: Arc<AtomicUsize>,
}

fn signed_in(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer cust")
}

async fn categories() -> Json<Value> {
    Json(json!({"success": true, "data": [{"_id": "c1", "name": "Tea"}]}))
}

async fn products() -> Json<Value> {
    Json(json!({"data": {
        "products": [{"_id": "p1", "name": "Green tea", "price": 120000, "stock": 4}],
        "pagination": {"page": 1, "limit": 12, "total": 1}
    }}))
}

async fn slider() -> Json<Value> {
    Json(json!({"data": [{"_id": "s1", "imageUrl": "https://cdn.example/s1.jpg"}]}))
}

async fn send_code(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["phone"], "989123456789");
    Json(json!({"success": true}))
}

/// Accepts `1234`. `5555` is also accepted, after a delay.
async fn verify_code(State(api): State<Api>, Json(body): Json<Value>) -> impl IntoResponse {
    api.verify_calls.fetch_add(1, Ordering::SeqCst);
    if body["code"] == "5555" {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    if body["code"] == "1234" || body["code"] == "5555" {
        Json(json!({"success": true, "data": {"accessToken": "cust"}})).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "Wrong code"})),
        )
            .into_response()
    }
}

async fn cart(State(api): State<Api>, headers: HeaderMap) -> impl IntoResponse {
    if !signed_in(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let items: Vec<Value> = api
        .cart
        .lock()
        .unwrap()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            json!({
                "_id": format!("ci{i}"),
                "productId": item["productId"],
                "name": "Green tea",
                "quantity": item["quantity"],
                "price": 120000
            })
        })
        .collect();
    Json(json!({"data": {"items": items, "subtotal": 0}})).into_response()
}

async fn add_item(
    State(api): State<Api>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if !signed_in(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    api.cart.lock().unwrap().push(body);
    Json(json!({"success": true})).into_response()
}

async fn order(Path(_id): Path<String>) -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Token expired"})))
}

async fn start() -> (Api, String) {
    let api = Api::default();
    let router = Router::new()
        .route("/api/categories", get(categories))
        .route("/api/products", get(products))
        .route("/api/slider", get(slider))
        .route("/api/auth/send-code", post(send_code))
        .route("/api/auth/verify-code", post(verify_code))
        .route("/api/cart", get(cart))
        .route("/api/cart/items", post(add_item))
        .route("/api/orders/{id}", get(order))
        .with_state(api.clone());
    let base = start_storefront(serve(router).await).await;
    (api, base)
}

/// Sign in and return where the verify step redirected to.
async fn sign_in(client: &reqwest::Client, base: &str) -> String {
    let response = client
        .post(format!("{base}/auth/send-code"))
        .form(&[("phone", "0912 345 6789")])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/auth/login");

    let response = client
        .post(format!("{base}/auth/verify"))
        .form(&[("code", "۱۲۳۴")])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    location(&response)
}

#[tokio::test]
async fn test_home_and_health() {
    let (_api, base) = start().await;
    let client = browser();

    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "ok");

    let ready = client.get(format!("{base}/health/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK.as_u16());

    let home = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(home.status(), StatusCode::OK.as_u16());
    assert!(home.headers().contains_key("content-security-policy"));
    let body = home.text().await.unwrap();
    assert!(body.contains("Green tea"));
    assert!(body.contains("120,000 Toman"));
}

#[tokio::test]
async fn test_cart_needs_sign_in_then_returns() {
    let (api, base) = start().await;
    let client = browser();

    let response = client
        .post(format!("{base}/cart/add"))
        .form(&[("product_id", "p1")])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert!(location(&response).starts_with("/auth/login"));
    assert!(api.cart.lock().unwrap().is_empty());

    sign_in(&client, &base).await;

    let response = client
        .post(format!("{base}/cart/add"))
        .form(&[("product_id", "p1"), ("quantity", "2"), ("return_to", "/cart")])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/cart");

    let added = api.cart.lock().unwrap().clone();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0]["productId"], "p1");
    assert_eq!(added[0]["quantity"], 2);

    let page = client.get(format!("{base}/cart")).send().await.unwrap();
    let body = page.text().await.unwrap();
    assert!(body.contains("Green tea"));
    assert!(body.contains("Added to your cart."));
}

#[tokio::test]
async fn test_wrong_code_stays_on_code_step() {
    let (_api, base) = start().await;
    let client = browser();

    client
        .post(format!("{base}/auth/send-code"))
        .form(&[("phone", "09123456789")])
        .send()
        .await
        .unwrap();
    let response = client
        .post(format!("{base}/auth/verify"))
        .form(&[("code", "9999")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK.as_u16());
    assert!(response.text().await.unwrap().contains("Wrong code"));
}

#[tokio::test]
async fn test_expired_token_on_order_page() {
    let (_api, base) = start().await;
    let client = browser();
    sign_in(&client, &base).await;

    let response = client.get(format!("{base}/orders/o1")).send().await.unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/auth/login?expired=1");

    // Signed out now: the order page asks for sign-in again
    let response = client.get(format!("{base}/orders/o1")).send().await.unwrap();
    assert!(location(&response).starts_with("/auth/login"));
}

#[tokio::test]
async fn test_sign_in_returns_to_nested_page() {
    let (_api, base) = start().await;
    let client = browser();

    let response = client
        .get(format!("{base}/orders/o1?tab=items"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert!(location(&response).starts_with("/auth/login"));

    assert_eq!(sign_in(&client, &base).await, "/orders/o1?tab=items");
}

#[tokio::test]
async fn test_concurrent_verify_reaches_api_once() {
    let (api, base) = start().await;
    let client = browser();

    client
        .post(format!("{base}/auth/send-code"))
        .form(&[("phone", "09123456789")])
        .send()
        .await
        .unwrap();

    let verify = || {
        client
            .post(format!("{base}/auth/verify"))
            .form(&[("code", "5555")])
            .send()
    };
    let (first, second) = tokio::join!(verify(), verify());
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(api.verify_calls.load(Ordering::SeqCst), 1);
    let redirected = [&first, &second]
        .iter()
        .filter(|r| r.status().is_redirection())
        .count();
    assert_eq!(redirected, 1);

    let refused = if first.status().is_redirection() { second } else { first };
    assert!(
        refused
            .text()
            .await
            .unwrap()
            .contains("Your code is already being checked.")
    );
}
