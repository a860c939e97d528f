//! Admin end-to-end: sign in, roles, product form save.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use kala_integration_tests::{browser, location, serve, start_admin};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

/// A saved product as the fake API received it: the `payload` JSON and the
/// file names of the `images` parts.
#[derive(Debug, Clone)]
struct SavedProduct {
    payload: Value,
    images: Vec<String>,
}

#[derive(Clone, Default)]
struct Api {
    saved: Arc<Mutex<Vec<SavedProduct>>>,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    let role = match (body["username"].as_str(), body["password"].as_str()) {
        (Some("root"), Some("pw")) => "super_admin",
        (Some("eve"), Some("pw")) => "viewer",
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Bad credentials"})),
            )
                .into_response();
        }
    };
    Json(json!({"data": {"token": format!("tok-{role}"), "role": role}})).into_response()
}

async fn stats(headers: HeaderMap) -> impl IntoResponse {
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"data": {"totalOrders": 7, "paid": 3, "totalRevenue": 900000}})).into_response()
}

async fn orders(headers: HeaderMap) -> impl IntoResponse {
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"data": {
        "orders": [{"_id": "o1", "orderNumber": "KL-77", "status": "paid", "totalPrice": 50000}],
        "pagination": {"page": 1, "limit": 20, "total": 1}
    }}))
    .into_response()
}

async fn categories() -> Json<Value> {
    Json(json!({"data": [
        {"_id": "tea", "name": "Tea", "fields": [
            {"key": "origin", "label": "Origin", "type": "select", "options": ["Lahijan", "Darjeeling"], "required": true}
        ]}
    ]}))
}

async fn create_product(
    State(api): State<Api>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if bearer(&headers) != Some("tok-super_admin") {
        return StatusCode::FORBIDDEN.into_response();
    }
    let mut payload = Value::Null;
    let mut images = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("payload") => payload = serde_json::from_str(&field.text().await.unwrap()).unwrap(),
            Some("images") => images.push(field.file_name().unwrap_or_default().to_owned()),
            _ => {}
        }
    }
    let name = payload["name"].clone();
    api.saved.lock().unwrap().push(SavedProduct { payload, images });
    Json(json!({"data": {"_id": "p9", "name": name, "price": 1000}})).into_response()
}

async fn start() -> (Api, String) {
    let api = Api::default();
    let router = Router::new()
        .route("/api/admin/auth/login", post(login))
        .route("/api/admin/orders/stats", get(stats))
        .route("/api/admin/orders", get(orders))
        .route("/api/categories", get(categories))
        .route("/api/admin/products", post(create_product))
        .with_state(api.clone());
    let base = start_admin(serve(router).await).await;
    (api, base)
}

async fn sign_in(client: &reqwest::Client, base: &str, username: &str) -> reqwest::Response {
    client
        .post(format!("{base}/login"))
        .form(&[("username", username), ("password", "pw")])
        .send()
        .await
        .unwrap()
}

fn png(name: &str) -> Part {
    Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name(name.to_owned())
        .mime_str("image/png")
        .unwrap()
}

#[tokio::test]
async fn test_sign_in_returns_to_requested_page() {
    let (_api, base) = start().await;
    let client = browser();

    let response = client.get(format!("{base}/orders")).send().await.unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/login");

    let response = sign_in(&client, &base, "root").await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/orders");

    let page = client.get(format!("{base}/orders")).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::OK.as_u16());
    assert_eq!(
        page.headers().get("x-robots-tag").unwrap(),
        "noindex, nofollow"
    );
    assert!(page.text().await.unwrap().contains("KL-77"));

    let dashboard = client.get(format!("{base}/")).send().await.unwrap();
    let body = dashboard.text().await.unwrap();
    assert!(body.contains("KL-77"));
    assert!(body.contains("900,000 Toman"));
}

#[tokio::test]
async fn test_bad_password() {
    let (_api, base) = start().await;
    let client = browser();

    let response = client
        .post(format!("{base}/login"))
        .form(&[("username", "root"), ("password", "nope")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED.as_u16());
    assert!(response.text().await.unwrap().contains("Invalid username or password."));
}

#[tokio::test]
async fn test_viewer_cannot_change_data() {
    let (api, base) = start().await;
    let client = browser();
    sign_in(&client, &base, "eve").await;

    let page = client.get(format!("{base}/products/new")).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::FORBIDDEN.as_u16());

    let response = client
        .post(format!("{base}/banners/sliders/b1/delete"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN.as_u16());

    let form = Form::new().text("name", "Tea").text("intent", "save");
    let response = client
        .post(format!("{base}/products/new"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN.as_u16());
    assert!(api.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_product_over_several_posts() {
    let (api, base) = start().await;
    let client = browser();
    sign_in(&client, &base, "root").await;

    // Pick a category and upload two images without saving
    let form = Form::new()
        .text("name", "Black tea")
        .text("price", "۱۲۰,۰۰۰")
        .text("stock", "5")
        .text("category_id", "tea")
        .part("images", png("front.png"))
        .part("images", png("back.png"))
        .text("intent", "refresh");
    let response = client
        .post(format!("{base}/products/new"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/products/new");

    let page = client
        .get(format!("{base}/products/new"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Origin"));
    assert!(page.contains("/products/uploads/"));

    // Saving without the required field re-renders with the error
    let form = Form::new()
        .text("name", "Black tea")
        .text("category_id", "tea")
        .text("intent", "save");
    let response = client
        .post(format!("{base}/products/new"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY.as_u16());
    assert!(response.text().await.unwrap().contains("Origin is required"));
    assert!(api.saved.lock().unwrap().is_empty());

    // Make the second image primary and save
    let form = Form::new()
        .text("category_id", "tea")
        .text("field.origin", "Lahijan")
        .text("intent", "primary_image:1");
    client
        .post(format!("{base}/products/new"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let form = Form::new().text("intent", "save");
    let response = client
        .post(format!("{base}/products/new"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/products");

    let saved = api.saved.lock().unwrap().clone();
    assert_eq!(saved.len(), 1);
    let payload = &saved[0].payload;
    assert_eq!(payload["name"], "Black tea");
    assert_eq!(payload["price"].as_f64(), Some(120_000.0));
    assert_eq!(payload["stock"], 5);
    assert_eq!(payload["categoryId"], "tea");
    assert_eq!(payload["fields"], json!([{"key": "origin", "value": "Lahijan"}]));
    assert_eq!(payload["primaryImage"], 1);
    assert_eq!(payload["newImages"], 2);
    assert_eq!(saved[0].images, ["front.png", "back.png"]);

    // The draft is gone once saved
    let page = client
        .get(format!("{base}/products/new"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Saved Black tea."));
    assert!(page.contains(r#"name="name" value="""#));
}
