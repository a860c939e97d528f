//! REST API client used by the admin panel.

use std::sync::Arc;

use kala_core::models::{
    AdminLogin, Banner, Category, Order, OrderFilters, OrderStats, Product, StatusUpdate,
};
use kala_core::{
    ApiEnvelope, BannerId, BannerKind, OrderId, OrderStatus, Page, PageRequest, ProductId,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use super::ApiError;
use crate::config::ApiConfig;
use crate::product_form::ProductPayload;

/// An image file held in memory on its way to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    fn to_part(&self) -> Result<Part, ApiError> {
        Ok(Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)?)
    }
}

// =============================================================================
// AdminApiClient
// =============================================================================

/// Client for the admin side of the Kala REST API.
///
/// Nothing is cached: the back-office always shows what the API has now.
#[derive(Clone)]
pub struct AdminApiClient {
    inner: Arc<AdminApiClientInner>,
}

struct AdminApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl AdminApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("kala-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(AdminApiClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn order_url(&self, order_id: &OrderId, suffix: &str) -> Result<Url, ApiError> {
        self.url(&format!(
            "admin/orders/{}{suffix}",
            urlencoding::encode(order_id.as_str())
        ))
    }

    fn banner_url(&self, kind: BannerKind, id: &BannerId, suffix: &str) -> Result<Url, ApiError> {
        self.url(&format!(
            "admin/{}/{}{suffix}",
            kind.slug(),
            urlencoding::encode(id.as_str())
        ))
    }

    /// Send a request, optionally with a bearer token, and normalize the body.
    async fn send(
        &self,
        request: RequestBuilder,
        token: Option<&SecretString>,
    ) -> Result<ApiEnvelope, ApiError> {
        let request = match token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        ApiEnvelope::from_slice(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %String::from_utf8_lossy(&body).chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::from(e)
        })
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Sign in with a username and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AdminLogin, ApiError> {
        let request = self
            .inner
            .client
            .post(self.url("admin/auth/login")?)
            .json(&json!({ "username": username, "password": password.expose_secret() }));
        Ok(self.send(request, None).await?.into_data()?)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Get all categories with their field definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Result<Vec<Category>, ApiError> {
        let request = self.inner.client.get(self.url("categories")?);
        Ok(self.send(request, None).await?.into_page::<Category>()?.items)
    }

    /// Get a page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_all_products(
        &self,
        token: &SecretString,
        page: PageRequest,
    ) -> Result<Page<Product>, ApiError> {
        let mut url = self.url("products")?;
        url.query_pairs_mut()
            .append_pair("page", &page.page.to_string())
            .append_pair("limit", &page.limit.to_string());
        let request = self.inner.client.get(url);
        Ok(self.send(request, Some(token)).await?.into_page()?)
    }

    /// Get one product with everything the edit form needs.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or the request fails.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn get_admin_product(
        &self,
        token: &SecretString,
        product_id: &ProductId,
    ) -> Result<Product, ApiError> {
        let url = self.url(&format!(
            "admin/products/{}",
            urlencoding::encode(product_id.as_str())
        ))?;
        let request = self.inner.client.get(url);
        Ok(self.send(request, Some(token)).await?.into_data()?)
    }

    /// Create a product from a saved form.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the product.
    #[instrument(skip_all, fields(name = %payload.name, images = images.len()))]
    pub async fn create_product(
        &self,
        token: &SecretString,
        payload: &ProductPayload,
        images: &[Arc<ImageUpload>],
    ) -> Result<Product, ApiError> {
        let form = product_form(payload, images)?;
        let request = self
            .inner
            .client
            .post(self.url("admin/products")?)
            .multipart(form);
        Ok(self.send(request, Some(token)).await?.into_data()?)
    }

    /// Replace a product with a saved form.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the product.
    #[instrument(skip(self, token, payload, images), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        payload: &ProductPayload,
        images: &[Arc<ImageUpload>],
    ) -> Result<Product, ApiError> {
        let form = product_form(payload, images)?;
        let url = self.url(&format!(
            "admin/products/{}",
            urlencoding::encode(product_id.as_str())
        ))?;
        let request = self.inner.client.put(url).multipart(form);
        Ok(self.send(request, Some(token)).await?.into_data()?)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Get a filtered page of orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_admin_orders(
        &self,
        token: &SecretString,
        filters: &OrderFilters,
    ) -> Result<Page<Order>, ApiError> {
        let mut url = self.url("admin/orders")?;
        let pairs = filters.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        let request = self.inner.client.get(url);
        Ok(self.send(request, Some(token)).await?.into_page()?)
    }

    /// Get one order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or the request fails.
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn get_admin_order(
        &self,
        token: &SecretString,
        order_id: &OrderId,
    ) -> Result<Order, ApiError> {
        let request = self.inner.client.get(self.order_url(order_id, "")?);
        Ok(self.send(request, Some(token)).await?.into_data()?)
    }

    /// Get dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_admin_order_stats(&self, token: &SecretString) -> Result<OrderStats, ApiError> {
        let request = self.inner.client.get(self.url("admin/orders/stats")?);
        Ok(self.send(request, Some(token)).await?.into_data()?)
    }

    /// Move an order to a new status.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the transition.
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn update_order_status(
        &self,
        token: &SecretString,
        order_id: &OrderId,
        status: OrderStatus,
        tracking_code: Option<String>,
    ) -> Result<(), ApiError> {
        let body = StatusUpdate {
            status,
            tracking_code,
        };
        let request = self
            .inner
            .client
            .put(self.order_url(order_id, "/status")?)
            .json(&body);
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }

    /// Set the carrier tracking code.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the code.
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn update_order_tracking(
        &self,
        token: &SecretString,
        order_id: &OrderId,
        tracking_code: &str,
    ) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .put(self.order_url(order_id, "/tracking")?)
            .json(&json!({ "trackingCode": tracking_code }));
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }

    /// Cancel an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order can no longer be cancelled.
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn cancel_admin_order(
        &self,
        token: &SecretString,
        order_id: &OrderId,
    ) -> Result<(), ApiError> {
        let request = self.inner.client.post(self.order_url(order_id, "/cancel")?);
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }

    // =========================================================================
    // Banners
    // =========================================================================

    /// Get every banner of one kind, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_admin_banners(
        &self,
        token: &SecretString,
        kind: BannerKind,
    ) -> Result<Vec<Banner>, ApiError> {
        let request = self
            .inner
            .client
            .get(self.url(&format!("admin/{}", kind.slug()))?);
        Ok(self.send(request, Some(token)).await?.into_page::<Banner>()?.items)
    }

    /// Upload one or more banner images.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the files.
    #[instrument(skip(self, token, files), fields(files = files.len()))]
    pub async fn create_banner(
        &self,
        token: &SecretString,
        kind: BannerKind,
        files: &[ImageUpload],
    ) -> Result<(), ApiError> {
        let mut form = Form::new();
        for file in files {
            form = form.part("images", file.to_part()?);
        }
        let request = self
            .inner
            .client
            .post(self.url(&format!("admin/{}", kind.slug()))?)
            .multipart(form);
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }

    /// Delete a banner.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(banner_id = %banner_id))]
    pub async fn delete_banner(
        &self,
        token: &SecretString,
        kind: BannerKind,
        banner_id: &BannerId,
    ) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.banner_url(kind, banner_id, "")?);
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }

    /// Show or hide a banner.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(banner_id = %banner_id))]
    pub async fn update_banner_status(
        &self,
        token: &SecretString,
        kind: BannerKind,
        banner_id: &BannerId,
        is_active: bool,
    ) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .patch(self.banner_url(kind, banner_id, "/status")?)
            .json(&json!({ "isActive": is_active }));
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }
}

/// Multipart body for product saves: the JSON `payload` part, then one
/// `images` part per new upload in draft order.
fn product_form(payload: &ProductPayload, images: &[Arc<ImageUpload>]) -> Result<Form, ApiError> {
    let json = serde_json::to_string(payload).map_err(|e| ApiError::Parse(e.to_string()))?;
    let mut form = Form::new().part(
        "payload",
        Part::text(json).mime_str("application/json")?,
    );
    for image in images {
        form = form.part("images", image.to_part()?);
    }
    Ok(form)
}

/// Build an [`ApiError`] from a non-success response.
fn error_from_body(status: StatusCode, body: &[u8]) -> ApiError {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let nested = value.get("error");

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| nested.and_then(Value::as_str))
        .or_else(|| nested.and_then(|e| e.get("message")).and_then(Value::as_str))
        .map_or_else(
            || status.canonical_reason().unwrap_or("request failed").to_owned(),
            str::to_owned,
        );
    let code = value
        .get("code")
        .or_else(|| nested.and_then(|e| e.get("code")))
        .and_then(|c| match c {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    if status.is_server_error() {
        tracing::error!(
            status = %status,
            body = %String::from_utf8_lossy(body).chars().take(500).collect::<String>(),
            "API returned server error"
        );
    }

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => ApiError::NotFound { code, message },
        _ => ApiError::Api {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::extract::{Multipart, Path, Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, patch, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    use super::*;
    use crate::config::parse_base_url;
    use crate::product_form::{PendingUpload, ProductAction, ProductDraft};

    #[derive(Clone, Default)]
    struct Backend {
        /// Multipart parts seen by the last product save, as (name, file name, body).
        parts: Arc<Mutex<Vec<(String, Option<String>, String)>>>,
        bodies: Arc<Mutex<Vec<Value>>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer adm")
    }

    async fn login(Json(body): Json<Value>) -> impl IntoResponse {
        if body["username"] == "root" && body["password"] == "pw" {
            Json(json!({"success": true, "data": {"token": "adm", "role": "super_admin"}}))
                .into_response()
        } else {
            (AxumStatus::UNAUTHORIZED, Json(json!({"message": "Bad credentials"}))).into_response()
        }
    }

    async fn orders(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        let status = q.get("status").cloned().unwrap_or_else(|| "paid".to_owned());
        Json(json!({"data": {
            "orders": [{"_id": "o1", "status": status, "totalPrice": 1000}],
            "pagination": {"page": 1, "limit": 20, "total": 1}
        }}))
        .into_response()
    }

    async fn status(
        State(backend): State<Backend>,
        Path(_id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        backend.bodies.lock().unwrap().push(body);
        Json(json!({"success": true}))
    }

    async fn cancel() -> impl IntoResponse {
        (
            AxumStatus::FORBIDDEN,
            Json(json!({"success": false, "message": "Viewer role"})),
        )
    }

    async fn create_product(State(backend): State<Backend>, mut multipart: Multipart) -> Json<Value> {
        let mut parts = Vec::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_owned();
            let file_name = field.file_name().map(str::to_owned);
            let body = field.text().await.unwrap();
            parts.push((name, file_name, body));
        }
        *backend.parts.lock().unwrap() = parts;
        Json(json!({"success": true, "data": {"_id": "p9", "name": "Mug", "price": 1000}}))
    }

    async fn banner_status(
        State(backend): State<Backend>,
        Path((kind, id)): Path<(String, String)>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        backend
            .bodies
            .lock()
            .unwrap()
            .push(json!({"kind": kind, "id": id, "body": body}));
        Json(json!({"success": true}))
    }

    async fn spawn_backend(backend: Backend) -> AdminApiClient {
        let app = Router::new()
            .route("/api/admin/auth/login", post(login))
            .route("/api/admin/orders", get(orders))
            .route("/api/admin/orders/{id}/status", axum::routing::put(status))
            .route("/api/admin/orders/{id}/cancel", post(cancel))
            .route("/api/admin/products", post(create_product))
            .route("/api/admin/{kind}/{id}/status", patch(banner_status))
            .with_state(backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        AdminApiClient::new(&ApiConfig {
            base_url: parse_base_url(&format!("http://{addr}/api")).unwrap(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn token() -> SecretString {
        SecretString::from("adm")
    }

    #[tokio::test]
    async fn test_login() {
        let client = spawn_backend(Backend::default()).await;

        let login = client.login("root", &SecretString::from("pw")).await.unwrap();
        assert_eq!(login.token, "adm");
        assert_eq!(login.role, kala_core::AdminRole::SuperAdmin);

        let err = client
            .login("root", &SecretString::from("nope"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_orders_are_filtered() {
        let client = spawn_backend(Backend::default()).await;
        let filters = OrderFilters {
            status: Some(OrderStatus::Shipped),
            ..OrderFilters::default()
        };

        let page = client.get_admin_orders(&token(), &filters).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].status, OrderStatus::Shipped);

        let err = client
            .get_admin_orders(&SecretString::from("stale"), &filters)
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_status_update_body() {
        let backend = Backend::default();
        let client = spawn_backend(backend.clone()).await;

        client
            .update_order_status(&token(), &OrderId::new("o1"), OrderStatus::Shipped, Some("TR-1".to_owned()))
            .await
            .unwrap();
        client
            .update_order_status(&token(), &OrderId::new("o1"), OrderStatus::Processing, None)
            .await
            .unwrap();

        let bodies = backend.bodies.lock().unwrap();
        assert_eq!(bodies[0], json!({"status": "shipped", "trackingCode": "TR-1"}));
        assert_eq!(bodies[1], json!({"status": "processing"}));
    }

    #[tokio::test]
    async fn test_forbidden_is_not_unauthorized() {
        let client = spawn_backend(Backend::default()).await;
        let err = client
            .cancel_admin_order(&token(), &OrderId::new("o1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
        assert!(!err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_create_product_multipart() {
        let backend = Backend::default();
        let client = spawn_backend(backend.clone()).await;

        let mut draft = ProductDraft::new();
        let category: Category =
            serde_json::from_value(json!({"_id": "c1", "name": "Kitchen"})).unwrap();
        for action in [
            ProductAction::SetName("Mug".to_owned()),
            ProductAction::SetPrice("1000".to_owned()),
            ProductAction::SelectCategory(category),
            ProductAction::AddImage(PendingUpload {
                upload_id: "u1".to_owned(),
                file_name: "mug.png".to_owned(),
                content_type: "image/png".to_owned(),
                size: 3,
            }),
        ] {
            draft.apply(action).unwrap();
        }
        let payload = draft.to_payload().unwrap();
        let image = Arc::new(ImageUpload {
            file_name: "mug.png".to_owned(),
            content_type: "image/png".to_owned(),
            bytes: b"png".to_vec(),
        });

        let product = client
            .create_product(&token(), &payload, &[image])
            .await
            .unwrap();
        assert_eq!(product.id.as_str(), "p9");

        let parts = backend.parts.lock().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, "payload");
        let sent: Value = serde_json::from_str(&parts[0].2).unwrap();
        assert_eq!(sent["name"], "Mug");
        assert_eq!(sent["newImages"], 1);
        assert_eq!(parts[1], ("images".to_owned(), Some("mug.png".to_owned()), "png".to_owned()));
    }

    #[tokio::test]
    async fn test_banner_status_path() {
        let backend = Backend::default();
        let client = spawn_backend(backend.clone()).await;

        client
            .update_banner_status(&token(), BannerKind::SmallBanners, &BannerId::new("b1"), false)
            .await
            .unwrap();

        let bodies = backend.bodies.lock().unwrap();
        assert_eq!(
            bodies[0],
            json!({"kind": "small-banners", "id": "b1", "body": {"isActive": false}})
        );
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            error_from_body(StatusCode::FORBIDDEN, b"{}"),
            ApiError::Forbidden
        ));
        let err = error_from_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"error": {"code": "INVALID", "message": "Price is required"}}"#,
        );
        assert_eq!(err.user_message(), "Price is required");
    }
}
