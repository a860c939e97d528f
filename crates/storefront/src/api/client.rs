//! REST API client used by the storefront.

use std::sync::Arc;
use std::time::Duration;

use kala_core::models::{AuthToken, Banner, Cart, Category, GatewayToken, Order, Product};
use kala_core::{
    ApiEnvelope, CartItemId, CategoryId, OrderId, OtpCode, Page, PageRequest, PhoneNumber,
    ProductId, VariantId,
};
use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use super::ApiError;
use super::cache::{CacheKey, CacheValue};
use crate::config::ApiConfig;

/// Body for `POST /cart/items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Kala REST API.
///
/// Categories and slider banners are cached for 5 minutes. Everything
/// customer-specific (cart, orders) always goes to the API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("kala-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    /// Resolve a path relative to the API base URL.
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn paged_url(&self, path: &str, page: PageRequest) -> Result<Url, ApiError> {
        let mut url = self.url(path)?;
        url.query_pairs_mut()
            .append_pair("page", &page.page.to_string())
            .append_pair("limit", &page.limit.to_string());
        Ok(url)
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

        // Check for rate limiting
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
    // Auth Methods
    // =========================================================================

    /// Ask the API to text a one-time code to `phone`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the number or the request fails.
    #[instrument(skip(self), fields(phone = %phone.masked()))]
    pub async fn send_code(&self, phone: &PhoneNumber) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.url("auth/send-code")?)
            .json(&json!({ "phone": phone.international() }));
        self.send(request, None).await?.into_unit()?;
        Ok(())
    }

    /// Exchange a one-time code for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is wrong or expired.
    #[instrument(skip(self, code), fields(phone = %phone.masked()))]
    pub async fn verify_code(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
    ) -> Result<AuthToken, ApiError> {
        let request = self
            .inner
            .client
            .post(self.url("auth/verify-code")?)
            .json(&json!({ "phone": phone.international(), "code": code.as_str() }));
        Ok(self.send(request, None).await?.into_data()?)
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// Get all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let request = self.inner.client.get(self.url("categories")?);
        let categories = self.send(request, None).await?.into_page::<Category>()?.items;

        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// Get a page of all products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_all_products(&self, page: PageRequest) -> Result<Page<Product>, ApiError> {
        let request = self.inner.client.get(self.paged_url("products", page)?);
        Ok(self.send(request, None).await?.into_page()?)
    }

    /// Get a page of products in a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(category = %category))]
    pub async fn get_products_by_category(
        &self,
        category: &CategoryId,
        page: PageRequest,
    ) -> Result<Page<Product>, ApiError> {
        let path = format!(
            "products/category/{}",
            urlencoding::encode(category.as_str())
        );
        let request = self.inner.client.get(self.paged_url(&path, page)?);
        Ok(self.send(request, None).await?.into_page()?)
    }

    /// Get a page of products carrying `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_products_by_label(
        &self,
        label: &str,
        page: PageRequest,
    ) -> Result<Page<Product>, ApiError> {
        let path = format!("products/label/{}", urlencoding::encode(label));
        let request = self.inner.client.get(self.paged_url(&path, page)?);
        Ok(self.send(request, None).await?.into_page()?)
    }

    /// Full-text product search.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn search_products(
        &self,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<Product>, ApiError> {
        let mut url = self.paged_url("products/search", page)?;
        url.query_pairs_mut().append_pair("q", query);
        let request = self.inner.client.get(url);
        Ok(self.send(request, None).await?.into_page()?)
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Get the signed-in customer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_cart(&self, token: &SecretString) -> Result<Cart, ApiError> {
        let request = self.inner.client.get(self.url("cart")?);
        let envelope = self.send(request, Some(token)).await?;
        // An empty cart may come back as `data: null`
        if envelope.data.is_null() {
            envelope.into_unit()?;
            return Ok(Cart::default());
        }
        Ok(envelope.into_data()?)
    }

    /// Add a product (or one of its variants) to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the item or the request fails.
    #[instrument(skip(self, token), fields(product_id = %item.product_id))]
    pub async fn add_to_cart(&self, token: &SecretString, item: &AddToCart) -> Result<(), ApiError> {
        let request = self.inner.client.post(self.url("cart/items")?).json(item);
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }

    /// Change the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the change or the request fails.
    #[instrument(skip(self, token), fields(item_id = %item_id))]
    pub async fn update_cart_item(
        &self,
        token: &SecretString,
        item_id: &CartItemId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!(
            "cart/items/{}",
            urlencoding::encode(item_id.as_str())
        ))?;
        let request = self
            .inner
            .client
            .patch(url)
            .json(&json!({ "quantity": quantity }));
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(item_id = %item_id))]
    pub async fn remove_cart_item(
        &self,
        token: &SecretString,
        item_id: &CartItemId,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!(
            "cart/items/{}",
            urlencoding::encode(item_id.as_str())
        ))?;
        let request = self.inner.client.delete(url);
        self.send(request, Some(token)).await?.into_unit()?;
        Ok(())
    }

    // =========================================================================
    // Order and Payment Methods
    // =========================================================================

    /// Get one of the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for a stale token and a not-found
    /// error for unknown orders.
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn get_order_details(
        &self,
        token: &SecretString,
        order_id: &OrderId,
    ) -> Result<Order, ApiError> {
        let url = self.url(&format!("orders/{}", urlencoding::encode(order_id.as_str())))?;
        let request = self.inner.client.get(url);
        Ok(self.send(request, Some(token)).await?.into_data()?)
    }

    /// Request a Saman gateway token for paying an order.
    ///
    /// `amount_rial` is the payable amount already converted to Rial.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway token cannot be issued.
    #[instrument(skip(self, token, phone), fields(order_id = %order_id))]
    pub async fn get_saman_token(
        &self,
        token: &SecretString,
        order_id: &OrderId,
        amount_rial: i64,
        phone: Option<&PhoneNumber>,
    ) -> Result<GatewayToken, ApiError> {
        let mut body = json!({ "orderId": order_id, "amount": amount_rial });
        if let (Some(phone), Value::Object(map)) = (phone, &mut body) {
            map.insert("phone".to_owned(), Value::String(phone.international()));
        }
        let request = self
            .inner
            .client
            .post(self.url("payments/saman/token")?)
            .json(&body);
        Ok(self.send(request, Some(token)).await?.into_data()?)
    }

    // =========================================================================
    // Content Methods
    // =========================================================================

    /// Get the active home page slider banners.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_slider(&self) -> Result<Vec<Banner>, ApiError> {
        if let Some(CacheValue::Slider(banners)) = self.inner.cache.get(&CacheKey::Slider).await {
            debug!("Cache hit for slider");
            return Ok(banners);
        }

        let request = self.inner.client.get(self.url("slider")?);
        let banners: Vec<Banner> = self
            .send(request, None)
            .await?
            .into_page::<Banner>()?
            .items
            .into_iter()
            .filter(|banner| banner.is_active)
            .collect();

        self.inner
            .cache
            .insert(CacheKey::Slider, CacheValue::Slider(banners.clone()))
            .await;

        Ok(banners)
    }
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
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    use super::*;
    use crate::config::parse_base_url;

    #[derive(Clone, Default)]
    struct Backend {
        category_hits: Arc<AtomicUsize>,
    }

    async fn categories(State(backend): State<Backend>) -> Json<Value> {
        backend.category_hits.fetch_add(1, Ordering::SeqCst);
        Json(json!({"success": true, "data": [{"_id": "c1", "name": "Tea"}]}))
    }

    async fn products(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        Json(json!({
            "success": true,
            "data": {
                "products": [{"id": 1, "name": "Green tea", "price": 120000}],
                "pagination": {"page": q.get("page").cloned().unwrap_or_default().parse::<u32>().unwrap_or(1), "limit": 12, "total": 13}
            }
        }))
    }

    async fn cart(headers: HeaderMap) -> impl IntoResponse {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer t0k") {
            return (AxumStatus::UNAUTHORIZED, Json(json!({"message": "no"}))).into_response();
        }
        Json(json!({"data": {"data": {
            "items": [{"_id": "ci", "productId": "p1", "quantity": 2, "price": 5000}],
            "subtotal": 10000
        }}}))
        .into_response()
    }

    async fn order(Path(id): Path<String>) -> impl IntoResponse {
        (
            AxumStatus::NOT_FOUND,
            Json(json!({"success": false, "code": "ORDER_NOT_FOUND", "message": format!("order {id}")})),
        )
    }

    async fn verify(Json(body): Json<Value>) -> Json<Value> {
        if body["code"] == "1234" && body["phone"] == "989123456789" {
            Json(json!({"success": true, "data": {"accessToken": "abc"}}))
        } else {
            Json(json!({"success": false, "message": "Invalid code"}))
        }
    }

    async fn slider() -> impl IntoResponse {
        (AxumStatus::TOO_MANY_REQUESTS, [("Retry-After", "7")], "slow down")
    }

    async fn spawn_backend(backend: Backend) -> ApiClient {
        let app = Router::new()
            .route("/v1/categories", get(categories))
            .route("/v1/products", get(products))
            .route("/v1/cart", get(cart))
            .route("/v1/orders/{id}", get(order))
            .route("/v1/auth/verify-code", post(verify))
            .route("/v1/slider", get(slider))
            .with_state(backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        ApiClient::new(&ApiConfig {
            base_url: parse_base_url(&format!("http://{addr}/v1")).unwrap(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_categories_are_cached() {
        let backend = Backend::default();
        let client = spawn_backend(backend.clone()).await;

        let first = client.get_categories().await.unwrap();
        let second = client.get_categories().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(backend.category_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_products_page_is_normalized() {
        let client = spawn_backend(Backend::default()).await;
        let page = client.get_all_products(PageRequest::new(2, 12)).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id.as_str(), "1");
        let pagination = page.pagination;
        assert_eq!(pagination.page, 2);
        assert_eq!(pagination.total_pages, 2);
    }

    #[tokio::test]
    async fn test_cart_requires_token() {
        let client = spawn_backend(Backend::default()).await;

        let cart = client.get_cart(&SecretString::from("t0k")).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 2);

        let err = client.get_cart(&SecretString::from("stale")).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_order_not_found_code() {
        let client = spawn_backend(Backend::default()).await;
        let err = client
            .get_order_details(&SecretString::from("t0k"), &OrderId::new("42"))
            .await
            .unwrap_err();

        assert!(err.is_order_not_found());
        assert_eq!(err.code(), Some("ORDER_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_verify_code() {
        let client = spawn_backend(Backend::default()).await;
        let phone = PhoneNumber::parse("09123456789").unwrap();

        let token = client
            .verify_code(&phone, &OtpCode::parse("1234").unwrap())
            .await
            .unwrap();
        assert_eq!(token.token, "abc");

        let err = client
            .verify_code(&phone, &OtpCode::parse("9999").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid code");
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let client = spawn_backend(Backend::default()).await;
        let err = client.get_slider().await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited(7)));
    }

    #[test]
    fn test_error_from_nested_body() {
        let err = error_from_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"error": {"code": "OUT_OF_STOCK", "message": "Sold out"}}"#,
        );
        assert_eq!(err.code(), Some("OUT_OF_STOCK"));
        assert_eq!(err.user_message(), "Sold out");

        let err = error_from_body(StatusCode::BAD_GATEWAY, b"<html>");
        assert!(matches!(err, ApiError::Api { status: 502, .. }));
    }
}
