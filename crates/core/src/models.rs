//! Wire models for the remote REST API.
//!
//! These are transient per-request copies. Field names follow the API's
//! camelCase with aliases for the `_id` style identifiers some endpoints
//! return. Optional or inconsistently present fields default instead of
//! failing the whole response.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    AdminRole, BannerId, CartItemId, CategoryId, Discount, DiscountKind, DiscountedPrice, ImageId,
    OrderId, OrderStatus, ProductId, Toman, VariantId, discounted,
};

// =============================================================================
// Catalog
// =============================================================================

/// Kind of a category-specific product field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Select,
}

/// A dynamic field a category asks products to fill in (e.g. "Material").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    #[serde(alias = "name")]
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, alias = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

impl FieldDefinition {
    /// Label for display, falling back to the key.
    #[must_use]
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.key
        } else {
            &self.label
        }
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(alias = "_id")]
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// A product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    #[serde(default, alias = "_id")]
    pub id: Option<ImageId>,
    #[serde(alias = "src")]
    pub url: String,
    #[serde(default, alias = "primary")]
    pub is_primary: bool,
}

/// A purchasable configuration of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<VariantId>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub price: Toman,
    #[serde(default)]
    pub stock: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// A value filled in for one of the category's dynamic fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub key: String,
    pub value: String,
}

/// Category reference embedded in a product: either a bare id or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Object {
        #[serde(alias = "_id")]
        id: CategoryId,
        #[serde(default)]
        name: Option<String>,
    },
    Id(CategoryId),
}

impl CategoryRef {
    #[must_use]
    pub const fn id(&self) -> &CategoryId {
        match self {
            Self::Object { id, .. } | Self::Id(id) => id,
        }
    }
}

/// A product as returned by catalog and admin endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Toman,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub discount_type: DiscountKind,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, alias = "categoryId")]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

impl Product {
    /// The product's discount, if it has one.
    #[must_use]
    pub fn discount(&self) -> Option<Discount> {
        self.discount.map(|value| Discount {
            value,
            kind: self.discount_type,
        })
    }

    /// Price after applying the product's discount.
    #[must_use]
    pub fn pricing(&self) -> DiscountedPrice {
        discounted(self.price, self.discount())
    }

    /// URL of the primary image, or the first image.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images
            .iter()
            .find(|img| img.is_primary)
            .or_else(|| self.images.first())
            .map(|img| img.url.as_str())
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(alias = "_id")]
    pub id: CartItemId,
    #[serde(alias = "product")]
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    pub quantity: u32,
    pub price: Toman,
}

impl CartItem {
    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Toman {
        Toman::new(self.price.amount() * Decimal::from(self.quantity))
    }
}

/// Cart totals computed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CartSummary {
    pub total_items: u32,
    pub total_price: Toman,
    pub discount: Toman,
    pub shipping: Toman,
    pub payable: Toman,
}

/// Body of `GET /cart`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub subtotal: Toman,
    pub summary: Option<CartSummary>,
}

// =============================================================================
// Orders
// =============================================================================

/// A line item on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default, alias = "product")]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    pub quantity: u32,
    pub price: Toman,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Toman {
        Toman::new(self.price.amount() * Decimal::from(self.quantity))
    }
}

/// Shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub recipient: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub street: String,
    pub postal_code: String,
}

impl Address {
    /// Single-line form for listings.
    #[must_use]
    pub fn one_line(&self) -> String {
        [&self.province, &self.city, &self.street, &self.postal_code]
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Customer summary embedded in admin order responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderCustomer {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// An order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(alias = "total", alias = "totalAmount")]
    pub total_price: Toman,
    #[serde(default)]
    pub shipping_cost: Toman,
    #[serde(default)]
    pub discount: Toman,
    #[serde(default)]
    pub payable: Option<Toman>,
    #[serde(default)]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default, alias = "user")]
    pub customer: Option<OrderCustomer>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "processingAt")]
    pub preparing_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Amount the customer has to pay: `payable` when the API sends it,
    /// otherwise total + shipping − discount.
    #[must_use]
    pub fn amount_due(&self) -> Toman {
        self.payable.unwrap_or_else(|| {
            let due = self.total_price.amount() + self.shipping_cost.amount()
                - self.discount.amount();
            Toman::new(due.max(Decimal::ZERO))
        })
    }

    /// Order number for display, falling back to the id.
    #[must_use]
    pub fn display_number(&self) -> &str {
        self.order_number
            .as_deref()
            .unwrap_or_else(|| self.id.as_str())
    }
}

/// Filters for the admin order list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl OrderFilters {
    /// Query pairs with empty values dropped.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_owned()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            pairs.push(("search", search.to_owned()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Dashboard counters from `GET /admin/orders/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderStats {
    pub total_orders: u64,
    pub pending_payment: u64,
    pub paid: u64,
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
    pub total_revenue: Toman,
    pub today_orders: u64,
    pub today_revenue: Toman,
}

/// Body for `PUT /admin/orders/{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_code: Option<String>,
}

// =============================================================================
// Auth and payment
// =============================================================================

/// Token returned by `verify-code`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
}

/// Token and role returned by the admin login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLogin {
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
    pub role: AdminRole,
}

/// Gateway token for redirecting the customer to the payment page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayToken {
    pub token: String,
    #[serde(alias = "url", alias = "gatewayUrl", alias = "redirectUrl")]
    pub payment_url: String,
}

// =============================================================================
// Content
// =============================================================================

/// A slider or banner image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    #[serde(alias = "_id")]
    pub id: BannerId,
    #[serde(alias = "imageUrl", alias = "url")]
    pub image: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default = "default_active", alias = "active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}
