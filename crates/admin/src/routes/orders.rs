//! Order management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use kala_core::models::{Order, OrderFilters};
use kala_core::{OrderId, OrderProgress, OrderStatus, Toman};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::ApiError;
use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireEditor, expire_session, set_flash};
use crate::routes::layout::{Layout, PagerView};
use crate::routes::redirect_after_failure;
use crate::state::AppState;

/// Orders per list page.
const PAGE_SIZE: u32 = 20;

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn order_path(order_id: &OrderId) -> String {
    format!("/orders/{}", urlencoding::encode(order_id.as_str()))
}

// =============================================================================
// View Models
// =============================================================================

/// One row of the order table.
#[derive(Debug, Clone)]
pub struct OrderRowView {
    pub href: String,
    pub number: String,
    pub customer: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub amount: String,
    pub placed_at: String,
}

fn customer_name(order: &Order) -> String {
    order
        .customer
        .as_ref()
        .and_then(|c| {
            c.name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .or_else(|| c.phone.clone())
        })
        .or_else(|| {
            order
                .address
                .as_ref()
                .map(|a| a.recipient.clone())
                .filter(|r| !r.is_empty())
        })
        .unwrap_or_default()
}

impl From<&Order> for OrderRowView {
    fn from(order: &Order) -> Self {
        Self {
            href: order_path(&order.id),
            number: order.display_number().to_owned(),
            customer: customer_name(order),
            status_label: order.status.label(),
            badge_class: order.status.badge_class(),
            amount: order.amount_due().to_string(),
            placed_at: order.created_at.map(format_timestamp).unwrap_or_default(),
        }
    }
}

/// A status filter or status-change option.
#[derive(Debug, Clone)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn status_options(selected: Option<OrderStatus>) -> Vec<StatusOption> {
    OrderStatus::ALL
        .into_iter()
        .map(|status| StatusOption {
            value: status.as_str(),
            label: status.label(),
            selected: Some(status) == selected,
        })
        .collect()
}

/// Timeline entry on the detail page.
#[derive(Debug, Clone)]
pub struct TimelineView {
    pub label: &'static str,
    pub css_class: &'static str,
    pub at: String,
}

/// Order line on the detail page.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub name: String,
    pub variant: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Everything the detail page shows.
#[derive(Debug, Clone)]
pub struct OrderDetailView {
    pub path: String,
    pub number: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub timeline: Vec<TimelineView>,
    pub percent: u8,
    pub lines: Vec<OrderLineView>,
    pub subtotal: String,
    pub shipping: String,
    pub discount: Option<String>,
    pub amount_due: String,
    pub customer: String,
    pub phone: String,
    pub address: String,
    pub tracking_code: String,
    pub placed_at: String,
    /// Statuses the order can be moved to.
    pub next_statuses: Vec<StatusOption>,
    pub can_cancel: bool,
    pub shows_tracking: bool,
}

impl From<&Order> for OrderDetailView {
    fn from(order: &Order) -> Self {
        let progress = OrderProgress::for_order(order);
        Self {
            path: order_path(&order.id),
            number: order.display_number().to_owned(),
            status_label: order.status.label(),
            badge_class: order.status.badge_class(),
            timeline: progress
                .steps
                .iter()
                .map(|step| TimelineView {
                    label: step.stage.label(),
                    css_class: step.state.css_class(),
                    at: step.at.map(format_timestamp).unwrap_or_default(),
                })
                .collect(),
            percent: progress.percent,
            lines: order
                .items
                .iter()
                .map(|item| OrderLineView {
                    name: item.name.clone(),
                    variant: item.variant.clone().unwrap_or_default(),
                    quantity: item.quantity,
                    price: item.price.to_string(),
                    line_price: item.line_total().to_string(),
                })
                .collect(),
            subtotal: order.total_price.to_string(),
            shipping: order.shipping_cost.to_string(),
            discount: (order.discount > Toman::ZERO).then(|| order.discount.to_string()),
            amount_due: order.amount_due().to_string(),
            customer: customer_name(order),
            phone: order
                .customer
                .as_ref()
                .and_then(|c| c.phone.clone())
                .or_else(|| order.address.as_ref().map(|a| a.phone.clone()))
                .unwrap_or_default(),
            address: order
                .address
                .as_ref()
                .map(kala_core::models::Address::one_line)
                .unwrap_or_default(),
            tracking_code: order.tracking_code.clone().unwrap_or_default(),
            placed_at: order.created_at.map(format_timestamp).unwrap_or_default(),
            next_statuses: status_options(None)
                .into_iter()
                .filter(|option| option.value != order.status.as_str())
                .collect(),
            can_cancel: order.status.is_cancellable(),
            shows_tracking: order.status.accepts_tracking_code(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Order list template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/list.html")]
pub struct OrderListTemplate {
    pub layout: Layout,
    pub orders: Vec<OrderRowView>,
    pub statuses: Vec<StatusOption>,
    pub search: String,
    pub pager: Option<PagerView>,
    pub error: Option<String>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: Layout,
    pub order: OrderDetailView,
}

/// Order not found template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/not_found.html")]
pub struct OrderNotFoundTemplate {
    pub layout: Layout,
    pub order_id: String,
}

// =============================================================================
// Forms
// =============================================================================

/// Order list query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
}

impl OrderListQuery {
    /// API filters; an unknown status means "any".
    fn filters(&self) -> OrderFilters {
        OrderFilters {
            status: self.status.as_deref().and_then(|s| s.parse().ok()),
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            page: Some(self.page.unwrap_or(1).max(1)),
            limit: Some(PAGE_SIZE),
        }
    }
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    #[serde(default)]
    pub tracking_code: String,
}

/// Tracking code form.
#[derive(Debug, Deserialize)]
pub struct TrackingForm {
    pub tracking_code: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the filtered order list.
#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<OrderListQuery>,
) -> Result<Response> {
    let filters = query.filters();
    let status = filters.status.map(|s| s.as_str()).unwrap_or_default();
    let search = filters.search.clone().unwrap_or_default();

    let (orders, pager, error) = match state.api().get_admin_orders(&admin.token, &filters).await {
        Ok(page) => (
            page.items.iter().map(OrderRowView::from).collect(),
            PagerView::build(
                &page.pagination,
                "/orders",
                &[("status", status), ("search", search.as_str())],
            ),
            None,
        ),
        Err(e) if e.is_unauthorized() => {
            return Ok(expire_session(&session, "/orders").await?.into_response());
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load orders");
            (Vec::new(), None, Some(e.user_message()))
        }
    };

    Ok(OrderListTemplate {
        layout: Layout::load(&session, Some(&admin), "/orders").await,
        orders,
        statuses: status_options(filters.status),
        search,
        pager,
        error,
    }
    .into_response())
}

/// Display one order.
#[instrument(skip(state, session, admin))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<String>,
) -> Result<Response> {
    let order_id = OrderId::new(id);
    let path = order_path(&order_id);

    match state.api().get_admin_order(&admin.token, &order_id).await {
        Ok(order) => Ok(OrderShowTemplate {
            layout: Layout::load(&session, Some(&admin), &path).await,
            order: OrderDetailView::from(&order),
        }
        .into_response()),
        Err(e) if e.is_unauthorized() => Ok(expire_session(&session, &path).await?.into_response()),
        Err(e @ ApiError::NotFound { .. }) => {
            tracing::info!(error = %e, "Order not found");
            Ok((
                StatusCode::NOT_FOUND,
                OrderNotFoundTemplate {
                    layout: Layout::load(&session, Some(&admin), &path).await,
                    order_id: order_id.to_string(),
                },
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Move an order to another status.
#[instrument(skip(state, session, admin, form))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    Path(id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Result<Response> {
    let order_id = OrderId::new(id);
    let path = order_path(&order_id);

    let Ok(status) = form.status.parse::<OrderStatus>() else {
        set_flash(&session, "Choose a valid status.").await;
        return Ok(Redirect::to(&path).into_response());
    };
    let tracking_code = Some(form.tracking_code.trim().to_owned())
        .filter(|code| !code.is_empty() && status.accepts_tracking_code());

    if let Err(e) = state
        .api()
        .update_order_status(&admin.token, &order_id, status, tracking_code)
        .await
    {
        return redirect_after_failure(&session, &e, &path).await;
    }

    tracing::info!(order_id = %order_id, status = %status, admin = %admin.username, "Order status changed");
    set_flash(&session, format!("Order marked as {}.", status.label())).await;
    Ok(Redirect::to(&path).into_response())
}

/// Set the carrier tracking code.
#[instrument(skip(state, session, admin, form))]
pub async fn update_tracking(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    Path(id): Path<String>,
    Form(form): Form<TrackingForm>,
) -> Result<Response> {
    let order_id = OrderId::new(id);
    let path = order_path(&order_id);

    let code = form.tracking_code.trim();
    if code.is_empty() {
        set_flash(&session, "Enter a tracking code.").await;
        return Ok(Redirect::to(&path).into_response());
    }

    if let Err(e) = state
        .api()
        .update_order_tracking(&admin.token, &order_id, code)
        .await
    {
        return redirect_after_failure(&session, &e, &path).await;
    }

    set_flash(&session, "Tracking code saved.").await;
    Ok(Redirect::to(&path).into_response())
}

/// Cancel an order.
#[instrument(skip(state, session, admin))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    Path(id): Path<String>,
) -> Result<Response> {
    let order_id = OrderId::new(id);
    let path = order_path(&order_id);

    if let Err(e) = state.api().cancel_admin_order(&admin.token, &order_id).await {
        return redirect_after_failure(&session, &e, &path).await;
    }

    tracing::info!(order_id = %order_id, admin = %admin.username, "Order cancelled");
    set_flash(&session, "Order cancelled.").await;
    Ok(Redirect::to(&path).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn order(status: &str) -> Order {
        serde_json::from_value(json!({
            "_id": "o 1",
            "orderNumber": "KL-1001",
            "status": status,
            "items": [{"name": "Tea", "variant": "500g", "quantity": 2, "price": 50000}],
            "totalPrice": 100000,
            "shippingCost": 20000,
            "user": {"name": "", "phone": "09123456789"},
            "createdAt": "2024-03-01T10:30:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_row_view() {
        let row = OrderRowView::from(&order("paid"));
        assert_eq!(row.href, "/orders/o%201");
        assert_eq!(row.customer, "09123456789");
        assert_eq!(row.amount, "120,000 Toman");
        assert_eq!(row.placed_at, "2024-03-01 10:30");
    }

    #[test]
    fn test_detail_actions_follow_status() {
        let paid = OrderDetailView::from(&order("paid"));
        assert!(paid.can_cancel);
        assert!(!paid.shows_tracking);
        assert_eq!(paid.next_statuses.len(), OrderStatus::ALL.len() - 1);
        assert!(paid.next_statuses.iter().all(|s| s.value != "paid"));
        assert_eq!(paid.lines[0].line_price, "100,000 Toman");

        let shipped = OrderDetailView::from(&order("shipped"));
        assert!(!shipped.can_cancel);
        assert!(shipped.shows_tracking);
    }

    #[test]
    fn test_list_query_filters() {
        let query = OrderListQuery {
            status: Some("lost".to_owned()),
            search: Some("  KL-1 ".to_owned()),
            page: Some(0),
        };
        let filters = query.filters();
        assert_eq!(filters.status, None);
        assert_eq!(filters.search.as_deref(), Some("KL-1"));
        assert_eq!(filters.page, Some(1));
        assert_eq!(filters.limit, Some(PAGE_SIZE));

        let query = OrderListQuery {
            status: Some("shipped".to_owned()),
            ..OrderListQuery::default()
        };
        assert_eq!(query.filters().status, Some(OrderStatus::Shipped));
    }
}
