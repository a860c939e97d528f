//! Customer order page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use kala_core::models::Order;
use kala_core::{OrderId, OrderProgress, Toman};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAuth, expire_session};
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Format a timestamp for display.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

// =============================================================================
// View Models
// =============================================================================

/// One node of the progress line.
#[derive(Clone)]
pub struct StepView {
    pub label: &'static str,
    pub css_class: &'static str,
    pub at: Option<String>,
}

/// Order line display data.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: String,
    pub number: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub cancelled: bool,
    pub steps: Vec<StepView>,
    pub percent: u8,
    /// `"completed/reached"`, e.g. `4/4`.
    pub reached: String,
    pub items: Vec<OrderItemView>,
    pub subtotal: String,
    pub shipping: String,
    pub discount: Option<String>,
    pub amount_due: String,
    pub address: Option<String>,
    pub tracking_code: Option<String>,
    pub placed_at: Option<String>,
    pub can_pay: bool,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let progress = OrderProgress::for_order(order);
        let (completed, reached) = progress.reached_fraction();

        Self {
            id: order.id.to_string(),
            number: order.display_number().to_owned(),
            status_label: order.status.label(),
            badge_class: order.status.badge_class(),
            cancelled: progress.is_cancelled(),
            steps: progress
                .steps
                .iter()
                .map(|step| StepView {
                    label: step.stage.label(),
                    css_class: step.state.css_class(),
                    at: step.at.map(format_timestamp),
                })
                .collect(),
            percent: progress.percent,
            reached: format!("{completed}/{reached}"),
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    price: item.price.to_string(),
                    line_price: item.line_total().to_string(),
                })
                .collect(),
            subtotal: order.total_price.to_string(),
            shipping: order.shipping_cost.to_string(),
            discount: (order.discount > Toman::ZERO).then(|| order.discount.to_string()),
            amount_due: order.amount_due().to_string(),
            address: order
                .address
                .as_ref()
                .map(kala_core::models::Address::one_line)
                .filter(|a| !a.is_empty()),
            tracking_code: order.tracking_code.clone().filter(|c| !c.is_empty()),
            placed_at: order.created_at.map(format_timestamp),
            can_pay: order.status.awaits_payment(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: Layout,
    pub order: OrderView,
}

/// Order not found template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/not_found.html")]
pub struct OrderNotFoundTemplate {
    pub layout: Layout,
    pub order_id: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display one order with its progress.
///
/// A rejected token sends the customer to sign in again and back here.
#[instrument(skip(state, session, customer))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response> {
    let order_id = OrderId::new(id);

    match state
        .api()
        .get_order_details(&customer.token, &order_id)
        .await
    {
        Ok(order) => {
            let layout = Layout::load(&session, Some(&customer)).await;
            Ok(OrderShowTemplate {
                layout,
                order: OrderView::from(&order),
            }
            .into_response())
        }
        Err(e) if e.is_unauthorized() => {
            let return_to = format!("/orders/{}", urlencoding::encode(order_id.as_str()));
            Ok(expire_session(&session, &return_to).await?.into_response())
        }
        Err(e) if e.is_order_not_found() => {
            let layout = Layout::load(&session, Some(&customer)).await;
            Ok((
                StatusCode::NOT_FOUND,
                OrderNotFoundTemplate {
                    layout,
                    order_id: order_id.to_string(),
                },
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}
