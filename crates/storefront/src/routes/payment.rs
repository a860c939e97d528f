//! Payment gateway hand-off and return page.
//!
//! Paying posts the browser to the Saman gateway with a token the API
//! issues. The gateway sends the browser back to `/result` with query
//! parameters that nobody signs, so the result page labels them as
//! unverified and shows the API's own order status next to them.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use kala_core::{OrderId, PaymentReturn, PaymentReturnQuery};
use tower_sessions::Session;
use tracing::instrument;
use url::Url;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth, expire_session, set_flash};
use crate::routes::layout::Layout;
use crate::routes::orders::OrderNotFoundTemplate;
use crate::state::AppState;

/// Auto-submitting form that posts the token to the gateway.
#[derive(Template, WebTemplate)]
#[template(path = "payment/redirect.html")]
pub struct GatewayRedirectTemplate {
    pub payment_url: String,
    pub token: String,
}

/// Payment result page template.
#[derive(Template, WebTemplate)]
#[template(path = "payment/result.html")]
pub struct PaymentResultTemplate {
    pub layout: Layout,
    pub reported_label: &'static str,
    pub reported_success: bool,
    pub order_href: Option<String>,
    pub order_id: Option<String>,
    pub ref_num: Option<String>,
    pub amount: Option<String>,
    pub reason: Option<String>,
    /// Order status as reported by the API.
    pub verified_status: Option<&'static str>,
    pub verified_badge: &'static str,
}

fn order_path(order_id: &OrderId) -> String {
    format!("/orders/{}", urlencoding::encode(order_id.as_str()))
}

/// Start paying for an order.
#[instrument(skip(state, session, customer))]
pub async fn pay(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response> {
    let order_id = OrderId::new(id);
    let order_page = order_path(&order_id);

    let order = match state
        .api()
        .get_order_details(&customer.token, &order_id)
        .await
    {
        Ok(order) => order,
        Err(e) if e.is_unauthorized() => {
            return Ok(expire_session(&session, &order_page).await?.into_response());
        }
        Err(e) if e.is_order_not_found() => {
            let layout = Layout::load(&session, Some(&customer)).await;
            return Ok((
                StatusCode::NOT_FOUND,
                OrderNotFoundTemplate {
                    layout,
                    order_id: order_id.to_string(),
                },
            )
                .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    if !order.status.awaits_payment() {
        set_flash(&session, "This order is not awaiting payment.").await;
        return Ok(Redirect::to(&order_page).into_response());
    }

    let amount_rial = order.amount_due().to_rial();
    if amount_rial <= 0 {
        set_flash(&session, "This order has nothing to pay.").await;
        return Ok(Redirect::to(&order_page).into_response());
    }

    let gateway = match state
        .api()
        .get_saman_token(
            &customer.token,
            &order_id,
            amount_rial,
            customer.phone.as_ref(),
        )
        .await
    {
        Ok(gateway) => gateway,
        Err(e) if e.is_unauthorized() => {
            return Ok(expire_session(&session, &order_page).await?.into_response());
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to get gateway token");
            set_flash(&session, e.user_message()).await;
            return Ok(Redirect::to(&order_page).into_response());
        }
    };

    let payment_url = Url::parse(&gateway.payment_url)
        .ok()
        .filter(|url| url.scheme() == "https" || url.scheme() == "http")
        .ok_or_else(|| {
            AppError::Internal(format!("invalid gateway URL: {}", gateway.payment_url))
        })?;

    add_breadcrumb(
        "payment",
        "Redirecting to gateway",
        Some(&[("order_id", order_id.as_str())]),
    );
    tracing::info!(order_id = %order_id, amount_rial, "Redirecting to payment gateway");

    Ok(GatewayRedirectTemplate {
        payment_url: payment_url.to_string(),
        token: gateway.token,
    }
    .into_response())
}

/// Show what the gateway reported, plus the real order status if we can.
#[instrument(skip(state, session, customer))]
pub async fn result(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Query(query): Query<PaymentReturnQuery>,
) -> Result<PaymentResultTemplate> {
    let reported = PaymentReturn::from_query(&query);

    let mut verified_status = None;
    let mut verified_badge = "";
    if let (Some(customer), Some(order_id)) = (customer.as_ref(), reported.order_id.as_ref()) {
        match state
            .api()
            .get_order_details(&customer.token, order_id)
            .await
        {
            Ok(order) => {
                verified_status = Some(order.status.label());
                verified_badge = order.status.badge_class();
            }
            Err(e) => tracing::info!(error = %e, "Could not load order for payment result"),
        }
    }

    let layout = Layout::load(&session, customer.as_ref()).await;
    Ok(PaymentResultTemplate {
        layout,
        reported_label: reported.outcome.label(),
        reported_success: reported.outcome.is_success(),
        order_href: reported.order_id.as_ref().map(order_path),
        order_id: reported.order_id.as_ref().map(ToString::to_string),
        ref_num: reported.ref_num.clone(),
        amount: reported.amount_toman().map(|t| t.to_string()),
        reason: reported.reason.clone(),
        verified_status,
        verified_badge,
    })
}
