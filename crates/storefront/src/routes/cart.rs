//! Cart route handlers.
//!
//! Mutations are plain form posts that redirect back (post/redirect/get).
//! Every mutation ends with a cart store refresh, which also pushes the new
//! count to open `/cart/events` streams.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{
        IntoResponse, Redirect, Response, Sse,
        sse::{Event, KeepAlive},
    },
};
use kala_core::redirect::safe_return_url;
use kala_core::{CartItemId, CartSnapshot, ProductId, VariantId};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{AddToCart, ApiError};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth, cart_key, expire_session, set_flash};
use crate::models::CurrentCustomer;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Highest quantity accepted from the cart forms.
const MAX_QUANTITY: u32 = 99;

// =============================================================================
// View Models
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub variant: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total: String,
    pub item_count: u32,
}

impl From<&CartSnapshot> for CartView {
    fn from(snapshot: &CartSnapshot) -> Self {
        Self {
            items: snapshot
                .items
                .iter()
                .map(|item| CartItemView {
                    id: item.id.to_string(),
                    product_id: item.product_id.to_string(),
                    name: item.name.clone(),
                    image: item.image.clone(),
                    variant: item.variant.clone(),
                    quantity: item.quantity,
                    price: item.price.to_string(),
                    line_price: item.line_total().to_string(),
                })
                .collect(),
            total: snapshot.total.to_string(),
            item_count: snapshot.count,
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: Option<u32>,
    /// Page to return to after adding.
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
}

/// Cart count badge fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Handlers
// =============================================================================

/// Refresh the store for this session and return the fresh snapshot.
async fn refresh(
    state: &AppState,
    session: &Session,
    customer: Option<&CurrentCustomer>,
) -> Result<CartSnapshot> {
    let key = cart_key(session).await?;
    Ok(state
        .cart()
        .refresh(&key, customer.map(|c| &c.token))
        .await)
}

/// Turn a failed mutation into a flash message, or a re-login on 401.
async fn mutation_failed(session: &Session, err: &ApiError, return_to: &str) -> Result<Response> {
    if err.is_unauthorized() {
        return Ok(expire_session(session, return_to).await?.into_response());
    }
    tracing::warn!(error = %err, "Cart update failed");
    set_flash(session, err.user_message()).await;
    Ok(Redirect::to(return_to).into_response())
}

/// Display cart page. Viewing the cart refreshes it.
#[instrument(skip(state, session, customer))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<CartShowTemplate> {
    let snapshot = refresh(&state, &session, customer.as_ref()).await?;
    let layout = Layout::load(&session, customer.as_ref()).await;

    Ok(CartShowTemplate {
        layout,
        cart: CartView::from(&snapshot),
    })
}

/// Add item to cart.
#[instrument(skip(state, session, customer))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let return_to = safe_return_url(form.return_to.as_deref());
    let item = AddToCart {
        product_id: ProductId::new(form.product_id),
        variant_id: form
            .variant_id
            .filter(|v| !v.trim().is_empty())
            .map(VariantId::new),
        quantity: form.quantity.unwrap_or(1).clamp(1, MAX_QUANTITY),
    };

    if let Err(e) = state.api().add_to_cart(&customer.token, &item).await {
        return mutation_failed(&session, &e, &return_to).await;
    }

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", item.product_id.as_str())]),
    );
    refresh(&state, &session, Some(&customer)).await?;
    set_flash(&session, "Added to your cart.").await;
    Ok(Redirect::to(&return_to).into_response())
}

/// Update cart line quantity. Zero removes the line.
#[instrument(skip(state, session, customer))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let item_id = CartItemId::new(form.item_id);
    let result = if form.quantity == 0 {
        state.api().remove_cart_item(&customer.token, &item_id).await
    } else {
        state
            .api()
            .update_cart_item(&customer.token, &item_id, form.quantity.min(MAX_QUANTITY))
            .await
    };

    if let Err(e) = result {
        return mutation_failed(&session, &e, "/cart").await;
    }

    refresh(&state, &session, Some(&customer)).await?;
    Ok(Redirect::to("/cart").into_response())
}

/// Remove a line from the cart.
#[instrument(skip(state, session, customer))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let item_id = CartItemId::new(form.item_id);
    if let Err(e) = state.api().remove_cart_item(&customer.token, &item_id).await {
        return mutation_failed(&session, &e, "/cart").await;
    }

    refresh(&state, &session, Some(&customer)).await?;
    Ok(Redirect::to("/cart").into_response())
}

/// Cart count badge from the stored snapshot; no API call.
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> Result<CartCountTemplate> {
    let key = cart_key(&session).await?;
    let count = state.cart().snapshot(&key).await.count;
    Ok(CartCountTemplate { count })
}

/// Refetch the cart and return the new badge.
#[instrument(skip(state, session, customer))]
pub async fn refresh_count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<CartCountTemplate> {
    let snapshot = refresh(&state, &session, customer.as_ref()).await?;
    Ok(CartCountTemplate {
        count: snapshot.count,
    })
}

/// Stream this session's cart count as server-sent events.
///
/// The current count is sent immediately, then one `cart` event per change.
#[instrument(skip(state, session))]
pub async fn events(
    State(state): State<AppState>,
    session: Session,
) -> Result<Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>>> {
    let key = cart_key(&session).await?;
    // Subscribe before reading the snapshot so no change falls in between
    let mut rx = state.cart().subscribe();
    let store = state.cart().clone();

    let stream = async_stream::stream! {
        yield Ok(count_event(store.snapshot(&key).await.count));

        loop {
            match rx.recv().await {
                Ok(event) if event.key() == key => yield Ok(count_event(event.count())),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Cart event stream lagged");
                    yield Ok(count_event(store.snapshot(&key).await.count));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn count_event(count: u32) -> Event {
    Event::default().event("cart").data(count.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kala_core::models::Cart;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_cart_view_formats_prices() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [{"id": "c1", "productId": "p1", "name": "Tea", "quantity": 3, "price": 12500}]
        }))
        .unwrap();
        let view = CartView::from(&CartSnapshot::from_cart(cart));

        assert_eq!(view.item_count, 3);
        assert_eq!(view.total, "37,500 Toman");
        assert_eq!(view.items[0].price, "12,500 Toman");
        assert_eq!(view.items[0].line_price, "37,500 Toman");
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::from(&CartSnapshot::empty());
        assert!(view.items.is_empty());
        assert_eq!(view.total, "0 Toman");
        assert_eq!(view.item_count, 0);
    }
}
