//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use kala_core::models::{OrderFilters, OrderStats};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdminAuth, expire_session};
use crate::routes::layout::Layout;
use crate::routes::orders::OrderRowView;
use crate::state::AppState;

/// Orders shown under the counters.
const RECENT_ORDERS: u32 = 5;

/// One counter tile.
#[derive(Debug, Clone)]
pub struct StatTile {
    pub label: &'static str,
    pub value: String,
    /// Order list filtered to this tile, if it maps to a status.
    pub href: Option<&'static str>,
}

fn stat_tiles(stats: &OrderStats) -> Vec<StatTile> {
    let count = |label: &'static str, value: u64, href: Option<&'static str>| StatTile {
        label,
        value: value.to_string(),
        href,
    };
    vec![
        count("Orders today", stats.today_orders, None),
        StatTile {
            label: "Revenue today",
            value: stats.today_revenue.to_string(),
            href: None,
        },
        count("All orders", stats.total_orders, Some("/orders")),
        StatTile {
            label: "Total revenue",
            value: stats.total_revenue.to_string(),
            href: None,
        },
        count(
            "Pending payment",
            stats.pending_payment,
            Some("/orders?status=pending_payment"),
        ),
        count("Paid", stats.paid, Some("/orders?status=paid")),
        count("Processing", stats.processing, Some("/orders?status=processing")),
        count("Shipped", stats.shipped, Some("/orders?status=shipped")),
        count("Delivered", stats.delivered, Some("/orders?status=delivered")),
        count("Cancelled", stats.cancelled, Some("/orders?status=cancelled")),
    ]
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub layout: Layout,
    pub tiles: Vec<StatTile>,
    pub recent_orders: Vec<OrderRowView>,
    pub error: Option<String>,
}

/// Display the dashboard.
///
/// A failing API still renders the page, with an error banner.
#[instrument(skip(state, session, admin))]
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<Response> {
    let recent = OrderFilters {
        limit: Some(RECENT_ORDERS),
        ..OrderFilters::default()
    };
    let (stats, orders) = tokio::join!(
        state.api().get_admin_order_stats(&admin.token),
        state.api().get_admin_orders(&admin.token, &recent),
    );

    if stats.as_ref().err().is_some_and(|e| e.is_unauthorized())
        || orders.as_ref().err().is_some_and(|e| e.is_unauthorized())
    {
        return Ok(expire_session(&session, "/").await?.into_response());
    }

    let mut error = None;
    let tiles = match stats {
        Ok(stats) => stat_tiles(&stats),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load order stats");
            error = Some(e.user_message());
            Vec::new()
        }
    };
    let recent_orders = match orders {
        Ok(page) => page.items.iter().map(OrderRowView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load recent orders");
            error.get_or_insert_with(|| e.user_message());
            Vec::new()
        }
    };

    Ok(DashboardTemplate {
        layout: Layout::load(&session, Some(&admin), "/").await,
        tiles,
        recent_orders,
        error,
    }
    .into_response())
}

#[cfg(test)]
mod tests {
    use kala_core::Toman;

    use super::*;

    #[test]
    fn test_stat_tiles() {
        let stats = OrderStats {
            total_orders: 12,
            shipped: 3,
            today_revenue: Toman::from_whole(250_000),
            ..OrderStats::default()
        };
        let tiles = stat_tiles(&stats);
        assert_eq!(tiles[1].value, "250,000 Toman");
        let shipped = tiles.iter().find(|t| t.label == "Shipped");
        assert_eq!(shipped.map(|t| t.value.as_str()), Some("3"));
        assert_eq!(shipped.and_then(|t| t.href), Some("/orders?status=shipped"));
    }
}
