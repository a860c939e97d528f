//! Product listing route handlers.
//!
//! All listings (everything, by category, by label, search) share one
//! template and one card view.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use kala_core::models::Product;
use kala_core::pagination::DEFAULT_LIMIT;
use kala_core::{CategoryId, Page, PageRequest, Pagination};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::ApiError;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Page numbers shown in the pagination bar.
const PAGE_WINDOW: u32 = 5;

// =============================================================================
// View Models
// =============================================================================

/// Product card display data for templates.
#[derive(Clone)]
pub struct ProductCardView {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    /// Price after discount.
    pub price: String,
    /// Struck-through price when discounted.
    pub original_price: Option<String>,
    pub discount_percent: u8,
    pub in_stock: bool,
    /// Variant preselected by the add-to-cart button.
    pub variant_id: Option<String>,
    pub labels: Vec<String>,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        let pricing = product.pricing();
        let discounted = pricing.has_discount();
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            image: product.primary_image().map(str::to_owned),
            price: pricing.final_price.to_string(),
            original_price: discounted.then(|| pricing.original.to_string()),
            discount_percent: if discounted { pricing.percent } else { 0 },
            in_stock: product.in_stock(),
            variant_id: product
                .variants
                .iter()
                .find(|v| v.stock > 0)
                .and_then(|v| v.id.as_ref())
                .map(ToString::to_string),
            labels: product.labels.clone(),
        }
    }
}

/// A numbered link in the pagination bar.
#[derive(Clone)]
pub struct PageLink {
    pub number: u32,
    pub href: String,
    pub current: bool,
}

/// Pagination bar display data.
#[derive(Clone)]
pub struct PaginationView {
    pub links: Vec<PageLink>,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    pub summary: String,
}

impl PaginationView {
    /// Build the bar for `base` (a path), carrying `extra` query pairs along.
    /// `None` when everything fits on one page.
    #[must_use]
    pub fn build(pagination: &Pagination, base: &str, extra: &[(&str, &str)]) -> Option<Self> {
        if pagination.total_pages <= 1 {
            return None;
        }
        let href = |page: u32| page_href(base, extra, page, pagination.limit);

        Some(Self {
            links: pagination
                .window(PAGE_WINDOW)
                .into_iter()
                .map(|number| PageLink {
                    number,
                    href: href(number),
                    current: number == pagination.page,
                })
                .collect(),
            prev_href: pagination.prev_page().map(href),
            next_href: pagination.next_page().map(href),
            summary: format!(
                "Page {} of {} ({} items)",
                pagination.page, pagination.total_pages, pagination.total
            ),
        })
    }
}

fn page_href(base: &str, extra: &[(&str, &str)], page: u32, limit: u32) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.extend_pairs(extra.iter().copied());
    query.append_pair("page", &page.to_string());
    if limit != DEFAULT_LIMIT {
        query.append_pair("limit", &limit.to_string());
    }
    format!("{base}?{}", query.finish())
}

// =============================================================================
// Templates
// =============================================================================

/// Shared product listing template.
#[derive(Template, WebTemplate)]
#[template(path = "products/list.html")]
pub struct ListingTemplate {
    pub layout: Layout,
    pub title: String,
    pub products: Vec<ProductCardView>,
    pub pagination: Option<PaginationView>,
    pub error: Option<String>,
    /// Search box contents; `None` hides the search form.
    pub query: Option<String>,
    /// Where add-to-cart should come back to.
    pub return_to: String,
}

struct Listing {
    title: String,
    base: String,
    extra: Vec<(&'static str, String)>,
    query: Option<String>,
}

impl Listing {
    fn new(title: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            base: base.into(),
            extra: Vec::new(),
            query: None,
        }
    }

    /// Render a fetched page; a failed fetch keeps the page with an error banner.
    fn render(
        self,
        layout: Layout,
        page: PageRequest,
        result: std::result::Result<Page<Product>, ApiError>,
    ) -> Result<ListingTemplate> {
        let (items, pagination, error) = match result {
            Ok(page) => (page.items, Some(page.pagination), None),
            Err(e @ ApiError::NotFound { .. }) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load products");
                (Vec::new(), None, Some(e.user_message()))
            }
        };

        let extra: Vec<(&str, &str)> = self.extra.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let return_to = if page.page > 1 {
            page_href(&self.base, &extra, page.page, page.limit)
        } else {
            self.base.clone()
        };

        Ok(ListingTemplate {
            layout,
            title: self.title,
            products: items.iter().map(ProductCardView::from).collect(),
            pagination: pagination
                .as_ref()
                .and_then(|p| PaginationView::build(p, &self.base, &extra)),
            error,
            query: self.query,
            return_to,
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// All products.
#[instrument(skip(state, session, customer))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Query(page): Query<PageRequest>,
) -> Result<ListingTemplate> {
    let layout = Layout::load(&session, customer.as_ref()).await;
    let result = state.api().get_all_products(page).await;
    Listing::new("All products", "/products").render(layout, page, result)
}

/// Products in one category.
#[instrument(skip(state, session, customer))]
pub async fn category(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Path(id): Path<String>,
    Query(page): Query<PageRequest>,
) -> Result<ListingTemplate> {
    let layout = Layout::load(&session, customer.as_ref()).await;
    let id = CategoryId::new(id);

    let (categories, result) = tokio::join!(
        state.api().get_categories(),
        state.api().get_products_by_category(&id, page)
    );

    let title = match categories {
        Ok(categories) => categories
            .into_iter()
            .find(|c| c.id == id)
            .map(|c| c.name)
            .ok_or_else(|| AppError::NotFound(format!("category {id}")))?,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load categories");
            "Category".to_owned()
        }
    };

    let base = format!("/categories/{}", urlencoding::encode(id.as_str()));
    Listing::new(title, base).render(layout, page, result)
}

/// Products carrying a label.
#[instrument(skip(state, session, customer))]
pub async fn label(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Path(label): Path<String>,
    Query(page): Query<PageRequest>,
) -> Result<ListingTemplate> {
    let layout = Layout::load(&session, customer.as_ref()).await;
    let result = state.api().get_products_by_label(&label, page).await;
    let base = format!("/labels/{}", urlencoding::encode(&label));
    Listing::new(label, base).render(layout, page, result)
}

/// Product search. An empty query shows just the search box.
#[instrument(skip(state, session, customer))]
pub async fn search(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Query(query): Query<SearchQuery>,
) -> Result<ListingTemplate> {
    let layout = Layout::load(&session, customer.as_ref()).await;
    let page = PageRequest::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_LIMIT),
    );
    let q = query.q.as_deref().map(str::trim).unwrap_or_default().to_owned();

    let mut listing = Listing::new("Search", "/search");
    listing.query = Some(q.clone());

    if q.is_empty() {
        return listing.render(layout, page, Ok(Page::empty()));
    }

    let result = state.api().search_products(&q, page).await;
    listing.title = format!("Results for \u{201c}{q}\u{201d}");
    listing.extra.push(("q", q));
    listing.render(layout, page, result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_card_shows_discount() {
        let product: Product = serde_json::from_value(json!({
            "id": "p1",
            "name": "Tea",
            "price": 100000,
            "discount": 10,
            "discountType": "percent",
            "stock": 3,
            "images": [{"url": "a.jpg"}, {"url": "b.jpg", "isPrimary": true}],
            "variants": [
                {"id": "v0", "name": "Small", "price": 100000, "stock": 0},
                {"id": "v1", "name": "Large", "price": 120000, "stock": 2}
            ]
        }))
        .unwrap();

        let card = ProductCardView::from(&product);
        assert_eq!(card.price, "90,000 Toman");
        assert_eq!(card.original_price.as_deref(), Some("100,000 Toman"));
        assert_eq!(card.discount_percent, 10);
        assert_eq!(card.image.as_deref(), Some("b.jpg"));
        assert_eq!(card.variant_id.as_deref(), Some("v1"));
        assert!(card.in_stock);
    }

    #[test]
    fn test_card_without_discount() {
        let product: Product =
            serde_json::from_value(json!({"id": 7, "name": "Cup", "price": 5000})).unwrap();
        let card = ProductCardView::from(&product);
        assert_eq!(card.original_price, None);
        assert_eq!(card.discount_percent, 0);
        assert!(!card.in_stock);
    }

    #[test]
    fn test_pagination_links_keep_query() {
        let pagination = Pagination::new(2, 12, 40);
        let view = PaginationView::build(&pagination, "/search", &[("q", "green tea")]).unwrap();

        assert_eq!(view.links.len(), 4);
        assert!(view.links[1].current);
        assert_eq!(view.prev_href.as_deref(), Some("/search?q=green+tea&page=1"));
        assert_eq!(view.next_href.as_deref(), Some("/search?q=green+tea&page=3"));
    }

    #[test]
    fn test_single_page_has_no_bar() {
        assert!(PaginationView::build(&Pagination::new(1, 12, 5), "/products", &[]).is_none());
    }
}
