//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use kala_core::PageRequest;
use kala_core::models::{Banner, Category};
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::catalog::ProductCardView;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Products shown on the home page.
const HOME_PRODUCT_COUNT: u32 = 8;

/// A slide in the home page carousel.
#[derive(Clone)]
pub struct SlideView {
    pub image: String,
    pub link: Option<String>,
}

impl From<Banner> for SlideView {
    fn from(banner: Banner) -> Self {
        Self {
            image: banner.image,
            link: banner.link.filter(|l| !l.trim().is_empty()),
        }
    }
}

/// A category tile.
#[derive(Clone)]
pub struct CategoryView {
    pub href: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<Category> for CategoryView {
    fn from(category: Category) -> Self {
        Self {
            href: format!("/categories/{}", urlencoding::encode(category.id.as_str())),
            name: category.name,
            image: category.image,
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub slides: Vec<SlideView>,
    pub categories: Vec<CategoryView>,
    pub products: Vec<ProductCardView>,
    pub error: Option<String>,
}

/// Display the home page.
///
/// Slider, categories and latest products load concurrently; a section that
/// fails to load is left out and a notice is shown.
#[instrument(skip(state, session, customer))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> HomeTemplate {
    let layout = Layout::load(&session, customer.as_ref()).await;
    let api = state.api();

    let (slider, categories, products) = tokio::join!(
        api.get_slider(),
        api.get_categories(),
        api.get_all_products(PageRequest::new(1, HOME_PRODUCT_COUNT)),
    );

    let mut failed = false;

    let slides = match slider {
        Ok(banners) => banners.into_iter().map(SlideView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load slider");
            failed = true;
            Vec::new()
        }
    };
    let categories = match categories {
        Ok(categories) => categories.into_iter().map(CategoryView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load categories");
            failed = true;
            Vec::new()
        }
    };
    let products = match products {
        Ok(page) => page.items.iter().map(ProductCardView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load products");
            failed = true;
            Vec::new()
        }
    };

    HomeTemplate {
        layout,
        slides,
        categories,
        products,
        error: failed.then(|| "Some content could not be loaded. Please refresh.".to_owned()),
    }
}
