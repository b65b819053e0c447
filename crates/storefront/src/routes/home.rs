//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::api::types::{Category, Product};
use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Number of products to feature on the home page.
const FEATURED_PRODUCTS: usize = 8;

/// Product card display data for templates.
#[derive(Clone)]
pub struct ProductCardView {
    pub slug: String,
    pub name: String,
    pub price: String,
    pub image: Option<String>,
    pub in_stock: bool,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            slug: product.slug.clone(),
            name: product.name.clone(),
            price: product.price.display(),
            image: product.image.clone(),
            in_stock: product.purchasable(),
        }
    }
}

/// Category card display data for templates.
#[derive(Clone)]
pub struct CategoryCardView {
    pub slug: String,
    pub name: String,
    pub description: String,
}

impl From<&Category> for CategoryCardView {
    fn from(category: &Category) -> Self {
        Self {
            slug: category.slug.clone(),
            name: category.name.clone(),
            description: category.description.clone(),
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub signed_in: bool,
    /// Featured products for the grid.
    pub featured_products: Vec<ProductCardView>,
    /// Categories for the showcase strip.
    pub categories: Vec<CategoryCardView>,
}

/// Display the home page.
#[instrument(skip(state, auth))]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
) -> Result<impl IntoResponse> {
    // Catalog fetch failures degrade to empty sections rather than a 502
    let featured_products = state.api().products(None, None).await.map_or_else(
        |e| {
            tracing::error!("Failed to fetch featured products: {e}");
            Vec::new()
        },
        |products| {
            products
                .iter()
                .take(FEATURED_PRODUCTS)
                .map(ProductCardView::from)
                .collect()
        },
    );

    let categories = state.api().categories().await.map_or_else(
        |e| {
            tracing::error!("Failed to fetch categories: {e}");
            Vec::new()
        },
        |categories| categories.iter().map(CategoryCardView::from).collect(),
    );

    Ok(HomeTemplate {
        signed_in: auth.is_some(),
        featured_products,
        categories,
    })
}
