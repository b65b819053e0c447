//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::types::{CreateReviewRequest, Product, Review};
use crate::error::Result;
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::state::AppState;
use crate::stores::AuthStore;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: inkwell_core::ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category_name: String,
    pub price: String,
    pub stock: u32,
    pub in_stock: bool,
    pub image: Option<String>,
    pub alternate_images: Vec<String>,
    pub review_count: u32,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            slug: product.slug.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            category_name: product.category_name.clone(),
            price: product.price.display(),
            stock: product.stock,
            in_stock: product.purchasable(),
            image: product.image.clone(),
            alternate_images: product.alternate_images.clone(),
            review_count: product.review_count,
        }
    }
}

/// Review display data for templates.
#[derive(Clone)]
pub struct ReviewView {
    pub rating: u8,
    pub title: Option<String>,
    pub comment: String,
    pub author: String,
    pub created_at: String,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            rating: review.rating,
            title: review.title.clone(),
            comment: review.comment.clone(),
            author: review.author.clone(),
            created_at: review.created_at.format("%B %-d, %Y").to_string(),
        }
    }
}

/// Listing filter query parameters.
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub error: Option<String>,
}

/// Message query parameters for the detail page.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub signed_in: bool,
    pub products: Vec<ProductView>,
    /// The category being filtered on, when the filter matched one.
    pub category_name: Option<String>,
    pub search: Option<String>,
    pub error: Option<String>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub signed_in: bool,
    pub product: ProductView,
    pub reviews: Vec<ReviewView>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Display product listing page.
///
/// Refetches whenever the `category` or `search` query parameters change;
/// zero results render the listing's empty state.
#[instrument(skip(state, auth))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let category = query.category.as_deref().filter(|s| !s.is_empty());
    let search = query.search.as_deref().filter(|s| !s.is_empty());

    let products = state.api().products(category, search).await?;

    // Resolve the filter slug to a display name; an unknown slug just
    // renders the unfiltered heading over zero results
    let category_name = match category {
        Some(slug) => match state.api().category(slug).await {
            Ok(category) => Some(category.name),
            Err(crate::api::ApiError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    Ok(ProductsIndexTemplate {
        signed_in: auth.is_some(),
        products: products.iter().map(ProductView::from).collect(),
        category_name,
        search: search.map(str::to_string),
        error: query.error,
    })
}

/// Display product detail page.
#[instrument(skip(state, auth), fields(slug = %slug))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    Path(slug): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    let product = state.api().product(&slug).await?;

    // Reviews are secondary content; a failed fetch hides the section
    let reviews = state.api().product_reviews(&slug).await.map_or_else(
        |e| {
            tracing::warn!("Failed to fetch reviews for {slug}: {e}");
            Vec::new()
        },
        |reviews| reviews.iter().map(ReviewView::from).collect(),
    );

    Ok(ProductShowTemplate {
        signed_in: auth.is_some(),
        product: ProductView::from(&product),
        reviews,
        error: query.error,
        success: query.success,
    })
}

/// Review submission form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: u8,
    pub title: Option<String>,
    pub comment: String,
}

/// Submit a review for a product.
#[instrument(skip(state, session, form), fields(slug = %slug))]
pub async fn create_review(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Path(slug): Path<String>,
    axum::Form(form): axum::Form<ReviewForm>,
) -> Result<Response> {
    if !(1..=5).contains(&form.rating) {
        return Ok(redirect_with_error(&slug, "Rating must be between 1 and 5").into_response());
    }
    if form.comment.trim().is_empty() {
        return Ok(redirect_with_error(&slug, "A comment is required").into_response());
    }

    let product = state.api().product(&slug).await?;

    let auth_store = AuthStore::new(&session);
    let mut creds = auth_store.credentials().await;

    let result = state
        .api()
        .create_review(
            &mut creds,
            &CreateReviewRequest {
                product: product.id,
                rating: form.rating,
                title: form.title.as_deref().filter(|t| !t.trim().is_empty()),
                comment: form.comment.trim(),
            },
        )
        .await;
    auth_store.save_credentials(&creds).await?;

    match result {
        Ok(_) => {
            // The cached detail page carries a stale review count now
            state.api().invalidate_product(&slug).await;
            Ok(Redirect::to(&format!("/products/{slug}?success=Review+submitted")).into_response())
        }
        Err(crate::api::ApiError::AuthRequired) => Ok(Redirect::to("/login").into_response()),
        Err(e) => Ok(redirect_with_error(&slug, &e.user_message()).into_response()),
    }
}

fn redirect_with_error(slug: &str, message: &str) -> Redirect {
    Redirect::to(&format!(
        "/products/{slug}?error={}",
        urlencoding::encode(message)
    ))
}
