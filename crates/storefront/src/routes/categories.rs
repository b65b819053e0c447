//! Category route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::home::CategoryCardView;
use crate::state::AppState;

/// Category listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub signed_in: bool,
    pub categories: Vec<CategoryCardView>,
}

/// Display category listing page.
#[instrument(skip(state, auth))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
) -> Result<impl IntoResponse> {
    let categories = state.api().categories().await?;

    Ok(CategoriesIndexTemplate {
        signed_in: auth.is_some(),
        categories: categories.iter().map(CategoryCardView::from).collect(),
    })
}
