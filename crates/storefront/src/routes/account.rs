//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::orders::OrderView;
use crate::state::AppState;
use crate::stores::AuthStore;

/// Number of recent orders shown on the profile page.
const RECENT_ORDERS: usize = 5;

/// User display data for templates.
#[derive(Clone)]
pub struct UserView {
    pub username: String,
    pub name: String,
    pub email: String,
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub signed_in: bool,
    pub user: UserView,
    pub recent_orders: Vec<OrderView>,
}

/// Display the profile page with recent orders.
#[instrument(skip(state, session, user))]
pub async fn profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let auth_store = AuthStore::new(&session);
    let mut creds = auth_store.credentials().await;
    let result = state.api().orders(&mut creds).await;
    auth_store.save_credentials(&creds).await?;

    // Order history is secondary here; show the profile even if it fails
    let recent_orders = result.map_or_else(
        |e| {
            tracing::warn!("Failed to fetch orders for profile: {e}");
            Vec::new()
        },
        |orders| {
            orders
                .iter()
                .take(RECENT_ORDERS)
                .map(OrderView::from)
                .collect()
        },
    );

    Ok(ProfileTemplate {
        signed_in: true,
        user: UserView {
            username: user.username.clone(),
            name: user.display_name(),
            email: user.email,
        },
        recent_orders,
    })
}
