//! Authentication route handlers.
//!
//! Login, registration, and logout all delegate to the commerce API; the
//! storefront never sees password hashes, only the remote session cookie it
//! captures on success. Auth transitions drive the cart store: signing in
//! fetches the cart, signing out destroys the whole session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use inkwell_core::Email;

use crate::api::types::RegisterRequest;
use crate::api::{ApiCredentials, ApiError};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::models::CurrentUser;
use crate::state::AppState;
use crate::stores::{AuthStore, CartStore};

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub signed_in: bool,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub signed_in: bool,
    pub error: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the login page.
pub async fn login_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        signed_in: false,
        error: query.error,
        success: query.success,
    }
}

/// Handle login form submission.
///
/// On success the remote session cookie is captured into the session and
/// the cart is fetched immediately - cart state follows the authentication
/// transition.
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    // A login starts a fresh remote session, never reuses an old one
    let mut creds = ApiCredentials::default();

    match state
        .api()
        .login(&mut creds, &form.username, &form.password)
        .await
    {
        Ok(user) => finish_sign_in(&state, &session, user.into(), creds).await,
        Err(ApiError::AuthRequired) => {
            // 401 here means the credentials were wrong, not an expired session
            Ok(Redirect::to("/login?error=Invalid+username+or+password").into_response())
        }
        Err(e) => {
            tracing::warn!("Login failed: {e}");
            Ok(redirect_with_error("/login", &e.user_message()))
        }
    }
}

/// Display the registration page.
pub async fn register_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    RegisterTemplate {
        signed_in: false,
        error: query.error,
    }
}

/// Handle registration form submission.
///
/// The commerce API logs the user in on successful registration, so this
/// ends the same way login does.
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    // Validate passwords match
    if form.password != form.password_confirm {
        return Ok(Redirect::to("/register?error=Passwords+do+not+match").into_response());
    }

    // Validate password length
    if form.password.len() < 8 {
        return Ok(
            Redirect::to("/register?error=Password+must+be+at+least+8+characters")
                .into_response(),
        );
    }

    // Validate email structure before it goes over the wire
    if Email::parse(form.email.trim()).is_err() {
        return Ok(Redirect::to("/register?error=Enter+a+valid+email+address").into_response());
    }

    let mut creds = ApiCredentials::default();

    match state
        .api()
        .register(
            &mut creds,
            &RegisterRequest {
                username: &form.username,
                email: &form.email,
                password: &form.password,
                first_name: &form.first_name,
                last_name: &form.last_name,
            },
        )
        .await
    {
        Ok(user) => finish_sign_in(&state, &session, user.into(), creds).await,
        Err(e) => {
            tracing::warn!("Registration failed: {e}");
            Ok(redirect_with_error("/register", &e.user_message()))
        }
    }
}

/// Handle logout.
///
/// Invalidates the remote session (best effort) and destroys the storefront
/// session, which clears the user, credentials, cart snapshot, and any
/// in-progress checkout.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Response> {
    let auth_store = AuthStore::new(&session);
    let mut creds = auth_store.credentials().await;

    if creds.has_session()
        && let Err(e) = state.api().logout(&mut creds).await
    {
        tracing::warn!("Failed to invalidate remote session: {e}");
    }

    clear_sentry_user();
    auth_store.sign_out().await?;

    Ok(Redirect::to("/").into_response())
}

// =============================================================================
// Helpers
// =============================================================================

/// Record the signed-in user and fetch their cart.
async fn finish_sign_in(
    state: &AppState,
    session: &Session,
    user: CurrentUser,
    mut creds: ApiCredentials,
) -> Result<Response> {
    set_sentry_user(&user.id, Some(&user.email));

    // Cart follows the auth transition; a failed fetch just delays it to
    // the next cart page view
    let cart_result = state.api().current_cart(&mut creds).await;

    let auth_store = AuthStore::new(session);
    auth_store.sign_in(&user, &creds).await?;

    match cart_result {
        Ok(cart) => CartStore::new(session).replace(&cart).await?,
        Err(e) => tracing::warn!("Failed to fetch cart after sign-in: {e}"),
    }

    Ok(Redirect::to("/").into_response())
}

fn redirect_with_error(path: &str, message: &str) -> Response {
    Redirect::to(&format!("{path}?error={}", urlencoding::encode(message))).into_response()
}
