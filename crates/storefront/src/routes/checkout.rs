//! Checkout route handlers.
//!
//! The web layer of the checkout orchestrator: every route re-evaluates the
//! entry guard (signed in, non-empty cart) against a fresh cart fetch, then
//! drives the session-held [`crate::checkout::CheckoutState`] through its
//! steps. Payment
//! hands the browser to the processor's hosted page; `/order/success`
//! reconciles the redirect back.

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

use crate::api::ApiError;
use crate::checkout::{self, ShippingDetails, ShippingErrors, ShippingForm};
use crate::error::Result;
use crate::filters;
use crate::models::CurrentUser;
use crate::routes::cart::CartView;
use crate::routes::orders::OrderView;
use crate::state::AppState;
use crate::stores::{AuthStore, CartStore, CheckoutStore};

// =============================================================================
// View Types
// =============================================================================

/// Shipping form field values, for rendering the form pre-filled.
#[derive(Clone, Default)]
pub struct ShippingFormView {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingFormView {
    /// Pre-fill name and email from the signed-in user's record.
    fn from_user(user: &CurrentUser) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            country: "US".to_string(),
            ..Self::default()
        }
    }

    fn from_submission(form: &ShippingForm) -> Self {
        Self {
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            address: form.address.clone(),
            city: form.city.clone(),
            state: form.state.clone(),
            postal_code: form.postal_code.clone(),
            country: form.country.clone(),
        }
    }
}

impl From<&ShippingDetails> for ShippingFormView {
    fn from(details: &ShippingDetails) -> Self {
        Self {
            first_name: details.first_name.clone(),
            last_name: details.last_name.clone(),
            email: details.email.clone(),
            phone: details.phone.clone(),
            address: details.address.clone(),
            city: details.city.clone(),
            state: details.state.clone(),
            postal_code: details.postal_code.clone(),
            country: details.country.clone(),
        }
    }
}

/// Shipping step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/shipping.html")]
pub struct CheckoutShippingTemplate {
    pub signed_in: bool,
    pub cart: CartView,
    pub form: ShippingFormView,
    pub errors: ShippingErrors,
}

/// Payment step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/payment.html")]
pub struct CheckoutPaymentTemplate {
    pub signed_in: bool,
    pub cart: CartView,
    pub shipping: ShippingFormView,
    pub error: Option<String>,
}

/// Order success (reconciliation) template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/success.html")]
pub struct OrderSuccessTemplate {
    pub signed_in: bool,
    /// The order matched to the checkout session, once the backend knows it.
    pub order: Option<OrderView>,
}

// =============================================================================
// Entry Guard
// =============================================================================

/// Outcome of evaluating the checkout entry guard for a request.
enum Entry {
    /// The visitor may not check out; send them away.
    Redirect(Response),
    /// Proceed with the signed-in user and their fresh cart.
    Proceed {
        user: CurrentUser,
        cart: crate::api::types::Cart,
    },
}

/// Evaluate the entry guard against a fresh cart fetch.
///
/// Runs on every checkout route: the cart and session can change underneath
/// an in-progress checkout (another tab, an expired session).
async fn enter(state: &AppState, session: &Session) -> Result<Entry> {
    let auth_store = AuthStore::new(session);
    let cart_store = CartStore::new(session);

    let user = auth_store.current_user().await;

    // Only fetch the cart for signed-in visitors; the guard handles the rest
    let cart = match &user {
        Some(_) => {
            let mut creds = auth_store.credentials().await;
            let result = state.api().current_cart(&mut creds).await;
            auth_store.save_credentials(&creds).await?;

            match cart_store.apply(result).await? {
                Ok(cart) => Some(cart),
                Err(message) => {
                    // Keep the held snapshot when the refresh fails
                    tracing::warn!("Cart refresh failed during checkout: {message}");
                    cart_store.get().await
                }
            }
        }
        None => None,
    };

    let guard = checkout::entry_guard(user.as_ref(), cart.as_ref());
    match (guard, user, cart) {
        (None, Some(user), Some(cart)) => Ok(Entry::Proceed { user, cart }),
        (guard, _, _) => {
            let target = guard.map_or("/cart", |g| g.redirect_target());
            Ok(Entry::Redirect(Redirect::to(target).into_response()))
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Query parameters for error display on the payment step.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

/// Display the current checkout step.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<MessageQuery>,
) -> Result<Response> {
    let (user, cart) = match enter(&state, &session).await? {
        Entry::Redirect(response) => return Ok(response),
        Entry::Proceed { user, cart } => (user, cart),
    };

    let checkout_store = CheckoutStore::new(&session);
    let flow = checkout_store.get().await;

    if flow.ready_for_payment() {
        let shipping = flow
            .shipping
            .as_ref()
            .map(ShippingFormView::from)
            .unwrap_or_default();
        return Ok(CheckoutPaymentTemplate {
            signed_in: true,
            cart: CartView::from(&cart),
            shipping,
            error: query.error,
        }
        .into_response());
    }

    // Shipping step: pre-fill from collected details, then the user record
    let form = flow.shipping.as_ref().map_or_else(
        || ShippingFormView::from_user(&user),
        ShippingFormView::from,
    );

    Ok(CheckoutShippingTemplate {
        signed_in: true,
        cart: CartView::from(&cart),
        form,
        errors: ShippingErrors::default(),
    }
    .into_response())
}

/// Handle shipping form submission.
///
/// Validation failures re-render the form with per-field errors; a valid
/// submission stores the details in the session and advances to payment.
/// Nothing is sent to the commerce API from this step.
#[instrument(skip(state, session, form))]
pub async fn submit_shipping(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ShippingForm>,
) -> Result<Response> {
    let cart = match enter(&state, &session).await? {
        Entry::Redirect(response) => return Ok(response),
        Entry::Proceed { cart, .. } => cart,
    };

    match form.validate() {
        Ok(details) => {
            let checkout_store = CheckoutStore::new(&session);
            let mut flow = checkout_store.get().await;
            flow.advance_to_payment(details);
            checkout_store.set(&flow).await?;
            Ok(Redirect::to("/checkout").into_response())
        }
        Err(errors) => Ok(CheckoutShippingTemplate {
            signed_in: true,
            cart: CartView::from(&cart),
            form: ShippingFormView::from_submission(&form),
            errors,
        }
        .into_response()),
    }
}

/// Step back from payment to the shipping form.
#[instrument(skip(state, session))]
pub async fn back_to_shipping(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response> {
    if let Entry::Redirect(response) = enter(&state, &session).await? {
        return Ok(response);
    }

    let checkout_store = CheckoutStore::new(&session);
    let mut flow = checkout_store.get().await;
    flow.back_to_shipping();
    checkout_store.set(&flow).await?;

    Ok(Redirect::to("/checkout").into_response())
}

/// Handle payment submission: create the order and hand off to the hosted
/// payment page.
///
/// The order-creation endpoint either returns a checkout URL - the whole
/// page redirects to it, exactly as returned - or a settled order. Any
/// failure keeps the customer on the payment step with an error banner; no
/// automatic retry.
#[instrument(skip(state, session))]
pub async fn submit_payment(State(state): State<AppState>, session: Session) -> Result<Response> {
    let cart = match enter(&state, &session).await? {
        Entry::Redirect(response) => return Ok(response),
        Entry::Proceed { cart, .. } => cart,
    };

    let checkout_store = CheckoutStore::new(&session);
    let flow = checkout_store.get().await;
    let Some(details) = flow.shipping.as_ref().filter(|_| flow.ready_for_payment()) else {
        // Payment submitted without completed shipping: back to the form
        return Ok(Redirect::to("/checkout").into_response());
    };

    let request = checkout::build_order_request(
        details,
        cart.coupon_code(),
        &state.config().base_url,
    );

    let auth_store = AuthStore::new(&session);
    let mut creds = auth_store.credentials().await;
    let result = state.api().create_order(&mut creds, &request).await;
    auth_store.save_credentials(&creds).await?;

    match result {
        Ok(response) => {
            // Order created: the flow is done and the server emptied the cart
            checkout_store.clear().await?;
            CartStore::new(&session).clear().await?;

            if let Some(url) = response.checkout_url {
                // Hand the whole page to the hosted payment flow, using the
                // URL exactly as the server returned it
                return Ok(Redirect::to(&url).into_response());
            }

            // No payment step needed: the order is already settled
            if let Some(order) = response.order {
                return Ok(Redirect::to(&format!("/orders/{}", order.id)).into_response());
            }
            if let Some(order_id) = response.order_id {
                return Ok(Redirect::to(&format!("/orders/{order_id}")).into_response());
            }
            Ok(Redirect::to("/orders").into_response())
        }
        Err(ApiError::AuthRequired) => Err(ApiError::AuthRequired.into()),
        Err(e) => {
            // Stay on the payment step with the server's message
            Ok(Redirect::to(&format!(
                "/checkout?error={}",
                urlencoding::encode(&e.user_message())
            ))
            .into_response())
        }
    }
}

/// Query parameters for the order-success route.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Post-payment reconciliation.
///
/// The payment processor redirects back here with its checkout session id.
/// Arriving without one is invalid and goes to the order list. The order is
/// fetched for display only; whether payment actually settled is the
/// backend's call, reported through the order's payment status.
#[instrument(skip(state, session))]
pub async fn order_success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Response> {
    let Some(session_id) = query.session_id.filter(|s| !s.is_empty()) else {
        return Ok(Redirect::to("/orders").into_response());
    };

    let auth_store = AuthStore::new(&session);
    let mut creds = auth_store.credentials().await;
    let result = state
        .api()
        .order_by_checkout_session(&mut creds, &session_id)
        .await;
    auth_store.save_credentials(&creds).await?;

    // The pre-payment cart and flow state are stale now regardless
    CartStore::new(&session).clear().await?;
    CheckoutStore::new(&session).clear().await?;

    let signed_in = auth_store.current_user().await.is_some();

    match result {
        Ok(order) => Ok(OrderSuccessTemplate {
            signed_in,
            order: Some(OrderView::from(&order)),
        }
        .into_response()),
        Err(ApiError::AuthRequired) => Err(ApiError::AuthRequired.into()),
        Err(e) => {
            // The webhook may not have landed yet; show the page without
            // order details rather than failing the arrival
            tracing::warn!("Order lookup by checkout session failed: {e}");
            Ok(OrderSuccessTemplate {
                signed_in,
                order: None,
            }
            .into_response())
        }
    }
}
