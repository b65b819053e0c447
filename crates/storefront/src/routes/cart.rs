//! Cart route handlers.
//!
//! Every mutation posts to the commerce API and, on success, replaces the
//! session's cart snapshot with the server's response wholesale. On failure
//! the snapshot stays as it was and the server's error message is carried
//! back to the page as a query parameter, rendered as a dismissible banner.

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

use inkwell_core::{CartItemId, ProductId};

use crate::api::types::{Cart, CartItem};
use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;
use crate::stores::{AuthStore, CartStore};

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: CartItemId,
    pub slug: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
    pub image: Option<String>,
    /// Stepper guards: increment disabled at stock, decrement disabled at 1.
    pub can_increment: bool,
    pub can_decrement: bool,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id,
            slug: item.product.slug.clone(),
            name: item.product.name.clone(),
            quantity: item.quantity,
            price: item.product.price.display(),
            line_total: item.line_total().display(),
            image: item.product.image.clone(),
            can_increment: item.can_increment(),
            can_decrement: item.can_decrement(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub discount: Option<String>,
    pub shipping: Option<String>,
    pub tax: Option<String>,
    pub total: String,
    pub coupon_code: Option<String>,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            item_count: 0,
            subtotal: "$0.00".to_string(),
            discount: None,
            shipping: None,
            tax: None,
            total: "$0.00".to_string(),
            coupon_code: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items.iter().map(CartItemView::from).collect(),
            item_count: cart.total_items,
            subtotal: cart.subtotal.display(),
            discount: cart
                .discount_amount
                .filter(inkwell_core::Price::is_positive)
                .map(|p| p.display()),
            shipping: cart.shipping_cost.map(|p| p.display()),
            tax: cart.tax.map(|p| p.display()),
            total: cart.display_total().display(),
            coupon_code: cart.coupon_code().map(str::to_string),
        }
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
    /// Page to return to; defaults to the cart.
    pub next: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub cart_item_id: CartItemId,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub cart_item_id: CartItemId,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    pub code: String,
}

/// Query parameters for error display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub signed_in: bool,
    pub cart: CartView,
    pub error: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
///
/// Signed-in visitors get a fresh fetch from the commerce API; anonymous
/// visitors see the empty state with a sign-in prompt.
#[instrument(skip(state, session, auth))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Result<Response> {
    let Some(_user) = auth else {
        return Ok(CartShowTemplate {
            signed_in: false,
            cart: CartView::empty(),
            error: query.error,
        }
        .into_response());
    };

    let auth_store = AuthStore::new(&session);
    let cart_store = CartStore::new(&session);
    let mut creds = auth_store.credentials().await;

    let result = state.api().current_cart(&mut creds).await;
    auth_store.save_credentials(&creds).await?;

    let mut error = query.error;
    let cart = match cart_store.apply(result).await? {
        Ok(cart) => CartView::from(&cart),
        Err(message) => {
            // Fetch failed: show the held snapshot rather than losing the page
            tracing::warn!("Failed to fetch cart: {message}");
            error = error.or(Some(message));
            cart_store
                .get()
                .await
                .as_ref()
                .map_or_else(CartView::empty, CartView::from)
        }
    };

    Ok(CartShowTemplate {
        signed_in: true,
        cart,
        error,
    }
    .into_response())
}

/// Add item to cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let auth_store = AuthStore::new(&session);
    if auth_store.current_user().await.is_none() {
        return Ok(Redirect::to("/login").into_response());
    }

    let next = sanitize_next(form.next.as_deref());
    let quantity = form.quantity.unwrap_or(1).max(1);

    let cart_store = CartStore::new(&session);
    let mut creds = auth_store.credentials().await;
    let result = state.api().add_item(&mut creds, form.product_id, quantity).await;
    auth_store.save_credentials(&creds).await?;

    Ok(finish_mutation(cart_store.apply(result).await?, &next))
}

/// Update cart line quantity.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let auth_store = AuthStore::new(&session);
    let cart_store = CartStore::new(&session);
    let mut creds = auth_store.credentials().await;

    let result = state
        .api()
        .update_item(&mut creds, form.cart_item_id, form.quantity)
        .await;
    auth_store.save_credentials(&creds).await?;

    Ok(finish_mutation(cart_store.apply(result).await?, "/cart"))
}

/// Remove a line from the cart.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let auth_store = AuthStore::new(&session);
    let cart_store = CartStore::new(&session);
    let mut creds = auth_store.credentials().await;

    let result = state.api().remove_item(&mut creds, form.cart_item_id).await;
    auth_store.save_credentials(&creds).await?;

    Ok(finish_mutation(cart_store.apply(result).await?, "/cart"))
}

/// Remove every line from the cart.
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Response> {
    let auth_store = AuthStore::new(&session);
    let cart_store = CartStore::new(&session);
    let mut creds = auth_store.credentials().await;

    let result = state.api().clear_cart(&mut creds).await;
    auth_store.save_credentials(&creds).await?;

    Ok(finish_mutation(cart_store.apply(result).await?, "/cart"))
}

/// Apply a coupon code.
#[instrument(skip(state, session, form))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CouponForm>,
) -> Result<Response> {
    let code = form.code.trim().to_uppercase();
    if code.is_empty() {
        return Ok(redirect_with_error("/cart", "Enter a coupon code"));
    }

    let auth_store = AuthStore::new(&session);
    let cart_store = CartStore::new(&session);
    let mut creds = auth_store.credentials().await;

    let result = state.api().apply_coupon(&mut creds, &code).await;
    auth_store.save_credentials(&creds).await?;

    Ok(finish_mutation(cart_store.apply(result).await?, "/cart"))
}

/// Remove the applied coupon.
#[instrument(skip(state, session))]
pub async fn remove_coupon(State(state): State<AppState>, session: Session) -> Result<Response> {
    let auth_store = AuthStore::new(&session);
    let cart_store = CartStore::new(&session);
    let mut creds = auth_store.credentials().await;

    let result = state.api().remove_coupon(&mut creds).await;
    auth_store.save_credentials(&creds).await?;

    Ok(finish_mutation(cart_store.apply(result).await?, "/cart"))
}

// =============================================================================
// Helpers
// =============================================================================

/// Turn a folded mutation outcome into a redirect: back to `next` on
/// success, back with an error banner on failure.
fn finish_mutation(outcome: std::result::Result<Cart, String>, next: &str) -> Response {
    match outcome {
        Ok(_) => Redirect::to(next).into_response(),
        Err(message) => redirect_with_error(next, &message),
    }
}

fn redirect_with_error(next: &str, message: &str) -> Response {
    let separator = if next.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{next}{separator}error={}",
        urlencoding::encode(message)
    ))
    .into_response()
}

/// Only same-site paths are allowed as return targets.
fn sanitize_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/cart".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_next() {
        assert_eq!(sanitize_next(Some("/products/book")), "/products/book");
        assert_eq!(sanitize_next(Some("https://evil.example")), "/cart");
        assert_eq!(sanitize_next(Some("//evil.example")), "/cart");
        assert_eq!(sanitize_next(None), "/cart");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_cart_view_stepper_flags() {
        let cart: Cart = serde_json::from_value(json!({
            "id": 1,
            "items": [{
                "id": 10,
                "product": {
                    "id": 1, "category": 1, "name": "Book", "slug": "book",
                    "price": "10.00", "stock": 3
                },
                "quantity": 3
            }],
            "total_items": 3,
            "subtotal": "30.00"
        }))
        .unwrap();

        let view = CartView::from(&cart);
        let item = view.items.first().unwrap();
        assert!(!item.can_increment, "at stock, increment is disabled");
        assert!(item.can_decrement);
        assert_eq!(view.total, "$30.00");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_cart_view_hides_zero_discount() {
        let cart: Cart = serde_json::from_value(json!({
            "id": 1,
            "items": [],
            "subtotal": "0.00",
            "discount_amount": "0.00"
        }))
        .unwrap();
        let view = CartView::from(&cart);
        assert!(view.discount.is_none());
        assert!(view.is_empty());
    }
}
