//! Wire types for the commerce API.
//!
//! All entities here are server-authoritative copies; the storefront never
//! mutates them locally. Fields the API may omit carry `#[serde(default)]`
//! so older payload shapes keep parsing. Types derive `Serialize` as well
//! because cart and checkout snapshots are persisted in the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_core::{
    CartId, CartItemId, CategoryId, OrderId, OrderItemId, OrderStatus, PaymentStatus, Price,
    ProductId, ReviewId, UserId,
};

// =============================================================================
// Response Normalization
// =============================================================================

/// A list endpoint response.
///
/// The commerce API returns either a bare JSON array or a paginated envelope
/// with a `results` field, depending on the endpoint and its pagination
/// settings. Both shapes are accepted here and normalized once, at the client
/// boundary, so callers only ever see a `Vec`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    /// Paginated envelope (`{"count": ..., "results": [...]}`).
    Paginated {
        /// The page of results.
        results: Vec<T>,
    },
    /// Bare array of results.
    Bare(Vec<T>),
}

impl<T> ListResponse<T> {
    /// Normalize into a plain list of items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Paginated { results } | Self::Bare(results) => results,
        }
    }
}

/// Error payload returned by the commerce API on rejected requests.
///
/// The API uses `{"error": "..."}` for domain errors and `{"detail": "..."}`
/// for framework-level rejections (authentication, permissions).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorPayload {
    /// The server-supplied message, if any.
    #[must_use]
    pub fn message(self) -> Option<String> {
        self.error.or(self.detail)
    }
}

// =============================================================================
// Auth
// =============================================================================

/// The authenticated user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Envelope returned by login and registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
}

/// Login request body.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Registration request body.
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

// =============================================================================
// Catalog
// =============================================================================

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

/// A product in the catalog. Read-only from the storefront's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category: CategoryId,
    #[serde(default)]
    pub category_name: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    pub stock: u32,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub alternate_images: Vec<String>,
    #[serde(default)]
    pub review_count: u32,
}

const fn default_true() -> bool {
    true
}

impl Product {
    /// Whether the product can currently be purchased.
    #[must_use]
    pub const fn purchasable(&self) -> bool {
        self.is_available && self.stock > 0
    }
}

/// A product review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub rating: u8,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// Review creation request body.
#[derive(Debug, Serialize)]
pub struct CreateReviewRequest<'a> {
    pub product: ProductId,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    pub comment: &'a str,
}

// =============================================================================
// Cart
// =============================================================================

/// An applied coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
}

/// A line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product: Product,
    pub quantity: u32,
    #[serde(default)]
    pub total_price: Option<Price>,
}

impl CartItem {
    /// Per-line subtotal for display: the server's value when present,
    /// otherwise price x quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.total_price
            .unwrap_or_else(|| self.product.price.times(self.quantity))
    }

    /// Whether the quantity stepper may go up (client-side UX guard only;
    /// the server is the authority on stock).
    #[must_use]
    pub const fn can_increment(&self) -> bool {
        self.quantity < self.product.stock
    }

    /// Whether the quantity stepper may go down.
    #[must_use]
    pub const fn can_decrement(&self) -> bool {
        self.quantity > 1
    }
}

/// The shopping cart, scoped to the authenticated session.
///
/// Every mutation replaces the whole snapshot with the server's response;
/// no field is ever patched locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub total_items: u32,
    #[serde(default)]
    pub subtotal: Price,
    #[serde(default)]
    pub discount_amount: Option<Price>,
    #[serde(default)]
    pub shipping_cost: Option<Price>,
    #[serde(default)]
    pub tax: Option<Price>,
    #[serde(default)]
    pub total: Option<Price>,
    #[serde(default)]
    pub coupon: Option<Coupon>,
}

impl Cart {
    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The total to display.
    ///
    /// The server's `total` is authoritative. When it is absent the estimate
    /// `subtotal - discount + shipping + tax` is shown instead; the estimate
    /// is display-only and is never sent back to the server.
    #[must_use]
    pub fn display_total(&self) -> Price {
        self.total.unwrap_or_else(|| {
            self.subtotal - self.discount_amount.unwrap_or(Price::ZERO)
                + self.shipping_cost.unwrap_or(Price::ZERO)
                + self.tax.unwrap_or(Price::ZERO)
        })
    }

    /// The coupon code currently applied, if any.
    #[must_use]
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon.as_ref().map(|c| c.code.as_str())
    }
}

/// Add-to-cart request body.
#[derive(Debug, Serialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Update-quantity request body.
#[derive(Debug, Serialize)]
pub struct UpdateItemRequest {
    pub cart_item_id: CartItemId,
    pub quantity: u32,
}

/// Remove-line request body.
#[derive(Debug, Serialize)]
pub struct RemoveItemRequest {
    pub cart_item_id: CartItemId,
}

/// Coupon request body.
#[derive(Debug, Serialize)]
pub struct CouponRequest<'a> {
    pub code: &'a str,
}

// =============================================================================
// Orders
// =============================================================================

/// A line in an order: a snapshot taken at order creation, independent of
/// later catalog changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    #[serde(default)]
    pub product: Option<ProductId>,
    pub product_name: String,
    pub product_price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub total_price: Option<Price>,
}

impl OrderItem {
    /// Per-line subtotal for display.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.total_price
            .unwrap_or_else(|| self.product_price.times(self.quantity))
    }
}

/// An order. Read-only from the storefront after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: String,
    pub subtotal: Price,
    #[serde(default)]
    pub shipping_cost: Price,
    #[serde(default)]
    pub tax: Price,
    pub total: Price,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// Shipment tracking details for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingInfo {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Order-creation request body, built by the checkout orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    /// Success redirect; contains the processor's session-id placeholder,
    /// substituted by the processor, never by this client.
    pub success_url: String,
    pub cancel_url: String,
}

/// Response from order creation.
///
/// Either `checkout_url` is present (redirect the whole page to the hosted
/// payment flow) or `order` is present (the flow is already settled).
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutResponse {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub order: Option<Order>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_json() -> serde_json::Value {
        json!({
            "id": 1,
            "category": 2,
            "category_name": "Fiction",
            "name": "The Long Shelf",
            "slug": "the-long-shelf",
            "description": "A novel.",
            "price": "24.99",
            "stock": 5,
            "is_available": true,
            "in_stock": true,
            "image": "/media/products/long-shelf.jpg"
        })
    }

    #[test]
    fn test_product_deserialize() {
        let product: Product = serde_json::from_value(product_json()).unwrap();
        assert_eq!(product.slug, "the-long-shelf");
        assert_eq!(product.price, Price::from_cents(2499));
        assert_eq!(product.stock, 5);
        assert!(product.purchasable());
    }

    #[test]
    fn test_product_minimal_payload() {
        // Older payloads omit images, review counts, and availability flags
        let product: Product = serde_json::from_value(json!({
            "id": 1,
            "category": 2,
            "name": "Bare",
            "slug": "bare",
            "price": "1.00",
            "stock": 0
        }))
        .unwrap();
        assert!(product.is_available);
        assert!(!product.purchasable());
        assert!(product.alternate_images.is_empty());
    }

    #[test]
    fn test_list_response_bare_array() {
        let list: ListResponse<Category> = serde_json::from_value(json!([
            {"id": 1, "name": "Fiction", "slug": "fiction"}
        ]))
        .unwrap();
        assert_eq!(list.into_items().len(), 1);
    }

    #[test]
    fn test_list_response_paginated_envelope() {
        let list: ListResponse<Category> = serde_json::from_value(json!({
            "count": 2,
            "next": null,
            "previous": null,
            "results": [
                {"id": 1, "name": "Fiction", "slug": "fiction"},
                {"id": 2, "name": "Poetry", "slug": "poetry"}
            ]
        }))
        .unwrap();
        assert_eq!(list.into_items().len(), 2);
    }

    #[test]
    fn test_error_payload_prefers_error_over_detail() {
        let payload: ErrorPayload =
            serde_json::from_value(json!({"error": "Cart is empty", "detail": "ignored"}))
                .unwrap();
        assert_eq!(payload.message().unwrap(), "Cart is empty");

        let payload: ErrorPayload =
            serde_json::from_value(json!({"detail": "Not authenticated"})).unwrap();
        assert_eq!(payload.message().unwrap(), "Not authenticated");

        let payload: ErrorPayload = serde_json::from_value(json!({})).unwrap();
        assert!(payload.message().is_none());
    }

    fn cart_with_items() -> Cart {
        serde_json::from_value(json!({
            "id": 10,
            "items": [{
                "id": 100,
                "product": product_json(),
                "quantity": 2,
                "total_price": "49.98"
            }],
            "total_items": 2,
            "subtotal": "49.98"
        }))
        .unwrap()
    }

    #[test]
    fn test_cart_display_total_falls_back_to_estimate() {
        let mut cart = cart_with_items();
        assert!(cart.total.is_none());
        // No discount/shipping/tax supplied: estimate equals the subtotal
        assert_eq!(cart.display_total(), Price::from_cents(4998));

        cart.discount_amount = Some(Price::from_cents(500));
        cart.shipping_cost = Some(Price::from_cents(500));
        cart.tax = Some(Price::from_cents(400));
        assert_eq!(cart.display_total(), Price::from_cents(5398));
    }

    #[test]
    fn test_cart_display_total_prefers_server_value() {
        let mut cart = cart_with_items();
        cart.total = Some(Price::from_cents(9999));
        cart.discount_amount = Some(Price::from_cents(500));
        // The server value wins even when it disagrees with the estimate
        assert_eq!(cart.display_total(), Price::from_cents(9999));
    }

    #[test]
    fn test_cart_item_quantity_guards() {
        let cart = cart_with_items();
        let item = cart.items.first().unwrap();
        // stock=5, quantity=2: both steppers enabled
        assert!(item.can_increment());
        assert!(item.can_decrement());

        let mut maxed = item.clone();
        maxed.quantity = 5;
        assert!(!maxed.can_increment());

        let mut single = item.clone();
        single.quantity = 1;
        assert!(!single.can_decrement());
    }

    #[test]
    fn test_cart_item_line_total_fallback() {
        let cart = cart_with_items();
        let mut item = cart.items.first().unwrap().clone();
        assert_eq!(item.line_total(), Price::from_cents(4998));

        item.total_price = None;
        assert_eq!(item.line_total(), Price::from_cents(4998));
    }

    #[test]
    fn test_checkout_response_shapes() {
        // Hosted-redirect shape
        let resp: CheckoutResponse = serde_json::from_value(json!({
            "order_id": 1,
            "order_number": "ORD-20250101-AAAA1111",
            "checkout_url": "https://pay.example.com/c/cs_123",
            "session_id": "cs_123"
        }))
        .unwrap();
        assert_eq!(
            resp.checkout_url.as_deref(),
            Some("https://pay.example.com/c/cs_123")
        );
        assert!(resp.order.is_none());

        // Already-settled shape
        let resp: CheckoutResponse = serde_json::from_value(json!({
            "order": {
                "id": 1,
                "order_number": "ORD-20250101-AAAA1111",
                "subtotal": "10.00",
                "total": "10.00",
                "created_at": "2025-01-01T00:00:00Z"
            }
        }))
        .unwrap();
        assert!(resp.checkout_url.is_none());
        assert_eq!(resp.order.unwrap().order_number, "ORD-20250101-AAAA1111");
    }

    #[test]
    fn test_order_status_defaults() {
        let order: Order = serde_json::from_value(json!({
            "id": 1,
            "order_number": "ORD-1",
            "subtotal": "10.00",
            "total": "10.80",
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }
}
