//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Health check
//!
//! # Catalog
//! GET  /products               - Product listing (?category=slug&search=text)
//! GET  /products/{slug}        - Product detail with reviews
//! POST /products/{slug}/reviews - Submit a review (requires auth)
//! GET  /categories             - Category listing
//!
//! # Cart
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add item
//! POST /cart/update            - Update line quantity
//! POST /cart/remove            - Remove line
//! POST /cart/clear             - Remove all lines
//! POST /cart/coupon            - Apply a coupon code
//! POST /cart/coupon/remove     - Remove the applied coupon
//!
//! # Checkout
//! GET  /checkout               - Current checkout step (shipping or payment)
//! POST /checkout/shipping      - Submit shipping form, advance to payment
//! POST /checkout/back          - Step back from payment to shipping
//! POST /checkout/payment       - Create order, redirect to hosted payment
//! GET  /order/success          - Post-payment reconciliation (?session_id=...)
//!
//! # Orders (requires auth)
//! GET  /orders                 - Order history
//! GET  /orders/{id}            - Order detail with tracking
//!
//! # Auth
//! GET  /login                  - Login page
//! POST /login                  - Login action
//! GET  /register               - Register page
//! POST /register               - Register action
//! POST /logout                 - Logout action
//!
//! # Account (requires auth)
//! GET  /profile                - Profile with recent orders
//!
//! # Pages
//! GET  /about                  - About page
//! GET  /contact                - Contact page
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod home;
pub mod orders;
pub mod pages;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, cart_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
        .route("/{slug}/reviews", post(products::create_review))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
        .layer(cart_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/shipping", post(checkout::submit_shipping))
        .route("/back", post(checkout::back_to_shipping))
        .route("/payment", post(checkout::submit_payment))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Catalog routes
        .nest("/products", product_routes())
        .route("/categories", get(categories::index))
        // Cart routes
        .nest("/cart", cart_routes())
        // Checkout routes
        .nest("/checkout", checkout_routes())
        .route("/order/success", get(checkout::order_success))
        // Order routes
        .nest("/orders", order_routes())
        // Auth routes
        .merge(auth_routes())
        // Account routes
        .route("/profile", get(account::profile))
        // Static pages
        .route("/about", get(pages::about))
        .route("/contact", get(pages::contact))
}
