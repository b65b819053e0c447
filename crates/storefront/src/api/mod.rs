//! Commerce API client.
//!
//! # Architecture
//!
//! - The commerce API is the source of truth - NO local sync, direct calls
//! - JSON over HTTP via `reqwest` 0.13
//! - In-memory caching via `moka` for catalog responses (5 minute TTL)
//! - Authentication is cookie/session based: the remote session cookie and
//!   CSRF token are held per storefront session in [`ApiCredentials`] and
//!   attached explicitly to each request (no shared cookie store, since one
//!   process serves many customers)
//!
//! # CSRF contract
//!
//! Mutating requests require the `X-CSRFToken` header, sourced from the
//! `csrftoken` cookie set by `GET /csrf/`. The token is fetched on first use.
//! A 403 response triggers exactly one token refresh and one retry of the
//! original request; a second failure propagates to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use inkwell_storefront::api::{ApiCredentials, CommerceClient};
//!
//! let client = CommerceClient::new(&config.api);
//! let mut creds = ApiCredentials::default();
//!
//! let user = client.login(&mut creds, "reader", "correct horse").await?;
//! let cart = client.add_item(&mut creds, product.id, 1).await?;
//! ```

mod cache;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::CommerceApiConfig;

use cache::CacheValue;
use inkwell_core::{CartItemId, OrderId, ProductId};
use types::{
    AddItemRequest, AuthResponse, Cart, Category, CheckoutResponse, CouponRequest,
    CreateOrderRequest, CreateReviewRequest, ErrorPayload, ListResponse, LoginRequest, Order,
    Product, RegisterRequest, RemoveItemRequest, Review, TrackingInfo, UpdateItemRequest, User,
};

/// Name of the remote session cookie.
pub const SESSION_COOKIE: &str = "sessionid";

/// Name of the remote CSRF cookie.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Header carrying the CSRF token on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Generic message shown when the server supplies no error payload.
pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur when calling the commerce API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, DNS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API rejected the request as unauthenticated (401).
    /// The web layer turns this into a redirect to the login page.
    #[error("authentication required")]
    AuthRequired,

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The CSRF token endpoint did not set a token cookie.
    #[error("CSRF token missing from token endpoint response")]
    MissingCsrfToken,

    /// Any other rejected request, with the server-supplied message.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ApiError {
    /// The message to show the user: the server's error payload when there is
    /// one, a generic fallback otherwise.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } | Self::NotFound(message) if !message.is_empty() => {
                message.clone()
            }
            _ => GENERIC_ERROR.to_string(),
        }
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Per-session credentials for the commerce API.
///
/// Holds the raw values of the remote `sessionid` and `csrftoken` cookies.
/// Stored in the storefront session and updated from `Set-Cookie` headers on
/// every response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiCredentials {
    /// Remote session cookie value, present once logged in.
    pub session: Option<String>,
    /// Remote CSRF token, fetched lazily before the first mutating call.
    pub csrf: Option<String>,
}

impl ApiCredentials {
    /// Build the `Cookie` header value for an outgoing request.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let mut pairs = Vec::new();
        if let Some(csrf) = &self.csrf {
            pairs.push(format!("{CSRF_COOKIE}={csrf}"));
        }
        if let Some(session) = &self.session {
            pairs.push(format!("{SESSION_COOKIE}={session}"));
        }
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Absorb `Set-Cookie` updates from a response.
    ///
    /// An empty value (as sent when the server expires a cookie on logout)
    /// clears the stored credential.
    pub fn absorb(&mut self, headers: &reqwest::header::HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some((name, value)) = parse_set_cookie(raw) else {
                continue;
            };
            let slot = match name {
                SESSION_COOKIE => &mut self.session,
                CSRF_COOKIE => &mut self.csrf,
                _ => continue,
            };
            *slot = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
    }

    /// Whether a remote session is established.
    #[must_use]
    pub const fn has_session(&self) -> bool {
        self.session.is_some()
    }
}

/// Parse the `name=value` pair from a `Set-Cookie` header, ignoring
/// attributes (`Path`, `Max-Age`, ...).
fn parse_set_cookie(raw: &str) -> Option<(&str, &str)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    Some((name.trim(), value.trim().trim_matches('"')))
}

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the commerce API.
///
/// Provides typed access to the catalog, cart, checkout, and order endpoints.
/// Catalog responses are cached for 5 minutes; everything session-scoped is
/// fetched fresh on every call.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    http: reqwest::Client,
    base_url: String,
    cache: moka::future::Cache<String, CacheValue>,
}

impl CommerceClient {
    /// Create a new commerce API client.
    #[must_use]
    pub fn new(config: &CommerceApiConfig) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CommerceClientInner {
                http: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                cache,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    // =========================================================================
    // Request Plumbing
    // =========================================================================

    /// Issue a GET without session credentials (public catalog endpoints).
    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let response = self
            .inner
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        decode(status, &text)
    }

    /// Issue a GET carrying the session cookie (account-scoped endpoints).
    async fn get_auth<T: DeserializeOwned>(
        &self,
        creds: &mut ApiCredentials,
        path: &str,
    ) -> Result<T, ApiError> {
        let mut request = self.inner.http.get(self.url(path));
        if let Some(cookie) = creds.cookie_header() {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await?;
        let status = response.status();
        creds.absorb(response.headers());
        let text = response.text().await?;
        decode(status, &text)
    }

    /// Issue a mutating POST with CSRF protection.
    ///
    /// Fetches a CSRF token first if none is held. A 403 response triggers
    /// one token refresh and one retry; the second response is final either
    /// way. No other retry policy exists.
    async fn post<T, B>(
        &self,
        creds: &mut ApiCredentials,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        if creds.csrf.is_none() {
            self.fetch_csrf_token(creds).await?;
        }

        let (status, text) = self.send_post(creds, path, body).await?;

        if status == StatusCode::FORBIDDEN {
            debug!(path, "request rejected with 403, refreshing CSRF token");
            self.fetch_csrf_token(creds).await?;
            let (status, text) = self.send_post(creds, path, body).await?;
            return decode(status, &text);
        }

        decode(status, &text)
    }

    async fn send_post<B>(
        &self,
        creds: &mut ApiCredentials,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, String), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.inner.http.post(self.url(path)).json(body);
        if let Some(cookie) = creds.cookie_header() {
            request = request.header(COOKIE, cookie);
        }
        if let Some(token) = &creds.csrf {
            request = request.header(CSRF_HEADER, token);
        }
        let response = request.send().await?;
        let status = response.status();
        creds.absorb(response.headers());
        let text = response.text().await?;
        Ok((status, text))
    }

    /// Fetch a fresh CSRF token; the endpoint sets the `csrftoken` cookie.
    #[instrument(skip(self, creds))]
    async fn fetch_csrf_token(&self, creds: &mut ApiCredentials) -> Result<(), ApiError> {
        let mut request = self.inner.http.get(self.url("/csrf/"));
        if let Some(cookie) = creds.cookie_header() {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await?;
        creds.absorb(response.headers());

        if creds.csrf.is_none() {
            return Err(ApiError::MissingCsrfToken);
        }
        Ok(())
    }

    /// Probe the commerce API for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the API is unreachable or unhealthy.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let response = self.inner.http.get(self.url("/csrf/")).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Api {
                status: status.as_u16(),
                message: "health probe failed".to_string(),
            })
        }
    }

    // =========================================================================
    // Auth Methods
    // =========================================================================

    /// Log in with username and password. The remote session cookie is
    /// captured into `creds` on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    #[instrument(skip(self, creds, password), fields(username = %username))]
    pub async fn login(
        &self,
        creds: &mut ApiCredentials,
        username: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let response: AuthResponse = self
            .post(creds, "/auth/login/", &LoginRequest { username, password })
            .await?;
        Ok(response.user)
    }

    /// Register a new account. The API logs the user in on success, so this
    /// mirrors [`login`](Self::login).
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the request fails.
    #[instrument(skip(self, creds, request), fields(username = %request.username))]
    pub async fn register(
        &self,
        creds: &mut ApiCredentials,
        request: &RegisterRequest<'_>,
    ) -> Result<User, ApiError> {
        let response: AuthResponse = self.post(creds, "/auth/register/", request).await?;
        Ok(response.user)
    }

    /// Invalidate the remote session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, creds))]
    pub async fn logout(&self, creds: &mut ApiCredentials) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post(creds, "/auth/logout/", &serde_json::json!({})).await?;
        Ok(())
    }

    /// Fetch the currently authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::AuthRequired`] if the session has expired.
    #[instrument(skip(self, creds))]
    pub async fn current_user(&self, creds: &mut ApiCredentials) -> Result<User, ApiError> {
        self.get_auth(creds, "/auth/user/").await
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let cache_key = "categories".to_string();

        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let list: ListResponse<Category> = self.get_public("/categories/", &[]).await?;
        let categories = list.into_items();

        self.inner
            .cache
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Get a category by its slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the category is not found or the request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn category(&self, slug: &str) -> Result<Category, ApiError> {
        let cache_key = format!("category:{slug}");

        if let Some(CacheValue::Category(category)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for category");
            return Ok(*category);
        }

        let category: Category = self.get_public(&format!("/categories/{slug}/"), &[]).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Category(Box::new(category.clone())))
            .await;

        Ok(category)
    }

    /// List products, optionally filtered by category slug and search text.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Product>, ApiError> {
        let cache_key = format!("products:{}", category.unwrap_or(""));

        // Check cache (search results are not cached)
        if search.is_none()
            && let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let mut query = Vec::new();
        if let Some(category) = category {
            query.push(("category", category));
        }
        if let Some(search) = search {
            query.push(("search", search));
        }

        let list: ListResponse<Product> = self.get_public("/products/", &query).await?;
        let products = list.into_items();

        if search.is_none() {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(products.clone()))
                .await;
        }

        Ok(products)
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn product(&self, slug: &str) -> Result<Product, ApiError> {
        let cache_key = format!("product:{slug}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self.get_public(&format!("/products/{slug}/"), &[]).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List reviews for a product. Not cached, so a just-submitted review
    /// shows up immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn product_reviews(&self, slug: &str) -> Result<Vec<Review>, ApiError> {
        let list: ListResponse<Review> = self
            .get_public(&format!("/products/{slug}/reviews/"), &[])
            .await?;
        Ok(list.into_items())
    }

    /// Submit a review for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the request fails.
    #[instrument(skip(self, creds, request))]
    pub async fn create_review(
        &self,
        creds: &mut ApiCredentials,
        request: &CreateReviewRequest<'_>,
    ) -> Result<Review, ApiError> {
        self.post(creds, "/reviews/", request).await
    }

    // =========================================================================
    // Cart Methods (not cached - mutable state)
    // =========================================================================

    /// Fetch the current user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, creds))]
    pub async fn current_cart(&self, creds: &mut ApiCredentials) -> Result<Cart, ApiError> {
        self.get_auth(creds, "/cart/current/").await
    }

    /// Add a product to the cart. Returns the full updated cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is unknown, out of stock, or the
    /// request fails.
    #[instrument(skip(self, creds), fields(product_id = %product_id, quantity))]
    pub async fn add_item(
        &self,
        creds: &mut ApiCredentials,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        self.post(
            creds,
            "/cart/add_item/",
            &AddItemRequest {
                product_id,
                quantity,
            },
        )
        .await
    }

    /// Update a cart line's quantity. Returns the full updated cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is unknown or the request fails.
    #[instrument(skip(self, creds), fields(cart_item_id = %cart_item_id, quantity))]
    pub async fn update_item(
        &self,
        creds: &mut ApiCredentials,
        cart_item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        self.post(
            creds,
            "/cart/update_item/",
            &UpdateItemRequest {
                cart_item_id,
                quantity,
            },
        )
        .await
    }

    /// Remove a line from the cart. Returns the full updated cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is unknown or the request fails.
    #[instrument(skip(self, creds), fields(cart_item_id = %cart_item_id))]
    pub async fn remove_item(
        &self,
        creds: &mut ApiCredentials,
        cart_item_id: CartItemId,
    ) -> Result<Cart, ApiError> {
        self.post(creds, "/cart/remove_item/", &RemoveItemRequest { cart_item_id })
            .await
    }

    /// Remove every line from the cart. Returns the (empty) updated cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, creds))]
    pub async fn clear_cart(&self, creds: &mut ApiCredentials) -> Result<Cart, ApiError> {
        self.post(creds, "/cart/clear/", &serde_json::json!({})).await
    }

    /// Apply a coupon code to the cart. Returns the full updated cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is invalid or the request fails.
    #[instrument(skip(self, creds), fields(code = %code))]
    pub async fn apply_coupon(
        &self,
        creds: &mut ApiCredentials,
        code: &str,
    ) -> Result<Cart, ApiError> {
        self.post(creds, "/cart/apply_coupon/", &CouponRequest { code })
            .await
    }

    /// Remove the applied coupon from the cart. Returns the full updated cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, creds))]
    pub async fn remove_coupon(&self, creds: &mut ApiCredentials) -> Result<Cart, ApiError> {
        self.post(creds, "/cart/remove_coupon/", &serde_json::json!({}))
            .await
    }

    // =========================================================================
    // Checkout & Orders
    // =========================================================================

    /// Create an order from the cart and initiate the hosted payment flow.
    ///
    /// The response carries either a `checkout_url` to redirect the customer
    /// to, or a completed order when no payment step is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is empty, validation fails, or the
    /// request fails.
    #[instrument(skip(self, creds, request))]
    pub async fn create_order(
        &self,
        creds: &mut ApiCredentials,
        request: &CreateOrderRequest,
    ) -> Result<CheckoutResponse, ApiError> {
        self.post(creds, "/cart/create_order/", request).await
    }

    /// List the current user's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, creds))]
    pub async fn orders(&self, creds: &mut ApiCredentials) -> Result<Vec<Order>, ApiError> {
        let list: ListResponse<Order> = self.get_auth(creds, "/orders/").await?;
        Ok(list.into_items())
    }

    /// Get one of the current user's orders by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is not found or the request fails.
    #[instrument(skip(self, creds), fields(order_id = %order_id))]
    pub async fn order(
        &self,
        creds: &mut ApiCredentials,
        order_id: OrderId,
    ) -> Result<Order, ApiError> {
        self.get_auth(creds, &format!("/orders/{order_id}/")).await
    }

    /// Get shipment tracking details for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is not found or the request fails.
    #[instrument(skip(self, creds), fields(order_id = %order_id))]
    pub async fn order_tracking(
        &self,
        creds: &mut ApiCredentials,
        order_id: OrderId,
    ) -> Result<TrackingInfo, ApiError> {
        self.get_auth(creds, &format!("/orders/{order_id}/tracking/"))
            .await
    }

    /// Look up an order by the payment processor's checkout session id,
    /// as carried on the post-payment redirect URL.
    ///
    /// # Errors
    ///
    /// Returns an error if no order matches or the request fails.
    #[instrument(skip(self, creds), fields(session_id = %session_id))]
    pub async fn order_by_checkout_session(
        &self,
        creds: &mut ApiCredentials,
        session_id: &str,
    ) -> Result<Order, ApiError> {
        self.get_auth(creds, &format!("/orders/by-session/{session_id}/"))
            .await
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Invalidate a cached product, e.g. after a review changes its
    /// aggregate count.
    pub async fn invalidate_product(&self, slug: &str) {
        self.inner
            .cache
            .invalidate(&format!("product:{slug}"))
            .await;
    }
}

// =============================================================================
// Response Decoding
// =============================================================================

/// Map a response to a typed value or an [`ApiError`].
fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::AuthRequired);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(extract_message(body)));
    }

    if !status.is_success() {
        return Err(ApiError::Api {
            status: status.as_u16(),
            message: extract_message(body),
        });
    }

    serde_json::from_str(body).map_err(ApiError::Parse)
}

/// Pull the server-supplied error string out of a rejected response body.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(ErrorPayload::message)
        .unwrap_or_else(|| GENERIC_ERROR.to_string())
}
