//! In-process stub of the commerce API.
//!
//! Implements just enough of the backend contract for the storefront to run
//! against: CSRF token issuance via the `csrftoken` cookie, cookie-session
//! authentication, whole-cart responses on every mutation, and order
//! creation that returns a hosted checkout URL. Mutating endpoints reject
//! requests whose `X-CSRFToken` header does not match the current token,
//! exactly once per request, so the client's refresh-and-retry is exercised
//! for real.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde_json::{Value, json};

/// Username the stub accepts.
pub const USERNAME: &str = "reader";
/// Password the stub accepts.
pub const PASSWORD: &str = "orchid-ledger-42";
/// The one coupon code the stub knows (10% off).
pub const COUPON_CODE: &str = "WELCOME10";
/// Checkout session id the stub issues on order creation.
pub const CHECKOUT_SESSION_ID: &str = "cs_test_a1b2c3";

/// A line in the stub's cart.
pub struct StubCartItem {
    pub id: i64,
    pub product_id: i64,
    pub quantity: u32,
}

/// Mutable stub state, shared with the test for assertions.
pub struct StubState {
    pub csrf_token: String,
    csrf_serial: u32,
    pub session: Option<String>,
    session_serial: u32,
    pub cart_items: Vec<StubCartItem>,
    next_item_id: i64,
    pub coupon: Option<String>,
    pub orders: Vec<Value>,
    next_order_id: i64,
    /// The body the storefront sent to `create_order`, verbatim.
    pub last_order_request: Option<Value>,
    /// POST attempts per path, including CSRF-rejected ones.
    pub post_counts: HashMap<String, u32>,
}

impl StubState {
    fn new() -> Self {
        Self {
            csrf_token: "tok-0".to_string(),
            csrf_serial: 0,
            session: None,
            session_serial: 0,
            cart_items: Vec::new(),
            next_item_id: 100,
            coupon: None,
            orders: Vec::new(),
            next_order_id: 1,
            last_order_request: None,
            post_counts: HashMap::new(),
        }
    }

    fn rotate_csrf(&mut self) -> String {
        self.csrf_serial += 1;
        self.csrf_token = format!("tok-{}", self.csrf_serial);
        self.csrf_token.clone()
    }
}

type Shared = Arc<Mutex<StubState>>;

/// Handle to a running stub API server.
#[derive(Clone)]
pub struct StubApi {
    pub base_url: String,
    pub state: Shared,
}

impl StubApi {
    /// Spawn the stub on an ephemeral port.
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(StubState::new()));

        let app = Router::new()
            .route("/csrf/", get(csrf))
            .route("/auth/login/", post(login))
            .route("/auth/logout/", post(logout))
            .route("/auth/user/", get(current_user))
            .route("/categories/", get(categories))
            .route("/categories/{slug}/", get(category_detail))
            .route("/products/", get(products_list))
            .route("/products/{slug}/", get(product_detail))
            .route("/products/{slug}/reviews/", get(product_reviews))
            .route("/cart/current/", get(cart_current))
            .route("/cart/add_item/", post(cart_add_item))
            .route("/cart/update_item/", post(cart_update_item))
            .route("/cart/remove_item/", post(cart_remove_item))
            .route("/cart/clear/", post(cart_clear))
            .route("/cart/apply_coupon/", post(cart_apply_coupon))
            .route("/cart/remove_coupon/", post(cart_remove_coupon))
            .route("/cart/create_order/", post(create_order))
            .route("/orders/", get(orders_list))
            .route("/orders/by-session/{sid}/", get(order_by_session))
            .route("/orders/{id}/", get(order_detail))
            .route("/orders/{id}/tracking/", get(order_tracking))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr: SocketAddr = listener.local_addr().expect("stub local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Rotate the server-side CSRF token, invalidating whatever the client
    /// holds. The next mutating request gets a 403 and must re-fetch.
    pub fn invalidate_csrf(&self) {
        self.state.lock().expect("state mutex").rotate_csrf();
    }

    /// POST attempts seen on a path, including rejected ones.
    #[must_use]
    pub fn post_count(&self, path: &str) -> u32 {
        self.state
            .lock()
            .expect("state mutex")
            .post_counts
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// The last order-creation request body, verbatim.
    #[must_use]
    pub fn last_order_request(&self) -> Option<Value> {
        self.state
            .lock()
            .expect("state mutex")
            .last_order_request
            .clone()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn products() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "category": 1,
            "category_name": "Fiction",
            "name": "The Long Shelf",
            "slug": "the-long-shelf",
            "description": "A novel about a bookshop that will not stay shut.",
            "price": "24.99",
            "stock": 5,
            "is_available": true,
            "in_stock": true,
            "image": "/media/products/the-long-shelf.jpg"
        }),
        json!({
            "id": 2,
            "category": 2,
            "category_name": "Merchandise",
            "name": "Field Notes Tote",
            "slug": "field-notes-tote",
            "description": "Canvas tote, holds nine paperbacks.",
            "price": "18.00",
            "stock": 3,
            "is_available": true,
            "in_stock": true,
            "image": "/media/products/field-notes-tote.jpg"
        }),
    ]
}

fn find_product_by_id(id: i64) -> Option<Value> {
    products().into_iter().find(|p| p["id"] == json!(id))
}

fn user_json() -> Value {
    json!({
        "id": 7,
        "username": USERNAME,
        "email": "reader@example.com",
        "first_name": "Avid",
        "last_name": "Reader"
    })
}

fn price_of(product: &Value) -> Decimal {
    product["price"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Decimal::ZERO)
}

fn money(value: Decimal) -> String {
    format!("{value:.2}")
}

// =============================================================================
// Request Guards
// =============================================================================

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

fn csrf_rejection() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"detail": "CSRF Failed: CSRF token missing or incorrect."})),
    )
        .into_response()
}

fn auth_rejection() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Authentication credentials were not provided."})),
    )
        .into_response()
}

fn check_csrf(state: &StubState, headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get("X-CSRFToken")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if token == state.csrf_token {
        Ok(())
    } else {
        Err(csrf_rejection())
    }
}

fn check_session(state: &StubState, headers: &HeaderMap) -> Result<(), Response> {
    match (&state.session, cookie_value(headers, "sessionid")) {
        (Some(active), Some(sent)) if *active == sent => Ok(()),
        _ => Err(auth_rejection()),
    }
}

fn count_post(state: &mut StubState, path: &str) {
    *state.post_counts.entry(path.to_string()).or_insert(0) += 1;
}

// =============================================================================
// Auth Handlers
// =============================================================================

async fn csrf(State(state): State<Shared>) -> Response {
    let mut state = state.lock().expect("state mutex");
    let token = state.rotate_csrf();
    (
        AppendHeaders([(
            header::SET_COOKIE,
            format!("csrftoken={token}; Path=/; SameSite=Lax"),
        )]),
        Json(json!({"csrfToken": token})),
    )
        .into_response()
}

async fn login(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/auth/login/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }

    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if username != USERNAME || password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid username or password"})),
        )
            .into_response();
    }

    state.session_serial += 1;
    let session_id = format!("sess-{}", state.session_serial);
    state.session = Some(session_id.clone());

    (
        AppendHeaders([(
            header::SET_COOKIE,
            format!("sessionid={session_id}; Path=/; HttpOnly"),
        )]),
        Json(json!({"user": user_json(), "message": "Login successful"})),
    )
        .into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/auth/logout/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }

    state.session = None;
    state.cart_items.clear();
    state.coupon = None;

    (
        AppendHeaders([(
            header::SET_COOKIE,
            "sessionid=; Path=/; Max-Age=0".to_string(),
        )]),
        Json(json!({"message": "Logout successful"})),
    )
        .into_response()
}

async fn current_user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().expect("state mutex");
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }
    Json(user_json()).into_response()
}

// =============================================================================
// Catalog Handlers
// =============================================================================

/// Categories come back as a bare array (unpaginated endpoint).
async fn categories() -> Response {
    Json(json!([
        {"id": 1, "name": "Fiction", "slug": "fiction", "description": "Novels and stories."},
        {"id": 2, "name": "Merchandise", "slug": "merch", "description": "Totes and prints."}
    ]))
    .into_response()
}

async fn category_detail(Path(slug): Path<String>) -> Response {
    let categories = [
        json!({"id": 1, "name": "Fiction", "slug": "fiction", "description": "Novels and stories."}),
        json!({"id": 2, "name": "Merchandise", "slug": "merch", "description": "Totes and prints."}),
    ];
    match categories.iter().find(|c| c["slug"] == json!(slug)) {
        Some(category) => Json(category.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

/// Products come back in a paginated envelope (the other list shape).
async fn products_list(Query(query): Query<HashMap<String, String>>) -> Response {
    let category = query.get("category").map(String::as_str);
    let search = query.get("search").map(|s| s.to_lowercase());

    let results: Vec<Value> = products()
        .into_iter()
        .filter(|p| match category {
            Some("fiction") => p["category"] == json!(1),
            Some("merch") => p["category"] == json!(2),
            Some(_) => false,
            None => true,
        })
        .filter(|p| match &search {
            Some(needle) => p["name"]
                .as_str()
                .unwrap_or_default()
                .to_lowercase()
                .contains(needle),
            None => true,
        })
        .collect();

    Json(json!({
        "count": results.len(),
        "next": null,
        "previous": null,
        "results": results
    }))
    .into_response()
}

async fn product_detail(Path(slug): Path<String>) -> Response {
    match products().into_iter().find(|p| p["slug"] == json!(slug)) {
        Some(product) => Json(product).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn product_reviews(Path(_slug): Path<String>) -> Response {
    Json(json!([
        {
            "id": 1,
            "rating": 5,
            "title": "Kept me up",
            "comment": "Read it in one sitting.",
            "author": "margaret",
            "created_at": "2025-05-01T09:30:00Z"
        }
    ]))
    .into_response()
}

// =============================================================================
// Cart Handlers
// =============================================================================

fn cart_json(state: &StubState) -> Value {
    let mut subtotal = Decimal::ZERO;
    let mut total_items: u32 = 0;
    let items: Vec<Value> = state
        .cart_items
        .iter()
        .filter_map(|item| {
            let product = find_product_by_id(item.product_id)?;
            let line_total = price_of(&product) * Decimal::from(item.quantity);
            subtotal += line_total;
            total_items += item.quantity;
            Some(json!({
                "id": item.id,
                "product": product,
                "quantity": item.quantity,
                "total_price": money(line_total)
            }))
        })
        .collect();

    let mut cart = json!({
        "id": 1,
        "items": items,
        "total_items": total_items,
        "subtotal": money(subtotal)
    });

    // 10% off with the known coupon; `total` is deliberately omitted so the
    // storefront's display fallback is exercised
    if let Some(code) = &state.coupon {
        let discount = subtotal * Decimal::new(10, 2);
        cart["coupon"] = json!({"code": code});
        cart["discount_amount"] = json!(money(discount));
    }

    cart
}

async fn cart_current(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().expect("state mutex");
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }
    Json(cart_json(&state)).into_response()
}

async fn cart_add_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/cart/add_item/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }

    let product_id = body["product_id"].as_i64().unwrap_or_default();
    let quantity = u32::try_from(body["quantity"].as_i64().unwrap_or(1)).unwrap_or(1);

    let Some(product) = find_product_by_id(product_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Product not found"})),
        )
            .into_response();
    };
    let stock = u32::try_from(product["stock"].as_i64().unwrap_or(0)).unwrap_or(0);

    let held: u32 = state
        .cart_items
        .iter()
        .filter(|i| i.product_id == product_id)
        .map(|i| i.quantity)
        .sum();
    if held + quantity > stock {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("Only {stock} items available in stock.")})),
        )
            .into_response();
    }

    if let Some(existing) = state
        .cart_items
        .iter_mut()
        .find(|i| i.product_id == product_id)
    {
        existing.quantity += quantity;
    } else {
        let id = state.next_item_id;
        state.next_item_id += 1;
        state.cart_items.push(StubCartItem {
            id,
            product_id,
            quantity,
        });
    }

    Json(cart_json(&state)).into_response()
}

async fn cart_update_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/cart/update_item/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }

    let item_id = body["cart_item_id"].as_i64().unwrap_or_default();
    let quantity = body["quantity"].as_i64().unwrap_or_default();

    let Some(position) = state.cart_items.iter().position(|i| i.id == item_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Cart item not found"})),
        )
            .into_response();
    };

    if quantity <= 0 {
        state.cart_items.remove(position);
    } else {
        let quantity = u32::try_from(quantity).unwrap_or(1);
        let product_id = state
            .cart_items
            .get(position)
            .map_or(0, |item| item.product_id);
        let stock = find_product_by_id(product_id)
            .and_then(|p| p["stock"].as_i64())
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        if quantity > stock {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Only {stock} items available in stock.")})),
            )
                .into_response();
        }
        if let Some(item) = state.cart_items.get_mut(position) {
            item.quantity = quantity;
        }
    }

    Json(cart_json(&state)).into_response()
}

async fn cart_remove_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/cart/remove_item/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }

    let item_id = body["cart_item_id"].as_i64().unwrap_or_default();
    let Some(position) = state.cart_items.iter().position(|i| i.id == item_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Cart item not found"})),
        )
            .into_response();
    };
    state.cart_items.remove(position);

    Json(cart_json(&state)).into_response()
}

async fn cart_clear(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/cart/clear/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }

    state.cart_items.clear();
    state.coupon = None;

    Json(cart_json(&state)).into_response()
}

async fn cart_apply_coupon(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/cart/apply_coupon/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }

    let code = body["code"].as_str().unwrap_or_default();
    if code != COUPON_CODE {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid coupon code"})),
        )
            .into_response();
    }

    state.coupon = Some(code.to_string());
    Json(cart_json(&state)).into_response()
}

async fn cart_remove_coupon(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/cart/remove_coupon/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }

    state.coupon = None;
    Json(cart_json(&state)).into_response()
}

// =============================================================================
// Checkout & Order Handlers
// =============================================================================

async fn create_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().expect("state mutex");
    count_post(&mut state, "/cart/create_order/");
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }

    if state.cart_items.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Cart is empty"})),
        )
            .into_response();
    }

    state.last_order_request = Some(body.clone());

    let mut subtotal = Decimal::ZERO;
    let items: Vec<Value> = state
        .cart_items
        .iter()
        .filter_map(|item| {
            let product = find_product_by_id(item.product_id)?;
            let price = price_of(&product);
            subtotal += price * Decimal::from(item.quantity);
            Some(json!({
                "id": item.id,
                "product": item.product_id,
                "product_name": product["name"],
                "product_price": money(price),
                "quantity": item.quantity
            }))
        })
        .collect();

    let discount = if state.coupon.is_some() {
        subtotal * Decimal::new(10, 2)
    } else {
        Decimal::ZERO
    };
    let shipping = Decimal::new(500, 2);
    let tax = (subtotal - discount) * Decimal::new(8, 2);
    let total = subtotal - discount + shipping + tax;

    let order_id = state.next_order_id;
    state.next_order_id += 1;
    let order_number = format!("ORD-20250601-TEST{order_id:04}");

    let order = json!({
        "id": order_id,
        "order_number": order_number,
        "email": body["email"],
        "first_name": body["first_name"],
        "last_name": body["last_name"],
        "address_line1": body["address_line1"],
        "address_line2": body["address_line2"],
        "city": body["city"],
        "state": body["state"],
        "postal_code": body["postal_code"],
        "country": body["country"],
        "phone": body["phone"],
        "subtotal": money(subtotal),
        "shipping_cost": money(shipping),
        "tax": money(tax),
        "total": money(total),
        "status": "pending",
        "payment_status": "pending",
        "stripe_session_id": CHECKOUT_SESSION_ID,
        "items": items,
        "created_at": "2025-06-01T12:00:00Z"
    });
    state.orders.push(order);

    // Order creation clears the cart, as the real backend does
    state.cart_items.clear();
    state.coupon = None;

    (
        StatusCode::CREATED,
        Json(json!({
            "order_id": order_id,
            "order_number": format!("ORD-20250601-TEST{order_id:04}"),
            "checkout_url": format!("https://pay.example.test/c/{CHECKOUT_SESSION_ID}"),
            "session_id": CHECKOUT_SESSION_ID
        })),
    )
        .into_response()
}

async fn orders_list(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().expect("state mutex");
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }
    Json(json!(state.orders)).into_response()
}

async fn order_detail(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let state = state.lock().expect("state mutex");
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }
    match state.orders.iter().find(|o| o["id"] == json!(id)) {
        Some(order) => Json(order.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn order_tracking(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let state = state.lock().expect("state mutex");
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }
    if !state.orders.iter().any(|o| o["id"] == json!(id)) {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    Json(json!({
        "tracking_number": null,
        "carrier": null,
        "status": "pending",
        "shipped_at": null,
        "delivered_at": null
    }))
    .into_response()
}

async fn order_by_session(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(sid): Path<String>,
) -> Response {
    let state = state.lock().expect("state mutex");
    if let Err(rejection) = check_session(&state, &headers) {
        return rejection;
    }
    if sid != CHECKOUT_SESSION_ID {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    match state.orders.last() {
        Some(order) => Json(order.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}
