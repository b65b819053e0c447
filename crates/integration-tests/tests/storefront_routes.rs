//! Browser-level tests: a spawned storefront server driven with a
//! cookie-holding client, backed by the stub commerce API. Covers the
//! checkout entry guards, the step transitions, and the hand-off to the
//! hosted payment page.

use inkwell_integration_tests::stub::{CHECKOUT_SESSION_ID, PASSWORD, StubApi, USERNAME};
use inkwell_integration_tests::{browser, spawn_storefront};

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn log_in(client: &reqwest::Client, store: &str) {
    let response = client
        .post(format!("{store}/login"))
        .form(&[("username", USERNAME), ("password", PASSWORD)])
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn checkout_requires_login() {
    let api = StubApi::spawn().await;
    let store = spawn_storefront(&api.base_url).await;
    let client = browser();

    let response = client
        .get(format!("{store}/checkout"))
        .send()
        .await
        .expect("checkout request");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn checkout_with_empty_cart_redirects_to_cart() {
    let api = StubApi::spawn().await;
    let store = spawn_storefront(&api.base_url).await;
    let client = browser();

    log_in(&client, &store).await;

    let response = client
        .get(format!("{store}/checkout"))
        .send()
        .await
        .expect("checkout request");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/cart");
}

#[tokio::test]
async fn invalid_login_returns_to_the_login_page() {
    let api = StubApi::spawn().await;
    let store = spawn_storefront(&api.base_url).await;
    let client = browser();

    let response = client
        .post(format!("{store}/login"))
        .form(&[("username", USERNAME), ("password", "wrong-pass-123")])
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status(), 303);
    assert!(location(&response).starts_with("/login?error="));
}

#[tokio::test]
async fn order_success_without_session_id_redirects_to_orders() {
    let api = StubApi::spawn().await;
    let store = spawn_storefront(&api.base_url).await;
    let client = browser();

    log_in(&client, &store).await;

    let response = client
        .get(format!("{store}/order/success"))
        .send()
        .await
        .expect("success request");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/orders");
}

#[tokio::test]
async fn full_checkout_happy_path() {
    let api = StubApi::spawn().await;
    let store = spawn_storefront(&api.base_url).await;
    let client = browser();

    log_in(&client, &store).await;

    // Add product 1 (stock 5) with quantity 2
    let response = client
        .post(format!("{store}/cart/add"))
        .form(&[
            ("product_id", "1"),
            ("quantity", "2"),
            ("next", "/cart"),
        ])
        .send()
        .await
        .expect("add to cart");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/cart");

    // The cart page shows the line
    let body = client
        .get(format!("{store}/cart"))
        .send()
        .await
        .expect("cart page")
        .text()
        .await
        .expect("cart body");
    assert!(body.contains("The Long Shelf"));
    assert!(body.contains("$49.98"));

    // The entry guard passes now: the shipping step renders
    let body = client
        .get(format!("{store}/checkout"))
        .send()
        .await
        .expect("checkout page")
        .text()
        .await
        .expect("checkout body");
    assert!(body.contains("Shipping information"));

    // A bad email blocks advancement and flags the field
    let response = client
        .post(format!("{store}/checkout/shipping"))
        .form(&[
            ("first_name", "Avid"),
            ("last_name", "Reader"),
            ("email", "not-an-email"),
            ("phone", "555-0142"),
            ("address", "14 Bindery Lane"),
            ("city", "Printers Row"),
            ("state", "IL"),
            ("postal_code", "60605"),
            ("country", "US"),
        ])
        .send()
        .await
        .expect("shipping submit");
    assert_eq!(response.status(), 200, "stays on the shipping step");
    let body = response.text().await.expect("shipping body");
    assert!(body.contains("Enter a valid email address"));

    // A valid submission advances to the payment step
    let response = client
        .post(format!("{store}/checkout/shipping"))
        .form(&[
            ("first_name", "Avid"),
            ("last_name", "Reader"),
            ("email", "reader@example.com"),
            ("phone", "555-0142"),
            ("address", "14 Bindery Lane"),
            ("city", "Printers Row"),
            ("state", "IL"),
            ("postal_code", "60605"),
            ("country", "US"),
        ])
        .send()
        .await
        .expect("shipping submit");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/checkout");

    let body = client
        .get(format!("{store}/checkout"))
        .send()
        .await
        .expect("payment page")
        .text()
        .await
        .expect("payment body");
    assert!(body.contains("Pay $49.98"));
    assert!(body.contains("14 Bindery Lane"));

    // Paying hands the browser to the hosted checkout URL, unmodified
    let response = client
        .post(format!("{store}/checkout/payment"))
        .send()
        .await
        .expect("payment submit");
    assert_eq!(response.status(), 303);
    assert_eq!(
        location(&response),
        format!("https://pay.example.test/c/{CHECKOUT_SESSION_ID}")
    );

    // The order-creation request carried the templated success URL
    let order_request = api.last_order_request().expect("order request recorded");
    assert_eq!(
        order_request["success_url"],
        serde_json::json!("http://shop.test/order/success?session_id={CHECKOUT_SESSION_ID}")
    );

    // Arriving back with the processor's session id shows the order
    let body = client
        .get(format!(
            "{store}/order/success?session_id={CHECKOUT_SESSION_ID}"
        ))
        .send()
        .await
        .expect("success page")
        .text()
        .await
        .expect("success body")
        ;
    assert!(body.contains("ORD-20250601-TEST0001"));

    // And the cart is empty again
    let body = client
        .get(format!("{store}/cart"))
        .send()
        .await
        .expect("cart page")
        .text()
        .await
        .expect("cart body");
    assert!(body.contains("Your cart is empty"));
}

#[tokio::test]
async fn payment_step_can_return_to_shipping() {
    let api = StubApi::spawn().await;
    let store = spawn_storefront(&api.base_url).await;
    let client = browser();

    log_in(&client, &store).await;
    client
        .post(format!("{store}/cart/add"))
        .form(&[("product_id", "2"), ("quantity", "1"), ("next", "/cart")])
        .send()
        .await
        .expect("add to cart");

    client
        .post(format!("{store}/checkout/shipping"))
        .form(&[
            ("first_name", "Avid"),
            ("last_name", "Reader"),
            ("email", "reader@example.com"),
            ("phone", "555-0142"),
            ("address", "14 Bindery Lane"),
            ("city", "Printers Row"),
            ("state", "IL"),
            ("postal_code", "60605"),
            ("country", "US"),
        ])
        .send()
        .await
        .expect("shipping submit");

    // Step back: the shipping form renders again, pre-filled
    let response = client
        .post(format!("{store}/checkout/back"))
        .send()
        .await
        .expect("back submit");
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/checkout");

    let body = client
        .get(format!("{store}/checkout"))
        .send()
        .await
        .expect("checkout page")
        .text()
        .await
        .expect("checkout body");
    assert!(body.contains("Shipping information"));
    assert!(body.contains("14 Bindery Lane"));
}
