//! Integration tests for the checkout orchestration against the stub API:
//! order creation, redirect URL handling, and post-payment reconciliation.

use inkwell_core::ProductId;
use inkwell_integration_tests::stub::{
    CHECKOUT_SESSION_ID, COUPON_CODE, PASSWORD, StubApi, USERNAME,
};
use inkwell_storefront::api::{ApiCredentials, CommerceClient};
use inkwell_storefront::checkout::{ShippingDetails, build_order_request};
use inkwell_storefront::config::CommerceApiConfig;

const BASE_URL: &str = "http://shop.test";

fn shipping_details() -> ShippingDetails {
    ShippingDetails {
        first_name: "Avid".to_string(),
        last_name: "Reader".to_string(),
        email: "reader@example.com".to_string(),
        phone: "555-0142".to_string(),
        address: "14 Bindery Lane".to_string(),
        city: "Printers Row".to_string(),
        state: "IL".to_string(),
        postal_code: "60605".to_string(),
        country: "US".to_string(),
    }
}

async fn signed_in(api: &StubApi) -> (CommerceClient, ApiCredentials) {
    let client = CommerceClient::new(&CommerceApiConfig {
        base_url: api.base_url.clone(),
    });
    let mut creds = ApiCredentials::default();
    client
        .login(&mut creds, USERNAME, PASSWORD)
        .await
        .expect("login succeeds");
    (client, creds)
}

#[tokio::test]
async fn happy_path_returns_the_hosted_checkout_url_unmodified() {
    let api = StubApi::spawn().await;
    let (client, mut creds) = signed_in(&api).await;

    let cart = client
        .add_item(&mut creds, ProductId::new(1), 2)
        .await
        .expect("seed the cart");

    let request = build_order_request(&shipping_details(), cart.coupon_code(), BASE_URL);
    let response = client
        .create_order(&mut creds, &request)
        .await
        .expect("order creation succeeds");

    // The hosted checkout URL is used exactly as returned
    assert_eq!(
        response.checkout_url.as_deref(),
        Some(format!("https://pay.example.test/c/{CHECKOUT_SESSION_ID}").as_str())
    );
    assert_eq!(response.session_id.as_deref(), Some(CHECKOUT_SESSION_ID));
    assert!(response.order_id.is_some());

    // The cart was consumed by order creation
    let cart = client.current_cart(&mut creds).await.expect("refetch cart");
    assert!(cart.is_empty());
}

#[tokio::test]
async fn success_url_carries_the_literal_session_placeholder() {
    let api = StubApi::spawn().await;
    let (client, mut creds) = signed_in(&api).await;

    client
        .add_item(&mut creds, ProductId::new(1), 1)
        .await
        .expect("seed the cart");

    let request = build_order_request(&shipping_details(), None, BASE_URL);
    client
        .create_order(&mut creds, &request)
        .await
        .expect("order creation succeeds");

    let body = api.last_order_request().expect("order request recorded");
    assert_eq!(
        body["success_url"],
        serde_json::json!("http://shop.test/order/success?session_id={CHECKOUT_SESSION_ID}"),
        "the placeholder is substituted by the processor, never by this client"
    );
    assert_eq!(body["cancel_url"], serde_json::json!("http://shop.test/cart"));
}

#[tokio::test]
async fn coupon_code_is_carried_into_order_creation() {
    let api = StubApi::spawn().await;
    let (client, mut creds) = signed_in(&api).await;

    client
        .add_item(&mut creds, ProductId::new(1), 2)
        .await
        .expect("seed the cart");
    let cart = client
        .apply_coupon(&mut creds, COUPON_CODE)
        .await
        .expect("apply coupon");

    let request = build_order_request(&shipping_details(), cart.coupon_code(), BASE_URL);
    client
        .create_order(&mut creds, &request)
        .await
        .expect("order creation succeeds");

    let body = api.last_order_request().expect("order request recorded");
    assert_eq!(body["coupon_code"], serde_json::json!(COUPON_CODE));
}

#[tokio::test]
async fn empty_cart_order_creation_is_rejected() {
    let api = StubApi::spawn().await;
    let (client, mut creds) = signed_in(&api).await;

    let request = build_order_request(&shipping_details(), None, BASE_URL);
    let err = client
        .create_order(&mut creds, &request)
        .await
        .expect_err("empty cart is rejected");
    assert_eq!(err.user_message(), "Cart is empty");
}

#[tokio::test]
async fn order_is_reconciled_by_checkout_session_id() {
    let api = StubApi::spawn().await;
    let (client, mut creds) = signed_in(&api).await;

    client
        .add_item(&mut creds, ProductId::new(1), 2)
        .await
        .expect("seed the cart");
    let request = build_order_request(&shipping_details(), None, BASE_URL);
    let created = client
        .create_order(&mut creds, &request)
        .await
        .expect("order creation succeeds");

    let order = client
        .order_by_checkout_session(&mut creds, CHECKOUT_SESSION_ID)
        .await
        .expect("lookup by session id");
    assert_eq!(Some(order.id), created.order_id);
    assert_eq!(Some(order.order_number.clone()), created.order_number);

    // The order also shows up in history and by id
    let orders = client.orders(&mut creds).await.expect("order history");
    assert_eq!(orders.len(), 1);
    let by_id = client.order(&mut creds, order.id).await.expect("order by id");
    assert_eq!(by_id.order_number, order.order_number);
}
