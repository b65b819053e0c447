//! Integration tests for the commerce API client: CSRF handling, auth
//! failures, error payload extraction, and response-shape normalization.

use inkwell_integration_tests::stub::{PASSWORD, StubApi, USERNAME};
use inkwell_storefront::api::{ApiCredentials, ApiError, CommerceClient};
use inkwell_storefront::config::CommerceApiConfig;

fn client_for(api: &StubApi) -> CommerceClient {
    CommerceClient::new(&CommerceApiConfig {
        base_url: api.base_url.clone(),
    })
}

async fn signed_in(api: &StubApi) -> (CommerceClient, ApiCredentials) {
    let client = client_for(api);
    let mut creds = ApiCredentials::default();
    client
        .login(&mut creds, USERNAME, PASSWORD)
        .await
        .expect("login succeeds");
    (client, creds)
}

#[tokio::test]
async fn login_captures_session_and_csrf_cookies() {
    let api = StubApi::spawn().await;
    let (_, creds) = signed_in(&api).await;

    assert!(creds.session.is_some(), "session cookie captured");
    assert!(creds.csrf.is_some(), "csrf token captured");
}

#[tokio::test]
async fn csrf_token_is_fetched_before_first_mutation() {
    let api = StubApi::spawn().await;
    let client = client_for(&api);

    // No token held; the client must fetch one before the login POST
    let mut creds = ApiCredentials::default();
    client
        .login(&mut creds, USERNAME, PASSWORD)
        .await
        .expect("login succeeds without a pre-fetched token");

    assert_eq!(api.post_count("/auth/login/"), 1);
}

#[tokio::test]
async fn csrf_rejection_is_retried_exactly_once() {
    let api = StubApi::spawn().await;
    let (client, mut creds) = signed_in(&api).await;

    // Invalidate the token the client holds; the next mutation gets a 403,
    // refreshes, and retries
    api.invalidate_csrf();

    let cart = client
        .add_item(&mut creds, inkwell_core::ProductId::new(1), 1)
        .await
        .expect("add succeeds after one retry");
    assert_eq!(cart.items.len(), 1);

    // First attempt rejected + one retry = two POSTs
    assert_eq!(api.post_count("/cart/add_item/"), 2);
}

#[tokio::test]
async fn unauthenticated_request_maps_to_auth_required() {
    let api = StubApi::spawn().await;
    let client = client_for(&api);

    let mut creds = ApiCredentials::default();
    let result = client.current_cart(&mut creds).await;
    assert!(matches!(result, Err(ApiError::AuthRequired)));
}

#[tokio::test]
async fn invalid_credentials_map_to_auth_required() {
    let api = StubApi::spawn().await;
    let client = client_for(&api);

    let mut creds = ApiCredentials::default();
    let result = client.login(&mut creds, USERNAME, "wrong-pass-123").await;
    assert!(matches!(result, Err(ApiError::AuthRequired)));
}

#[tokio::test]
async fn server_error_payload_is_surfaced() {
    let api = StubApi::spawn().await;
    let (client, mut creds) = signed_in(&api).await;

    // Stock for product 1 is 5
    let result = client
        .add_item(&mut creds, inkwell_core::ProductId::new(1), 99)
        .await;

    match result {
        Err(err @ ApiError::Api { .. }) => {
            assert_eq!(err.user_message(), "Only 5 items available in stock.");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[tokio::test]
async fn both_list_shapes_are_normalized() {
    let api = StubApi::spawn().await;
    let client = client_for(&api);

    // Categories come back as a bare array
    let categories = client.categories().await.expect("categories fetch");
    assert_eq!(categories.len(), 2);

    // Products come back in a paginated envelope
    let products = client.products(None, None).await.expect("products fetch");
    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn product_filters_pass_through() {
    let api = StubApi::spawn().await;
    let client = client_for(&api);

    let fiction = client
        .products(Some("fiction"), None)
        .await
        .expect("filtered fetch");
    assert_eq!(fiction.len(), 1);
    assert_eq!(fiction.first().map(|p| p.slug.as_str()), Some("the-long-shelf"));

    let hits = client
        .products(None, Some("tote"))
        .await
        .expect("search fetch");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits.first().map(|p| p.slug.as_str()), Some("field-notes-tote"));
}

#[tokio::test]
async fn category_detail_resolves_by_slug() {
    let api = StubApi::spawn().await;
    let client = client_for(&api);

    let category = client.category("fiction").await.expect("category fetch");
    assert_eq!(category.name, "Fiction");

    let result = client.category("no-such-section").await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn missing_product_maps_to_not_found() {
    let api = StubApi::spawn().await;
    let client = client_for(&api);

    let result = client.product("no-such-book").await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn logout_invalidates_the_remote_session() {
    let api = StubApi::spawn().await;
    let (client, mut creds) = signed_in(&api).await;

    client.logout(&mut creds).await.expect("logout succeeds");
    assert!(creds.session.is_none(), "expired cookie cleared the credential");

    let result = client.current_cart(&mut creds).await;
    assert!(matches!(result, Err(ApiError::AuthRequired)));
}
