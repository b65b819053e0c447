//! Integration tests for the Inkwell storefront.
//!
//! The commerce API is stubbed with a small in-process axum server
//! ([`stub::StubApi`]) that mimics the real backend's contract: CSRF cookie
//! issuance, cookie-session auth, cart mutations returning the whole cart,
//! and order creation handing back a hosted checkout URL.
//!
//! Tests drive either the [`inkwell_storefront::api::CommerceClient`]
//! directly against the stub, or a full spawned storefront server with a
//! cookie-holding HTTP client standing in for the browser.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod stub;

use std::net::SocketAddr;

use axum::Router;
use secrecy::SecretString;

use inkwell_storefront::config::{CommerceApiConfig, SentryConfig, StorefrontConfig};
use inkwell_storefront::state::AppState;
use inkwell_storefront::{middleware, routes};

/// Spawn a storefront server wired to the given commerce API and return its
/// base URL.
pub async fn spawn_storefront(api_base_url: &str) -> String {
    let config = StorefrontConfig {
        host: "127.0.0.1".parse().expect("loopback address parses"),
        port: 0,
        base_url: "http://shop.test".to_string(),
        session_secret: SecretString::from(
            "k8Qw3rTz9XyB1mNp5EhL7cVd2FgJ4aSu6oIeRtYqUwZx",
        ),
        api: CommerceApiConfig {
            base_url: api_base_url.trim_end_matches('/').to_string(),
        },
        sentry: SentryConfig::default(),
    };

    let session_layer = middleware::create_session_layer(&config);
    let state = AppState::new(config);

    let app = Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind storefront listener");
    let addr = listener.local_addr().expect("storefront local addr");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("storefront server");
    });

    format!("http://{addr}")
}

/// An HTTP client that behaves like a browser for the storefront: keeps
/// cookies, never follows redirects (so tests can assert on `Location`).
#[must_use]
pub fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .expect("build test client")
}
