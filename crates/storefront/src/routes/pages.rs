//! Static page route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;

use crate::filters;
use crate::middleware::OptionalAuth;

/// About page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub signed_in: bool,
}

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate {
    pub signed_in: bool,
}

/// Display the about page.
pub async fn about(OptionalAuth(auth): OptionalAuth) -> impl IntoResponse {
    AboutTemplate {
        signed_in: auth.is_some(),
    }
}

/// Display the contact page.
pub async fn contact(OptionalAuth(auth): OptionalAuth) -> impl IntoResponse {
    ContactTemplate {
        signed_in: auth.is_some(),
    }
}
