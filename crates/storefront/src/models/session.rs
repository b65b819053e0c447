//! Session-related types.
//!
//! Everything the storefront remembers between requests lives in the session:
//! the signed-in user, the remote API credentials, the last cart snapshot,
//! and the in-progress checkout state.

use serde::{Deserialize, Serialize};

use inkwell_core::UserId;

use crate::api::types::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user and
/// pre-fill checkout forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's id on the commerce API.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Given name, may be empty.
    pub first_name: String,
    /// Family name, may be empty.
    pub last_name: String,
}

impl CurrentUser {
    /// Name to greet the user with: full name when known, username otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// Session keys for storefront state.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the remote commerce API credentials (session cookie + CSRF token).
    pub const API_CREDENTIALS: &str = "api_credentials";

    /// Key for the last server-authoritative cart snapshot.
    pub const CART: &str = "cart";

    /// Key for the in-progress checkout state.
    pub const CHECKOUT: &str = "checkout";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    #[test]
    fn test_display_name_full() {
        assert_eq!(user("Ada", "Lovelace").display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(user("", "").display_name(), "reader");
    }
}
