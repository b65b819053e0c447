//! Explicit session-backed state containers.
//!
//! The cart, auth, and checkout state are the only mutable state in the
//! storefront. Each is owned by one store here and mutated only through the
//! store's operations; handlers receive a store by constructing it over the
//! request's session, never by reaching into another component's keys.
//!
//! Auth transitions drive the other stores explicitly: signing in is
//! followed by a cart fetch, signing out flushes everything.

use tower_sessions::Session;

use crate::api::types::Cart;
use crate::api::{ApiCredentials, ApiError};
use crate::checkout::CheckoutState;
use crate::error::Result;
use crate::models::{CurrentUser, session_keys};

// =============================================================================
// AuthStore
// =============================================================================

/// Auth state: the signed-in user and the remote API credentials.
pub struct AuthStore<'a> {
    session: &'a Session,
}

impl<'a> AuthStore<'a> {
    /// Wrap the request's session.
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// The signed-in user, if any.
    pub async fn current_user(&self) -> Option<CurrentUser> {
        self.session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
    }

    /// Record a successful login: the user record and the captured remote
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn sign_in(&self, user: &CurrentUser, creds: &ApiCredentials) -> Result<()> {
        self.session
            .insert(session_keys::CURRENT_USER, user)
            .await?;
        self.session
            .insert(session_keys::API_CREDENTIALS, creds)
            .await?;
        Ok(())
    }

    /// The remote API credentials for this session (empty if anonymous).
    pub async fn credentials(&self) -> ApiCredentials {
        self.session
            .get(session_keys::API_CREDENTIALS)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Persist credentials after an API call; the remote may have rotated
    /// its cookies on any response.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn save_credentials(&self, creds: &ApiCredentials) -> Result<()> {
        self.session
            .insert(session_keys::API_CREDENTIALS, creds)
            .await?;
        Ok(())
    }

    /// Sign out: destroy the whole session, which also clears the cart
    /// snapshot and any in-progress checkout.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be flushed.
    pub async fn sign_out(&self) -> Result<()> {
        self.session.flush().await?;
        Ok(())
    }
}

// =============================================================================
// CartStore
// =============================================================================

/// Cart state: the last server-authoritative snapshot.
///
/// Every successful mutation replaces the snapshot wholesale with the
/// server's response; a failed mutation leaves it untouched.
pub struct CartStore<'a> {
    session: &'a Session,
}

impl<'a> CartStore<'a> {
    /// Wrap the request's session.
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// The held snapshot, if any.
    pub async fn get(&self) -> Option<Cart> {
        self.session.get(session_keys::CART).await.ok().flatten()
    }

    /// Replace the snapshot with a fresh server payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn replace(&self, cart: &Cart) -> Result<()> {
        self.session.insert(session_keys::CART, cart).await?;
        Ok(())
    }

    /// Drop the snapshot (order placed, or signed out).
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn clear(&self) -> Result<()> {
        self.session.remove::<Cart>(session_keys::CART).await?;
        Ok(())
    }

    /// Fold a mutation outcome into the store.
    ///
    /// On success the snapshot is replaced with exactly the server's payload
    /// and returned. On failure the snapshot is untouched and the
    /// user-facing message comes back instead - except an authentication
    /// failure, which propagates so the web layer can redirect to login.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote session expired or the session store
    /// cannot be modified.
    pub async fn apply(
        &self,
        outcome: std::result::Result<Cart, ApiError>,
    ) -> Result<std::result::Result<Cart, String>> {
        match outcome {
            Ok(cart) => {
                self.replace(&cart).await?;
                Ok(Ok(cart))
            }
            Err(ApiError::AuthRequired) => Err(ApiError::AuthRequired.into()),
            Err(err) => Ok(Err(err.user_message())),
        }
    }
}

// =============================================================================
// CheckoutStore
// =============================================================================

/// Checkout state: which step the customer is on and the collected
/// shipping details.
pub struct CheckoutStore<'a> {
    session: &'a Session,
}

impl<'a> CheckoutStore<'a> {
    /// Wrap the request's session.
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// The in-progress state, starting at the shipping step.
    pub async fn get(&self) -> CheckoutState {
        self.session
            .get(session_keys::CHECKOUT)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Persist the state after a transition.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn set(&self, state: &CheckoutState) -> Result<()> {
        self.session.insert(session_keys::CHECKOUT, state).await?;
        Ok(())
    }

    /// Clear the flow, once an order has been created or abandoned.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn clear(&self) -> Result<()> {
        self.session
            .remove::<CheckoutState>(session_keys::CHECKOUT)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn cart(subtotal: &str) -> Cart {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "items": [{
                "id": 10,
                "product": {
                    "id": 1, "category": 1, "name": "Book", "slug": "book",
                    "price": subtotal, "stock": 5
                },
                "quantity": 1
            }],
            "subtotal": subtotal
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_apply_success_replaces_snapshot() {
        let session = session();
        let store = CartStore::new(&session);
        store.replace(&cart("10.00")).await.unwrap();

        let result = store.apply(Ok(cart("25.00"))).await.unwrap();
        assert!(result.is_ok());
        let held = store.get().await.unwrap();
        assert_eq!(held.subtotal, inkwell_core::Price::from_cents(2500));
    }

    #[tokio::test]
    async fn test_apply_failure_leaves_snapshot_untouched() {
        let session = session();
        let store = CartStore::new(&session);
        store.replace(&cart("10.00")).await.unwrap();
        let before = serde_json::to_string(&store.get().await.unwrap()).unwrap();

        let result = store
            .apply(Err(ApiError::Api {
                status: 400,
                message: "Only 3 items available in stock.".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(
            result.unwrap_err(),
            "Only 3 items available in stock."
        );
        let after = serde_json::to_string(&store.get().await.unwrap()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_apply_auth_failure_propagates() {
        let session = session();
        let store = CartStore::new(&session);
        let result = store.apply(Err(ApiError::AuthRequired)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_checkout_store_roundtrip() {
        let session = session();
        let store = CheckoutStore::new(&session);
        assert_eq!(store.get().await.step, crate::checkout::CheckoutStep::Shipping);

        let mut state = CheckoutState::default();
        state.advance_to_payment(crate::checkout::ShippingDetails {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "555".to_string(),
            address: "12 Way".to_string(),
            city: "London".to_string(),
            state: "LDN".to_string(),
            postal_code: "SW1".to_string(),
            country: "GB".to_string(),
        });
        store.set(&state).await.unwrap();
        assert!(store.get().await.ready_for_payment());

        store.clear().await.unwrap();
        assert!(!store.get().await.ready_for_payment());
    }
}
