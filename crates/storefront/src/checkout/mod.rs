//! Checkout orchestration.
//!
//! A small linear flow: Shipping -> Payment -> (external redirect) ->
//! Success. The orchestrator collects shipping details, builds one
//! order-creation request, and hands the browser off to the payment
//! processor's hosted page. Reconciliation happens on the redirect back,
//! keyed by the processor's session id; settlement itself is confirmed
//! out-of-band between the processor and the backend.
//!
//! Payment may step back to Shipping; once an order is created the state is
//! cleared, so there is nothing to step back *from* after Success.

mod shipping;

pub use shipping::{ShippingDetails, ShippingErrors, ShippingForm};

use serde::{Deserialize, Serialize};

use crate::api::types::{Cart, CreateOrderRequest};
use crate::models::CurrentUser;

/// The literal placeholder the payment processor substitutes with its
/// checkout session id. Must reach the order-creation endpoint unmodified.
pub const CHECKOUT_SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Current step of the checkout flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    Shipping,
    Payment,
}

/// In-progress checkout state, held in the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutState {
    pub step: CheckoutStep,
    /// Present once the shipping form has validated.
    pub shipping: Option<ShippingDetails>,
}

impl CheckoutState {
    /// Advance to the payment step with validated shipping details.
    pub fn advance_to_payment(&mut self, details: ShippingDetails) {
        self.shipping = Some(details);
        self.step = CheckoutStep::Payment;
    }

    /// Step back from payment to the shipping form. The collected details
    /// are kept so the form re-renders pre-filled.
    pub const fn back_to_shipping(&mut self) {
        self.step = CheckoutStep::Shipping;
    }

    /// Whether the payment step may render: it needs shipping details.
    #[must_use]
    pub const fn ready_for_payment(&self) -> bool {
        matches!(self.step, CheckoutStep::Payment) && self.shipping.is_some()
    }
}

/// Where the entry guard sends a visitor who may not check out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryGuard {
    /// Not signed in: go log in first.
    Login,
    /// Nothing to buy: back to the cart page.
    Cart,
}

impl EntryGuard {
    /// The redirect target for this guard.
    #[must_use]
    pub const fn redirect_target(&self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Cart => "/cart",
        }
    }
}

/// Evaluate the checkout entry guard.
///
/// Checked on every checkout route, not just the first: the cart and the
/// session can change underneath an in-progress checkout. Authentication is
/// checked before the cart, so an anonymous visitor with an empty cart lands
/// on the login page.
#[must_use]
pub fn entry_guard(user: Option<&CurrentUser>, cart: Option<&Cart>) -> Option<EntryGuard> {
    if user.is_none() {
        return Some(EntryGuard::Login);
    }
    match cart {
        Some(cart) if !cart.is_empty() => None,
        _ => Some(EntryGuard::Cart),
    }
}

/// Build the order-creation request for the payment step.
///
/// Combines the validated shipping details, the coupon carried over from the
/// cart (if any), and the redirect URLs: a success URL templated with the
/// processor's session-id placeholder and a cancel URL pointing back to the
/// cart.
#[must_use]
pub fn build_order_request(
    details: &ShippingDetails,
    coupon_code: Option<&str>,
    base_url: &str,
) -> CreateOrderRequest {
    let base = base_url.trim_end_matches('/');
    CreateOrderRequest {
        email: details.email.clone(),
        first_name: details.first_name.clone(),
        last_name: details.last_name.clone(),
        phone: details.phone.clone(),
        address_line1: details.address.clone(),
        address_line2: String::new(),
        city: details.city.clone(),
        state: details.state.clone(),
        postal_code: details.postal_code.clone(),
        country: details.country.clone(),
        coupon_code: coupon_code.map(str::to_string),
        success_url: format!("{base}/order/success?session_id={CHECKOUT_SESSION_PLACEHOLDER}"),
        cancel_url: format!("{base}/cart"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use inkwell_core::UserId;
    use serde_json::json;

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    fn cart(empty: bool) -> Cart {
        let items = if empty {
            json!([])
        } else {
            json!([{
                "id": 1,
                "product": {
                    "id": 1, "category": 1, "name": "Book", "slug": "book",
                    "price": "10.00", "stock": 3
                },
                "quantity": 1
            }])
        };
        serde_json::from_value(json!({
            "id": 1,
            "items": items,
            "subtotal": "10.00"
        }))
        .unwrap()
    }

    fn details() -> ShippingDetails {
        ShippingDetails {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "555-1234".to_string(),
            address: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "LDN".to_string(),
            postal_code: "SW1A 1AA".to_string(),
            country: "GB".to_string(),
        }
    }

    #[test]
    fn test_entry_guard_unauthenticated() {
        // Auth is checked first, even with a full cart
        assert_eq!(
            entry_guard(None, Some(&cart(false))),
            Some(EntryGuard::Login)
        );
        assert_eq!(EntryGuard::Login.redirect_target(), "/login");
    }

    #[test]
    fn test_entry_guard_empty_cart() {
        let user = user();
        assert_eq!(
            entry_guard(Some(&user), Some(&cart(true))),
            Some(EntryGuard::Cart)
        );
        assert_eq!(entry_guard(Some(&user), None), Some(EntryGuard::Cart));
        assert_eq!(EntryGuard::Cart.redirect_target(), "/cart");
    }

    #[test]
    fn test_entry_guard_passes() {
        let user = user();
        assert_eq!(entry_guard(Some(&user), Some(&cart(false))), None);
    }

    #[test]
    fn test_step_transitions() {
        let mut state = CheckoutState::default();
        assert_eq!(state.step, CheckoutStep::Shipping);
        assert!(!state.ready_for_payment());

        state.advance_to_payment(details());
        assert_eq!(state.step, CheckoutStep::Payment);
        assert!(state.ready_for_payment());

        // Backward transition keeps the collected details
        state.back_to_shipping();
        assert_eq!(state.step, CheckoutStep::Shipping);
        assert_eq!(state.shipping, Some(details()));
    }

    #[test]
    fn test_payment_step_requires_shipping_details() {
        let state = CheckoutState {
            step: CheckoutStep::Payment,
            shipping: None,
        };
        assert!(!state.ready_for_payment());
    }

    #[test]
    fn test_build_order_request_urls() {
        let request = build_order_request(&details(), None, "https://shop.example.com");
        assert_eq!(
            request.success_url,
            "https://shop.example.com/order/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(request.cancel_url, "https://shop.example.com/cart");
    }

    #[test]
    fn test_build_order_request_trims_trailing_slash() {
        let request = build_order_request(&details(), None, "https://shop.example.com/");
        assert_eq!(request.cancel_url, "https://shop.example.com/cart");
    }

    #[test]
    fn test_build_order_request_carries_coupon() {
        let request =
            build_order_request(&details(), Some("WELCOME10"), "https://shop.example.com");
        assert_eq!(request.coupon_code.as_deref(), Some("WELCOME10"));

        let request = build_order_request(&details(), None, "https://shop.example.com");
        assert!(request.coupon_code.is_none());
    }

    #[test]
    fn test_build_order_request_maps_address_fields() {
        let request = build_order_request(&details(), None, "https://shop.example.com");
        assert_eq!(request.address_line1, "12 Analytical Way");
        assert_eq!(request.address_line2, "");
        assert_eq!(request.email, "ada@example.com");
    }
}
