//! Shipping form collection and validation.
//!
//! Validation is synchronous and purely client-side field checks; the
//! commerce API re-validates everything on order creation. Nothing from this
//! form is persisted remotely until the payment step submits the order.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Email shape check. Deliberately loose; the commerce API is the authority.
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern is valid"));

/// Raw shipping form submission, straight from the request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl ShippingForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns per-field errors when any required field is blank or the email
    /// fails the shape check. On success every field comes back trimmed.
    pub fn validate(&self) -> Result<ShippingDetails, ShippingErrors> {
        let mut errors = ShippingErrors::default();

        if self.first_name.trim().is_empty() {
            errors.first_name = Some("First name is required".to_string());
        }
        if self.last_name.trim().is_empty() {
            errors.last_name = Some("Last name is required".to_string());
        }
        if self.email.trim().is_empty() {
            errors.email = Some("Email is required".to_string());
        } else if !EMAIL_RE.is_match(self.email.trim()) {
            errors.email = Some("Enter a valid email address".to_string());
        }
        if self.phone.trim().is_empty() {
            errors.phone = Some("Phone is required".to_string());
        }
        if self.address.trim().is_empty() {
            errors.address = Some("Address is required".to_string());
        }
        if self.city.trim().is_empty() {
            errors.city = Some("City is required".to_string());
        }
        if self.state.trim().is_empty() {
            errors.state = Some("State is required".to_string());
        }
        if self.postal_code.trim().is_empty() {
            errors.postal_code = Some("Postal code is required".to_string());
        }
        if self.country.trim().is_empty() {
            errors.country = Some("Country is required".to_string());
        }

        if errors.is_empty() {
            Ok(ShippingDetails {
                first_name: self.first_name.trim().to_string(),
                last_name: self.last_name.trim().to_string(),
                email: self.email.trim().to_string(),
                phone: self.phone.trim().to_string(),
                address: self.address.trim().to_string(),
                city: self.city.trim().to_string(),
                state: self.state.trim().to_string(),
                postal_code: self.postal_code.trim().to_string(),
                country: self.country.trim().to_string(),
            })
        } else {
            Err(errors)
        }
    }
}

/// Validated shipping details, held in the session for the duration of
/// checkout and submitted once as part of order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Per-field validation errors, rendered inline next to the offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingErrors {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl ShippingErrors {
    /// Whether the form passed validation.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
    }
}
