//! Status enums for orders.
//!
//! The commerce API serializes both statuses as lowercase strings.

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Human-readable label for display.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether the order has left the warehouse.
    #[must_use]
    pub const fn is_shipped(&self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Payment settlement status.
///
/// Settlement is confirmed out-of-band by the payment processor's webhook to
/// the backend; the storefront only displays what the backend reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Human-readable label for display.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Payment pending",
            Self::Completed => "Paid",
            Self::Failed => "Payment failed",
            Self::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_serde_lowercase() {
        let status: OrderStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, OrderStatus::Processing);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"processing\"");
    }

    #[test]
    fn test_payment_status_serde_lowercase() {
        let status: PaymentStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, PaymentStatus::Completed);
    }

    #[test]
    fn test_is_shipped() {
        assert!(OrderStatus::Shipped.is_shipped());
        assert!(OrderStatus::Delivered.is_shipped());
        assert!(!OrderStatus::Pending.is_shipped());
        assert!(!OrderStatus::Cancelled.is_shipped());
    }

    #[test]
    fn test_labels() {
        assert_eq!(OrderStatus::Pending.label(), "Pending");
        assert_eq!(PaymentStatus::Completed.label(), "Paid");
    }
}
