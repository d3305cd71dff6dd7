//! Status enums and their presentation mapping.
//!
//! The backend owns every state transition. These enums only decide how a
//! status is labelled and coloured, and which actions the UI offers.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipping,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Shipping,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire value used by the backend and in query strings.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipping => "shipping",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending confirmation",
            Self::Confirmed => "Confirmed",
            Self::Shipping => "Shipping",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// CSS classes for the status badge.
    #[must_use]
    pub const fn badge_class(&self) -> &'static str {
        match self {
            Self::Pending => "bg-yellow-100 text-yellow-800",
            Self::Confirmed => "bg-blue-100 text-blue-700",
            Self::Shipping => "bg-indigo-100 text-indigo-700",
            Self::Delivered => "bg-green-100 text-green-700",
            Self::Cancelled => "bg-gray-100 text-gray-600",
        }
    }

    /// Customers may only cancel orders the shop has not confirmed yet.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether no further transitions exist.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Statuses an admin may move the order to next.
    #[must_use]
    pub const fn next_statuses(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Shipping, Self::Cancelled],
            Self::Shipping => &[Self::Delivered],
            Self::Delivered | Self::Cancelled => &[],
        }
    }

    /// Position on the pending → confirmed → shipping → delivered track.
    ///
    /// Cancelled orders are off the track and return `None`.
    #[must_use]
    pub const fn progress_step(&self) -> Option<usize> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Shipping => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Human readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unpaid => "Unpaid",
            Self::Paid => "Paid",
            Self::Failed => "Payment failed",
            Self::Refunded => "Refunded",
        }
    }

    /// CSS classes for the status badge.
    #[must_use]
    pub const fn badge_class(&self) -> &'static str {
        match self {
            Self::Unpaid => "bg-yellow-100 text-yellow-800",
            Self::Paid => "bg-green-100 text-green-700",
            Self::Failed => "bg-red-100 text-red-700",
            Self::Refunded => "bg-gray-100 text-gray-600",
        }
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cod,
    /// Online payment through the VNPay gateway.
    Vnpay,
}

impl PaymentMethod {
    /// Wire value used by the backend and in forms.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Vnpay => "vnpay",
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Cod => "Cash on delivery",
            Self::Vnpay => "VNPay",
        }
    }

    /// Whether the order has to go through the online gateway.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        matches!(self, Self::Vnpay)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(Self::Cod),
            "vnpay" => Ok(Self::Vnpay),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Account role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
}

impl UserRole {
    /// Human readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Admin => "Administrator",
        }
    }

    /// Whether the account may use the admin panel.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_wire_format() {
        let status: OrderStatus = serde_json::from_str("\"shipping\"").unwrap();
        assert_eq!(status, OrderStatus::Shipping);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_only_pending_orders_are_cancellable() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_cancellable(), status == OrderStatus::Pending);
        }
    }

    #[test]
    fn test_next_statuses() {
        assert_eq!(
            OrderStatus::Pending.next_statuses(),
            &[OrderStatus::Confirmed, OrderStatus::Cancelled]
        );
        assert_eq!(
            OrderStatus::Confirmed.next_statuses(),
            &[OrderStatus::Shipping, OrderStatus::Cancelled]
        );
        assert_eq!(
            OrderStatus::Shipping.next_statuses(),
            &[OrderStatus::Delivered]
        );
        assert!(OrderStatus::Delivered.next_statuses().is_empty());
        assert!(OrderStatus::Cancelled.next_statuses().is_empty());
    }

    #[test]
    fn test_terminal_states_have_no_next_status() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), status.next_statuses().is_empty());
        }
    }

    #[test]
    fn test_progress_step() {
        assert_eq!(OrderStatus::Pending.progress_step(), Some(0));
        assert_eq!(OrderStatus::Delivered.progress_step(), Some(3));
        assert_eq!(OrderStatus::Cancelled.progress_step(), None);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        assert_eq!(
            "vnpay".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Vnpay
        );
        assert!("paypal".parse::<PaymentMethod>().is_err());
        assert!(PaymentMethod::Vnpay.is_online());
        assert!(!PaymentMethod::Cod.is_online());
    }

    #[test]
    fn test_user_role() {
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert!(role.is_admin());
        assert!(!UserRole::Customer.is_admin());
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }
}
