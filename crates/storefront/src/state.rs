//! Order statuses as reported by each storefront.

use serde::{Deserialize, Serialize};

/// WooCommerce order status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WooCommerceState {
    #[default]
    None,
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    Shipped,
}

impl WooCommerceState {
    /// Statuses in which the shop has taken the customer's money.
    pub fn allows_conversion(self) -> bool {
        matches!(
            self,
            WooCommerceState::Processing | WooCommerceState::Shipped | WooCommerceState::Completed
        )
    }
}

/// Shopify financial status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopifyState {
    #[default]
    None,
    Pending,
    Authorized,
    Paid,
    PartiallyPaid,
    Refunded,
    PartiallyRefunded,
    Voided,
}

impl ShopifyState {
    pub fn allows_conversion(self) -> bool {
        self == ShopifyState::Paid
    }
}
