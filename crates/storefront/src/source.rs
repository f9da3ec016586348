//! Storefront configuration.

use serde::{Deserialize, Serialize};

use storebridge_core::UserId;
use storebridge_payments::AcquirerId;
use storebridge_products::ProductId;
use storebridge_sales::{CarrierId, PaymentModeId, PaymentTermId};

/// Storefront configuration reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalSourceId(pub u32);

impl core::fmt::Display for ExternalSourceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Shopify,
    WooCommerce,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Shopify => "shopify",
            SourceKind::WooCommerce => "woocommerce",
        }
    }
}

impl core::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of one storefront.
///
/// `url` is the shop host for Shopify (`shop.myshopify.com`) and the site base
/// URL including the trailing slash for WooCommerce (`https://shop.example/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSource {
    pub id: ExternalSourceId,
    pub kind: SourceKind,
    pub url: String,
    /// Salesperson owning leads and customers coming from this shop.
    pub salesperson: Option<UserId>,
    pub payment_mode: Option<PaymentModeId>,
    pub payment_term: Option<PaymentTermId>,
    /// Product used for shipping-cost lines.
    pub shipping_product: Option<ProductId>,
    pub payment_acquirer: Option<AcquirerId>,
    /// Carrier proposed for light parcels.
    pub carrier: Option<CarrierId>,
}

impl ExternalSource {
    pub fn new(id: ExternalSourceId, kind: SourceKind, url: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            url: url.into(),
            salesperson: None,
            payment_mode: None,
            payment_term: None,
            shipping_product: None,
            payment_acquirer: None,
            carrier: None,
        }
    }

    /// Back-office URL of an order on the storefront itself.
    pub fn order_url(&self, external_id: &str) -> String {
        match self.kind {
            SourceKind::Shopify => format!("https://{}/admin/orders/{}", self.url, external_id),
            SourceKind::WooCommerce => {
                format!("{}wp-admin/post.php?post={}&action=edit", self.url, external_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shopify_order_url_points_to_admin() {
        let source = ExternalSource::new(ExternalSourceId(1), SourceKind::Shopify, "tiles.myshopify.com");
        assert_eq!(
            source.order_url("4501"),
            "https://tiles.myshopify.com/admin/orders/4501"
        );
    }

    #[test]
    fn woocommerce_order_url_points_to_post_editor() {
        let source = ExternalSource::new(
            ExternalSourceId(2),
            SourceKind::WooCommerce,
            "https://shop.example/",
        );
        assert_eq!(
            source.order_url("88"),
            "https://shop.example/wp-admin/post.php?post=88&action=edit"
        );
    }
}
