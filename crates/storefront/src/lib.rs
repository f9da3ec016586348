//! Orders imported from e-commerce storefronts (Shopify, WooCommerce).
//!
//! An [`ExternalSaleOrder`] is a snapshot of a storefront order plus the links
//! to the native records produced from it (lead, sales order, payment
//! transaction). Each link is set at most once. [`ExternalSource`] holds the
//! per-storefront settings that drive conversion.

pub mod order;
pub mod source;
pub mod state;

pub use order::{
    AddressMapped, AddressRole, CustomerMapped, ExternalAddress, ExternalCustomer,
    ExternalDiscount, ExternalOrderData, ExternalOrderLine, ExternalProduct, ExternalSaleOrder,
    ExternalSaleOrderCommand, ExternalSaleOrderEvent, ExternalSaleOrderId, ExternalShippingLine,
    ImportOrder, LandingAttribution, LeadLinked, LinkLead, LinkPaymentTransaction,
    LinkSalesLine, LinkSalesOrder, MapAddress, MapCustomer, MapProduct, OrderImported,
    OrderTotals, PaymentTransactionLinked, ProductMapped, SalesLineLinked, SalesLineSource,
    SalesOrderLinked, SourceStateUpdated, UpdateSourceState,
};
pub use source::{ExternalSource, ExternalSourceId, SourceKind};
pub use state::{ShopifyState, WooCommerceState};
