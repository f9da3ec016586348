//! Hook points for deployment-specific behaviour.
//!
//! Hooks never touch storage. They inspect the records the orchestrator loaded
//! and return [`ExtensionAction`]s, which the orchestrator dispatches as
//! ordinary commands.

use std::sync::Arc;

use storebridge_crm::{Lead, LeadClassification, LeadId};
use storebridge_parties::Partner;
use storebridge_products::ProductId;
use storebridge_sales::{CarrierId, SalesOrder, SalesOrderId};
use storebridge_storefront::{ExternalSaleOrder, ExternalSource};

/// State available right after the order's lead is linked.
#[derive(Debug, Clone, Copy)]
pub struct LeadCreatedContext<'a> {
    pub order: &'a ExternalSaleOrder,
    pub source: &'a ExternalSource,
    pub lead: &'a Lead,
    /// Customer partner, when the order's customer is mapped.
    pub customer: Option<&'a Partner>,
}

/// Sales order line with the unit weight of its product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_weight_grams: u64,
}

/// State available before a draft or sent sales order is confirmed.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationContext<'a> {
    pub order: &'a ExternalSaleOrder,
    pub source: &'a ExternalSource,
    pub sales_order: &'a SalesOrder,
    pub lines: &'a [WeightedLine],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionAction {
    ClassifyLead {
        lead_id: LeadId,
        classification: LeadClassification,
    },
    AssignCarrier {
        sales_order_id: SalesOrderId,
        carrier_id: CarrierId,
    },
}

pub trait WorkflowExtension: Send + Sync {
    fn after_lead_created(&self, _ctx: &LeadCreatedContext<'_>) -> Vec<ExtensionAction> {
        vec![]
    }

    fn before_order_confirmed(&self, _ctx: &ConfirmationContext<'_>) -> Vec<ExtensionAction> {
        vec![]
    }
}

/// Base workflow without customization.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtension;

impl WorkflowExtension for NoExtension {}

impl<T> WorkflowExtension for Arc<T>
where
    T: WorkflowExtension + ?Sized,
{
    fn after_lead_created(&self, ctx: &LeadCreatedContext<'_>) -> Vec<ExtensionAction> {
        (**self).after_lead_created(ctx)
    }

    fn before_order_confirmed(&self, ctx: &ConfirmationContext<'_>) -> Vec<ExtensionAction> {
        (**self).before_order_confirmed(ctx)
    }
}
