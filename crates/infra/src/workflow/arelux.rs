//! Arelux customization of the conversion workflow.
//!
//! - New leads get the customer's commercial classification, or fixed
//!   defaults when the order has no mapped customer.
//! - Light orders get the source's default carrier before confirmation.

use storebridge_crm::LeadClassification;

use crate::config::AreluxConfig;

use super::extension::{
    ConfirmationContext, ExtensionAction, LeadCreatedContext, WeightedLine, WorkflowExtension,
};

#[derive(Debug, Clone, Default)]
pub struct AreluxExtension {
    config: AreluxConfig,
}

impl AreluxExtension {
    pub fn new(config: AreluxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AreluxConfig {
        &self.config
    }
}

/// Grams shipped: product weight times quantity, ignoring weightless products
/// and non-positive quantities.
pub fn total_weight_grams(lines: &[WeightedLine]) -> u64 {
    lines
        .iter()
        .filter(|l| l.quantity > 0 && l.unit_weight_grams > 0)
        .map(|l| l.unit_weight_grams.saturating_mul(l.quantity as u64))
        .fold(0u64, u64::saturating_add)
}

impl WorkflowExtension for AreluxExtension {
    fn after_lead_created(&self, ctx: &LeadCreatedContext<'_>) -> Vec<ExtensionAction> {
        // A mapped customer's classification is copied as is, even when unset.
        let classification = match ctx.customer {
            Some(customer) => {
                let from_customer = customer.classification();
                LeadClassification {
                    activity_type: from_customer.activity_type.clone(),
                    customer_type: from_customer.customer_type.clone(),
                }
            }
            None => LeadClassification {
                activity_type: Some(self.config.default_activity_type.clone()),
                customer_type: Some(self.config.default_customer_type.clone()),
            },
        };

        if ctx.lead.classification() == &classification {
            return vec![];
        }

        vec![ExtensionAction::ClassifyLead {
            lead_id: ctx.lead.id_typed(),
            classification,
        }]
    }

    fn before_order_confirmed(&self, ctx: &ConfirmationContext<'_>) -> Vec<ExtensionAction> {
        let Some(carrier_id) = ctx.source.carrier else {
            return vec![];
        };

        let weight = total_weight_grams(ctx.lines);
        if weight > self.config.max_carrier_weight_grams {
            tracing::debug!(
                sales_order = %ctx.sales_order.name(),
                weight_grams = weight,
                "order too heavy for the default carrier"
            );
            return vec![];
        }

        vec![ExtensionAction::AssignCarrier {
            sales_order_id: ctx.sales_order.id_typed(),
            carrier_id,
        }]
    }
}
