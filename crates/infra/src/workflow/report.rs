use serde::{Deserialize, Serialize};

use storebridge_storefront::ExternalSaleOrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CreateLead,
    CreateSalesOrder,
    ConfirmSalesOrder,
    CreatePaymentTransaction,
    WinLead,
}

impl core::fmt::Display for Step {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Step::CreateLead => "create_lead",
            Step::CreateSalesOrder => "create_sales_order",
            Step::ConfirmSalesOrder => "confirm_sales_order",
            Step::CreatePaymentTransaction => "create_payment_transaction",
            Step::WinLead => "win_lead",
        };
        f.write_str(name)
    }
}

/// Unmet precondition of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The record this step produces is already linked.
    AlreadyDone,
    CustomerNotMapped,
    BillingAddressNotMapped,
    ShippingAddressNotMapped,
    ProductNotMapped,
    NoLead,
    NoSalesOrder,
    /// The sales order is past the quotation states.
    NotAQuotation,
    /// The sales order is not confirmed yet.
    NotConfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    Skipped(SkipReason),
    /// The step ran but a business rule refused the change.
    Rejected(String),
}

impl StepOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied)
    }
}

/// What one `run` did to one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub order_id: ExternalSaleOrderId,
    /// Whether the storefront status allowed conversion. No step runs otherwise.
    pub allowed: bool,
    pub steps: Vec<(Step, StepOutcome)>,
}

impl RunReport {
    pub fn new(order_id: ExternalSaleOrderId) -> Self {
        Self {
            order_id,
            allowed: true,
            steps: Vec::new(),
        }
    }

    pub fn not_allowed(order_id: ExternalSaleOrderId) -> Self {
        Self {
            order_id,
            allowed: false,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push((step, outcome));
    }

    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    pub fn applied_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|(_, o)| o.is_applied())
            .map(|(s, _)| *s)
            .collect()
    }
}
