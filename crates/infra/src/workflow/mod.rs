//! Conversion of imported storefront orders into native records.
//!
//! [`ExternalOrderWorkflow::run`] advances one order through five steps, in
//! this order: lead, sales order, confirmation, payment transaction, lead win.
//! Nothing runs unless the storefront status allows it. Each step checks its
//! own preconditions against freshly loaded state, so running an order twice
//! is harmless. A failing step stops the run; earlier steps are not undone.

pub mod arelux;
pub mod extension;
pub mod report;

#[cfg(test)]
mod scenario_tests;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use storebridge_core::{AggregateId, TenantId};
use storebridge_crm::{
    AssignPartner, ClassifyLead, Lead, LeadCommand, LeadId, LeadKind, MarkWon, OpenLead,
};
use storebridge_events::{EventBus, EventEnvelope};
use storebridge_parties::{AssignSalesperson, Partner, PartnerCommand, PartyId};
use storebridge_payments::{
    CreateTransaction, MarkDone, PaymentTransaction, TransactionCommand, TransactionId,
};
use storebridge_products::{Product, ProductId, UomId};
use storebridge_sales::{
    AddLine, ConfirmOrder, CreateSalesOrder, SalesOrder, SalesOrderCommand, SalesOrderEvent,
    SalesOrderHeader, SalesOrderId, SalesOrderStatus, SetCarrier,
};
use storebridge_storefront::{
    ExternalOrderData, ExternalSaleOrder, ExternalSaleOrderCommand, ExternalSaleOrderId,
    ExternalSource, ExternalSourceId, LinkLead, LinkPaymentTransaction, LinkSalesLine,
    LinkSalesOrder, SalesLineSource,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::config::WorkflowConfig;
use crate::event_store::EventStore;
use crate::read_model::TenantStore;

pub use arelux::AreluxExtension;
pub use extension::{
    ConfirmationContext, ExtensionAction, LeadCreatedContext, NoExtension, WeightedLine,
    WorkflowExtension,
};
pub use report::{RunReport, SkipReason, Step, StepOutcome};

pub const ORDER_AGGREGATE: &str = "storefront.order";
pub const PARTNER_AGGREGATE: &str = "parties.partner";
pub const PRODUCT_AGGREGATE: &str = "products.product";
pub const LEAD_AGGREGATE: &str = "crm.lead";
pub const SALES_ORDER_AGGREGATE: &str = "sales.order";
pub const TRANSACTION_AGGREGATE: &str = "payments.transaction";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("external sale order {0} not found")]
    OrderNotFound(ExternalSaleOrderId),
    #[error("external source {0} is not configured")]
    SourceNotFound(ExternalSourceId),
    #[error("{kind} {id} referenced by the order does not exist")]
    MissingRecord { kind: &'static str, id: AggregateId },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Partners and products a sales order is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrderPreconditions {
    pub customer: PartyId,
    pub invoice_partner: PartyId,
    pub shipping_partner: PartyId,
    /// Mapped product of each order line, by line index.
    pub products: Vec<ProductId>,
}

impl SalesOrderPreconditions {
    pub fn check(data: &ExternalOrderData) -> Result<Self, SkipReason> {
        let customer = data.customer_partner().ok_or(SkipReason::CustomerNotMapped)?;
        let invoice_partner = data
            .billing_partner()
            .ok_or(SkipReason::BillingAddressNotMapped)?;
        let shipping_partner = data
            .shipping_partner()
            .ok_or(SkipReason::ShippingAddressNotMapped)?;
        let products = data
            .lines
            .iter()
            .map(|l| l.product_id().ok_or(SkipReason::ProductNotMapped))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            customer,
            invoice_partner,
            shipping_partner,
            products,
        })
    }
}

fn order_aggregate(_: TenantId, id: AggregateId) -> ExternalSaleOrder {
    ExternalSaleOrder::empty(ExternalSaleOrderId::new(id))
}

fn partner_aggregate(_: TenantId, id: AggregateId) -> Partner {
    Partner::empty(PartyId::new(id))
}

fn product_aggregate(_: TenantId, id: AggregateId) -> Product {
    Product::empty(ProductId::new(id))
}

fn lead_aggregate(_: TenantId, id: AggregateId) -> Lead {
    Lead::empty(LeadId::new(id))
}

fn sales_order_aggregate(_: TenantId, id: AggregateId) -> SalesOrder {
    SalesOrder::empty(SalesOrderId::new(id))
}

fn transaction_aggregate(_: TenantId, id: AggregateId) -> PaymentTransaction {
    PaymentTransaction::empty(TransactionId::new(id))
}

/// Orchestrator of the order conversion steps.
///
/// Storefront settings come from `sources`; records are read and written
/// through the dispatcher. `X` customizes the lead and confirmation steps.
pub struct ExternalOrderWorkflow<S, B, R, X = NoExtension> {
    dispatcher: CommandDispatcher<S, B>,
    sources: R,
    config: WorkflowConfig,
    extension: X,
    clock: fn() -> DateTime<Utc>,
}

impl<S, B, R> ExternalOrderWorkflow<S, B, R, NoExtension> {
    pub fn new(dispatcher: CommandDispatcher<S, B>, sources: R, config: WorkflowConfig) -> Self {
        Self {
            dispatcher,
            sources,
            config,
            extension: NoExtension,
            clock: Utc::now,
        }
    }
}

impl<S, B, R, X> ExternalOrderWorkflow<S, B, R, X> {
    pub fn with_extension<Y>(self, extension: Y) -> ExternalOrderWorkflow<S, B, R, Y> {
        ExternalOrderWorkflow {
            dispatcher: self.dispatcher,
            sources: self.sources,
            config: self.config,
            extension,
            clock: self.clock,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn sources(&self) -> &R {
        &self.sources
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

impl<S, B, R, X> ExternalOrderWorkflow<S, B, R, X>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: TenantStore<ExternalSourceId, ExternalSource>,
    X: WorkflowExtension,
{
    pub fn load_order(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<ExternalSaleOrder, WorkflowError> {
        self.dispatcher
            .load(tenant_id, order_id.0, order_aggregate)?
            .filter(ExternalSaleOrder::is_created)
            .ok_or(WorkflowError::OrderNotFound(order_id))
    }

    /// Whether the order may be converted. False when its source is not
    /// configured for the tenant.
    pub fn allow_create(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<bool, WorkflowError> {
        let order = self.load_order(tenant_id, order_id)?;
        let Some(data) = order.data() else {
            return Ok(false);
        };
        if self.sources.get(tenant_id, &data.source_id).is_none() {
            tracing::debug!(
                order_id = %order_id,
                source_id = %data.source_id,
                "order source is not configured"
            );
            return Ok(false);
        }
        Ok(order.allow_create())
    }

    /// Run every step in sequence when the gate passes.
    pub fn run(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<RunReport, WorkflowError> {
        if !self.allow_create(tenant_id, order_id)? {
            tracing::info!(
                tenant_id = %tenant_id,
                order_id = %order_id,
                "storefront status does not allow conversion"
            );
            return Ok(RunReport::not_allowed(order_id));
        }

        let mut report = RunReport::new(order_id);
        report.record(Step::CreateLead, self.create_lead(tenant_id, order_id)?);
        report.record(Step::CreateSalesOrder, self.create_sales_order(tenant_id, order_id)?);
        report.record(Step::ConfirmSalesOrder, self.confirm_sales_order(tenant_id, order_id)?);
        report.record(
            Step::CreatePaymentTransaction,
            self.create_payment_transaction(tenant_id, order_id)?,
        );
        report.record(Step::WinLead, self.win_lead(tenant_id, order_id)?);

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            applied = ?report.applied_steps(),
            "external order run finished"
        );
        Ok(report)
    }

    /// Run only orders that have no sales order yet. `None` when skipped.
    pub fn run_if_pending(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<Option<RunReport>, WorkflowError> {
        let order = self.load_order(tenant_id, order_id)?;
        if order.sales_order().is_some() {
            return Ok(None);
        }
        self.run(tenant_id, order_id).map(Some)
    }

    /// Apply [`Self::run_if_pending`] to each order. A failure on one order
    /// does not stop the others.
    pub fn run_many(
        &self,
        tenant_id: TenantId,
        order_ids: &[ExternalSaleOrderId],
    ) -> Vec<(ExternalSaleOrderId, Result<Option<RunReport>, WorkflowError>)> {
        order_ids
            .iter()
            .map(|&order_id| {
                let result = self.run_if_pending(tenant_id, order_id);
                if let Err(err) = &result {
                    tracing::warn!(order_id = %order_id, "external order run failed: {err}");
                }
                (order_id, result)
            })
            .collect()
    }

    /// Open an opportunity for the order's customer and link it.
    ///
    /// The extension's `after_lead_created` hook runs whenever the order ends
    /// up with a lead, including when it was linked by an earlier run.
    pub fn create_lead(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<StepOutcome, WorkflowError> {
        let outcome = self.open_lead(tenant_id, order_id)?;

        let order = self.load_order(tenant_id, order_id)?;
        if let (Some(lead_id), Some(data)) = (order.lead(), order.data()) {
            let source = self.source(tenant_id, data.source_id)?;
            let lead = self.load_lead(tenant_id, lead_id)?;
            let customer = match data.customer_partner() {
                Some(id) => Some(self.load_partner(tenant_id, id)?),
                None => None,
            };
            let actions = self.extension.after_lead_created(&LeadCreatedContext {
                order: &order,
                source: &source,
                lead: &lead,
                customer: customer.as_ref(),
            });
            self.apply_actions(tenant_id, actions)?;
        }

        Ok(outcome)
    }

    fn open_lead(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<StepOutcome, WorkflowError> {
        let order = self.load_order(tenant_id, order_id)?;
        let data = order.data().ok_or(WorkflowError::OrderNotFound(order_id))?;

        if order.lead().is_some() {
            return Ok(StepOutcome::Skipped(SkipReason::AlreadyDone));
        }
        let Some(customer_id) = data.customer_partner() else {
            return Ok(StepOutcome::Skipped(SkipReason::CustomerNotMapped));
        };

        let source = self.source(tenant_id, data.source_id)?;
        let customer = self.load_partner(tenant_id, customer_id)?;
        let now = self.now();
        let lead_id = LeadId::new(AggregateId::new());

        self.dispatcher.dispatch(
            tenant_id,
            lead_id.0,
            LEAD_AGGREGATE,
            LeadCommand::OpenLead(OpenLead {
                tenant_id,
                lead_id,
                kind: LeadKind::Opportunity,
                name: format!("{} {}", data.source_kind, data.number),
                origin_ref: Some(order_id.0),
                team: Some(self.config.default_team),
                salesperson: source.salesperson,
                probability: self.config.lead_probability,
                deadline: Some(now + Duration::days(self.config.lead_deadline_days)),
                occurred_at: now,
            }),
            lead_aggregate,
        )?;

        self.dispatcher.dispatch(
            tenant_id,
            lead_id.0,
            LEAD_AGGREGATE,
            LeadCommand::AssignPartner(AssignPartner {
                tenant_id,
                lead_id,
                partner_id: customer_id,
                contact_name: Some(customer.name().to_string()),
                email: customer.contact().email.clone(),
                phone: customer.contact().phone.clone(),
                occurred_at: now,
            }),
            lead_aggregate,
        )?;

        if let Some(salesperson) = source.salesperson {
            if customer.salesperson().is_none() {
                self.dispatcher.dispatch(
                    tenant_id,
                    customer_id.0,
                    PARTNER_AGGREGATE,
                    PartnerCommand::AssignSalesperson(AssignSalesperson {
                        tenant_id,
                        party_id: customer_id,
                        salesperson,
                        occurred_at: now,
                    }),
                    partner_aggregate,
                )?;
            }
        }

        self.dispatch_order(
            tenant_id,
            order_id,
            ExternalSaleOrderCommand::LinkLead(LinkLead {
                tenant_id,
                order_id,
                lead_id,
                occurred_at: now,
            }),
        )?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            lead_id = %lead_id,
            "lead created for external order"
        );
        Ok(StepOutcome::Applied)
    }

    /// Build a draft sales order from the order's lines and link it.
    pub fn create_sales_order(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<StepOutcome, WorkflowError> {
        let order = self.load_order(tenant_id, order_id)?;
        let data = order.data().ok_or(WorkflowError::OrderNotFound(order_id))?;

        if order.sales_order().is_some() {
            return Ok(StepOutcome::Skipped(SkipReason::AlreadyDone));
        }
        let preconditions = match SalesOrderPreconditions::check(data) {
            Ok(p) => p,
            Err(reason) => return Ok(StepOutcome::Skipped(reason)),
        };

        let source = self.source(tenant_id, data.source_id)?;
        let lead = match order.lead() {
            Some(id) => Some(self.load_lead(tenant_id, id)?),
            None => None,
        };
        let now = self.now();
        let sales_order_id = SalesOrderId::new(AggregateId::new());

        let header = SalesOrderHeader {
            name: format!("{}{}", self.config.sales_order_prefix, data.number),
            origin_ref: Some(order_id.0),
            origin: lead.as_ref().map(|l| l.name().to_string()),
            opportunity: order.lead(),
            team: lead
                .as_ref()
                .and_then(Lead::team)
                .or(Some(self.config.default_team)),
            partner: lead
                .as_ref()
                .and_then(Lead::partner)
                .unwrap_or(preconditions.customer),
            invoice_partner: preconditions.invoice_partner,
            shipping_partner: preconditions.shipping_partner,
            date_order: data.date,
            salesperson: lead.as_ref().and_then(Lead::salesperson),
            payment_mode: source.payment_mode,
            payment_term: source.payment_term,
        };
        let name = header.name.clone();

        self.dispatcher.dispatch(
            tenant_id,
            sales_order_id.0,
            SALES_ORDER_AGGREGATE,
            SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                tenant_id,
                order_id: sales_order_id,
                header,
                occurred_at: now,
            }),
            sales_order_aggregate,
        )?;
        self.dispatch_order(
            tenant_id,
            order_id,
            ExternalSaleOrderCommand::LinkSalesOrder(LinkSalesOrder {
                tenant_id,
                order_id,
                sales_order_id,
                occurred_at: now,
            }),
        )?;

        for (idx, shipping) in data.shipping_lines.iter().enumerate() {
            let Some(product_id) = source.shipping_product else {
                tracing::warn!(
                    order_id = %order_id,
                    source_id = %source.id,
                    "source has no shipping product, shipping line '{}' skipped",
                    shipping.title
                );
                continue;
            };
            let line_no = self.add_line(
                tenant_id,
                AddLine {
                    tenant_id,
                    order_id: sales_order_id,
                    product_id,
                    description: shipping.title.clone(),
                    quantity: 1,
                    uom: self.product_uom(tenant_id, product_id)?,
                    unit_price: shipping.unit_price_without_tax,
                    discount_percent: 0,
                    occurred_at: now,
                },
            )?;
            self.link_sales_line(tenant_id, order_id, SalesLineSource::Shipping(idx), line_no, now)?;
        }

        for (idx, (line, product_id)) in data.lines.iter().zip(&preconditions.products).enumerate() {
            let line_no = self.add_line(
                tenant_id,
                AddLine {
                    tenant_id,
                    order_id: sales_order_id,
                    product_id: *product_id,
                    description: line.title.clone(),
                    quantity: line.quantity,
                    uom: self.product_uom(tenant_id, *product_id)?,
                    unit_price: line.unit_price_without_tax,
                    discount_percent: 0,
                    occurred_at: now,
                },
            )?;
            self.link_sales_line(tenant_id, order_id, SalesLineSource::Product(idx), line_no, now)?;
        }

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            sales_order = %name,
            "sales order created for external order"
        );
        Ok(StepOutcome::Applied)
    }

    /// Confirm the linked quotation, unless its customer has no tax id.
    pub fn confirm_sales_order(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<StepOutcome, WorkflowError> {
        let order = self.load_order(tenant_id, order_id)?;
        let data = order.data().ok_or(WorkflowError::OrderNotFound(order_id))?;

        let Some(sales_order_id) = order.sales_order() else {
            return Ok(StepOutcome::Skipped(SkipReason::NoSalesOrder));
        };
        let sales_order = self.load_sales_order(tenant_id, sales_order_id)?;
        if !sales_order.is_quotation() {
            return Ok(StepOutcome::Skipped(SkipReason::NotAQuotation));
        }

        let source = self.source(tenant_id, data.source_id)?;
        let lines = self.weighted_lines(tenant_id, &sales_order)?;
        let actions = self.extension.before_order_confirmed(&ConfirmationContext {
            order: &order,
            source: &source,
            sales_order: &sales_order,
            lines: &lines,
        });
        self.apply_actions(tenant_id, actions)?;

        let partner_id = sales_order.partner().ok_or(WorkflowError::MissingRecord {
            kind: "sales order",
            id: sales_order_id.0,
        })?;
        let partner = self.load_partner(tenant_id, partner_id)?;
        if !partner.has_vat() {
            let message = format!(
                "order {} cannot be confirmed because the customer has no tax id",
                sales_order.name()
            );
            tracing::info!(tenant_id = %tenant_id, order_id = %order_id, "{message}");
            return Ok(StepOutcome::Rejected(message));
        }

        self.dispatcher.dispatch(
            tenant_id,
            sales_order_id.0,
            SALES_ORDER_AGGREGATE,
            SalesOrderCommand::ConfirmOrder(ConfirmOrder {
                tenant_id,
                order_id: sales_order_id,
                occurred_at: self.now(),
            }),
            sales_order_aggregate,
        )?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            sales_order = %sales_order.name(),
            "sales order confirmed"
        );
        Ok(StepOutcome::Applied)
    }

    /// Record the storefront payment as a done transaction and link it.
    pub fn create_payment_transaction(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<StepOutcome, WorkflowError> {
        let order = self.load_order(tenant_id, order_id)?;
        let data = order.data().ok_or(WorkflowError::OrderNotFound(order_id))?;

        if order.payment_transaction().is_some() {
            return Ok(StepOutcome::Skipped(SkipReason::AlreadyDone));
        }
        let Some(sales_order_id) = order.sales_order() else {
            return Ok(StepOutcome::Skipped(SkipReason::NoSalesOrder));
        };
        let Some(customer_id) = data.customer_partner() else {
            return Ok(StepOutcome::Skipped(SkipReason::CustomerNotMapped));
        };

        let source = self.source(tenant_id, data.source_id)?;
        let sales_order = self.load_sales_order(tenant_id, sales_order_id)?;
        let now = self.now();
        let transaction_id = TransactionId::new(AggregateId::new());

        self.dispatcher.dispatch(
            tenant_id,
            transaction_id.0,
            TRANSACTION_AGGREGATE,
            TransactionCommand::CreateTransaction(CreateTransaction {
                tenant_id,
                transaction_id,
                reference: sales_order.name().to_string(),
                sales_order: Some(sales_order_id),
                amount: data.total_price(),
                partner: customer_id,
                acquirer: source.payment_acquirer,
                date_validate: Some(data.date),
                occurred_at: now,
            }),
            transaction_aggregate,
        )?;
        self.dispatcher.dispatch(
            tenant_id,
            transaction_id.0,
            TRANSACTION_AGGREGATE,
            TransactionCommand::MarkDone(MarkDone {
                tenant_id,
                transaction_id,
                occurred_at: now,
            }),
            transaction_aggregate,
        )?;
        self.dispatch_order(
            tenant_id,
            order_id,
            ExternalSaleOrderCommand::LinkPaymentTransaction(LinkPaymentTransaction {
                tenant_id,
                order_id,
                transaction_id,
                occurred_at: now,
            }),
        )?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            amount = %data.total_price(),
            "payment transaction recorded"
        );
        Ok(StepOutcome::Applied)
    }

    /// Payment step for orders converted before payments were recorded.
    pub fn create_payment_transaction_if_missing(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<StepOutcome, WorkflowError> {
        let order = self.load_order(tenant_id, order_id)?;
        if order.payment_transaction().is_some() {
            return Ok(StepOutcome::Skipped(SkipReason::AlreadyDone));
        }
        self.create_payment_transaction(tenant_id, order_id)
    }

    /// Mark the lead won once its sales order is confirmed.
    pub fn win_lead(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<StepOutcome, WorkflowError> {
        let order = self.load_order(tenant_id, order_id)?;

        let Some(lead_id) = order.lead() else {
            return Ok(StepOutcome::Skipped(SkipReason::NoLead));
        };
        let Some(sales_order_id) = order.sales_order() else {
            return Ok(StepOutcome::Skipped(SkipReason::NoSalesOrder));
        };
        let sales_order = self.load_sales_order(tenant_id, sales_order_id)?;
        if sales_order.status() != SalesOrderStatus::Sale {
            return Ok(StepOutcome::Skipped(SkipReason::NotConfirmed));
        }
        let lead = self.load_lead(tenant_id, lead_id)?;
        if lead.probability() >= 100 {
            return Ok(StepOutcome::Skipped(SkipReason::AlreadyDone));
        }

        self.dispatcher.dispatch(
            tenant_id,
            lead_id.0,
            LEAD_AGGREGATE,
            LeadCommand::MarkWon(MarkWon {
                tenant_id,
                lead_id,
                occurred_at: self.now(),
            }),
            lead_aggregate,
        )?;

        tracing::info!(tenant_id = %tenant_id, order_id = %order_id, lead_id = %lead_id, "lead won");
        Ok(StepOutcome::Applied)
    }

    fn apply_actions(
        &self,
        tenant_id: TenantId,
        actions: Vec<ExtensionAction>,
    ) -> Result<(), WorkflowError> {
        for action in actions {
            tracing::debug!(tenant_id = %tenant_id, ?action, "applying extension action");
            match action {
                ExtensionAction::ClassifyLead {
                    lead_id,
                    classification,
                } => {
                    self.dispatcher.dispatch(
                        tenant_id,
                        lead_id.0,
                        LEAD_AGGREGATE,
                        LeadCommand::ClassifyLead(ClassifyLead {
                            tenant_id,
                            lead_id,
                            classification,
                            occurred_at: self.now(),
                        }),
                        lead_aggregate,
                    )?;
                }
                ExtensionAction::AssignCarrier {
                    sales_order_id,
                    carrier_id,
                } => {
                    self.dispatcher.dispatch(
                        tenant_id,
                        sales_order_id.0,
                        SALES_ORDER_AGGREGATE,
                        SalesOrderCommand::SetCarrier(SetCarrier {
                            tenant_id,
                            order_id: sales_order_id,
                            carrier_id,
                            occurred_at: self.now(),
                        }),
                        sales_order_aggregate,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn dispatch_order(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
        command: ExternalSaleOrderCommand,
    ) -> Result<(), WorkflowError> {
        self.dispatcher
            .dispatch(tenant_id, order_id.0, ORDER_AGGREGATE, command, order_aggregate)?;
        Ok(())
    }

    /// Add a line and return the number the sales order gave it.
    fn add_line(&self, tenant_id: TenantId, command: AddLine) -> Result<u32, WorkflowError> {
        let sales_order_id = command.order_id;
        let committed = self.dispatcher.dispatch(
            tenant_id,
            sales_order_id.0,
            SALES_ORDER_AGGREGATE,
            SalesOrderCommand::AddLine(command),
            sales_order_aggregate,
        )?;

        committed
            .into_iter()
            .find_map(|stored| match serde_json::from_value(stored.payload) {
                Ok(SalesOrderEvent::LineAdded(e)) => Some(e.line.line_no),
                _ => None,
            })
            .ok_or_else(|| {
                DispatchError::Deserialize("AddLine committed no line_added event".to_string())
                    .into()
            })
    }

    fn link_sales_line(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
        source: SalesLineSource,
        sales_line_no: u32,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        self.dispatch_order(
            tenant_id,
            order_id,
            ExternalSaleOrderCommand::LinkSalesLine(LinkSalesLine {
                tenant_id,
                order_id,
                source,
                sales_line_no,
                occurred_at,
            }),
        )
    }

    fn weighted_lines(
        &self,
        tenant_id: TenantId,
        sales_order: &SalesOrder,
    ) -> Result<Vec<WeightedLine>, WorkflowError> {
        sales_order
            .lines()
            .iter()
            .map(|line| {
                let product = self.load_product(tenant_id, line.product_id)?;
                Ok(WeightedLine {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_weight_grams: product.weight_grams(),
                })
            })
            .collect()
    }

    fn product_uom(&self, tenant_id: TenantId, product_id: ProductId) -> Result<UomId, WorkflowError> {
        Ok(self
            .load_product(tenant_id, product_id)?
            .uom()
            .unwrap_or(self.config.default_uom))
    }

    fn source(
        &self,
        tenant_id: TenantId,
        source_id: ExternalSourceId,
    ) -> Result<ExternalSource, WorkflowError> {
        self.sources
            .get(tenant_id, &source_id)
            .ok_or(WorkflowError::SourceNotFound(source_id))
    }

    fn load_partner(&self, tenant_id: TenantId, id: PartyId) -> Result<Partner, WorkflowError> {
        self.dispatcher
            .load(tenant_id, id.0, partner_aggregate)?
            .filter(Partner::is_created)
            .ok_or(WorkflowError::MissingRecord {
                kind: "partner",
                id: id.0,
            })
    }

    fn load_product(&self, tenant_id: TenantId, id: ProductId) -> Result<Product, WorkflowError> {
        self.dispatcher
            .load(tenant_id, id.0, product_aggregate)?
            .filter(Product::is_created)
            .ok_or(WorkflowError::MissingRecord {
                kind: "product",
                id: id.0,
            })
    }

    fn load_lead(&self, tenant_id: TenantId, id: LeadId) -> Result<Lead, WorkflowError> {
        self.dispatcher
            .load(tenant_id, id.0, lead_aggregate)?
            .filter(Lead::is_created)
            .ok_or(WorkflowError::MissingRecord {
                kind: "lead",
                id: id.0,
            })
    }

    fn load_sales_order(
        &self,
        tenant_id: TenantId,
        id: SalesOrderId,
    ) -> Result<SalesOrder, WorkflowError> {
        self.dispatcher
            .load(tenant_id, id.0, sales_order_aggregate)?
            .filter(SalesOrder::is_created)
            .ok_or(WorkflowError::MissingRecord {
                kind: "sales order",
                id: id.0,
            })
    }
}
