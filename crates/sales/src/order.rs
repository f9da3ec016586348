use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storebridge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use storebridge_crm::{LeadId, SalesTeamId};
use storebridge_events::Event;
use storebridge_parties::PartyId;
use storebridge_products::{ProductId, UomId};

/// Sales order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub AggregateId);

impl SalesOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Delivery carrier reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarrierId(pub u32);

/// Payment mode reference (bank transfer, card, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentModeId(pub u32);

/// Payment term reference (immediate, 30 days, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentTermId(pub u32);

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Draft,
    Sent,
    Sale,
}

/// Header values fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderHeader {
    pub name: String,
    /// Record this order was generated from (e.g. an imported storefront order).
    pub origin_ref: Option<AggregateId>,
    /// Human-readable source document, usually the opportunity name.
    pub origin: Option<String>,
    pub opportunity: Option<LeadId>,
    pub team: Option<SalesTeamId>,
    pub partner: PartyId,
    pub invoice_partner: PartyId,
    pub shipping_partner: PartyId,
    pub date_order: DateTime<Utc>,
    pub salesperson: Option<UserId>,
    pub payment_mode: Option<PaymentModeId>,
    pub payment_term: Option<PaymentTermId>,
}

/// Order line: product, description, quantity, unit of measure, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub description: String,
    pub quantity: i64,
    pub uom: UomId,
    /// Price in smallest currency unit (e.g., cents), tax excluded.
    pub unit_price: u64,
    pub discount_percent: u8,
}

impl OrderLine {
    pub fn subtotal(&self) -> u64 {
        let gross = self.unit_price.saturating_mul(self.quantity.max(0) as u64);
        gross - gross.saturating_mul(u64::from(self.discount_percent)) / 100
    }
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    tenant_id: Option<TenantId>,
    header: Option<SalesOrderHeader>,
    status: SalesOrderStatus,
    lines: Vec<OrderLine>,
    carrier: Option<CarrierId>,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            header: None,
            status: SalesOrderStatus::Draft,
            lines: Vec::new(),
            carrier: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn header(&self) -> Option<&SalesOrderHeader> {
        self.header.as_ref()
    }

    pub fn name(&self) -> &str {
        self.header.as_ref().map(|h| h.name.as_str()).unwrap_or_default()
    }

    pub fn partner(&self) -> Option<PartyId> {
        self.header.as_ref().map(|h| h.partner)
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn carrier(&self) -> Option<CarrierId> {
        self.carrier
    }

    pub fn amount_untaxed(&self) -> u64 {
        self.lines
            .iter()
            .map(OrderLine::subtotal)
            .fold(0u64, u64::saturating_add)
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Quotation states: still editable and confirmable.
    pub fn is_quotation(&self) -> bool {
        matches!(self.status, SalesOrderStatus::Draft | SalesOrderStatus::Sent)
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub header: SalesOrderHeader,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub product_id: ProductId,
    pub description: String,
    pub quantity: i64,
    pub uom: UomId,
    pub unit_price: u64,
    pub discount_percent: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetCarrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCarrier {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub carrier_id: CarrierId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSent {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    AddLine(AddLine),
    SetCarrier(SetCarrier),
    MarkSent(MarkSent),
    ConfirmOrder(ConfirmOrder),
}

/// Event: SalesOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub header: SalesOrderHeader,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line: OrderLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CarrierAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierAssigned {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub carrier_id: CarrierId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSent {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    LineAdded(LineAdded),
    CarrierAssigned(CarrierAssigned),
    OrderSent(OrderSent),
    OrderConfirmed(OrderConfirmed),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "sales.order.created",
            SalesOrderEvent::LineAdded(_) => "sales.order.line_added",
            SalesOrderEvent::CarrierAssigned(_) => "sales.order.carrier_assigned",
            SalesOrderEvent::OrderSent(_) => "sales.order.sent",
            SalesOrderEvent::OrderConfirmed(_) => "sales.order.confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::LineAdded(e) => e.occurred_at,
            SalesOrderEvent::CarrierAssigned(e) => e.occurred_at,
            SalesOrderEvent::OrderSent(e) => e.occurred_at,
            SalesOrderEvent::OrderConfirmed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.header = Some(e.header.clone());
                self.status = SalesOrderStatus::Draft;
                self.lines.clear();
                self.carrier = None;
                self.created = true;
            }
            SalesOrderEvent::LineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            SalesOrderEvent::CarrierAssigned(e) => {
                self.carrier = Some(e.carrier_id);
            }
            SalesOrderEvent::OrderSent(_) => {
                self.status = SalesOrderStatus::Sent;
            }
            SalesOrderEvent::OrderConfirmed(_) => {
                self.status = SalesOrderStatus::Sale;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            SalesOrderCommand::SetCarrier(cmd) => self.handle_set_carrier(cmd),
            SalesOrderCommand::MarkSent(cmd) => self.handle_mark_sent(cmd),
            SalesOrderCommand::ConfirmOrder(cmd) => self.handle_confirm(cmd),
        }
    }
}

impl SalesOrder {
    fn ensure_existing(&self, tenant_id: TenantId, order_id: SalesOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_quotation(&self, action: &str) -> Result<(), DomainError> {
        if !self.is_quotation() {
            return Err(DomainError::invariant(format!(
                "cannot {action} once the order is confirmed"
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }

        if cmd.header.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            header: cmd.header.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        self.ensure_quotation("modify lines")?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        if cmd.discount_percent > 100 {
            return Err(DomainError::validation("discount cannot exceed 100%"));
        }

        let next_line_no = (self.lines.len() as u32) + 1;

        Ok(vec![SalesOrderEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line: OrderLine {
                line_no: next_line_no,
                product_id: cmd.product_id,
                description: cmd.description.clone(),
                quantity: cmd.quantity,
                uom: cmd.uom,
                unit_price: cmd.unit_price,
                discount_percent: cmd.discount_percent,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_carrier(&self, cmd: &SetCarrier) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        self.ensure_quotation("change the carrier")?;

        if self.carrier == Some(cmd.carrier_id) {
            return Ok(vec![]);
        }

        Ok(vec![SalesOrderEvent::CarrierAssigned(CarrierAssigned {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            carrier_id: cmd.carrier_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_sent(&self, cmd: &MarkSent) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != SalesOrderStatus::Draft {
            return Err(DomainError::invariant("only draft orders can be marked sent"));
        }

        Ok(vec![SalesOrderEvent::OrderSent(OrderSent {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if !self.is_quotation() {
            return Err(DomainError::invariant(
                "only draft or sent orders can be confirmed",
            ));
        }

        Ok(vec![SalesOrderEvent::OrderConfirmed(OrderConfirmed {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
