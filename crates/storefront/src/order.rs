use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storebridge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId};
use storebridge_crm::LeadId;
use storebridge_events::Event;
use storebridge_parties::PartyId;
use storebridge_payments::TransactionId;
use storebridge_products::ProductId;
use storebridge_sales::SalesOrderId;

use crate::source::{ExternalSource, ExternalSourceId, SourceKind};
use crate::state::{ShopifyState, WooCommerceState};

/// External sale order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalSaleOrderId(pub AggregateId);

impl ExternalSaleOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ExternalSaleOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Storefront customer and the partner it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCustomer {
    pub external_id: String,
    pub email: Option<String>,
    pub partner_id: Option<PartyId>,
}

/// Storefront address and the partner it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAddress {
    pub external_id: String,
    pub partner_id: Option<PartyId>,
}

/// Storefront product and the catalog product it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProduct {
    pub external_id: String,
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalOrderLine {
    pub title: String,
    pub quantity: i64,
    /// Minor currency units, tax excluded.
    pub unit_price_without_tax: u64,
    pub product: Option<ExternalProduct>,
    /// Sales order line generated from this line.
    pub sales_line_no: Option<u32>,
}

impl ExternalOrderLine {
    pub fn product_id(&self) -> Option<ProductId> {
        self.product.as_ref().and_then(|p| p.product_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalShippingLine {
    pub title: String,
    pub unit_price_without_tax: u64,
    pub sales_line_no: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDiscount {
    pub code: String,
    pub amount: u64,
}

/// Monetary totals as computed by the storefront (minor units, order currency).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total_price: u64,
    pub subtotal_price: u64,
    pub total_tax: u64,
    pub total_discounts: u64,
    pub total_line_items_price: u64,
    pub total_shipping_price: u64,
}

/// Marketing attribution of the landing page that produced the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingAttribution {
    pub url: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_source: Option<String>,
}

/// Snapshot of a storefront order as imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalOrderData {
    pub external_id: String,
    pub number: u64,
    pub source_id: ExternalSourceId,
    pub source_kind: SourceKind,
    pub date: DateTime<Utc>,
    pub currency: String,
    pub customer: Option<ExternalCustomer>,
    pub billing_address: Option<ExternalAddress>,
    pub shipping_address: Option<ExternalAddress>,
    #[serde(default)]
    pub woocommerce_state: WooCommerceState,
    #[serde(default)]
    pub shopify_state: ShopifyState,
    pub totals: OrderTotals,
    pub lines: Vec<ExternalOrderLine>,
    pub shipping_lines: Vec<ExternalShippingLine>,
    pub discounts: Vec<ExternalDiscount>,
    #[serde(default)]
    pub landing: LandingAttribution,
}

impl ExternalOrderData {
    /// Whether the storefront status allows converting the order.
    pub fn allow_create(&self) -> bool {
        match self.source_kind {
            SourceKind::WooCommerce => self.woocommerce_state.allows_conversion(),
            SourceKind::Shopify => self.shopify_state.allows_conversion(),
        }
    }

    pub fn customer_partner(&self) -> Option<PartyId> {
        self.customer.as_ref().and_then(|c| c.partner_id)
    }

    pub fn billing_partner(&self) -> Option<PartyId> {
        self.billing_address.as_ref().and_then(|a| a.partner_id)
    }

    pub fn shipping_partner(&self) -> Option<PartyId> {
        self.shipping_address.as_ref().and_then(|a| a.partner_id)
    }

    /// Every product line resolved to a catalog product.
    pub fn all_products_mapped(&self) -> bool {
        self.lines.iter().all(|l| l.product_id().is_some())
    }

    pub fn total_price(&self) -> Money {
        Money::new(self.totals.total_price, self.currency.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressRole {
    Billing,
    Shipping,
}

/// Which external line a sales order line was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum SalesLineSource {
    Product(usize),
    Shipping(usize),
}

/// Aggregate root: ExternalSaleOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSaleOrder {
    id: ExternalSaleOrderId,
    tenant_id: Option<TenantId>,
    data: Option<ExternalOrderData>,
    lead: Option<LeadId>,
    sales_order: Option<SalesOrderId>,
    payment_transaction: Option<TransactionId>,
    version: u64,
    created: bool,
}

impl ExternalSaleOrder {
    /// Create an empty, not-yet-imported aggregate instance for rehydration.
    pub fn empty(id: ExternalSaleOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            data: None,
            lead: None,
            sales_order: None,
            payment_transaction: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ExternalSaleOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn data(&self) -> Option<&ExternalOrderData> {
        self.data.as_ref()
    }

    pub fn lead(&self) -> Option<LeadId> {
        self.lead
    }

    pub fn sales_order(&self) -> Option<SalesOrderId> {
        self.sales_order
    }

    pub fn payment_transaction(&self) -> Option<TransactionId> {
        self.payment_transaction
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.data.as_ref().map(|d| d.source_kind)
    }

    /// Gate of the conversion workflow. Orders not imported yet never pass.
    pub fn allow_create(&self) -> bool {
        self.data.as_ref().is_some_and(ExternalOrderData::allow_create)
    }

    /// Storefront back-office URL of this order; empty when `source` is not
    /// the order's source.
    pub fn external_url(&self, source: &ExternalSource) -> String {
        match &self.data {
            Some(d) if d.source_id == source.id => source.order_url(&d.external_id),
            _ => String::new(),
        }
    }
}

impl AggregateRoot for ExternalSaleOrder {
    type Id = ExternalSaleOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ImportOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOrder {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub data: ExternalOrderData,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MapCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapCustomer {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub partner_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MapAddress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapAddress {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub role: AddressRole,
    pub partner_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MapProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapProduct {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub line_index: usize,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSourceState. `None` keeps the current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSourceState {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub woocommerce_state: Option<WooCommerceState>,
    pub shopify_state: Option<ShopifyState>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkLead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkLead {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub lead_id: LeadId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub sales_order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkSalesLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSalesLine {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub source: SalesLineSource,
    pub sales_line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkPaymentTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPaymentTransaction {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalSaleOrderCommand {
    ImportOrder(ImportOrder),
    MapCustomer(MapCustomer),
    MapAddress(MapAddress),
    MapProduct(MapProduct),
    UpdateSourceState(UpdateSourceState),
    LinkLead(LinkLead),
    LinkSalesOrder(LinkSalesOrder),
    LinkSalesLine(LinkSalesLine),
    LinkPaymentTransaction(LinkPaymentTransaction),
}

/// Event: OrderImported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderImported {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub data: ExternalOrderData,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerMapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerMapped {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub partner_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AddressMapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMapped {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub role: AddressRole,
    pub partner_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductMapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMapped {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub line_index: usize,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SourceStateUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStateUpdated {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub woocommerce_state: WooCommerceState,
    pub shopify_state: ShopifyState,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LeadLinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadLinked {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub lead_id: LeadId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SalesOrderLinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLinked {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub sales_order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SalesLineLinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesLineLinked {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub source: SalesLineSource,
    pub sales_line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentTransactionLinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransactionLinked {
    pub tenant_id: TenantId,
    pub order_id: ExternalSaleOrderId,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalSaleOrderEvent {
    OrderImported(OrderImported),
    CustomerMapped(CustomerMapped),
    AddressMapped(AddressMapped),
    ProductMapped(ProductMapped),
    SourceStateUpdated(SourceStateUpdated),
    LeadLinked(LeadLinked),
    SalesOrderLinked(SalesOrderLinked),
    SalesLineLinked(SalesLineLinked),
    PaymentTransactionLinked(PaymentTransactionLinked),
}

impl Event for ExternalSaleOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExternalSaleOrderEvent::OrderImported(_) => "storefront.order.imported",
            ExternalSaleOrderEvent::CustomerMapped(_) => "storefront.order.customer_mapped",
            ExternalSaleOrderEvent::AddressMapped(_) => "storefront.order.address_mapped",
            ExternalSaleOrderEvent::ProductMapped(_) => "storefront.order.product_mapped",
            ExternalSaleOrderEvent::SourceStateUpdated(_) => "storefront.order.source_state_updated",
            ExternalSaleOrderEvent::LeadLinked(_) => "storefront.order.lead_linked",
            ExternalSaleOrderEvent::SalesOrderLinked(_) => "storefront.order.sales_order_linked",
            ExternalSaleOrderEvent::SalesLineLinked(_) => "storefront.order.sales_line_linked",
            ExternalSaleOrderEvent::PaymentTransactionLinked(_) => {
                "storefront.order.payment_transaction_linked"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExternalSaleOrderEvent::OrderImported(e) => e.occurred_at,
            ExternalSaleOrderEvent::CustomerMapped(e) => e.occurred_at,
            ExternalSaleOrderEvent::AddressMapped(e) => e.occurred_at,
            ExternalSaleOrderEvent::ProductMapped(e) => e.occurred_at,
            ExternalSaleOrderEvent::SourceStateUpdated(e) => e.occurred_at,
            ExternalSaleOrderEvent::LeadLinked(e) => e.occurred_at,
            ExternalSaleOrderEvent::SalesOrderLinked(e) => e.occurred_at,
            ExternalSaleOrderEvent::SalesLineLinked(e) => e.occurred_at,
            ExternalSaleOrderEvent::PaymentTransactionLinked(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ExternalSaleOrder {
    type Command = ExternalSaleOrderCommand;
    type Event = ExternalSaleOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExternalSaleOrderEvent::OrderImported(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.data = Some(e.data.clone());
                self.lead = None;
                self.sales_order = None;
                self.payment_transaction = None;
                self.created = true;
            }
            ExternalSaleOrderEvent::CustomerMapped(e) => {
                if let Some(customer) = self.data.as_mut().and_then(|d| d.customer.as_mut()) {
                    customer.partner_id = Some(e.partner_id);
                }
            }
            ExternalSaleOrderEvent::AddressMapped(e) => {
                if let Some(data) = self.data.as_mut() {
                    let address = match e.role {
                        AddressRole::Billing => data.billing_address.as_mut(),
                        AddressRole::Shipping => data.shipping_address.as_mut(),
                    };
                    if let Some(address) = address {
                        address.partner_id = Some(e.partner_id);
                    }
                }
            }
            ExternalSaleOrderEvent::ProductMapped(e) => {
                if let Some(product) = self
                    .data
                    .as_mut()
                    .and_then(|d| d.lines.get_mut(e.line_index))
                    .and_then(|l| l.product.as_mut())
                {
                    product.product_id = Some(e.product_id);
                }
            }
            ExternalSaleOrderEvent::SourceStateUpdated(e) => {
                if let Some(data) = self.data.as_mut() {
                    data.woocommerce_state = e.woocommerce_state;
                    data.shopify_state = e.shopify_state;
                }
            }
            ExternalSaleOrderEvent::LeadLinked(e) => {
                self.lead = Some(e.lead_id);
            }
            ExternalSaleOrderEvent::SalesOrderLinked(e) => {
                self.sales_order = Some(e.sales_order_id);
            }
            ExternalSaleOrderEvent::SalesLineLinked(e) => {
                if let Some(data) = self.data.as_mut() {
                    let slot = match e.source {
                        SalesLineSource::Product(i) => {
                            data.lines.get_mut(i).map(|l| &mut l.sales_line_no)
                        }
                        SalesLineSource::Shipping(i) => {
                            data.shipping_lines.get_mut(i).map(|l| &mut l.sales_line_no)
                        }
                    };
                    if let Some(slot) = slot {
                        *slot = Some(e.sales_line_no);
                    }
                }
            }
            ExternalSaleOrderEvent::PaymentTransactionLinked(e) => {
                self.payment_transaction = Some(e.transaction_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExternalSaleOrderCommand::ImportOrder(cmd) => self.handle_import(cmd),
            ExternalSaleOrderCommand::MapCustomer(cmd) => self.handle_map_customer(cmd),
            ExternalSaleOrderCommand::MapAddress(cmd) => self.handle_map_address(cmd),
            ExternalSaleOrderCommand::MapProduct(cmd) => self.handle_map_product(cmd),
            ExternalSaleOrderCommand::UpdateSourceState(cmd) => self.handle_update_state(cmd),
            ExternalSaleOrderCommand::LinkLead(cmd) => self.handle_link_lead(cmd),
            ExternalSaleOrderCommand::LinkSalesOrder(cmd) => self.handle_link_sales_order(cmd),
            ExternalSaleOrderCommand::LinkSalesLine(cmd) => self.handle_link_sales_line(cmd),
            ExternalSaleOrderCommand::LinkPaymentTransaction(cmd) => {
                self.handle_link_payment_transaction(cmd)
            }
        }
    }
}

impl ExternalSaleOrder {
    fn existing_data(
        &self,
        tenant_id: TenantId,
        order_id: ExternalSaleOrderId,
    ) -> Result<&ExternalOrderData, DomainError> {
        let data = match (&self.data, self.created) {
            (Some(data), true) => data,
            _ => return Err(DomainError::not_found()),
        };
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(data)
    }

    fn handle_import(&self, cmd: &ImportOrder) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("external sale order already imported"));
        }

        if cmd.data.external_id.trim().is_empty() {
            return Err(DomainError::validation("external_id cannot be empty"));
        }

        if cmd.data.currency.trim().is_empty() {
            return Err(DomainError::validation("currency is required"));
        }

        if cmd.data.lines.iter().any(|l| l.quantity <= 0) {
            return Err(DomainError::validation("line quantity must be positive"));
        }

        Ok(vec![ExternalSaleOrderEvent::OrderImported(OrderImported {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            data: cmd.data.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_map_customer(
        &self,
        cmd: &MapCustomer,
    ) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        let data = self.existing_data(cmd.tenant_id, cmd.order_id)?;

        if data.customer.is_none() {
            return Err(DomainError::invariant("order has no customer to map"));
        }

        Ok(vec![ExternalSaleOrderEvent::CustomerMapped(CustomerMapped {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            partner_id: cmd.partner_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_map_address(
        &self,
        cmd: &MapAddress,
    ) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        let data = self.existing_data(cmd.tenant_id, cmd.order_id)?;

        let present = match cmd.role {
            AddressRole::Billing => data.billing_address.is_some(),
            AddressRole::Shipping => data.shipping_address.is_some(),
        };
        if !present {
            return Err(DomainError::invariant(format!(
                "order has no {:?} address to map",
                cmd.role
            )));
        }

        Ok(vec![ExternalSaleOrderEvent::AddressMapped(AddressMapped {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            role: cmd.role,
            partner_id: cmd.partner_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_map_product(
        &self,
        cmd: &MapProduct,
    ) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        let data = self.existing_data(cmd.tenant_id, cmd.order_id)?;

        let line = data
            .lines
            .get(cmd.line_index)
            .ok_or_else(|| DomainError::validation("line_index out of range"))?;
        if line.product.is_none() {
            return Err(DomainError::invariant("line has no storefront product to map"));
        }

        Ok(vec![ExternalSaleOrderEvent::ProductMapped(ProductMapped {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_index: cmd.line_index,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_state(
        &self,
        cmd: &UpdateSourceState,
    ) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        let data = self.existing_data(cmd.tenant_id, cmd.order_id)?;

        let woocommerce_state = cmd.woocommerce_state.unwrap_or(data.woocommerce_state);
        let shopify_state = cmd.shopify_state.unwrap_or(data.shopify_state);
        if woocommerce_state == data.woocommerce_state && shopify_state == data.shopify_state {
            return Ok(vec![]);
        }

        Ok(vec![ExternalSaleOrderEvent::SourceStateUpdated(SourceStateUpdated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            woocommerce_state,
            shopify_state,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_lead(&self, cmd: &LinkLead) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        self.existing_data(cmd.tenant_id, cmd.order_id)?;

        if self.lead.is_some() {
            return Err(DomainError::conflict("order is already linked to a lead"));
        }

        Ok(vec![ExternalSaleOrderEvent::LeadLinked(LeadLinked {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            lead_id: cmd.lead_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_sales_order(
        &self,
        cmd: &LinkSalesOrder,
    ) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        self.existing_data(cmd.tenant_id, cmd.order_id)?;

        if self.sales_order.is_some() {
            return Err(DomainError::conflict("order is already linked to a sales order"));
        }

        Ok(vec![ExternalSaleOrderEvent::SalesOrderLinked(SalesOrderLinked {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            sales_order_id: cmd.sales_order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_sales_line(
        &self,
        cmd: &LinkSalesLine,
    ) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        let data = self.existing_data(cmd.tenant_id, cmd.order_id)?;

        if self.sales_order.is_none() {
            return Err(DomainError::invariant(
                "cannot link sales lines before the sales order",
            ));
        }

        let current = match cmd.source {
            SalesLineSource::Product(i) => data.lines.get(i).map(|l| l.sales_line_no),
            SalesLineSource::Shipping(i) => data.shipping_lines.get(i).map(|l| l.sales_line_no),
        };
        match current {
            None => Err(DomainError::validation("line index out of range")),
            Some(Some(_)) => Err(DomainError::conflict("line is already linked")),
            Some(None) => Ok(vec![ExternalSaleOrderEvent::SalesLineLinked(SalesLineLinked {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                source: cmd.source,
                sales_line_no: cmd.sales_line_no,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_link_payment_transaction(
        &self,
        cmd: &LinkPaymentTransaction,
    ) -> Result<Vec<ExternalSaleOrderEvent>, DomainError> {
        self.existing_data(cmd.tenant_id, cmd.order_id)?;

        if self.payment_transaction.is_some() {
            return Err(DomainError::conflict(
                "order is already linked to a payment transaction",
            ));
        }

        Ok(vec![ExternalSaleOrderEvent::PaymentTransactionLinked(
            PaymentTransactionLinked {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                transaction_id: cmd.transaction_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
