use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storebridge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use storebridge_events::Event;

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Unit of measure reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UomId(pub u32);

impl UomId {
    /// "Units", the catalog's base unit.
    pub const UNIT: UomId = UomId(1);
}

impl Default for UomId {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    name: String,
    uom: Option<UomId>,
    /// Shipping weight of one unit, in grams.
    weight_grams: u64,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            name: String::new(),
            uom: None,
            weight_grams: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uom(&self) -> Option<UomId> {
        self.uom
    }

    pub fn weight_grams(&self) -> u64 {
        self.weight_grams
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub uom: Option<UomId>,
    pub weight_grams: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLogistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLogistics {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub uom: Option<UomId>,
    pub weight_grams: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateLogistics(UpdateLogistics),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub uom: Option<UomId>,
    pub weight_grams: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LogisticsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogisticsUpdated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub uom: Option<UomId>,
    pub weight_grams: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    LogisticsUpdated(LogisticsUpdated),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::LogisticsUpdated(_) => "products.product.logistics_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::LogisticsUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.uom = e.uom;
                self.weight_grams = e.weight_grams;
                self.created = true;
            }
            ProductEvent::LogisticsUpdated(e) => {
                self.uom = e.uom;
                self.weight_grams = e.weight_grams;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateLogistics(cmd) => self.handle_update_logistics(cmd),
        }
    }
}

impl Product {
    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku: cmd.sku.clone(),
            name: cmd.name.clone(),
            uom: cmd.uom,
            weight_grams: cmd.weight_grams,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_logistics(
        &self,
        cmd: &UpdateLogistics,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != cmd.product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }

        Ok(vec![ProductEvent::LogisticsUpdated(LogisticsUpdated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            uom: cmd.uom,
            weight_grams: cmd.weight_grams,
            occurred_at: cmd.occurred_at,
        })])
    }
}
