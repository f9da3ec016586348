use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storebridge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId};
use storebridge_events::Event;
use storebridge_parties::PartyId;
use storebridge_sales::SalesOrderId;

/// Payment transaction identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub AggregateId);

impl TransactionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Payment acquirer reference (the storefront's payment provider account).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcquirerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Draft,
    Done,
}

/// Aggregate root: PaymentTransaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    id: TransactionId,
    tenant_id: Option<TenantId>,
    reference: String,
    sales_order: Option<SalesOrderId>,
    amount: Option<Money>,
    partner: Option<PartyId>,
    acquirer: Option<AcquirerId>,
    date_validate: Option<DateTime<Utc>>,
    state: TransactionState,
    version: u64,
    created: bool,
}

impl PaymentTransaction {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TransactionId) -> Self {
        Self {
            id,
            tenant_id: None,
            reference: String::new(),
            sales_order: None,
            amount: None,
            partner: None,
            acquirer: None,
            date_validate: None,
            state: TransactionState::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn sales_order(&self) -> Option<SalesOrderId> {
        self.sales_order
    }

    pub fn amount(&self) -> Option<&Money> {
        self.amount.as_ref()
    }

    pub fn partner(&self) -> Option<PartyId> {
        self.partner
    }

    pub fn acquirer(&self) -> Option<AcquirerId> {
        self.acquirer
    }

    pub fn date_validate(&self) -> Option<DateTime<Utc>> {
        self.date_validate
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == TransactionState::Done
    }
}

impl AggregateRoot for PaymentTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub tenant_id: TenantId,
    pub transaction_id: TransactionId,
    pub reference: String,
    pub sales_order: Option<SalesOrderId>,
    pub amount: Money,
    pub partner: PartyId,
    pub acquirer: Option<AcquirerId>,
    pub date_validate: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDone {
    pub tenant_id: TenantId,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionCommand {
    CreateTransaction(CreateTransaction),
    MarkDone(MarkDone),
}

/// Event: TransactionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCreated {
    pub tenant_id: TenantId,
    pub transaction_id: TransactionId,
    pub reference: String,
    pub sales_order: Option<SalesOrderId>,
    pub amount: Money,
    pub partner: PartyId,
    pub acquirer: Option<AcquirerId>,
    pub date_validate: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransactionDone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDone {
    pub tenant_id: TenantId,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    TransactionCreated(TransactionCreated),
    TransactionDone(TransactionDone),
}

impl Event for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::TransactionCreated(_) => "payments.transaction.created",
            TransactionEvent::TransactionDone(_) => "payments.transaction.done",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransactionEvent::TransactionCreated(e) => e.occurred_at,
            TransactionEvent::TransactionDone(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PaymentTransaction {
    type Command = TransactionCommand;
    type Event = TransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransactionEvent::TransactionCreated(e) => {
                self.id = e.transaction_id;
                self.tenant_id = Some(e.tenant_id);
                self.reference = e.reference.clone();
                self.sales_order = e.sales_order;
                self.amount = Some(e.amount.clone());
                self.partner = Some(e.partner);
                self.acquirer = e.acquirer;
                self.date_validate = e.date_validate;
                self.state = TransactionState::Draft;
                self.created = true;
            }
            TransactionEvent::TransactionDone(_) => {
                self.state = TransactionState::Done;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransactionCommand::CreateTransaction(cmd) => self.handle_create(cmd),
            TransactionCommand::MarkDone(cmd) => self.handle_mark_done(cmd),
        }
    }
}

impl PaymentTransaction {
    fn handle_create(&self, cmd: &CreateTransaction) -> Result<Vec<TransactionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("payment transaction already exists"));
        }

        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }

        if cmd.amount.currency.trim().is_empty() {
            return Err(DomainError::validation("currency is required"));
        }

        Ok(vec![TransactionEvent::TransactionCreated(TransactionCreated {
            tenant_id: cmd.tenant_id,
            transaction_id: cmd.transaction_id,
            reference: cmd.reference.clone(),
            sales_order: cmd.sales_order,
            amount: cmd.amount.clone(),
            partner: cmd.partner,
            acquirer: cmd.acquirer,
            date_validate: cmd.date_validate,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_done(&self, cmd: &MarkDone) -> Result<Vec<TransactionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != cmd.transaction_id {
            return Err(DomainError::invariant("transaction_id mismatch"));
        }

        if self.is_done() {
            return Err(DomainError::conflict("payment transaction is already done"));
        }

        Ok(vec![TransactionEvent::TransactionDone(TransactionDone {
            tenant_id: cmd.tenant_id,
            transaction_id: cmd.transaction_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
