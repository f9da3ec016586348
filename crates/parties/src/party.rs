use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storebridge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use storebridge_events::Event;

/// Partner identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub AggregateId);

impl PartyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What a partner record stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerKind {
    Company,
    Individual,
    /// Invoice or delivery address attached to a customer.
    Address,
}

/// Contact information for a partner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country_code: Option<String>,
}

/// Commercial segmentation of a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerClassification {
    pub activity_type: Option<String>,
    pub customer_type: Option<String>,
}

/// Aggregate root: Partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partner {
    id: PartyId,
    tenant_id: Option<TenantId>,
    kind: PartnerKind,
    name: String,
    vat: Option<String>,
    contact: ContactInfo,
    salesperson: Option<UserId>,
    classification: PartnerClassification,
    version: u64,
    created: bool,
}

impl Partner {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: PartnerKind::Individual,
            name: String::new(),
            vat: None,
            contact: ContactInfo::default(),
            salesperson: None,
            classification: PartnerClassification::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kind(&self) -> PartnerKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vat(&self) -> Option<&str> {
        self.vat.as_deref()
    }

    /// Whether the partner carries a usable tax identifier.
    pub fn has_vat(&self) -> bool {
        self.vat.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn salesperson(&self) -> Option<UserId> {
        self.salesperson
    }

    pub fn classification(&self) -> &PartnerClassification {
        &self.classification
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Partner {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterPartner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPartner {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartnerKind,
    pub name: String,
    pub vat: Option<String>,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails. `None` fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: Option<String>,
    pub vat: Option<String>,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignSalesperson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignSalesperson {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub salesperson: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClassifyPartner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyPartner {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub classification: PartnerClassification,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerCommand {
    RegisterPartner(RegisterPartner),
    UpdateDetails(UpdateDetails),
    AssignSalesperson(AssignSalesperson),
    ClassifyPartner(ClassifyPartner),
}

/// Event: PartnerRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRegistered {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartnerKind,
    pub name: String,
    pub vat: Option<String>,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartnerUpdated (full resulting details).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerUpdated {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: String,
    pub vat: Option<String>,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SalespersonAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalespersonAssigned {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub salesperson: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartnerClassified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerClassified {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub classification: PartnerClassification,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerEvent {
    PartnerRegistered(PartnerRegistered),
    PartnerUpdated(PartnerUpdated),
    SalespersonAssigned(SalespersonAssigned),
    PartnerClassified(PartnerClassified),
}

impl Event for PartnerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartnerEvent::PartnerRegistered(_) => "parties.partner.registered",
            PartnerEvent::PartnerUpdated(_) => "parties.partner.updated",
            PartnerEvent::SalespersonAssigned(_) => "parties.partner.salesperson_assigned",
            PartnerEvent::PartnerClassified(_) => "parties.partner.classified",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartnerEvent::PartnerRegistered(e) => e.occurred_at,
            PartnerEvent::PartnerUpdated(e) => e.occurred_at,
            PartnerEvent::SalespersonAssigned(e) => e.occurred_at,
            PartnerEvent::PartnerClassified(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Partner {
    type Command = PartnerCommand;
    type Event = PartnerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartnerEvent::PartnerRegistered(e) => {
                self.id = e.party_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.name = e.name.clone();
                self.vat = e.vat.clone();
                self.contact = e.contact.clone();
                self.created = true;
            }
            PartnerEvent::PartnerUpdated(e) => {
                self.name = e.name.clone();
                self.vat = e.vat.clone();
                self.contact = e.contact.clone();
            }
            PartnerEvent::SalespersonAssigned(e) => {
                self.salesperson = Some(e.salesperson);
            }
            PartnerEvent::PartnerClassified(e) => {
                self.classification = e.classification.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartnerCommand::RegisterPartner(cmd) => self.handle_register(cmd),
            PartnerCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            PartnerCommand::AssignSalesperson(cmd) => self.handle_assign_salesperson(cmd),
            PartnerCommand::ClassifyPartner(cmd) => self.handle_classify(cmd),
        }
    }
}

impl Partner {
    fn ensure_existing(&self, tenant_id: TenantId, party_id: PartyId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterPartner) -> Result<Vec<PartnerEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("partner already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![PartnerEvent::PartnerRegistered(PartnerRegistered {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            kind: cmd.kind,
            name: cmd.name.clone(),
            vat: normalize_vat(cmd.vat.as_deref()),
            contact: cmd.contact.clone().unwrap_or_default(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<PartnerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.party_id)?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let vat = match cmd.vat.as_deref() {
            Some(v) => normalize_vat(Some(v)),
            None => self.vat.clone(),
        };

        Ok(vec![PartnerEvent::PartnerUpdated(PartnerUpdated {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            name,
            vat,
            contact: cmd.contact.clone().unwrap_or_else(|| self.contact.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_salesperson(
        &self,
        cmd: &AssignSalesperson,
    ) -> Result<Vec<PartnerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.party_id)?;

        if self.salesperson == Some(cmd.salesperson) {
            return Ok(vec![]);
        }

        Ok(vec![PartnerEvent::SalespersonAssigned(SalespersonAssigned {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            salesperson: cmd.salesperson,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_classify(&self, cmd: &ClassifyPartner) -> Result<Vec<PartnerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.party_id)?;

        Ok(vec![PartnerEvent::PartnerClassified(PartnerClassified {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            classification: cmd.classification.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// Blank tax ids are stored as absent.
fn normalize_vat(vat: Option<&str>) -> Option<String> {
    vat.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
