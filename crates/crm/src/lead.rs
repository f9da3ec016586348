use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storebridge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use storebridge_events::Event;
use storebridge_parties::PartyId;

/// Lead identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub AggregateId);

impl LeadId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LeadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sales team reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesTeamId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadKind {
    Lead,
    Opportunity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStage {
    Open,
    Won,
}

/// Commercial segmentation copied onto a lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadClassification {
    pub activity_type: Option<String>,
    pub customer_type: Option<String>,
}

/// Aggregate root: Lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    id: LeadId,
    tenant_id: Option<TenantId>,
    kind: LeadKind,
    name: String,
    /// Record this lead was opened from (e.g. an imported storefront order).
    origin_ref: Option<AggregateId>,
    team: Option<SalesTeamId>,
    salesperson: Option<UserId>,
    probability: u8,
    deadline: Option<DateTime<Utc>>,
    partner: Option<PartyId>,
    contact_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    classification: LeadClassification,
    stage: LeadStage,
    version: u64,
    created: bool,
}

impl Lead {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: LeadId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: LeadKind::Lead,
            name: String::new(),
            origin_ref: None,
            team: None,
            salesperson: None,
            probability: 0,
            deadline: None,
            partner: None,
            contact_name: None,
            email: None,
            phone: None,
            classification: LeadClassification::default(),
            stage: LeadStage::Open,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LeadId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kind(&self) -> LeadKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin_ref(&self) -> Option<AggregateId> {
        self.origin_ref
    }

    pub fn team(&self) -> Option<SalesTeamId> {
        self.team
    }

    pub fn salesperson(&self) -> Option<UserId> {
        self.salesperson
    }

    pub fn probability(&self) -> u8 {
        self.probability
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn partner(&self) -> Option<PartyId> {
        self.partner
    }

    pub fn contact_name(&self) -> Option<&str> {
        self.contact_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn classification(&self) -> &LeadClassification {
        &self.classification
    }

    pub fn stage(&self) -> LeadStage {
        self.stage
    }

    pub fn is_won(&self) -> bool {
        self.stage == LeadStage::Won
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Lead {
    type Id = LeadId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenLead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLead {
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub kind: LeadKind,
    pub name: String,
    pub origin_ref: Option<AggregateId>,
    pub team: Option<SalesTeamId>,
    pub salesperson: Option<UserId>,
    pub probability: u8,
    pub deadline: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignPartner. Carries the partner's contact details to copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignPartner {
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub partner_id: PartyId,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClassifyLead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyLead {
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub classification: LeadClassification,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkWon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkWon {
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadCommand {
    OpenLead(OpenLead),
    AssignPartner(AssignPartner),
    ClassifyLead(ClassifyLead),
    MarkWon(MarkWon),
}

/// Event: LeadOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadOpened {
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub kind: LeadKind,
    pub name: String,
    pub origin_ref: Option<AggregateId>,
    pub team: Option<SalesTeamId>,
    pub salesperson: Option<UserId>,
    pub probability: u8,
    pub deadline: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartnerAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerAssigned {
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub partner_id: PartyId,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LeadClassified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadClassified {
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub classification: LeadClassification,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LeadWon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadWon {
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadEvent {
    LeadOpened(LeadOpened),
    PartnerAssigned(PartnerAssigned),
    LeadClassified(LeadClassified),
    LeadWon(LeadWon),
}

impl Event for LeadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LeadEvent::LeadOpened(_) => "crm.lead.opened",
            LeadEvent::PartnerAssigned(_) => "crm.lead.partner_assigned",
            LeadEvent::LeadClassified(_) => "crm.lead.classified",
            LeadEvent::LeadWon(_) => "crm.lead.won",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LeadEvent::LeadOpened(e) => e.occurred_at,
            LeadEvent::PartnerAssigned(e) => e.occurred_at,
            LeadEvent::LeadClassified(e) => e.occurred_at,
            LeadEvent::LeadWon(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Lead {
    type Command = LeadCommand;
    type Event = LeadEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LeadEvent::LeadOpened(e) => {
                self.id = e.lead_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.name = e.name.clone();
                self.origin_ref = e.origin_ref;
                self.team = e.team;
                self.salesperson = e.salesperson;
                self.probability = e.probability;
                self.deadline = e.deadline;
                self.stage = LeadStage::Open;
                self.created = true;
            }
            LeadEvent::PartnerAssigned(e) => {
                self.partner = Some(e.partner_id);
                self.contact_name = e.contact_name.clone();
                self.email = e.email.clone();
                self.phone = e.phone.clone();
            }
            LeadEvent::LeadClassified(e) => {
                self.classification = e.classification.clone();
            }
            LeadEvent::LeadWon(_) => {
                self.stage = LeadStage::Won;
                self.probability = 100;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LeadCommand::OpenLead(cmd) => self.handle_open(cmd),
            LeadCommand::AssignPartner(cmd) => self.handle_assign_partner(cmd),
            LeadCommand::ClassifyLead(cmd) => self.handle_classify(cmd),
            LeadCommand::MarkWon(cmd) => self.handle_mark_won(cmd),
        }
    }
}

impl Lead {
    fn ensure_existing(&self, tenant_id: TenantId, lead_id: LeadId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != lead_id {
            return Err(DomainError::invariant("lead_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenLead) -> Result<Vec<LeadEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("lead already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if cmd.probability > 100 {
            return Err(DomainError::validation("probability must be between 0 and 100"));
        }

        Ok(vec![LeadEvent::LeadOpened(LeadOpened {
            tenant_id: cmd.tenant_id,
            lead_id: cmd.lead_id,
            kind: cmd.kind,
            name: cmd.name.clone(),
            origin_ref: cmd.origin_ref,
            team: cmd.team,
            salesperson: cmd.salesperson,
            probability: cmd.probability,
            deadline: cmd.deadline,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_partner(&self, cmd: &AssignPartner) -> Result<Vec<LeadEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.lead_id)?;

        if self.is_won() {
            return Err(DomainError::invariant("cannot reassign partner of a won lead"));
        }

        Ok(vec![LeadEvent::PartnerAssigned(PartnerAssigned {
            tenant_id: cmd.tenant_id,
            lead_id: cmd.lead_id,
            partner_id: cmd.partner_id,
            contact_name: cmd.contact_name.clone(),
            email: cmd.email.clone(),
            phone: cmd.phone.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_classify(&self, cmd: &ClassifyLead) -> Result<Vec<LeadEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.lead_id)?;

        if self.classification == cmd.classification {
            return Ok(vec![]);
        }

        Ok(vec![LeadEvent::LeadClassified(LeadClassified {
            tenant_id: cmd.tenant_id,
            lead_id: cmd.lead_id,
            classification: cmd.classification.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_won(&self, cmd: &MarkWon) -> Result<Vec<LeadEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.lead_id)?;

        if self.is_won() {
            return Err(DomainError::conflict("lead is already won"));
        }

        Ok(vec![LeadEvent::LeadWon(LeadWon {
            tenant_id: cmd.tenant_id,
            lead_id: cmd.lead_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storebridge_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_lead_id() -> LeadId {
        LeadId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn open_cmd(tenant_id: TenantId, lead_id: LeadId) -> OpenLead {
        OpenLead {
            tenant_id,
            lead_id,
            kind: LeadKind::Opportunity,
            name: "shopify 1001".to_string(),
            origin_ref: Some(AggregateId::new()),
            team: Some(SalesTeamId(1)),
            salesperson: None,
            probability: 10,
            deadline: None,
            occurred_at: test_time(),
        }
    }

    fn opened(tenant_id: TenantId, lead_id: LeadId) -> Lead {
        let mut lead = Lead::empty(lead_id);
        execute(&mut lead, &LeadCommand::OpenLead(open_cmd(tenant_id, lead_id))).unwrap();
        lead
    }

    #[test]
    fn open_lead_emits_lead_opened_event() {
        let tenant_id = test_tenant_id();
        let lead_id = test_lead_id();
        let lead = Lead::empty(lead_id);

        let events = lead
            .handle(&LeadCommand::OpenLead(open_cmd(tenant_id, lead_id)))
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            LeadEvent::LeadOpened(e) => {
                assert_eq!(e.name, "shopify 1001");
                assert_eq!(e.probability, 10);
                assert_eq!(e.kind, LeadKind::Opportunity);
            }
            _ => panic!("Expected LeadOpened event"),
        }
    }

    #[test]
    fn probability_above_hundred_is_rejected() {
        let tenant_id = test_tenant_id();
        let lead_id = test_lead_id();
        let mut cmd = open_cmd(tenant_id, lead_id);
        cmd.probability = 101;

        let err = Lead::empty(lead_id).handle(&LeadCommand::OpenLead(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn assign_partner_copies_contact_details() {
        let tenant_id = test_tenant_id();
        let lead_id = test_lead_id();
        let mut lead = opened(tenant_id, lead_id);
        let partner_id = PartyId::new(AggregateId::new());

        execute(
            &mut lead,
            &LeadCommand::AssignPartner(AssignPartner {
                tenant_id,
                lead_id,
                partner_id,
                contact_name: Some("Ana".to_string()),
                email: Some("ana@example.com".to_string()),
                phone: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(lead.partner(), Some(partner_id));
        assert_eq!(lead.contact_name(), Some("Ana"));
        assert_eq!(lead.email(), Some("ana@example.com"));
    }

    #[test]
    fn mark_won_sets_full_probability_once() {
        let tenant_id = test_tenant_id();
        let lead_id = test_lead_id();
        let mut lead = opened(tenant_id, lead_id);
        let cmd = LeadCommand::MarkWon(MarkWon {
            tenant_id,
            lead_id,
            occurred_at: test_time(),
        });

        execute(&mut lead, &cmd).unwrap();
        assert!(lead.is_won());
        assert_eq!(lead.probability(), 100);

        let err = lead.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn identical_classification_is_a_no_op() {
        let tenant_id = test_tenant_id();
        let lead_id = test_lead_id();
        let mut lead = opened(tenant_id, lead_id);
        let cmd = LeadCommand::ClassifyLead(ClassifyLead {
            tenant_id,
            lead_id,
            classification: LeadClassification {
                activity_type: Some("arelux".to_string()),
                customer_type: Some("particular".to_string()),
            },
            occurred_at: test_time(),
        });

        assert_eq!(execute(&mut lead, &cmd).unwrap().len(), 1);
        assert!(execute(&mut lead, &cmd).unwrap().is_empty());
        assert_eq!(lead.version(), 2);
    }

    #[test]
    fn apply_is_deterministic() {
        let tenant_id = test_tenant_id();
        let lead_id = test_lead_id();
        let opened_event = Lead::empty(lead_id)
            .handle(&LeadCommand::OpenLead(open_cmd(tenant_id, lead_id)))
            .unwrap();
        let won = LeadEvent::LeadWon(LeadWon {
            tenant_id,
            lead_id,
            occurred_at: test_time(),
        });

        let mut a = Lead::empty(lead_id);
        let mut b = Lead::empty(lead_id);
        for ev in opened_event.iter().chain(std::iter::once(&won)) {
            a.apply(ev);
            b.apply(ev);
        }

        assert_eq!(a, b);
        assert_eq!(a.version(), 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: handle is deterministic and probability is capped at 100.
            #[test]
            fn open_is_deterministic_and_bounded(probability in 0u8..=u8::MAX) {
                let tenant_id = test_tenant_id();
                let lead_id = test_lead_id();
                let lead = Lead::empty(lead_id);
                let mut cmd = open_cmd(tenant_id, lead_id);
                cmd.probability = probability;
                let cmd = LeadCommand::OpenLead(cmd);

                let first = lead.handle(&cmd);
                let second = lead.handle(&cmd);
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(first.is_ok(), probability <= 100);
            }
        }
    }
}
