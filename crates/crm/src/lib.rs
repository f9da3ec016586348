//! CRM pipeline module: leads and opportunities (event-sourced).
//!
//! Pure domain logic (no IO, no storage).

pub mod lead;

pub use lead::{
    AssignPartner, ClassifyLead, Lead, LeadClassification, LeadClassified, LeadCommand,
    LeadEvent, LeadId, LeadKind, LeadOpened, LeadStage, LeadWon, MarkWon, OpenLead,
    PartnerAssigned, SalesTeamId,
};
