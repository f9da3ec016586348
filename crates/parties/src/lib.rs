//! Partners: customers and their invoice/delivery addresses (event-sourced).
//!
//! Pure domain logic (no IO, no storage).

pub mod party;

pub use party::{
    AssignSalesperson, ClassifyPartner, ContactInfo, Partner, PartnerClassification,
    PartnerClassified, PartnerCommand, PartnerEvent, PartnerKind, PartnerRegistered,
    PartnerUpdated, PartyId, RegisterPartner, SalespersonAssigned, UpdateDetails,
};
