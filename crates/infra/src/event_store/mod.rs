//! Append-only event store boundary.
//!
//! Streams are keyed by `(tenant_id, aggregate_id)`; the store makes no
//! assumption about the business meaning of the payloads it keeps.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
