//! Domain events and their transport.
//!
//! Business crates implement [`Event`] for their event enums; infrastructure
//! wraps persisted events in an [`EventEnvelope`] and publishes them on an
//! [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
