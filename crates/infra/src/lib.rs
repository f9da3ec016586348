//! Infrastructure layer: event storage, command dispatch, configuration and
//! the storefront order conversion workflow.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod read_model;
pub mod workflow;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use config::{AreluxConfig, ConfigError, WorkflowConfig};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use read_model::{InMemoryTenantStore, TenantStore};
pub use workflow::{
    AreluxExtension, ExternalOrderWorkflow, RunReport, SkipReason, Step, StepOutcome,
    WorkflowError, WorkflowExtension,
};
