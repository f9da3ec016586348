//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   -> load stream (tenant-scoped) and validate it
//!   -> rehydrate the aggregate
//!   -> handle (pure decision)
//!   -> append with ExpectedVersion::Exact(current)
//!   -> publish committed events
//! ```
//!
//! Publication happens only after a successful append. A publish failure is
//! reported to the caller although the events are already persisted.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use storebridge_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use storebridge_events::{Event, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Stale aggregate version, or a domain conflict.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("aggregate not found")]
    NotFound,
    /// A historical payload did not deserialize into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    #[error("event store error: {0}")]
    Store(EventStoreError),
    /// Publication failed after a successful append.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Generic command executor over an [`EventStore`] and an [`EventBus`].
///
/// `make_aggregate` builds the empty instance the history is replayed onto,
/// e.g. `|_, id| Lead::empty(LeadId::new(id))`.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the current state of the aggregate and persist the
    /// decided events. Returns the committed events; empty when the command
    /// decided nothing.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Rehydrate an aggregate without handling a command.
    ///
    /// Returns `None` when the stream is empty (the aggregate was never created).
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Option<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        if history.is_empty() {
            return Ok(None);
        }
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(Some(aggregate))
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // A backend must never hand back another tenant's events, and sequence
    // numbers must be strictly increasing from 1.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
