//! Atomic multi-stream unit of work.
//!
//! A workflow loads every aggregate it touches through one `UnitOfWork`,
//! executes commands against the cached instances, and commits all decided
//! events in a single store append:
//!
//! ```text
//! load (rehydrate, remember version) ─┐
//! execute (handle + apply in cache)  ─┼─ repeat per aggregate
//!                                     ┘
//! commit → EventStore::append([StreamAppend { expected: Exact(loaded) }, ...])
//! ```
//!
//! A unit of work dropped without `commit()` persists nothing.

use std::any::Any;
use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use storeops_core::{AggregateId, AggregateRoot, DomainError, EventSourced, ExpectedVersion};
use storeops_events::Event as DomainEvent;

use crate::error::{WorkflowError, WorkflowResult};
use crate::event_store::{EventStore, StoredEvent, StreamAppend, UncommittedEvent};

/// An event-sourced aggregate the store can persist and replay.
pub trait Persisted:
    EventSourced<Error = DomainError, Event: DomainEvent + Serialize + DeserializeOwned>
{
}

impl<A> Persisted for A where
    A: EventSourced<Error = DomainError, Event: DomainEvent + Serialize + DeserializeOwned>
{
}

struct Tracked<A: Persisted> {
    aggregate: A,
    loaded_version: u64,
    pending: Vec<A::Event>,
}

/// Type-erased view of a tracked stream, so streams of different aggregate
/// types can share one cache.
trait TrackedStream: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn pending_len(&self) -> usize;
    fn to_append(&self, aggregate_id: AggregateId) -> WorkflowResult<StreamAppend>;
}

impl<A: Persisted> TrackedStream for Tracked<A> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn to_append(&self, aggregate_id: AggregateId) -> WorkflowResult<StreamAppend> {
        let events = self
            .pending
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, A::AGGREGATE_TYPE, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StreamAppend {
            aggregate_id,
            aggregate_type: A::AGGREGATE_TYPE.to_string(),
            expected_version: ExpectedVersion::Exact(self.loaded_version),
            events,
        })
    }
}

/// Collects decided events across streams and commits them atomically.
pub struct UnitOfWork<'s, S: EventStore + ?Sized> {
    store: &'s S,
    streams: HashMap<AggregateId, Box<dyn TrackedStream + 's>>,
    /// First-touch order, so committed events come back in decision order per stream.
    order: Vec<AggregateId>,
}

impl<'s, S: EventStore + ?Sized> UnitOfWork<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            streams: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Current state of an aggregate, including events decided in this unit.
    ///
    /// Returns the empty instance when the stream does not exist; check
    /// `EventSourced::exists` where existence matters.
    pub fn load<A: Persisted>(&mut self, id: AggregateId) -> WorkflowResult<A> {
        Ok(self.tracked::<A>(id)?.aggregate.clone())
    }

    /// Like [`load`](Self::load), but a missing aggregate is `NotFound`.
    pub fn get<A: Persisted>(&mut self, id: AggregateId, entity: &'static str) -> WorkflowResult<A> {
        let aggregate = self.load::<A>(id)?;
        if !aggregate.exists() {
            return Err(DomainError::not_found(entity, id).into());
        }
        Ok(aggregate)
    }

    /// Decide and apply a command. Events are kept until `commit()`.
    pub fn execute<A: Persisted>(
        &mut self,
        id: AggregateId,
        command: A::Command,
    ) -> WorkflowResult<Vec<A::Event>> {
        let tracked = self.tracked::<A>(id)?;
        let decided = tracked.aggregate.handle(&command)?;
        for event in &decided {
            tracked.aggregate.apply(event);
        }
        tracked.pending.extend(decided.iter().cloned());
        Ok(decided)
    }

    /// Number of events decided so far.
    pub fn pending_events(&self) -> usize {
        self.streams.values().map(|s| s.pending_len()).sum()
    }

    /// Persist every decided event in one atomic append.
    pub fn commit(self) -> WorkflowResult<Vec<StoredEvent>> {
        let mut batch = Vec::new();
        for id in &self.order {
            if let Some(stream) = self.streams.get(id) {
                if stream.pending_len() > 0 {
                    batch.push(stream.to_append(*id)?);
                }
            }
        }
        if batch.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.store.append(batch)?)
    }

    fn tracked<A: Persisted>(&mut self, id: AggregateId) -> WorkflowResult<&mut Tracked<A>> {
        if !self.streams.contains_key(&id) {
            let tracked = rehydrate::<A, S>(self.store, id)?;
            self.streams.insert(id, Box::new(tracked));
            self.order.push(id);
        }

        self.streams
            .get_mut(&id)
            .and_then(|s| s.as_any_mut().downcast_mut::<Tracked<A>>())
            .ok_or_else(|| {
                WorkflowError::corrupt(
                    id,
                    format!("stream already loaded as a different type than {}", A::AGGREGATE_TYPE),
                )
            })
    }
}

fn rehydrate<A: Persisted, S: EventStore + ?Sized>(store: &S, id: AggregateId) -> WorkflowResult<Tracked<A>> {
    let history = store.load_stream(id)?;
    validate_loaded_stream::<A>(id, &history)?;

    let mut aggregate = A::empty(id);
    for stored in &history {
        let event: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| WorkflowError::corrupt(id, format!("event {}: {e}", stored.sequence_number)))?;
        aggregate.apply(&event);
    }

    let loaded_version = history.last().map(|e| e.sequence_number).unwrap_or(0);
    if aggregate.version() != loaded_version {
        return Err(WorkflowError::corrupt(
            id,
            format!(
                "replayed version {} does not match stream version {loaded_version}",
                aggregate.version()
            ),
        ));
    }

    Ok(Tracked {
        aggregate,
        loaded_version,
        pending: Vec::new(),
    })
}

fn validate_loaded_stream<A: Persisted>(id: AggregateId, stream: &[StoredEvent]) -> WorkflowResult<()> {
    let mut last = 0u64;
    for e in stream {
        if e.aggregate_id != id {
            return Err(WorkflowError::corrupt(
                id,
                format!("loaded stream contains event of {}", e.aggregate_id),
            ));
        }
        if e.aggregate_type != A::AGGREGATE_TYPE {
            return Err(WorkflowError::corrupt(
                id,
                format!(
                    "stream is '{}', expected '{}'",
                    e.aggregate_type,
                    A::AGGREGATE_TYPE
                ),
            ));
        }
        if e.sequence_number != last + 1 {
            return Err(WorkflowError::corrupt(
                id,
                format!("sequence gap after {last} (found {})", e.sequence_number),
            ));
        }
        last = e.sequence_number;
    }
    Ok(())
}
