//! Read-side access to event-sourced aggregates.

use storeops_core::{AggregateId, DomainError};

use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::unit_of_work::{Persisted, UnitOfWork};

/// Typed repository over the event store.
///
/// Every read rehydrates from the stream; there are no read models to drift.
#[derive(Debug, Clone)]
pub struct Repository<S> {
    store: S,
}

impl<S: EventStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `None` when the aggregate was never created.
    pub fn find<A: Persisted>(&self, id: AggregateId) -> WorkflowResult<Option<A>> {
        let aggregate = UnitOfWork::new(&self.store).load::<A>(id)?;
        Ok(aggregate.exists().then_some(aggregate))
    }

    pub fn get<A: Persisted>(&self, id: AggregateId, entity: &'static str) -> WorkflowResult<A> {
        self.find::<A>(id)?
            .ok_or_else(|| DomainError::not_found(entity, id).into())
    }

    /// Every existing aggregate of type `A`, oldest stream first.
    pub fn list<A: Persisted>(&self) -> WorkflowResult<Vec<A>> {
        let ids = self.store.stream_ids(A::AGGREGATE_TYPE)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(aggregate) = self.find::<A>(id)? {
                out.push(aggregate);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use storeops_core::LocationId;
    use storeops_inventory::{LocationCommand, LocationKind, RegisterLocation, StockLocation};

    use crate::event_store::InMemoryEventStore;

    fn register(store: &InMemoryEventStore, code: &str) -> LocationId {
        let id = LocationId::new();
        let mut uow = UnitOfWork::new(store);
        uow.execute::<StockLocation>(
            id.0,
            LocationCommand::Register(RegisterLocation {
                location_id: id,
                code: code.to_string(),
                name: code.to_string(),
                kind: LocationKind::Warehouse,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        uow.commit().unwrap();
        id
    }

    #[test]
    fn find_get_and_list() {
        let store = Arc::new(InMemoryEventStore::new());
        let a = register(&store, "WH-A");
        register(&store, "WH-B");
        let repo = Repository::new(store);

        assert_eq!(repo.get::<StockLocation>(a.0, "location").unwrap().code(), "WH-A");
        assert!(repo.find::<StockLocation>(AggregateId::new()).unwrap().is_none());

        let codes: Vec<String> = repo
            .list::<StockLocation>()
            .unwrap()
            .iter()
            .map(|l| l.code().to_string())
            .collect();
        assert_eq!(codes, vec!["WH-A", "WH-B"]);
    }
}
