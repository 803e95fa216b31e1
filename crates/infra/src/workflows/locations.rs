use chrono::Utc;
use tracing::instrument;

use storeops_core::{DomainError, LocationId};
use storeops_inventory::{
    InventoryRecord, LocationCommand, LocationKind, RegisterLocation, StockLevel, StockLocation,
};

use super::commit;
use super::ledger::records_at;
use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::repository::Repository;
use crate::unit_of_work::UnitOfWork;

/// Warehouses and stores.
#[derive(Debug, Clone)]
pub struct LocationService<S> {
    store: S,
}

impl<S: EventStore + Clone> LocationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a location. Codes are unique across all locations.
    #[instrument(skip(self, name), err(level = "warn"))]
    pub fn register(&self, code: &str, name: &str, kind: LocationKind) -> WorkflowResult<LocationId> {
        let taken = self.list()?.iter().any(|l| l.code().eq_ignore_ascii_case(code.trim()));
        if taken {
            return Err(DomainError::conflict(format!("location code {code} already exists")).into());
        }

        let location_id = LocationId::new();
        let mut uow = UnitOfWork::new(&self.store);
        uow.execute::<StockLocation>(
            location_id.0,
            LocationCommand::Register(RegisterLocation {
                location_id,
                code: code.to_string(),
                name: name.to_string(),
                kind,
                occurred_at: Utc::now(),
            }),
        )?;
        commit(uow, "locations.register")?;
        Ok(location_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn deactivate(&self, location_id: LocationId) -> WorkflowResult<StockLocation> {
        self.execute(
            location_id,
            LocationCommand::Deactivate {
                occurred_at: Utc::now(),
            },
            "locations.deactivate",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn reactivate(&self, location_id: LocationId) -> WorkflowResult<StockLocation> {
        self.execute(
            location_id,
            LocationCommand::Reactivate {
                occurred_at: Utc::now(),
            },
            "locations.reactivate",
        )
    }

    pub fn get(&self, location_id: LocationId) -> WorkflowResult<StockLocation> {
        Repository::new(self.store.clone()).get::<StockLocation>(location_id.0, "location")
    }

    pub fn list(&self) -> WorkflowResult<Vec<StockLocation>> {
        Repository::new(self.store.clone()).list::<StockLocation>()
    }

    /// Stock records held at a location; inactive locations keep theirs.
    pub fn stock(&self, location_id: LocationId) -> WorkflowResult<Vec<StockLevel>> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<StockLocation>(location_id.0, "location")?;
        let records: Vec<InventoryRecord> = records_at(&self.store, &mut uow, location_id)?;
        Ok(records.iter().filter_map(InventoryRecord::snapshot).collect())
    }

    fn execute(
        &self,
        location_id: LocationId,
        command: LocationCommand,
        operation: &'static str,
    ) -> WorkflowResult<StockLocation> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<StockLocation>(location_id.0, "location")?;
        uow.execute::<StockLocation>(location_id.0, command)?;
        let location = uow.load::<StockLocation>(location_id.0)?;
        commit(uow, operation)?;
        Ok(location)
    }
}
