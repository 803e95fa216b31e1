//! Stock ledger entry points.
//!
//! [`apply_delta`] is the one way any workflow changes on-hand stock. It runs
//! inside the caller's unit of work and hands back the movement it recorded.
//! [`LedgerService`] wraps it for manual adjustments and opening balances, and
//! exposes the record-level operations (reservations, quarantine, condition).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use storeops_core::{DomainError, EventSourced, LocationId, Money, ProductId, UserId};
use storeops_inventory::{
    ApplyDelta, DeltaType, InventoryRecord, InventoryRecordCommand, InventoryRecordEvent,
    InventoryRecordId, MovementEntry, PriceUpdate, ReasonCode, StockCondition, StockLevel,
    StockLocation,
};

use super::commit;
use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::unit_of_work::UnitOfWork;

/// Apply one ledger mutation within `uow`.
pub fn apply_delta<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    delta: ApplyDelta,
) -> WorkflowResult<MovementEntry> {
    let record_id = InventoryRecordId::for_stock(delta.product_id, delta.location_id);
    let events =
        uow.execute::<InventoryRecord>(record_id.0, InventoryRecordCommand::ApplyDelta(delta))?;
    events
        .into_iter()
        .find_map(|event| match event {
            InventoryRecordEvent::StockMoved(movement) => Some(movement),
            _ => None,
        })
        .ok_or_else(|| DomainError::invariant("ledger mutation recorded no movement").into())
}

/// Every existing record at `location_id`, as seen by `uow`.
pub fn records_at<S: EventStore + ?Sized>(
    store: &S,
    uow: &mut UnitOfWork<'_, S>,
    location_id: LocationId,
) -> WorkflowResult<Vec<InventoryRecord>> {
    let mut records = Vec::new();
    for id in store.stream_ids(InventoryRecord::AGGREGATE_TYPE)? {
        let record = uow.load::<InventoryRecord>(id)?;
        if record.exists() && record.location_id() == Some(location_id) {
            records.push(record);
        }
    }
    Ok(records)
}

fn stock_identity(record: &InventoryRecord) -> WorkflowResult<(ProductId, LocationId)> {
    match (record.product_id(), record.location_id()) {
        (Some(product_id), Some(location_id)) => Ok((product_id, location_id)),
        _ => Err(DomainError::invariant("inventory record without product/location").into()),
    }
}

fn level(record: &InventoryRecord) -> WorkflowResult<StockLevel> {
    record
        .snapshot()
        .ok_or_else(|| DomainError::invariant("inventory record without product/location").into())
}

/// `POST /inventory/items/{id}/adjust`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAdjustment {
    pub record_id: InventoryRecordId,
    pub delta_type: DeltaType,
    pub quantity: i64,
    /// Free-text reason, kept as the movement's reference.
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Direct receipt of stock outside any purchase order (opening balances).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningStock {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub cost_price: Option<Money>,
    pub retail_price: Option<Money>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LedgerService<S> {
    store: S,
}

impl<S: EventStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Manual ADD/REMOVE/SET against an existing record.
    #[instrument(
        skip(self, adjustment),
        fields(record_id = %adjustment.record_id, delta_type = ?adjustment.delta_type, quantity = adjustment.quantity),
        err(level = "warn")
    )]
    pub fn adjust(&self, adjustment: ManualAdjustment, actor_id: UserId) -> WorkflowResult<MovementEntry> {
        let mut uow = UnitOfWork::new(&self.store);
        let record = uow.get::<InventoryRecord>(adjustment.record_id.0, "inventory record")?;
        let (product_id, location_id) = stock_identity(&record)?;

        let movement = apply_delta(
            &mut uow,
            ApplyDelta {
                product_id,
                location_id,
                delta_type: adjustment.delta_type,
                quantity: adjustment.quantity,
                reason: ReasonCode::ManualAdjustment,
                actor_id,
                reference: adjustment.reason,
                notes: adjustment.notes,
                prices: None,
                occurred_at: Utc::now(),
            },
        )?;
        commit(uow, "ledger.adjust")?;
        Ok(movement)
    }

    /// ADD stock at an active location, opening the record if needed.
    #[instrument(
        skip(self, stock),
        fields(product_id = %stock.product_id, location_id = %stock.location_id, quantity = stock.quantity),
        err(level = "warn")
    )]
    pub fn receive_stock(&self, stock: OpeningStock, actor_id: UserId) -> WorkflowResult<StockLevel> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.load::<StockLocation>(stock.location_id.0)?.ensure_active()?;

        let prices = PriceUpdate {
            cost_price: stock.cost_price,
            retail_price: stock.retail_price,
        };
        apply_delta(
            &mut uow,
            ApplyDelta {
                product_id: stock.product_id,
                location_id: stock.location_id,
                delta_type: DeltaType::Add,
                quantity: stock.quantity,
                reason: ReasonCode::ManualAdjustment,
                actor_id,
                reference: None,
                notes: stock.notes,
                prices: Some(prices),
                occurred_at: Utc::now(),
            },
        )?;

        let record_id = InventoryRecordId::for_stock(stock.product_id, stock.location_id);
        let level = level(&uow.load::<InventoryRecord>(record_id.0)?)?;
        commit(uow, "ledger.receive_stock")?;
        Ok(level)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn reserve(&self, record_id: InventoryRecordId, quantity: i64) -> WorkflowResult<StockLevel> {
        self.execute(
            record_id,
            InventoryRecordCommand::Reserve {
                quantity,
                occurred_at: Utc::now(),
            },
            "ledger.reserve",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn release_reservation(
        &self,
        record_id: InventoryRecordId,
        quantity: i64,
    ) -> WorkflowResult<StockLevel> {
        self.execute(
            record_id,
            InventoryRecordCommand::ReleaseReservation {
                quantity,
                occurred_at: Utc::now(),
            },
            "ledger.release_reservation",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn quarantine(
        &self,
        record_id: InventoryRecordId,
        reason: String,
        actor_id: UserId,
    ) -> WorkflowResult<StockLevel> {
        self.execute(
            record_id,
            InventoryRecordCommand::Quarantine {
                reason,
                actor_id,
                occurred_at: Utc::now(),
            },
            "ledger.quarantine",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn release_quarantine(
        &self,
        record_id: InventoryRecordId,
        actor_id: UserId,
    ) -> WorkflowResult<StockLevel> {
        self.execute(
            record_id,
            InventoryRecordCommand::ReleaseQuarantine {
                actor_id,
                occurred_at: Utc::now(),
            },
            "ledger.release_quarantine",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn mark_condition(
        &self,
        record_id: InventoryRecordId,
        condition: StockCondition,
        actor_id: UserId,
    ) -> WorkflowResult<StockLevel> {
        self.execute(
            record_id,
            InventoryRecordCommand::MarkCondition {
                condition,
                actor_id,
                occurred_at: Utc::now(),
            },
            "ledger.mark_condition",
        )
    }

    pub fn record(&self, record_id: InventoryRecordId) -> WorkflowResult<StockLevel> {
        let record = UnitOfWork::new(&self.store).get::<InventoryRecord>(record_id.0, "inventory record")?;
        level(&record)
    }

    /// Movement history of a record, oldest first.
    pub fn movements(&self, record_id: InventoryRecordId) -> WorkflowResult<Vec<MovementEntry>> {
        let record = UnitOfWork::new(&self.store).get::<InventoryRecord>(record_id.0, "inventory record")?;
        Ok(record.movements().to_vec())
    }

    fn execute(
        &self,
        record_id: InventoryRecordId,
        command: InventoryRecordCommand,
        operation: &'static str,
    ) -> WorkflowResult<StockLevel> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<InventoryRecord>(record_id.0, "inventory record")?;
        uow.execute::<InventoryRecord>(record_id.0, command)?;
        let level = level(&uow.load::<InventoryRecord>(record_id.0)?)?;
        commit(uow, operation)?;
        Ok(level)
    }
}
