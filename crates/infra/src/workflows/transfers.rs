//! Transfer workflow.
//!
//! The `Transfer` aggregate decides every status change; this service adds the
//! ledger side: shipping removes stock at the source and receiving adds it at
//! the destination, in the same unit of work as the transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use storeops_core::{DomainError, LocationId, Money, ProductId, UserId};
use storeops_inventory::{
    ApplyDelta, DeltaType, InventoryRecord, InventoryRecordId, MovementEntry, PriceUpdate,
    ReasonCode, StockLocation,
};
use storeops_transfers::{
    CreateTransfer, ShipTransfer, Transfer, TransferCommand, TransferId, TransferItem,
    TransferKind, TransferPriority, TransferStatus, UpdateTransfer,
};

use super::commit;
use super::ledger::apply_delta;
use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::numbering::{DocumentSeries, next_number};
use crate::unit_of_work::UnitOfWork;

/// A requested transfer line. Omitted prices are filled in from the source
/// record (source prices) and from the source prices (target prices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub source_cost_price: Option<Money>,
    #[serde(default)]
    pub source_retail_price: Option<Money>,
    #[serde(default)]
    pub target_cost_price: Option<Money>,
    #[serde(default)]
    pub target_retail_price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub kind: TransferKind,
    pub priority: TransferPriority,
    pub items: Vec<TransferItemRequest>,
    pub notes: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

/// Partial edit; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferUpdate {
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub kind: Option<TransferKind>,
    pub priority: Option<TransferPriority>,
    pub items: Option<Vec<TransferItemRequest>>,
    pub notes: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TransferService<S> {
    store: S,
}

impl<S: EventStore> TransferService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a DRAFT transfer between two active locations.
    #[instrument(
        skip(self, request),
        fields(from = %request.from_location, to = %request.to_location, items = request.items.len()),
        err(level = "warn")
    )]
    pub fn create(&self, request: NewTransfer, actor_id: UserId) -> WorkflowResult<Transfer> {
        if request.from_location == request.to_location {
            return Err(DomainError::validation("source and destination must differ").into());
        }
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        ensure_active(&mut uow, request.from_location)?;
        ensure_active(&mut uow, request.to_location)?;

        let items = resolve_items(&mut uow, request.from_location, &request.items)?;
        let transfer_number = next_number(&mut uow, DocumentSeries::Transfer, now)?;
        let transfer_id = TransferId::new();

        uow.execute::<Transfer>(
            transfer_id.0,
            TransferCommand::Create(CreateTransfer {
                transfer_id,
                transfer_number,
                from_location: request.from_location,
                to_location: request.to_location,
                kind: request.kind,
                priority: request.priority,
                items,
                notes: request.notes,
                expected_delivery_date: request.expected_delivery_date,
                requested_by: actor_id,
                occurred_at: now,
            }),
        )?;
        let transfer = uow.load::<Transfer>(transfer_id.0)?;
        commit(uow, "transfers.create")?;
        Ok(transfer)
    }

    /// Edit a DRAFT or PENDING transfer.
    #[instrument(skip(self, update), err(level = "warn"))]
    pub fn update(
        &self,
        transfer_id: TransferId,
        update: TransferUpdate,
        actor_id: UserId,
    ) -> WorkflowResult<Transfer> {
        let mut uow = UnitOfWork::new(&self.store);
        let current = uow.get::<Transfer>(transfer_id.0, "transfer")?;

        if let Some(from) = update.from_location {
            ensure_active(&mut uow, from)?;
        }
        if let Some(to) = update.to_location {
            ensure_active(&mut uow, to)?;
        }
        let source = match update.from_location.or(current.from_location()) {
            Some(source) => source,
            None => return Err(DomainError::invariant("transfer without source location").into()),
        };
        let items = match &update.items {
            Some(items) => Some(resolve_items(&mut uow, source, items)?),
            None => None,
        };

        uow.execute::<Transfer>(
            transfer_id.0,
            TransferCommand::Update {
                changes: UpdateTransfer {
                    from_location: update.from_location,
                    to_location: update.to_location,
                    kind: update.kind,
                    priority: update.priority,
                    items,
                    notes: update.notes,
                    expected_delivery_date: update.expected_delivery_date,
                },
                actor_id,
                occurred_at: Utc::now(),
            },
        )?;
        let transfer = uow.load::<Transfer>(transfer_id.0)?;
        commit(uow, "transfers.update")?;
        Ok(transfer)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn submit(&self, transfer_id: TransferId, actor_id: UserId) -> WorkflowResult<Transfer> {
        self.transition(
            transfer_id,
            TransferCommand::Submit {
                actor_id,
                occurred_at: Utc::now(),
            },
            "transfers.submit",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn approve(&self, transfer_id: TransferId, actor_id: UserId) -> WorkflowResult<Transfer> {
        self.transition(
            transfer_id,
            TransferCommand::Approve {
                actor_id,
                occurred_at: Utc::now(),
            },
            "transfers.approve",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn reject(
        &self,
        transfer_id: TransferId,
        reason: Option<String>,
        actor_id: UserId,
    ) -> WorkflowResult<Transfer> {
        self.transition(
            transfer_id,
            TransferCommand::Reject {
                reason,
                actor_id,
                occurred_at: Utc::now(),
            },
            "transfers.reject",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn cancel(
        &self,
        transfer_id: TransferId,
        reason: Option<String>,
        actor_id: UserId,
    ) -> WorkflowResult<Transfer> {
        self.transition(
            transfer_id,
            TransferCommand::Cancel {
                reason,
                actor_id,
                occurred_at: Utc::now(),
            },
            "transfers.cancel",
        )
    }

    /// Delete a DRAFT transfer. The stream is kept; reads report it missing.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn delete(&self, transfer_id: TransferId, actor_id: UserId) -> WorkflowResult<()> {
        self.transition(
            transfer_id,
            TransferCommand::Delete {
                actor_id,
                occurred_at: Utc::now(),
            },
            "transfers.delete",
        )
        .map(|_| ())
    }

    /// PENDING/APPROVED -> IN_TRANSIT, removing every item at the source.
    #[instrument(skip(self, shipment), err(level = "warn"))]
    pub fn ship(
        &self,
        transfer_id: TransferId,
        shipment: ShipTransfer,
        actor_id: UserId,
    ) -> WorkflowResult<(Transfer, Vec<MovementEntry>)> {
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<Transfer>(transfer_id.0, "transfer")?;
        uow.execute::<Transfer>(
            transfer_id.0,
            TransferCommand::Ship {
                shipment,
                actor_id,
                occurred_at: now,
            },
        )?;

        let transfer = uow.load::<Transfer>(transfer_id.0)?;
        let source = endpoint(transfer.from_location())?;
        let mut movements = Vec::with_capacity(transfer.items().len());
        for item in transfer.items() {
            movements.push(apply_delta(
                &mut uow,
                ApplyDelta {
                    product_id: item.product_id,
                    location_id: source,
                    delta_type: DeltaType::Remove,
                    quantity: item.quantity,
                    reason: ReasonCode::TransferShipment,
                    actor_id,
                    reference: Some(transfer.transfer_number().to_string()),
                    notes: None,
                    prices: None,
                    occurred_at: now,
                },
            )?);
        }

        commit(uow, "transfers.ship")?;
        info!(transfer = transfer.transfer_number(), movements = movements.len(), "transfer shipped");
        Ok((transfer, movements))
    }

    /// IN_TRANSIT -> COMPLETED, adding every item at the destination at its
    /// target prices.
    #[instrument(skip(self, notes), err(level = "warn"))]
    pub fn receive(
        &self,
        transfer_id: TransferId,
        notes: Option<String>,
        actor_id: UserId,
    ) -> WorkflowResult<(Transfer, Vec<MovementEntry>)> {
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<Transfer>(transfer_id.0, "transfer")?;
        uow.execute::<Transfer>(
            transfer_id.0,
            TransferCommand::Receive {
                notes,
                actor_id,
                occurred_at: now,
            },
        )?;

        let transfer = uow.load::<Transfer>(transfer_id.0)?;
        let destination = endpoint(transfer.to_location())?;
        let mut movements = Vec::with_capacity(transfer.items().len());
        for item in transfer.items() {
            movements.push(apply_delta(
                &mut uow,
                ApplyDelta {
                    product_id: item.product_id,
                    location_id: destination,
                    delta_type: DeltaType::Add,
                    quantity: item.quantity,
                    reason: ReasonCode::TransferReceipt,
                    actor_id,
                    reference: Some(transfer.transfer_number().to_string()),
                    notes: None,
                    prices: Some(PriceUpdate::both(
                        item.target_cost_price,
                        item.target_retail_price,
                    )),
                    occurred_at: now,
                },
            )?);
        }

        commit(uow, "transfers.receive")?;
        info!(transfer = transfer.transfer_number(), movements = movements.len(), "transfer received");
        Ok((transfer, movements))
    }

    /// Drive a transfer to `status` through the matching operation, so the
    /// ledger-touching transitions always go through `ship` / `receive`.
    pub fn patch_status(
        &self,
        transfer_id: TransferId,
        status: TransferStatus,
        actor_id: UserId,
    ) -> WorkflowResult<Transfer> {
        match status {
            TransferStatus::Pending => self.submit(transfer_id, actor_id),
            TransferStatus::Approved => self.approve(transfer_id, actor_id),
            TransferStatus::Rejected => self.reject(transfer_id, None, actor_id),
            TransferStatus::Cancelled => self.cancel(transfer_id, None, actor_id),
            TransferStatus::InTransit => self
                .ship(transfer_id, ShipTransfer::default(), actor_id)
                .map(|(transfer, _)| transfer),
            TransferStatus::Completed => self
                .receive(transfer_id, None, actor_id)
                .map(|(transfer, _)| transfer),
            TransferStatus::Draft => {
                let current = self.get(transfer_id)?;
                Err(DomainError::invalid_transition("transfer", current.status(), "revert to draft").into())
            }
        }
    }

    pub fn get(&self, transfer_id: TransferId) -> WorkflowResult<Transfer> {
        UnitOfWork::new(&self.store).get::<Transfer>(transfer_id.0, "transfer")
    }

    fn transition(
        &self,
        transfer_id: TransferId,
        command: TransferCommand,
        operation: &'static str,
    ) -> WorkflowResult<Transfer> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<Transfer>(transfer_id.0, "transfer")?;
        uow.execute::<Transfer>(transfer_id.0, command)?;
        let transfer = uow.load::<Transfer>(transfer_id.0)?;
        commit(uow, operation)?;
        Ok(transfer)
    }
}

fn ensure_active<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    location_id: LocationId,
) -> WorkflowResult<()> {
    uow.load::<StockLocation>(location_id.0)?.ensure_active()?;
    Ok(())
}

fn endpoint(location: Option<LocationId>) -> WorkflowResult<LocationId> {
    location.ok_or_else(|| DomainError::invariant("transfer without endpoint location").into())
}

fn resolve_items<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    source: LocationId,
    requested: &[TransferItemRequest],
) -> WorkflowResult<Vec<TransferItem>> {
    let mut items = Vec::with_capacity(requested.len());
    for item in requested {
        let record = uow.load::<InventoryRecord>(InventoryRecordId::for_stock(item.product_id, source).0)?;
        let source_cost_price = item.source_cost_price.unwrap_or(record.cost_price());
        let source_retail_price = item.source_retail_price.unwrap_or(record.retail_price());
        items.push(TransferItem {
            product_id: item.product_id,
            quantity: item.quantity,
            source_cost_price,
            source_retail_price,
            target_cost_price: item.target_cost_price.unwrap_or(source_cost_price),
            target_retail_price: item.target_retail_price.unwrap_or(source_retail_price),
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use storeops_core::AggregateRoot;
    use storeops_inventory::LocationKind;

    use crate::event_store::InMemoryEventStore;
    use crate::workflows::{LedgerService, LocationService, OpeningStock};

    struct Fixture {
        transfers: TransferService<Arc<InMemoryEventStore>>,
        ledger: LedgerService<Arc<InMemoryEventStore>>,
        locations: LocationService<Arc<InMemoryEventStore>>,
        warehouse: LocationId,
        shop: LocationId,
        product: ProductId,
        actor: UserId,
    }

    impl Fixture {
        fn new(on_hand: i64) -> Self {
            let store = Arc::new(InMemoryEventStore::new());
            let locations = LocationService::new(store.clone());
            let warehouse = locations.register("WH", "Warehouse", LocationKind::Warehouse).unwrap();
            let shop = locations.register("ST", "Store", LocationKind::Store).unwrap();
            let ledger = LedgerService::new(store.clone());
            let product = ProductId::new();
            let actor = UserId::new();
            ledger
                .receive_stock(
                    OpeningStock {
                        product_id: product,
                        location_id: warehouse,
                        quantity: on_hand,
                        cost_price: Some(Decimal::new(400, 2)),
                        retail_price: Some(Decimal::new(900, 2)),
                        notes: None,
                    },
                    actor,
                )
                .unwrap();
            Self {
                transfers: TransferService::new(store),
                ledger,
                locations,
                warehouse,
                shop,
                product,
                actor,
            }
        }

        fn draft(&self, quantity: i64) -> Transfer {
            self.transfers
                .create(
                    NewTransfer {
                        from_location: self.warehouse,
                        to_location: self.shop,
                        kind: TransferKind::Restock,
                        priority: TransferPriority::Normal,
                        items: vec![TransferItemRequest {
                            product_id: self.product,
                            quantity,
                            source_cost_price: None,
                            source_retail_price: None,
                            target_cost_price: None,
                            target_retail_price: Some(Decimal::new(1000, 2)),
                        }],
                        notes: None,
                        expected_delivery_date: None,
                    },
                    self.actor,
                )
                .unwrap()
        }

        fn on_hand(&self, location: LocationId) -> i64 {
            self.ledger
                .record(InventoryRecordId::for_stock(self.product, location))
                .map(|level| level.quantity)
                .unwrap_or(0)
        }
    }

    #[test]
    fn create_fills_prices_from_source_record() {
        let f = Fixture::new(10);
        let transfer = f.draft(4);

        assert_eq!(transfer.status(), TransferStatus::Draft);
        assert!(transfer.transfer_number().starts_with("TRF-"));
        let item = &transfer.items()[0];
        assert_eq!(item.source_cost_price, Decimal::new(400, 2));
        assert_eq!(item.target_cost_price, Decimal::new(400, 2));
        assert_eq!(item.target_retail_price, Decimal::new(1000, 2));
        assert_eq!(transfer.totals().total_cost, Decimal::new(1600, 2));
    }

    #[test]
    fn create_rejects_inactive_destination() {
        let f = Fixture::new(10);
        f.locations.deactivate(f.shop).unwrap();
        let err = f
            .transfers
            .create(
                NewTransfer {
                    from_location: f.warehouse,
                    to_location: f.shop,
                    kind: TransferKind::Restock,
                    priority: TransferPriority::Low,
                    items: vec![TransferItemRequest {
                        product_id: f.product,
                        quantity: 1,
                        source_cost_price: None,
                        source_retail_price: None,
                        target_cost_price: None,
                        target_retail_price: None,
                    }],
                    notes: None,
                    expected_delivery_date: None,
                },
                f.actor,
            )
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
    }

    #[test]
    fn ship_then_receive_moves_stock_and_reprices_destination() {
        let f = Fixture::new(10);
        let transfer = f.draft(4);
        let id = *transfer.id();

        f.transfers.submit(id, f.actor).unwrap();
        let (shipped, removed) = f.transfers.ship(id, ShipTransfer::default(), f.actor).unwrap();
        assert_eq!(shipped.status(), TransferStatus::InTransit);
        assert_eq!(removed[0].reason, ReasonCode::TransferShipment);
        assert_eq!(f.on_hand(f.warehouse), 6);

        let (completed, added) = f.transfers.receive(id, None, f.actor).unwrap();
        assert_eq!(completed.status(), TransferStatus::Completed);
        assert!(completed.actual_delivery_date().is_some());
        assert_eq!(added[0].quantity_delta, 4);
        assert_eq!(f.on_hand(f.shop), 4);

        let level = f
            .ledger
            .record(InventoryRecordId::for_stock(f.product, f.shop))
            .unwrap();
        assert_eq!(level.retail_price, Decimal::new(1000, 2));
    }

    #[test]
    fn shipping_more_than_on_hand_changes_nothing() {
        let f = Fixture::new(2);
        let transfer = f.draft(5);
        let id = *transfer.id();
        f.transfers.submit(id, f.actor).unwrap();

        let err = f.transfers.ship(id, ShipTransfer::default(), f.actor).unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::InsufficientStock { .. })));
        assert_eq!(f.transfers.get(id).unwrap().status(), TransferStatus::Pending);
        assert_eq!(f.on_hand(f.warehouse), 2);
    }

    #[test]
    fn patch_status_routes_through_ledger_operations() {
        let f = Fixture::new(10);
        let id = *f.draft(3).id();

        f.transfers.patch_status(id, TransferStatus::Pending, f.actor).unwrap();
        f.transfers.patch_status(id, TransferStatus::Approved, f.actor).unwrap();
        f.transfers.patch_status(id, TransferStatus::InTransit, f.actor).unwrap();
        assert_eq!(f.on_hand(f.warehouse), 7);
        f.transfers.patch_status(id, TransferStatus::Completed, f.actor).unwrap();
        assert_eq!(f.on_hand(f.shop), 3);

        let err = f
            .transfers
            .patch_status(id, TransferStatus::Draft, f.actor)
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::InvalidStateTransition { .. })));
    }

    #[test]
    fn deleted_draft_reads_as_not_found() {
        let f = Fixture::new(10);
        let id = *f.draft(1).id();
        f.transfers.delete(id, f.actor).unwrap();
        let err = f.transfers.get(id).unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound { entity: "transfer", .. })));
    }

    #[test]
    fn update_reprices_items_and_rejects_after_approval() {
        let f = Fixture::new(10);
        let id = *f.draft(1).id();

        let updated = f
            .transfers
            .update(
                id,
                TransferUpdate {
                    items: Some(vec![TransferItemRequest {
                        product_id: f.product,
                        quantity: 2,
                        source_cost_price: None,
                        source_retail_price: None,
                        target_cost_price: None,
                        target_retail_price: None,
                    }]),
                    priority: Some(TransferPriority::Urgent),
                    ..TransferUpdate::default()
                },
                f.actor,
            )
            .unwrap();
        assert_eq!(updated.totals().total_items, 2);
        assert_eq!(updated.priority(), TransferPriority::Urgent);

        f.transfers.submit(id, f.actor).unwrap();
        f.transfers.approve(id, f.actor).unwrap();
        let err = f
            .transfers
            .update(id, TransferUpdate::default(), f.actor)
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::InvalidStateTransition { .. })));
    }
}
