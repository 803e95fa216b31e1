//! Physical-inventory audit workflow.
//!
//! Counting is one short unit of work per submission and never touches the
//! ledger. Reconciling a discrepancy SETs the record to the counted quantity
//! in the same unit of work that marks the item reconciled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use storeops_audits::{
    Audit, AuditCommand, AuditEvent, AuditId, AuditItem, AuditItemSeed, AuditProgress, ItemCount,
    PlanAudit,
};
use storeops_core::{AggregateRoot, DomainError, LocationId, ProductId, UserId};
use storeops_inventory::{
    ApplyDelta, DeltaType, InventoryRecord, InventoryRecordId, LocationKind, MovementEntry,
    ReasonCode, StockLocation,
};

use super::commit;
use super::ledger::{apply_delta, records_at};
use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::numbering::{DocumentSeries, next_number};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAuditRequest {
    pub warehouse_id: Option<LocationId>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Scope the audit to these products; empty means "everything on hand at
    /// start".
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
}

/// Result of one count submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountOutcome {
    /// The items touched by this submission, after counting.
    pub items: Vec<AuditItem>,
    pub progress: AuditProgress,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub item: AuditItem,
    pub movement: MovementEntry,
    pub progress: AuditProgress,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct AuditService<S> {
    store: S,
}

impl<S: EventStore> AuditService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Plan an audit of an active warehouse. Scoped products are snapshotted
    /// immediately.
    #[instrument(skip(self, request), err(level = "warn"))]
    pub fn plan(&self, request: PlanAuditRequest, actor_id: UserId) -> WorkflowResult<Audit> {
        let warehouse_id = request
            .warehouse_id
            .ok_or_else(|| DomainError::validation("warehouse_id is required"))?;
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        uow.load::<StockLocation>(warehouse_id.0)?
            .ensure_active_kind(LocationKind::Warehouse)?;

        let mut items = Vec::with_capacity(request.product_ids.len());
        for product_id in request.product_ids {
            let record_id = InventoryRecordId::for_stock(product_id, warehouse_id);
            let record = uow.get::<InventoryRecord>(record_id.0, "inventory record")?;
            items.push(AuditItemSeed {
                product_id,
                record_id,
                expected_quantity: record.quantity(),
            });
        }

        let audit_id = AuditId::new();
        let audit_number = next_number(&mut uow, DocumentSeries::Audit, now)?;
        uow.execute::<Audit>(
            audit_id.0,
            AuditCommand::Plan(PlanAudit {
                audit_id,
                audit_number,
                warehouse_id,
                scheduled_date: request.scheduled_date,
                notes: request.notes,
                items,
                actor_id,
                occurred_at: now,
            }),
        )?;
        let audit = uow.load::<Audit>(audit_id.0)?;
        commit(uow, "audits.plan")?;
        Ok(audit)
    }

    /// PLANNED -> IN_PROGRESS. An unscoped audit snapshots every record at
    /// the warehouse with stock on hand.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn start(&self, audit_id: AuditId, actor_id: UserId) -> WorkflowResult<Audit> {
        let mut uow = UnitOfWork::new(&self.store);
        let audit = uow.get::<Audit>(audit_id.0, "audit")?;
        let warehouse_id = audit
            .warehouse_id()
            .ok_or_else(|| DomainError::invariant("audit has no warehouse"))?;
        uow.load::<StockLocation>(warehouse_id.0)?.ensure_active()?;

        let snapshot = if audit.items().is_empty() {
            records_at(&self.store, &mut uow, warehouse_id)?
                .iter()
                .filter(|record| record.quantity() > 0)
                .filter_map(|record| {
                    record.product_id().map(|product_id| AuditItemSeed {
                        product_id,
                        record_id: *record.id(),
                        expected_quantity: record.quantity(),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        uow.execute::<Audit>(
            audit_id.0,
            AuditCommand::Start {
                snapshot,
                actor_id,
                occurred_at: Utc::now(),
            },
        )?;
        let audit = uow.load::<Audit>(audit_id.0)?;
        commit(uow, "audits.start")?;
        Ok(audit)
    }

    /// Record counted quantities. Completion is evaluated in the same commit.
    #[instrument(skip(self, counts), fields(counts = counts.len()), err(level = "warn"))]
    pub fn record_counts(
        &self,
        audit_id: AuditId,
        counts: Vec<ItemCount>,
        actor_id: UserId,
    ) -> WorkflowResult<CountOutcome> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<Audit>(audit_id.0, "audit")?;
        let events = uow.execute::<Audit>(
            audit_id.0,
            AuditCommand::RecordCounts {
                counts,
                actor_id,
                occurred_at: Utc::now(),
            },
        )?;
        let audit = uow.load::<Audit>(audit_id.0)?;
        commit(uow, "audits.record_counts")?;

        let mut items = Vec::new();
        let mut completed = false;
        for event in &events {
            match event {
                AuditEvent::ItemCounted(counted) => items.extend(audit.item(counted.item_id).cloned()),
                AuditEvent::Completed { .. } => completed = true,
                _ => {}
            }
        }
        if completed {
            info!(audit = audit.audit_number(), "audit completed");
        }
        Ok(CountOutcome {
            items,
            progress: audit.progress(),
            completed,
        })
    }

    /// Settle a DISCREPANCY item by setting the ledger to the counted quantity.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn reconcile(
        &self,
        audit_id: AuditId,
        item_id: u32,
        actor_id: UserId,
    ) -> WorkflowResult<ReconcileOutcome> {
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        let audit = uow.get::<Audit>(audit_id.0, "audit")?;
        let warehouse_id = audit
            .warehouse_id()
            .ok_or_else(|| DomainError::invariant("audit has no warehouse"))?;
        let item = audit
            .item(item_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("audit item", item_id))?;

        let events = uow.execute::<Audit>(
            audit_id.0,
            AuditCommand::Reconcile {
                item_id,
                actor_id,
                occurred_at: now,
            },
        )?;
        let counted = item
            .counted_quantity
            .ok_or_else(|| DomainError::invariant("reconciled item was never counted"))?;

        let movement = apply_delta(
            &mut uow,
            ApplyDelta {
                product_id: item.product_id,
                location_id: warehouse_id,
                delta_type: DeltaType::Set,
                quantity: counted,
                reason: ReasonCode::AuditReconciliation,
                actor_id,
                reference: Some(audit.audit_number().to_string()),
                notes: item.notes.clone(),
                prices: None,
                occurred_at: now,
            },
        )?;

        let audit = uow.load::<Audit>(audit_id.0)?;
        commit(uow, "audits.reconcile")?;

        let completed = events.iter().any(|e| matches!(e, AuditEvent::Completed { .. }));
        let item = audit
            .item(item_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("audit item", item_id))?;
        Ok(ReconcileOutcome {
            item,
            movement,
            progress: audit.progress(),
            completed,
        })
    }

    pub fn get(&self, audit_id: AuditId) -> WorkflowResult<Audit> {
        UnitOfWork::new(&self.store).get::<Audit>(audit_id.0, "audit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use storeops_audits::{AuditItemStatus, AuditStatus};

    use crate::event_store::InMemoryEventStore;
    use crate::workflows::{LedgerService, LocationService, ManualAdjustment, OpeningStock};

    struct Fixture {
        store: Arc<InMemoryEventStore>,
        audits: AuditService<Arc<InMemoryEventStore>>,
        ledger: LedgerService<Arc<InMemoryEventStore>>,
        warehouse: LocationId,
        actor: UserId,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryEventStore::new());
            let warehouse = LocationService::new(store.clone())
                .register("WH", "Warehouse", LocationKind::Warehouse)
                .unwrap();
            Self {
                audits: AuditService::new(store.clone()),
                ledger: LedgerService::new(store.clone()),
                store,
                warehouse,
                actor: UserId::new(),
            }
        }

        fn stock(&self, quantity: i64) -> ProductId {
            let product_id = ProductId::new();
            self.ledger
                .receive_stock(
                    OpeningStock {
                        product_id,
                        location_id: self.warehouse,
                        quantity,
                        cost_price: None,
                        retail_price: None,
                        notes: None,
                    },
                    self.actor,
                )
                .unwrap();
            product_id
        }

        fn plan(&self, product_ids: Vec<ProductId>) -> AuditId {
            let audit = self
                .audits
                .plan(
                    PlanAuditRequest {
                        warehouse_id: Some(self.warehouse),
                        product_ids,
                        ..PlanAuditRequest::default()
                    },
                    self.actor,
                )
                .unwrap();
            *audit.id()
        }

        fn count(&self, audit_id: AuditId, item_id: u32, counted_quantity: i64) -> CountOutcome {
            self.audits
                .record_counts(
                    audit_id,
                    vec![ItemCount {
                        item_id,
                        counted_quantity,
                        notes: None,
                    }],
                    self.actor,
                )
                .unwrap()
        }
    }

    #[test]
    fn start_snapshots_only_records_with_stock() {
        let f = Fixture::new();
        f.stock(5);
        let empty = f.stock(1);
        f.ledger
            .adjust(
                ManualAdjustment {
                    record_id: InventoryRecordId::for_stock(empty, f.warehouse),
                    delta_type: DeltaType::Set,
                    quantity: 0,
                    reason: None,
                    notes: None,
                },
                f.actor,
            )
            .unwrap();

        let audit_id = f.plan(vec![]);
        let audit = f.audits.start(audit_id, f.actor).unwrap();
        assert_eq!(audit.status(), AuditStatus::InProgress);
        assert_eq!(audit.items().len(), 1);
        assert_eq!(audit.items()[0].expected_quantity, 5);
    }

    #[test]
    fn start_without_stock_is_rejected() {
        let f = Fixture::new();
        let audit_id = f.plan(vec![]);
        let err = f.audits.start(audit_id, f.actor).unwrap_err();
        assert_eq!(err.as_domain(), Some(&DomainError::NoInventoryToAudit(f.warehouse)));
        assert_eq!(f.audits.get(audit_id).unwrap().status(), AuditStatus::Planned);
    }

    #[test]
    fn counting_reports_discrepancies_and_progress() {
        let f = Fixture::new();
        let a = f.stock(10);
        let b = f.stock(4);
        let audit_id = f.plan(vec![a, b]);
        f.audits.start(audit_id, f.actor).unwrap();

        let outcome = f.count(audit_id, 1, 8);
        assert_eq!(outcome.items[0].discrepancy, Some(-2));
        assert_eq!(outcome.items[0].status, AuditItemStatus::Discrepancy);
        assert_eq!(outcome.progress.percentage, 0);
        assert!(!outcome.completed);

        let outcome = f.count(audit_id, 2, 4);
        assert_eq!(outcome.progress.percentage, 50);
        assert!(!outcome.completed);

        // Counting never touches the ledger.
        let level = f.ledger.record(InventoryRecordId::for_stock(a, f.warehouse)).unwrap();
        assert_eq!(level.quantity, 10);
    }

    #[test]
    fn reconciling_last_discrepancy_sets_stock_and_completes() {
        let f = Fixture::new();
        let a = f.stock(10);
        let audit_id = f.plan(vec![a]);
        f.audits.start(audit_id, f.actor).unwrap();
        f.count(audit_id, 1, 7);

        let outcome = f.audits.reconcile(audit_id, 1, f.actor).unwrap();
        assert_eq!(outcome.item.status, AuditItemStatus::Reconciled);
        assert_eq!(outcome.movement.movement_type, DeltaType::Set);
        assert_eq!(outcome.movement.reason, ReasonCode::AuditReconciliation);
        assert_eq!((outcome.movement.previous_quantity, outcome.movement.new_quantity), (10, 7));
        assert!(outcome.completed);
        assert_eq!(outcome.progress.percentage, 100);

        let audit = f.audits.get(audit_id).unwrap();
        assert_eq!(audit.status(), AuditStatus::Completed);
        assert!(audit.end_date().is_some());
    }

    #[test]
    fn reconciling_a_matching_count_is_rejected() {
        let f = Fixture::new();
        let a = f.stock(3);
        let audit_id = f.plan(vec![a]);
        f.audits.start(audit_id, f.actor).unwrap();
        let outcome = f.count(audit_id, 1, 3);
        assert!(outcome.completed);

        assert!(f.audits.reconcile(audit_id, 1, f.actor).is_err());
    }

    #[test]
    fn planning_at_a_store_is_rejected() {
        let f = Fixture::new();
        let store = LocationService::new(f.store.clone())
            .register("ST", "Store", LocationKind::Store)
            .unwrap();
        let err = f
            .audits
            .plan(
                PlanAuditRequest {
                    warehouse_id: Some(store),
                    ..PlanAuditRequest::default()
                },
                f.actor,
            )
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
    }
}
