use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EventSourced, LocationId, ProductId,
    UserId, aggregate_id,
};
use storeops_events::Event;
use storeops_inventory::InventoryRecordId;

aggregate_id!(
    /// Audit identifier.
    AuditId
);

/// Audit status lifecycle: `PLANNED -> IN_PROGRESS -> COMPLETED`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Planned,
    InProgress,
    Completed,
}

impl AuditStatus {
    pub fn can_transition_to(self, next: AuditStatus) -> bool {
        matches!(
            (self, next),
            (AuditStatus::Planned, AuditStatus::InProgress)
                | (AuditStatus::InProgress, AuditStatus::Completed)
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditItemStatus {
    Pending,
    Counted,
    Discrepancy,
    Reconciled,
}

impl AuditItemStatus {
    /// Counts towards the completion percentage.
    pub fn is_settled(self) -> bool {
        matches!(self, AuditItemStatus::Counted | AuditItemStatus::Reconciled)
    }
}

/// What an item is created from: a record and its on-hand quantity at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditItemSeed {
    pub product_id: ProductId,
    pub record_id: InventoryRecordId,
    pub expected_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditItem {
    /// 1-based position within the audit.
    pub item_id: u32,
    pub product_id: ProductId,
    pub record_id: InventoryRecordId,
    /// Snapshot taken when the item was created; never recomputed.
    pub expected_quantity: i64,
    pub counted_quantity: Option<i64>,
    pub discrepancy: Option<i64>,
    pub status: AuditItemStatus,
    pub notes: Option<String>,
    pub counted_by: Option<UserId>,
    pub counted_at: Option<DateTime<Utc>>,
}

/// Progress summary of an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditProgress {
    pub total_items: usize,
    /// COUNTED or RECONCILED.
    pub settled_items: usize,
    pub discrepancy_items: usize,
    pub pending_items: usize,
    /// `round(100 * settled / total)`, half-up, and never 100 while an item
    /// is unsettled.
    pub percentage: u8,
}

impl AuditProgress {
    pub fn of(items: &[AuditItem]) -> Self {
        let total = items.len();
        let count = |s: AuditItemStatus| items.iter().filter(|i| i.status == s).count();
        let settled = items.iter().filter(|i| i.status.is_settled()).count();
        let percentage = if total == 0 {
            0
        } else if settled == total {
            100
        } else {
            ((200 * settled + total) / (2 * total)).min(99) as u8
        };
        Self {
            total_items: total,
            settled_items: settled,
            discrepancy_items: count(AuditItemStatus::Discrepancy),
            pending_items: count(AuditItemStatus::Pending),
            percentage,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_items > 0 && self.settled_items == self.total_items
    }
}

/// One submitted count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub item_id: u32,
    pub counted_quantity: i64,
    pub notes: Option<String>,
}

/// Aggregate root: Audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    id: AuditId,
    audit_number: String,
    warehouse_id: Option<LocationId>,
    status: AuditStatus,
    items: Vec<AuditItem>,
    scheduled_date: Option<DateTime<Utc>>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    planned_by: Option<UserId>,
    version: u64,
    created: bool,
}

impl Audit {
    pub fn audit_number(&self) -> &str {
        &self.audit_number
    }

    pub fn warehouse_id(&self) -> Option<LocationId> {
        self.warehouse_id
    }

    pub fn status(&self) -> AuditStatus {
        self.status
    }

    pub fn items(&self) -> &[AuditItem] {
        &self.items
    }

    pub fn item(&self, item_id: u32) -> Option<&AuditItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn scheduled_date(&self) -> Option<DateTime<Utc>> {
        self.scheduled_date
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn progress(&self) -> AuditProgress {
        AuditProgress::of(&self.items)
    }

    /// Completion evaluation: an in-progress audit whose items are all settled.
    pub fn completion_due(&self) -> bool {
        self.status == AuditStatus::InProgress && self.progress().is_complete()
    }
}

impl AggregateRoot for Audit {
    type Id = AuditId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlanAudit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAudit {
    pub audit_id: AuditId,
    pub audit_number: String,
    pub warehouse_id: LocationId,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Optional pre-selected scope (partial audit).
    pub items: Vec<AuditItemSeed>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCommand {
    Plan(PlanAudit),
    /// `snapshot` is only used when the audit has no items yet.
    Start {
        snapshot: Vec<AuditItemSeed>,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    RecordCounts {
        counts: Vec<ItemCount>,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Reconcile {
        item_id: u32,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPlanned {
    pub audit_id: AuditId,
    pub audit_number: String,
    pub warehouse_id: LocationId,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub planned_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounted {
    pub audit_id: AuditId,
    pub item_id: u32,
    pub counted_quantity: i64,
    pub discrepancy: i64,
    pub status: AuditItemStatus,
    pub notes: Option<String>,
    pub counted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEvent {
    Planned(AuditPlanned),
    ItemsAdded {
        audit_id: AuditId,
        items: Vec<AuditItem>,
        occurred_at: DateTime<Utc>,
    },
    Started {
        audit_id: AuditId,
        started_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ItemCounted(ItemCounted),
    ItemReconciled {
        audit_id: AuditId,
        item_id: u32,
        reconciled_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    Completed {
        audit_id: AuditId,
        total_items: usize,
        discrepancies_reconciled: usize,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for AuditEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::Planned(_) => "audits.audit.planned",
            AuditEvent::ItemsAdded { .. } => "audits.audit.items_added",
            AuditEvent::Started { .. } => "audits.audit.started",
            AuditEvent::ItemCounted(_) => "audits.audit.item_counted",
            AuditEvent::ItemReconciled { .. } => "audits.audit.item_reconciled",
            AuditEvent::Completed { .. } => "audits.audit.completed",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AuditEvent::Planned(e) => e.occurred_at,
            AuditEvent::ItemCounted(e) => e.occurred_at,
            AuditEvent::ItemsAdded { occurred_at, .. }
            | AuditEvent::Started { occurred_at, .. }
            | AuditEvent::ItemReconciled { occurred_at, .. }
            | AuditEvent::Completed { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Audit {
    type Command = AuditCommand;
    type Event = AuditEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AuditEvent::Planned(e) => {
                self.id = e.audit_id;
                self.audit_number = e.audit_number.clone();
                self.warehouse_id = Some(e.warehouse_id);
                self.scheduled_date = e.scheduled_date;
                self.notes = e.notes.clone();
                self.planned_by = Some(e.planned_by);
                self.status = AuditStatus::Planned;
                self.created = true;
            }
            AuditEvent::ItemsAdded { items, .. } => self.items.extend(items.iter().cloned()),
            AuditEvent::Started { occurred_at, .. } => {
                self.status = AuditStatus::InProgress;
                self.start_date = Some(*occurred_at);
            }
            AuditEvent::ItemCounted(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.item_id == e.item_id) {
                    item.counted_quantity = Some(e.counted_quantity);
                    item.discrepancy = Some(e.discrepancy);
                    item.status = e.status;
                    item.notes = e.notes.clone().or_else(|| item.notes.clone());
                    item.counted_by = Some(e.counted_by);
                    item.counted_at = Some(e.occurred_at);
                }
            }
            AuditEvent::ItemReconciled { item_id, .. } => {
                if let Some(item) = self.items.iter_mut().find(|i| i.item_id == *item_id) {
                    item.status = AuditItemStatus::Reconciled;
                }
            }
            AuditEvent::Completed { occurred_at, .. } => {
                self.status = AuditStatus::Completed;
                self.end_date = Some(*occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if let AuditCommand::Plan(cmd) = command {
            return self.handle_plan(cmd);
        }
        if !self.created {
            return Err(DomainError::not_found("audit", self.id));
        }

        match command {
            AuditCommand::Plan(_) => Err(DomainError::conflict("audit already exists")),
            AuditCommand::Start {
                snapshot,
                actor_id,
                occurred_at,
            } => self.handle_start(snapshot, *actor_id, *occurred_at),
            AuditCommand::RecordCounts {
                counts,
                actor_id,
                occurred_at,
            } => self.handle_counts(counts, *actor_id, *occurred_at),
            AuditCommand::Reconcile {
                item_id,
                actor_id,
                occurred_at,
            } => self.handle_reconcile(*item_id, *actor_id, *occurred_at),
        }
    }
}

impl Audit {
    fn ensure_in_progress(&self, action: &str) -> Result<(), DomainError> {
        if self.status != AuditStatus::InProgress {
            return Err(DomainError::invalid_transition("audit", self.status, action));
        }
        Ok(())
    }

    fn build_items(&self, seeds: &[AuditItemSeed]) -> Result<Vec<AuditItem>, DomainError> {
        let mut seen: HashSet<InventoryRecordId> =
            self.items.iter().map(|i| i.record_id).collect();
        let first_id = self.items.len() as u32 + 1;

        seeds
            .iter()
            .enumerate()
            .map(|(idx, seed)| {
                if seed.expected_quantity < 0 {
                    return Err(DomainError::validation("expected quantity cannot be negative"));
                }
                if !seen.insert(seed.record_id) {
                    return Err(DomainError::validation(format!(
                        "product {} is already part of this audit",
                        seed.product_id
                    )));
                }
                Ok(AuditItem {
                    item_id: first_id + idx as u32,
                    product_id: seed.product_id,
                    record_id: seed.record_id,
                    expected_quantity: seed.expected_quantity,
                    counted_quantity: None,
                    discrepancy: None,
                    status: AuditItemStatus::Pending,
                    notes: None,
                    counted_by: None,
                    counted_at: None,
                })
            })
            .collect()
    }

    /// Explicit completion step, evaluated against the post-mutation state.
    fn evaluate_completion(&self, after: &Audit, occurred_at: DateTime<Utc>) -> Option<AuditEvent> {
        if !after.completion_due() {
            return None;
        }
        Some(AuditEvent::Completed {
            audit_id: self.id,
            total_items: after.items.len(),
            discrepancies_reconciled: after
                .items
                .iter()
                .filter(|i| i.status == AuditItemStatus::Reconciled)
                .count(),
            occurred_at,
        })
    }

    fn handle_plan(&self, cmd: &PlanAudit) -> Result<Vec<AuditEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("audit already exists"));
        }
        if cmd.audit_id != self.id {
            return Err(DomainError::invariant("audit_id mismatch"));
        }
        if cmd.audit_number.trim().is_empty() {
            return Err(DomainError::validation("audit_number cannot be empty"));
        }

        let mut events = vec![AuditEvent::Planned(AuditPlanned {
            audit_id: cmd.audit_id,
            audit_number: cmd.audit_number.clone(),
            warehouse_id: cmd.warehouse_id,
            scheduled_date: cmd.scheduled_date,
            notes: cmd.notes.clone(),
            planned_by: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })];

        if !cmd.items.is_empty() {
            events.push(AuditEvent::ItemsAdded {
                audit_id: cmd.audit_id,
                items: self.build_items(&cmd.items)?,
                occurred_at: cmd.occurred_at,
            });
        }
        Ok(events)
    }

    fn handle_start(
        &self,
        snapshot: &[AuditItemSeed],
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<AuditEvent>, DomainError> {
        if !self.status.can_transition_to(AuditStatus::InProgress) {
            return Err(DomainError::invalid_transition("audit", self.status, "start"));
        }
        let warehouse_id = self
            .warehouse_id
            .ok_or_else(|| DomainError::invariant("audit has no warehouse"))?;

        let mut events = Vec::with_capacity(2);
        if self.items.is_empty() {
            if snapshot.is_empty() {
                return Err(DomainError::NoInventoryToAudit(warehouse_id));
            }
            events.push(AuditEvent::ItemsAdded {
                audit_id: self.id,
                items: self.build_items(snapshot)?,
                occurred_at,
            });
        }
        events.push(AuditEvent::Started {
            audit_id: self.id,
            started_by: actor_id,
            occurred_at,
        });
        Ok(events)
    }

    fn handle_counts(
        &self,
        counts: &[ItemCount],
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<AuditEvent>, DomainError> {
        self.ensure_in_progress("record counts")?;
        if counts.is_empty() {
            return Err(DomainError::validation("at least one count is required"));
        }

        let mut working = self.clone();
        let mut events = Vec::with_capacity(counts.len() + 1);
        for count in counts {
            if count.counted_quantity < 0 {
                return Err(DomainError::validation(format!(
                    "counted quantity for item {} cannot be negative",
                    count.item_id
                )));
            }
            let item = working
                .item(count.item_id)
                .ok_or_else(|| DomainError::not_found("audit item", count.item_id))?;
            if item.status == AuditItemStatus::Reconciled {
                return Err(DomainError::invalid_transition(
                    "audit item",
                    item.status,
                    "recount",
                ));
            }

            let discrepancy = count.counted_quantity - item.expected_quantity;
            let event = AuditEvent::ItemCounted(ItemCounted {
                audit_id: self.id,
                item_id: count.item_id,
                counted_quantity: count.counted_quantity,
                discrepancy,
                status: if discrepancy == 0 {
                    AuditItemStatus::Counted
                } else {
                    AuditItemStatus::Discrepancy
                },
                notes: count.notes.clone(),
                counted_by: actor_id,
                occurred_at,
            });
            working.apply(&event);
            events.push(event);
        }

        events.extend(self.evaluate_completion(&working, occurred_at));
        Ok(events)
    }

    fn handle_reconcile(
        &self,
        item_id: u32,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<AuditEvent>, DomainError> {
        self.ensure_in_progress("reconcile")?;
        let item = self
            .item(item_id)
            .ok_or_else(|| DomainError::not_found("audit item", item_id))?;
        if item.status != AuditItemStatus::Discrepancy {
            return Err(DomainError::invalid_transition(
                "audit item",
                item.status,
                "reconcile",
            ));
        }

        let event = AuditEvent::ItemReconciled {
            audit_id: self.id,
            item_id,
            reconciled_by: actor_id,
            occurred_at,
        };
        let mut working = self.clone();
        working.apply(&event);

        let mut events = vec![event];
        events.extend(self.evaluate_completion(&working, occurred_at));
        Ok(events)
    }
}

impl EventSourced for Audit {
    const AGGREGATE_TYPE: &'static str = "audits.audit";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: AuditId(id),
            audit_number: String::new(),
            warehouse_id: None,
            status: AuditStatus::Planned,
            items: Vec::new(),
            scheduled_date: None,
            start_date: None,
            end_date: None,
            notes: None,
            planned_by: None,
            version: 0,
            created: false,
        }
    }

    fn exists(&self) -> bool {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn seed(expected: i64) -> AuditItemSeed {
        let product_id = ProductId::new();
        AuditItemSeed {
            product_id,
            record_id: InventoryRecordId::for_stock(product_id, LocationId::new()),
            expected_quantity: expected,
        }
    }

    fn run(audit: &mut Audit, cmd: AuditCommand) -> Result<Vec<AuditEvent>, DomainError> {
        let events = audit.handle(&cmd)?;
        for e in &events {
            audit.apply(e);
        }
        Ok(events)
    }

    fn planned(items: Vec<AuditItemSeed>) -> Audit {
        let id = AuditId::new();
        let mut audit = Audit::empty(id.0);
        run(
            &mut audit,
            AuditCommand::Plan(PlanAudit {
                audit_id: id,
                audit_number: "AUD-20260101-0001".to_string(),
                warehouse_id: LocationId::new(),
                scheduled_date: None,
                notes: None,
                items,
                actor_id: UserId::new(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        audit
    }

    fn start(audit: &mut Audit, snapshot: Vec<AuditItemSeed>) -> Result<Vec<AuditEvent>, DomainError> {
        run(
            audit,
            AuditCommand::Start {
                snapshot,
                actor_id: UserId::new(),
                occurred_at: test_time(),
            },
        )
    }

    fn count(audit: &mut Audit, item_id: u32, qty: i64) -> Result<Vec<AuditEvent>, DomainError> {
        run(
            audit,
            AuditCommand::RecordCounts {
                counts: vec![ItemCount {
                    item_id,
                    counted_quantity: qty,
                    notes: None,
                }],
                actor_id: UserId::new(),
                occurred_at: test_time(),
            },
        )
    }

    #[test]
    fn start_without_inventory_fails() {
        let mut audit = planned(vec![]);
        let err = start(&mut audit, vec![]).unwrap_err();
        assert!(matches!(err, DomainError::NoInventoryToAudit(_)));
        assert_eq!(audit.status(), AuditStatus::Planned);
    }

    #[test]
    fn start_snapshots_items_when_none_were_planned() {
        let mut audit = planned(vec![]);
        start(&mut audit, vec![seed(10), seed(4)]).unwrap();
        assert_eq!(audit.status(), AuditStatus::InProgress);
        assert!(audit.start_date().is_some());
        assert_eq!(audit.items().len(), 2);
        assert!(audit.items().iter().all(|i| i.status == AuditItemStatus::Pending));
    }

    #[test]
    fn start_keeps_a_preselected_scope() {
        let mut audit = planned(vec![seed(3)]);
        start(&mut audit, vec![seed(10), seed(4)]).unwrap();
        assert_eq!(audit.items().len(), 1);
    }

    #[test]
    fn starting_twice_is_an_invalid_transition() {
        let mut audit = planned(vec![seed(1)]);
        start(&mut audit, vec![]).unwrap();
        assert!(matches!(
            start(&mut audit, vec![]),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn counting_before_start_is_rejected() {
        let mut audit = planned(vec![seed(1)]);
        assert!(matches!(
            count(&mut audit, 1, 1),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn discrepancy_and_progress_follow_counts() {
        let mut audit = planned(vec![seed(10), seed(5), seed(8)]);
        start(&mut audit, vec![]).unwrap();

        count(&mut audit, 1, 10).unwrap();
        count(&mut audit, 2, 3).unwrap();

        let first = audit.item(1).unwrap();
        assert_eq!(first.discrepancy, Some(0));
        assert_eq!(first.status, AuditItemStatus::Counted);

        let second = audit.item(2).unwrap();
        assert_eq!(second.discrepancy, Some(-2));
        assert_eq!(second.status, AuditItemStatus::Discrepancy);

        let progress = audit.progress();
        assert_eq!(progress.settled_items, 1);
        assert_eq!(progress.discrepancy_items, 1);
        assert_eq!(progress.percentage, 33);
        assert_eq!(audit.status(), AuditStatus::InProgress);
    }

    #[test]
    fn last_settling_count_emits_an_explicit_completion_event() {
        let mut audit = planned(vec![seed(2), seed(6)]);
        start(&mut audit, vec![]).unwrap();

        let events = count(&mut audit, 1, 2).unwrap();
        assert_eq!(events.len(), 1);

        let events = count(&mut audit, 2, 6).unwrap();
        assert!(matches!(events.last(), Some(AuditEvent::Completed { total_items: 2, .. })));
        assert_eq!(audit.status(), AuditStatus::Completed);
        assert!(audit.end_date().is_some());
        assert_eq!(audit.progress().percentage, 100);
    }

    #[test]
    fn discrepancies_block_completion_until_reconciled() {
        let mut audit = planned(vec![seed(5)]);
        start(&mut audit, vec![]).unwrap();
        count(&mut audit, 1, 4).unwrap();
        assert_eq!(audit.status(), AuditStatus::InProgress);

        let events = run(
            &mut audit,
            AuditCommand::Reconcile {
                item_id: 1,
                actor_id: UserId::new(),
                occurred_at: test_time(),
            },
        )
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(audit.item(1).unwrap().status, AuditItemStatus::Reconciled);
        assert_eq!(audit.status(), AuditStatus::Completed);
    }

    #[test]
    fn unknown_item_is_not_found_and_negative_count_invalid() {
        let mut audit = planned(vec![seed(5)]);
        start(&mut audit, vec![]).unwrap();
        assert!(matches!(count(&mut audit, 9, 1), Err(DomainError::NotFound { .. })));
        assert!(matches!(count(&mut audit, 1, -1), Err(DomainError::Validation(_))));
    }

    fn items_with(statuses: impl IntoIterator<Item = AuditItemStatus>) -> Vec<AuditItem> {
        statuses
            .into_iter()
            .enumerate()
            .map(|(n, status)| {
                let s = seed(1);
                AuditItem {
                    item_id: n as u32 + 1,
                    product_id: s.product_id,
                    record_id: s.record_id,
                    expected_quantity: 1,
                    counted_quantity: None,
                    discrepancy: None,
                    status,
                    notes: None,
                    counted_by: None,
                    counted_at: None,
                }
            })
            .collect()
    }

    #[test]
    fn percentage_rounds_half_up() {
        let items = items_with(
            std::iter::once(AuditItemStatus::Counted)
                .chain(std::iter::repeat_n(AuditItemStatus::Pending, 7)),
        );
        // 1 / 8 = 12.5% -> 13
        assert_eq!(AuditProgress::of(&items).percentage, 13);
    }

    #[test]
    fn an_open_discrepancy_keeps_progress_below_100() {
        let items = items_with(
            std::iter::repeat_n(AuditItemStatus::Counted, 199)
                .chain(std::iter::once(AuditItemStatus::Discrepancy)),
        );
        let progress = AuditProgress::of(&items);
        assert_eq!(progress.percentage, 99);
        assert_eq!(progress.discrepancy_items, 1);
        assert!(!progress.is_complete());

        let items = items_with(std::iter::repeat_n(AuditItemStatus::Reconciled, 3));
        assert_eq!(AuditProgress::of(&items).percentage, 100);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn completes_only_when_every_item_is_settled(
            expected in prop::collection::vec(0i64..20, 1..8),
            counted in prop::collection::vec(0i64..20, 1..8),
        ) {
            let mut audit = planned(expected.iter().map(|e| seed(*e)).collect());
            start(&mut audit, vec![]).unwrap();

            for (idx, qty) in counted.iter().enumerate().take(expected.len()) {
                count(&mut audit, idx as u32 + 1, *qty).unwrap();
            }

            let all_settled = audit.items().iter().all(|i| i.status.is_settled());
            prop_assert_eq!(audit.status() == AuditStatus::Completed, all_settled);
            prop_assert_eq!(audit.progress().percentage == 100, all_settled);
        }
    }
}
