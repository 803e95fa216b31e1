use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EventSourced, LocationId, Money,
    ProductId, UserId, aggregate_id, money,
};
use storeops_events::Event;

aggregate_id!(
    /// Transfer identifier.
    TransferId
);

/// Transfer status lifecycle.
///
/// ```text
/// DRAFT -> PENDING -> APPROVED -> IN_TRANSIT -> COMPLETED
///   |        |  \_______________/^
///   |        +-> REJECTED
///   +--------+-> CANCELLED
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Draft,
    Pending,
    Approved,
    InTransit,
    Completed,
    Rejected,
    Cancelled,
}

impl TransferStatus {
    /// The complete transition table; anything not listed is illegal.
    pub fn can_transition_to(self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Draft, Cancelled)
                | (Pending, Approved)
                | (Pending, InTransit)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, InTransit)
                | (InTransit, Completed)
        )
    }

    /// Items, locations and notes may only change before approval.
    pub fn is_editable(self) -> bool {
        matches!(self, TransferStatus::Draft | TransferStatus::Pending)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Rejected | TransferStatus::Cancelled
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferKind {
    Restock,
    Return,
    Relocation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferPriority {
    Low,
    Normal,
    High,
    Urgent,
}

/// One product moving between locations.
///
/// Target prices may differ from source prices; they are what the destination
/// record is priced at on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub source_cost_price: Money,
    pub source_retail_price: Money,
    pub target_cost_price: Money,
    pub target_retail_price: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTotals {
    pub total_items: i64,
    pub total_cost: Money,
    pub total_retail: Money,
}

impl TransferTotals {
    pub fn of(items: &[TransferItem]) -> Result<Self, DomainError> {
        items.iter().try_fold(Self::default(), |acc, item| {
            Ok(Self {
                total_items: money::add_units(acc.total_items, item.quantity)?,
                total_cost: money::add(
                    acc.total_cost,
                    money::extend(item.source_cost_price, item.quantity)?,
                )?,
                total_retail: money::add(
                    acc.total_retail,
                    money::extend(item.source_retail_price, item.quantity)?,
                )?,
            })
        })
    }
}

/// Aggregate root: Transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    id: TransferId,
    transfer_number: String,
    from_location: Option<LocationId>,
    to_location: Option<LocationId>,
    kind: TransferKind,
    priority: TransferPriority,
    status: TransferStatus,
    items: Vec<TransferItem>,
    totals: TransferTotals,
    notes: Option<String>,
    requested_by: Option<UserId>,
    approved_by: Option<UserId>,
    approved_date: Option<DateTime<Utc>>,
    shipped_date: Option<DateTime<Utc>>,
    shipping_method: Option<String>,
    tracking_number: Option<String>,
    completed_date: Option<DateTime<Utc>>,
    actual_delivery_date: Option<DateTime<Utc>>,
    expected_delivery_date: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    cancellation_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Transfer {
    pub fn transfer_number(&self) -> &str {
        &self.transfer_number
    }

    pub fn from_location(&self) -> Option<LocationId> {
        self.from_location
    }

    pub fn to_location(&self) -> Option<LocationId> {
        self.to_location
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    pub fn priority(&self) -> TransferPriority {
        self.priority
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    pub fn totals(&self) -> &TransferTotals {
        &self.totals
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn approved_date(&self) -> Option<DateTime<Utc>> {
        self.approved_date
    }

    pub fn shipped_date(&self) -> Option<DateTime<Utc>> {
        self.shipped_date
    }

    pub fn shipping_method(&self) -> Option<&str> {
        self.shipping_method.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn completed_date(&self) -> Option<DateTime<Utc>> {
        self.completed_date
    }

    pub fn actual_delivery_date(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery_date
    }

    pub fn expected_delivery_date(&self) -> Option<DateTime<Utc>> {
        self.expected_delivery_date
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Transfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransfer {
    pub transfer_id: TransferId,
    pub transfer_number: String,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub kind: TransferKind,
    pub priority: TransferPriority,
    pub items: Vec<TransferItem>,
    pub notes: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateTransfer. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTransfer {
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub kind: Option<TransferKind>,
    pub priority: Option<TransferPriority>,
    pub items: Option<Vec<TransferItem>>,
    pub notes: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

/// Command: ShipTransfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipTransfer {
    pub shipping_method: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    Create(CreateTransfer),
    Update {
        changes: UpdateTransfer,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Submit {
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Approve {
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Reject {
        reason: Option<String>,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Cancel {
        reason: Option<String>,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Ship {
        shipment: ShipTransfer,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Receive {
        notes: Option<String>,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Delete {
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

/// Event: TransferCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCreated {
    pub transfer_id: TransferId,
    pub transfer_number: String,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub kind: TransferKind,
    pub priority: TransferPriority,
    pub items: Vec<TransferItem>,
    pub totals: TransferTotals,
    pub notes: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferUpdated (carries the full post-edit values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferUpdated {
    pub transfer_id: TransferId,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub kind: TransferKind,
    pub priority: TransferPriority,
    pub items: Vec<TransferItem>,
    pub totals: TransferTotals,
    pub notes: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub updated_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferShipped {
    pub transfer_id: TransferId,
    pub shipping_method: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub shipped_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCompleted {
    pub transfer_id: TransferId,
    pub notes: Option<String>,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    Created(TransferCreated),
    Updated(TransferUpdated),
    Submitted {
        transfer_id: TransferId,
        submitted_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    Approved {
        transfer_id: TransferId,
        approved_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    Rejected {
        transfer_id: TransferId,
        reason: Option<String>,
        rejected_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        transfer_id: TransferId,
        reason: Option<String>,
        cancelled_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    Shipped(TransferShipped),
    Completed(TransferCompleted),
    Deleted {
        transfer_id: TransferId,
        deleted_by: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::Created(_) => "transfers.transfer.created",
            TransferEvent::Updated(_) => "transfers.transfer.updated",
            TransferEvent::Submitted { .. } => "transfers.transfer.submitted",
            TransferEvent::Approved { .. } => "transfers.transfer.approved",
            TransferEvent::Rejected { .. } => "transfers.transfer.rejected",
            TransferEvent::Cancelled { .. } => "transfers.transfer.cancelled",
            TransferEvent::Shipped(_) => "transfers.transfer.shipped",
            TransferEvent::Completed(_) => "transfers.transfer.completed",
            TransferEvent::Deleted { .. } => "transfers.transfer.deleted",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::Created(e) => e.occurred_at,
            TransferEvent::Updated(e) => e.occurred_at,
            TransferEvent::Shipped(e) => e.occurred_at,
            TransferEvent::Completed(e) => e.occurred_at,
            TransferEvent::Submitted { occurred_at, .. }
            | TransferEvent::Approved { occurred_at, .. }
            | TransferEvent::Rejected { occurred_at, .. }
            | TransferEvent::Cancelled { occurred_at, .. }
            | TransferEvent::Deleted { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Transfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::Created(e) => {
                self.id = e.transfer_id;
                self.transfer_number = e.transfer_number.clone();
                self.from_location = Some(e.from_location);
                self.to_location = Some(e.to_location);
                self.kind = e.kind;
                self.priority = e.priority;
                self.items = e.items.clone();
                self.totals = e.totals.clone();
                self.notes = e.notes.clone();
                self.expected_delivery_date = e.expected_delivery_date;
                self.requested_by = Some(e.requested_by);
                self.created_at = Some(e.occurred_at);
                self.status = TransferStatus::Draft;
                self.created = true;
            }
            TransferEvent::Updated(e) => {
                self.from_location = Some(e.from_location);
                self.to_location = Some(e.to_location);
                self.kind = e.kind;
                self.priority = e.priority;
                self.items = e.items.clone();
                self.totals = e.totals.clone();
                self.notes = e.notes.clone();
                self.expected_delivery_date = e.expected_delivery_date;
            }
            TransferEvent::Submitted { .. } => self.status = TransferStatus::Pending,
            TransferEvent::Approved {
                approved_by,
                occurred_at,
                ..
            } => {
                self.status = TransferStatus::Approved;
                self.approved_by = Some(*approved_by);
                self.approved_date = Some(*occurred_at);
            }
            TransferEvent::Rejected { reason, .. } => {
                self.status = TransferStatus::Rejected;
                self.rejection_reason = reason.clone();
            }
            TransferEvent::Cancelled { reason, .. } => {
                self.status = TransferStatus::Cancelled;
                self.cancellation_reason = reason.clone();
            }
            TransferEvent::Shipped(e) => {
                self.status = TransferStatus::InTransit;
                self.shipped_date = Some(e.occurred_at);
                self.shipping_method = e.shipping_method.clone();
                self.tracking_number = e.tracking_number.clone();
                if e.notes.is_some() {
                    self.notes = e.notes.clone();
                }
            }
            TransferEvent::Completed(e) => {
                self.status = TransferStatus::Completed;
                self.completed_date = Some(e.occurred_at);
                self.actual_delivery_date = Some(e.occurred_at);
                if e.notes.is_some() {
                    self.notes = e.notes.clone();
                }
            }
            TransferEvent::Deleted { .. } => self.deleted = true,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if let TransferCommand::Create(cmd) = command {
            return self.handle_create(cmd);
        }
        self.ensure_exists()?;

        match command {
            TransferCommand::Create(_) => Err(DomainError::conflict("transfer already exists")),
            TransferCommand::Update {
                changes,
                actor_id,
                occurred_at,
            } => self.handle_update(changes, *actor_id, *occurred_at),
            TransferCommand::Submit {
                actor_id,
                occurred_at,
            } => {
                self.ensure_transition(TransferStatus::Pending, "submit")?;
                Ok(vec![TransferEvent::Submitted {
                    transfer_id: self.id,
                    submitted_by: *actor_id,
                    occurred_at: *occurred_at,
                }])
            }
            TransferCommand::Approve {
                actor_id,
                occurred_at,
            } => {
                self.ensure_transition(TransferStatus::Approved, "approve")?;
                Ok(vec![TransferEvent::Approved {
                    transfer_id: self.id,
                    approved_by: *actor_id,
                    occurred_at: *occurred_at,
                }])
            }
            TransferCommand::Reject {
                reason,
                actor_id,
                occurred_at,
            } => {
                self.ensure_transition(TransferStatus::Rejected, "reject")?;
                Ok(vec![TransferEvent::Rejected {
                    transfer_id: self.id,
                    reason: reason.clone(),
                    rejected_by: *actor_id,
                    occurred_at: *occurred_at,
                }])
            }
            TransferCommand::Cancel {
                reason,
                actor_id,
                occurred_at,
            } => {
                self.ensure_transition(TransferStatus::Cancelled, "cancel")?;
                Ok(vec![TransferEvent::Cancelled {
                    transfer_id: self.id,
                    reason: reason.clone(),
                    cancelled_by: *actor_id,
                    occurred_at: *occurred_at,
                }])
            }
            TransferCommand::Ship {
                shipment,
                actor_id,
                occurred_at,
            } => {
                self.ensure_transition(TransferStatus::InTransit, "ship")?;
                Ok(vec![TransferEvent::Shipped(TransferShipped {
                    transfer_id: self.id,
                    shipping_method: shipment.shipping_method.clone(),
                    tracking_number: shipment.tracking_number.clone(),
                    notes: shipment.notes.clone(),
                    shipped_by: *actor_id,
                    occurred_at: *occurred_at,
                })])
            }
            TransferCommand::Receive {
                notes,
                actor_id,
                occurred_at,
            } => {
                self.ensure_transition(TransferStatus::Completed, "receive")?;
                Ok(vec![TransferEvent::Completed(TransferCompleted {
                    transfer_id: self.id,
                    notes: notes.clone(),
                    received_by: *actor_id,
                    occurred_at: *occurred_at,
                })])
            }
            TransferCommand::Delete {
                actor_id,
                occurred_at,
            } => {
                if self.status != TransferStatus::Draft {
                    return Err(DomainError::invalid_transition(
                        "transfer",
                        self.status,
                        "delete",
                    ));
                }
                Ok(vec![TransferEvent::Deleted {
                    transfer_id: self.id,
                    deleted_by: *actor_id,
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

impl Transfer {
    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found("transfer", self.id));
        }
        Ok(())
    }

    fn ensure_transition(&self, next: TransferStatus, action: &str) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_transition("transfer", self.status, action));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transfer already exists"));
        }
        if cmd.transfer_id != self.id {
            return Err(DomainError::invariant("transfer_id mismatch"));
        }
        if cmd.transfer_number.trim().is_empty() {
            return Err(DomainError::validation("transfer_number cannot be empty"));
        }
        validate_route(cmd.from_location, cmd.to_location)?;
        validate_items(&cmd.items)?;

        Ok(vec![TransferEvent::Created(TransferCreated {
            transfer_id: cmd.transfer_id,
            transfer_number: cmd.transfer_number.clone(),
            from_location: cmd.from_location,
            to_location: cmd.to_location,
            kind: cmd.kind,
            priority: cmd.priority,
            totals: TransferTotals::of(&cmd.items)?,
            items: cmd.items.clone(),
            notes: cmd.notes.clone(),
            expected_delivery_date: cmd.expected_delivery_date,
            requested_by: cmd.requested_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(
        &self,
        changes: &UpdateTransfer,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<TransferEvent>, DomainError> {
        if !self.status.is_editable() {
            return Err(DomainError::invalid_transition("transfer", self.status, "edit"));
        }

        let from_location = changes
            .from_location
            .or(self.from_location)
            .ok_or_else(|| DomainError::invariant("transfer has no source location"))?;
        let to_location = changes
            .to_location
            .or(self.to_location)
            .ok_or_else(|| DomainError::invariant("transfer has no destination location"))?;
        validate_route(from_location, to_location)?;

        let items = changes.items.clone().unwrap_or_else(|| self.items.clone());
        validate_items(&items)?;

        Ok(vec![TransferEvent::Updated(TransferUpdated {
            transfer_id: self.id,
            from_location,
            to_location,
            kind: changes.kind.unwrap_or(self.kind),
            priority: changes.priority.unwrap_or(self.priority),
            totals: TransferTotals::of(&items)?,
            items,
            notes: changes.notes.clone().or_else(|| self.notes.clone()),
            expected_delivery_date: changes.expected_delivery_date.or(self.expected_delivery_date),
            updated_by: actor_id,
            occurred_at,
        })])
    }
}

fn validate_route(from: LocationId, to: LocationId) -> Result<(), DomainError> {
    if from == to {
        return Err(DomainError::validation(
            "source and destination locations must differ",
        ));
    }
    Ok(())
}

fn validate_items(items: &[TransferItem]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::validation("transfer must contain at least one item"));
    }
    for item in items {
        if item.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
        let prices = [
            item.source_cost_price,
            item.source_retail_price,
            item.target_cost_price,
            item.target_retail_price,
        ];
        if prices.iter().any(|p| p.is_sign_negative()) {
            return Err(DomainError::validation(format!(
                "prices for product {} cannot be negative",
                item.product_id
            )));
        }
    }
    Ok(())
}

impl EventSourced for Transfer {
    const AGGREGATE_TYPE: &'static str = "transfers.transfer";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: TransferId(id),
            transfer_number: String::new(),
            from_location: None,
            to_location: None,
            kind: TransferKind::Restock,
            priority: TransferPriority::Normal,
            status: TransferStatus::Draft,
            items: Vec::new(),
            totals: TransferTotals::default(),
            notes: None,
            requested_by: None,
            approved_by: None,
            approved_date: None,
            shipped_date: None,
            shipping_method: None,
            tracking_number: None,
            completed_date: None,
            actual_delivery_date: None,
            expected_delivery_date: None,
            rejection_reason: None,
            cancellation_reason: None,
            created_at: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    fn exists(&self) -> bool {
        self.created && !self.deleted
    }
}
