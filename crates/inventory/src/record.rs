//! The stock ledger row: one event stream per `(product, location)`.
//!
//! Every quantity mutation is decided here and recorded as a [`MovementEntry`]
//! (the `StockMoved` event). Because the movement is the event that changes the
//! quantity, the ledger row and its movement history can never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EventSourced, LocationId, Money,
    ProductId, UserId, aggregate_id,
};
use storeops_events::Event;

aggregate_id!(
    /// Inventory record identifier, derived from `(product, location)`.
    InventoryRecordId
);

impl InventoryRecordId {
    /// The one stream that holds stock of `product_id` at `location_id`.
    pub fn for_stock(product_id: ProductId, location_id: LocationId) -> Self {
        Self(AggregateId::derived(
            InventoryRecord::AGGREGATE_TYPE,
            &format!("{product_id}@{location_id}"),
        ))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Available,
    OutOfStock,
    Quarantine,
    Damaged,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockCondition {
    New,
    Damaged,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeltaType {
    Add,
    Remove,
    Set,
}

/// Why a movement happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Sale,
    SaleReturn,
    TransferShipment,
    TransferReceipt,
    PurchaseReceipt,
    AuditReconciliation,
    ManualAdjustment,
}

/// Optional price overwrite carried by a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub cost_price: Option<Money>,
    pub retail_price: Option<Money>,
}

impl PriceUpdate {
    pub fn cost(cost_price: Money) -> Self {
        Self {
            cost_price: Some(cost_price),
            retail_price: None,
        }
    }

    pub fn both(cost_price: Money, retail_price: Money) -> Self {
        Self {
            cost_price: Some(cost_price),
            retail_price: Some(retail_price),
        }
    }

    fn is_empty(&self) -> bool {
        self.cost_price.is_none() && self.retail_price.is_none()
    }
}

/// Immutable audit line written for every successful ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub record_id: InventoryRecordId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub movement_type: DeltaType,
    /// Quantity as requested by the caller (always >= 0).
    pub quantity: i64,
    /// Signed effect on on-hand stock.
    pub quantity_delta: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub reason: ReasonCode,
    pub actor_id: UserId,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Read-side view of a record that is known to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub record_id: InventoryRecordId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub available_quantity: i64,
    pub cost_price: Money,
    pub retail_price: Money,
    pub status: StockStatus,
    pub condition: StockCondition,
}

/// Aggregate root: InventoryRecord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    id: InventoryRecordId,
    product_id: Option<ProductId>,
    location_id: Option<LocationId>,
    quantity: i64,
    reserved: i64,
    cost_price: Money,
    retail_price: Money,
    condition: StockCondition,
    quarantined: bool,
    status: StockStatus,
    movements: Vec<MovementEntry>,
    version: u64,
    created: bool,
}

impl InventoryRecord {
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reserved_quantity(&self) -> i64 {
        self.reserved
    }

    /// On-hand quantity not held by reservations.
    pub fn available_quantity(&self) -> i64 {
        (self.quantity - self.reserved).max(0)
    }

    /// What a sale may take: nothing while quarantined or damaged.
    pub fn sellable_quantity(&self) -> i64 {
        match self.status {
            StockStatus::Quarantine | StockStatus::Damaged => 0,
            StockStatus::Available | StockStatus::OutOfStock => self.available_quantity(),
        }
    }

    pub fn status(&self) -> StockStatus {
        self.status
    }

    pub fn condition(&self) -> StockCondition {
        self.condition
    }

    pub fn cost_price(&self) -> Money {
        self.cost_price
    }

    pub fn retail_price(&self) -> Money {
        self.retail_price
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn movements(&self) -> &[MovementEntry] {
        &self.movements
    }

    /// Current state as a plain view, if the record exists.
    pub fn snapshot(&self) -> Option<StockLevel> {
        let (product_id, location_id) = (self.product_id?, self.location_id?);
        Some(StockLevel {
            record_id: self.id,
            product_id,
            location_id,
            quantity: self.quantity,
            reserved_quantity: self.reserved,
            available_quantity: self.available_quantity(),
            cost_price: self.cost_price,
            retail_price: self.retail_price,
            status: self.status,
            condition: self.condition,
        })
    }

    fn derive_status(&self) -> StockStatus {
        if self.quarantined {
            StockStatus::Quarantine
        } else if self.condition == StockCondition::Damaged {
            StockStatus::Damaged
        } else if self.quantity > 0 {
            StockStatus::Available
        } else {
            StockStatus::OutOfStock
        }
    }
}

impl AggregateRoot for InventoryRecord {
    type Id = InventoryRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ApplyDelta (the single ledger mutation primitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyDelta {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub delta_type: DeltaType,
    pub quantity: i64,
    pub reason: ReasonCode,
    pub actor_id: UserId,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub prices: Option<PriceUpdate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryRecordCommand {
    ApplyDelta(ApplyDelta),
    Reserve {
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    ReleaseReservation {
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    Quarantine {
        reason: String,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    ReleaseQuarantine {
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    MarkCondition {
        condition: StockCondition,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOpened {
    pub record_id: InventoryRecordId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricesChanged {
    pub record_id: InventoryRecordId,
    pub cost_price: Option<Money>,
    pub retail_price: Option<Money>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryRecordEvent {
    Opened(RecordOpened),
    StockMoved(MovementEntry),
    PricesChanged(PricesChanged),
    Reserved {
        record_id: InventoryRecordId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    ReservationReleased {
        record_id: InventoryRecordId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    Quarantined {
        record_id: InventoryRecordId,
        reason: String,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    QuarantineReleased {
        record_id: InventoryRecordId,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    ConditionChanged {
        record_id: InventoryRecordId,
        condition: StockCondition,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for InventoryRecordEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryRecordEvent::Opened(_) => "inventory.record.opened",
            InventoryRecordEvent::StockMoved(_) => "inventory.record.stock_moved",
            InventoryRecordEvent::PricesChanged(_) => "inventory.record.prices_changed",
            InventoryRecordEvent::Reserved { .. } => "inventory.record.reserved",
            InventoryRecordEvent::ReservationReleased { .. } => {
                "inventory.record.reservation_released"
            }
            InventoryRecordEvent::Quarantined { .. } => "inventory.record.quarantined",
            InventoryRecordEvent::QuarantineReleased { .. } => {
                "inventory.record.quarantine_released"
            }
            InventoryRecordEvent::ConditionChanged { .. } => "inventory.record.condition_changed",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryRecordEvent::Opened(e) => e.occurred_at,
            InventoryRecordEvent::StockMoved(e) => e.occurred_at,
            InventoryRecordEvent::PricesChanged(e) => e.occurred_at,
            InventoryRecordEvent::Reserved { occurred_at, .. }
            | InventoryRecordEvent::ReservationReleased { occurred_at, .. }
            | InventoryRecordEvent::Quarantined { occurred_at, .. }
            | InventoryRecordEvent::QuarantineReleased { occurred_at, .. }
            | InventoryRecordEvent::ConditionChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for InventoryRecord {
    type Command = InventoryRecordCommand;
    type Event = InventoryRecordEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryRecordEvent::Opened(e) => {
                self.id = e.record_id;
                self.product_id = Some(e.product_id);
                self.location_id = Some(e.location_id);
                self.quantity = 0;
                self.created = true;
            }
            InventoryRecordEvent::StockMoved(e) => {
                self.quantity = e.new_quantity;
                self.movements.push(e.clone());
            }
            InventoryRecordEvent::PricesChanged(e) => {
                if let Some(cost) = e.cost_price {
                    self.cost_price = cost;
                }
                if let Some(retail) = e.retail_price {
                    self.retail_price = retail;
                }
            }
            InventoryRecordEvent::Reserved { quantity, .. } => self.reserved += quantity,
            InventoryRecordEvent::ReservationReleased { quantity, .. } => {
                self.reserved -= quantity
            }
            InventoryRecordEvent::Quarantined { .. } => self.quarantined = true,
            InventoryRecordEvent::QuarantineReleased { .. } => self.quarantined = false,
            InventoryRecordEvent::ConditionChanged { condition, .. } => {
                self.condition = *condition
            }
        }

        // Status is derived, never stored independently of the quantity.
        self.status = self.derive_status();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryRecordCommand::ApplyDelta(cmd) => self.handle_apply_delta(cmd),
            InventoryRecordCommand::Reserve {
                quantity,
                occurred_at,
            } => self.handle_reserve(*quantity, *occurred_at),
            InventoryRecordCommand::ReleaseReservation {
                quantity,
                occurred_at,
            } => self.handle_release(*quantity, *occurred_at),
            InventoryRecordCommand::Quarantine {
                reason,
                actor_id,
                occurred_at,
            } => {
                self.ensure_created()?;
                if self.quarantined {
                    return Err(DomainError::invalid_transition(
                        "inventory record",
                        self.status,
                        "quarantine",
                    ));
                }
                Ok(vec![InventoryRecordEvent::Quarantined {
                    record_id: self.id,
                    reason: reason.clone(),
                    actor_id: *actor_id,
                    occurred_at: *occurred_at,
                }])
            }
            InventoryRecordCommand::ReleaseQuarantine {
                actor_id,
                occurred_at,
            } => {
                self.ensure_created()?;
                if !self.quarantined {
                    return Err(DomainError::invalid_transition(
                        "inventory record",
                        self.status,
                        "release quarantine",
                    ));
                }
                Ok(vec![InventoryRecordEvent::QuarantineReleased {
                    record_id: self.id,
                    actor_id: *actor_id,
                    occurred_at: *occurred_at,
                }])
            }
            InventoryRecordCommand::MarkCondition {
                condition,
                actor_id,
                occurred_at,
            } => {
                self.ensure_created()?;
                if self.condition == *condition {
                    return Ok(vec![]);
                }
                Ok(vec![InventoryRecordEvent::ConditionChanged {
                    record_id: self.id,
                    condition: *condition,
                    actor_id: *actor_id,
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

impl InventoryRecord {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("inventory record", self.id));
        }
        Ok(())
    }

    fn ensure_stream(&self, product_id: ProductId, location_id: LocationId) -> Result<(), DomainError> {
        if InventoryRecordId::for_stock(product_id, location_id) != self.id {
            return Err(DomainError::invariant(
                "record_id does not match (product_id, location_id)",
            ));
        }
        Ok(())
    }

    fn handle_apply_delta(&self, cmd: &ApplyDelta) -> Result<Vec<InventoryRecordEvent>, DomainError> {
        self.ensure_stream(cmd.product_id, cmd.location_id)?;

        if cmd.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if cmd.quantity == 0 && cmd.delta_type != DeltaType::Set {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let previous = self.quantity;
        let new_quantity = match cmd.delta_type {
            DeltaType::Add => previous
                .checked_add(cmd.quantity)
                .ok_or_else(|| DomainError::validation("quantity overflow"))?,
            DeltaType::Remove => {
                // A missing record has nothing on hand; REMOVE never creates one.
                if !self.created || previous < cmd.quantity {
                    return Err(DomainError::InsufficientStock {
                        product_id: cmd.product_id,
                        location_id: cmd.location_id,
                        requested: cmd.quantity,
                        available: previous,
                    });
                }
                previous - cmd.quantity
            }
            DeltaType::Set => cmd.quantity,
        };

        let mut events = Vec::with_capacity(4);
        if !self.created {
            events.push(InventoryRecordEvent::Opened(RecordOpened {
                record_id: self.id,
                product_id: cmd.product_id,
                location_id: cmd.location_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        if let Some(prices) = cmd.prices.as_ref().filter(|p| !p.is_empty()) {
            if prices.cost_price.is_some_and(|p| p.is_sign_negative())
                || prices.retail_price.is_some_and(|p| p.is_sign_negative())
            {
                return Err(DomainError::validation("prices cannot be negative"));
            }
            events.push(InventoryRecordEvent::PricesChanged(PricesChanged {
                record_id: self.id,
                cost_price: prices.cost_price,
                retail_price: prices.retail_price,
                occurred_at: cmd.occurred_at,
            }));
        }

        events.push(InventoryRecordEvent::StockMoved(MovementEntry {
            record_id: self.id,
            product_id: cmd.product_id,
            location_id: cmd.location_id,
            movement_type: cmd.delta_type,
            quantity: cmd.quantity,
            quantity_delta: new_quantity - previous,
            previous_quantity: previous,
            new_quantity,
            reason: cmd.reason,
            actor_id: cmd.actor_id,
            reference: cmd.reference.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        }));

        // Reservations never exceed what is on hand.
        if self.reserved > new_quantity {
            events.push(InventoryRecordEvent::ReservationReleased {
                record_id: self.id,
                quantity: self.reserved - new_quantity,
                occurred_at: cmd.occurred_at,
            });
        }

        Ok(events)
    }

    fn handle_reserve(
        &self,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<InventoryRecordEvent>, DomainError> {
        self.ensure_created()?;
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if quantity > self.available_quantity() {
            return Err(DomainError::InsufficientStock {
                product_id: self.product_id.ok_or_else(|| DomainError::invariant("product_id missing"))?,
                location_id: self
                    .location_id
                    .ok_or_else(|| DomainError::invariant("location_id missing"))?,
                requested: quantity,
                available: self.available_quantity(),
            });
        }
        Ok(vec![InventoryRecordEvent::Reserved {
            record_id: self.id,
            quantity,
            occurred_at,
        }])
    }

    fn handle_release(
        &self,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<InventoryRecordEvent>, DomainError> {
        self.ensure_created()?;
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if quantity > self.reserved {
            return Err(DomainError::validation(format!(
                "cannot release {quantity}, only {} reserved",
                self.reserved
            )));
        }
        Ok(vec![InventoryRecordEvent::ReservationReleased {
            record_id: self.id,
            quantity,
            occurred_at,
        }])
    }
}

impl EventSourced for InventoryRecord {
    const AGGREGATE_TYPE: &'static str = "inventory.record";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: InventoryRecordId(id),
            product_id: None,
            location_id: None,
            quantity: 0,
            reserved: 0,
            cost_price: Money::ZERO,
            retail_price: Money::ZERO,
            condition: StockCondition::New,
            quarantined: false,
            status: StockStatus::OutOfStock,
            movements: Vec::new(),
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

    struct Fixture {
        product_id: ProductId,
        location_id: LocationId,
        actor_id: UserId,
        record: InventoryRecord,
    }

    impl Fixture {
        fn new() -> Self {
            let product_id = ProductId::new();
            let location_id = LocationId::new();
            let id = InventoryRecordId::for_stock(product_id, location_id);
            Self {
                product_id,
                location_id,
                actor_id: UserId::new(),
                record: InventoryRecord::empty(id.0),
            }
        }

        fn delta(&self, delta_type: DeltaType, quantity: i64) -> InventoryRecordCommand {
            InventoryRecordCommand::ApplyDelta(ApplyDelta {
                product_id: self.product_id,
                location_id: self.location_id,
                delta_type,
                quantity,
                reason: ReasonCode::ManualAdjustment,
                actor_id: self.actor_id,
                reference: None,
                notes: None,
                prices: None,
                occurred_at: Utc::now(),
            })
        }

        fn run(&mut self, cmd: InventoryRecordCommand) -> Result<Vec<InventoryRecordEvent>, DomainError> {
            let events = self.record.handle(&cmd)?;
            for e in &events {
                self.record.apply(e);
            }
            Ok(events)
        }
    }

    #[test]
    fn add_creates_the_record_and_writes_a_movement() {
        let mut f = Fixture::new();
        let events = f.run(f.delta(DeltaType::Add, 10)).unwrap();

        assert!(matches!(events[0], InventoryRecordEvent::Opened(_)));
        assert!(f.record.exists());
        assert_eq!(f.record.quantity(), 10);
        assert_eq!(f.record.status(), StockStatus::Available);

        let movement = &f.record.movements()[0];
        assert_eq!(movement.previous_quantity, 0);
        assert_eq!(movement.new_quantity, 10);
        assert_eq!(movement.quantity_delta, 10);
    }

    #[test]
    fn remove_below_zero_is_rejected_and_leaves_state_untouched() {
        let mut f = Fixture::new();
        f.run(f.delta(DeltaType::Add, 3)).unwrap();
        let before = f.record.clone();

        let err = f.run(f.delta(DeltaType::Remove, 5)).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id: f.product_id,
                location_id: f.location_id,
                requested: 5,
                available: 3,
            }
        );
        assert_eq!(f.record, before);
    }

    #[test]
    fn remove_on_missing_record_is_insufficient_stock() {
        let mut f = Fixture::new();
        let err = f.run(f.delta(DeltaType::Remove, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { available: 0, .. }));
        assert!(!f.record.exists());
    }

    #[test]
    fn remove_to_zero_flips_status_to_out_of_stock() {
        let mut f = Fixture::new();
        f.run(f.delta(DeltaType::Add, 2)).unwrap();
        f.run(f.delta(DeltaType::Remove, 2)).unwrap();
        assert_eq!(f.record.quantity(), 0);
        assert_eq!(f.record.status(), StockStatus::OutOfStock);
    }

    #[test]
    fn set_overwrites_and_records_signed_delta() {
        let mut f = Fixture::new();
        f.run(f.delta(DeltaType::Add, 20)).unwrap();
        f.run(f.delta(DeltaType::Set, 17)).unwrap();

        let last = f.record.movements().last().unwrap();
        assert_eq!(last.movement_type, DeltaType::Set);
        assert_eq!(last.previous_quantity, 20);
        assert_eq!(last.new_quantity, 17);
        assert_eq!(last.quantity_delta, -3);
    }

    #[test]
    fn zero_or_negative_quantities_are_validation_errors() {
        let mut f = Fixture::new();
        assert!(matches!(
            f.run(f.delta(DeltaType::Add, 0)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            f.run(f.delta(DeltaType::Set, -1)),
            Err(DomainError::Validation(_))
        ));
        // SET to zero is a legal count.
        assert!(f.run(f.delta(DeltaType::Set, 0)).is_ok());
    }

    #[test]
    fn prices_are_overwritten_with_the_movement() {
        let mut f = Fixture::new();
        let mut cmd = f.delta(DeltaType::Add, 5);
        if let InventoryRecordCommand::ApplyDelta(d) = &mut cmd {
            d.prices = Some(PriceUpdate::both(Money::new(450, 2), Money::new(999, 2)));
        }
        f.run(cmd).unwrap();
        assert_eq!(f.record.cost_price(), Money::new(450, 2));
        assert_eq!(f.record.retail_price(), Money::new(999, 2));
    }

    #[test]
    fn reservations_reduce_available_quantity() {
        let mut f = Fixture::new();
        f.run(f.delta(DeltaType::Add, 10)).unwrap();
        f.run(InventoryRecordCommand::Reserve {
            quantity: 4,
            occurred_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(f.record.available_quantity(), 6);

        let err = f
            .run(InventoryRecordCommand::Reserve {
                quantity: 7,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { available: 6, .. }));
    }

    #[test]
    fn shrinking_stock_releases_the_excess_reservation() {
        let mut f = Fixture::new();
        f.run(f.delta(DeltaType::Add, 10)).unwrap();
        f.run(InventoryRecordCommand::Reserve {
            quantity: 6,
            occurred_at: Utc::now(),
        })
        .unwrap();

        let events = f.run(f.delta(DeltaType::Set, 4)).unwrap();
        assert!(matches!(
            events.last(),
            Some(InventoryRecordEvent::ReservationReleased { quantity: 2, .. })
        ));
        assert_eq!(f.record.reserved_quantity(), 4);
        assert_eq!(f.record.available_quantity(), 0);

        f.run(f.delta(DeltaType::Remove, 3)).unwrap();
        assert_eq!(f.record.quantity(), 1);
        assert_eq!(f.record.reserved_quantity(), 1);

        // Growing stock leaves the reservation alone.
        let events = f.run(f.delta(DeltaType::Add, 5)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(f.record.reserved_quantity(), 1);
    }

    #[test]
    fn quarantined_or_damaged_stock_is_not_sellable() {
        let mut f = Fixture::new();
        f.run(f.delta(DeltaType::Add, 10)).unwrap();
        assert_eq!(f.record.sellable_quantity(), 10);

        f.run(InventoryRecordCommand::Quarantine {
            reason: "recall".to_string(),
            actor_id: f.actor_id,
            occurred_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(f.record.sellable_quantity(), 0);
        assert_eq!(f.record.available_quantity(), 10);

        f.run(InventoryRecordCommand::ReleaseQuarantine {
            actor_id: f.actor_id,
            occurred_at: Utc::now(),
        })
        .unwrap();
        f.run(InventoryRecordCommand::MarkCondition {
            condition: StockCondition::Damaged,
            actor_id: f.actor_id,
            occurred_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(f.record.sellable_quantity(), 0);
    }

    #[test]
    fn quarantine_overrides_quantity_status() {
        let mut f = Fixture::new();
        f.run(f.delta(DeltaType::Add, 10)).unwrap();
        f.run(InventoryRecordCommand::Quarantine {
            reason: "recall".to_string(),
            actor_id: f.actor_id,
            occurred_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(f.record.status(), StockStatus::Quarantine);

        f.run(InventoryRecordCommand::ReleaseQuarantine {
            actor_id: f.actor_id,
            occurred_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(f.record.status(), StockStatus::Available);
    }

    #[test]
    fn mismatched_stream_is_an_invariant_violation() {
        let mut f = Fixture::new();
        f.location_id = LocationId::new();
        assert!(matches!(
            f.run(f.delta(DeltaType::Add, 1)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    fn op() -> impl Strategy<Value = (DeltaType, i64)> {
        (
            prop_oneof![Just(DeltaType::Add), Just(DeltaType::Remove), Just(DeltaType::Set)],
            0i64..50,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn quantity_never_goes_negative_and_movements_chain(ops in prop::collection::vec(op(), 1..40)) {
            let mut f = Fixture::new();
            for (delta_type, qty) in ops {
                let _ = f.run(f.delta(delta_type, qty));
                let _ = f.run(InventoryRecordCommand::Reserve {
                    quantity: qty / 3,
                    occurred_at: Utc::now(),
                });
                prop_assert!(f.record.quantity() >= 0);
                prop_assert!(f.record.reserved_quantity() <= f.record.quantity());
            }

            // Each movement starts where the previous one ended.
            let mut expected_previous = 0;
            for m in f.record.movements() {
                prop_assert_eq!(m.previous_quantity, expected_previous);
                prop_assert_eq!(m.new_quantity, m.previous_quantity + m.quantity_delta);
                expected_previous = m.new_quantity;
            }
            prop_assert_eq!(expected_previous, f.record.quantity());
        }
    }
}
