use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EventSourced, LocationId, Money,
    ProductId, UserId, aggregate_id, money,
};
use storeops_events::Event;

aggregate_id!(
    /// Purchase order identifier.
    PurchaseOrderId
);

aggregate_id!(
    /// Supplier identifier (supplier records are managed outside this system).
    SupplierId
);

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Ordered,
    Partial,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Ordered)
                | (Draft, Cancelled)
                | (Ordered, Cancelled)
                | (Ordered, Partial)
                | (Ordered, Received)
                | (Partial, Partial)
                | (Partial, Received)
        )
    }

    /// Goods may only be received against a placed, not fully received order.
    pub fn accepts_receipts(self) -> bool {
        matches!(self, PurchaseOrderStatus::Ordered | PurchaseOrderStatus::Partial)
    }
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub ordered_quantity: i64,
    /// Monotonically non-decreasing, never above `ordered_quantity`.
    pub received_quantity: i64,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn outstanding(&self) -> i64 {
        self.ordered_quantity - self.received_quantity
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_quantity >= self.ordered_quantity
    }
}

/// A line as supplied by the caller (numbered by the aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Quantity received against one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReceipt {
    pub line_no: u32,
    pub quantity: i64,
}

/// Receipt detail carried by `GoodsReceived`, enough to drive the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub received_quantity_after: i64,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    order_number: String,
    supplier_id: Option<SupplierId>,
    warehouse_id: Option<LocationId>,
    status: PurchaseOrderStatus,
    lines: Vec<OrderLine>,
    total_amount: Money,
    expected_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    ordered_at: Option<DateTime<Utc>>,
    last_received_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn warehouse_id(&self) -> Option<LocationId> {
        self.warehouse_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn expected_date(&self) -> Option<DateTime<Utc>> {
        self.expected_date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn ordered_at(&self) -> Option<DateTime<Utc>> {
        self.ordered_at
    }

    pub fn last_received_at(&self) -> Option<DateTime<Utc>> {
        self.last_received_at
    }

    /// Sum of `ordered_quantity * unit_price` over all lines.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub warehouse_id: LocationId,
    pub lines: Vec<NewOrderLine>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveGoods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveGoods {
    pub receipts: Vec<LineReceipt>,
    pub notes: Option<String>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    /// Only allowed in Draft.
    AddLine {
        line: NewOrderLine,
        occurred_at: DateTime<Utc>,
    },
    Place {
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    ReceiveGoods(ReceiveGoods),
    Cancel {
        reason: Option<String>,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub warehouse_id: LocationId,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLineAdded {
    pub order_id: PurchaseOrderId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
///
/// Carries the product, quantity and unit price of every received line; the
/// receiving workflow turns each into a stock ledger ADD in the same commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub order_id: PurchaseOrderId,
    pub warehouse_id: LocationId,
    pub lines: Vec<ReceivedLine>,
    pub status_after: PurchaseOrderStatus,
    pub notes: Option<String>,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderLineAdded(PurchaseOrderLineAdded),
    PurchaseOrderPlaced {
        order_id: PurchaseOrderId,
        placed_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    GoodsReceived(GoodsReceived),
    PurchaseOrderCancelled {
        order_id: PurchaseOrderId,
        reason: Option<String>,
        cancelled_by: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderLineAdded(_) => "purchasing.order.line_added",
            PurchaseOrderEvent::PurchaseOrderPlaced { .. } => "purchasing.order.placed",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
            PurchaseOrderEvent::PurchaseOrderCancelled { .. } => "purchasing.order.cancelled",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => e.occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderPlaced { occurred_at, .. }
            | PurchaseOrderEvent::PurchaseOrderCancelled { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.expected_date = e.expected_date;
                self.notes = e.notes.clone();
                self.status = PurchaseOrderStatus::Draft;
                self.lines.clear();
                self.total_amount = Money::ZERO;
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => {
                self.lines.push(OrderLine {
                    line_no: e.line_no,
                    product_id: e.product_id,
                    ordered_quantity: e.quantity,
                    received_quantity: 0,
                    unit_price: e.unit_price,
                });
                self.total_amount += e.line_total;
            }
            PurchaseOrderEvent::PurchaseOrderPlaced { occurred_at, .. } => {
                self.status = PurchaseOrderStatus::Ordered;
                self.ordered_at = Some(*occurred_at);
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                for received in &e.lines {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == received.line_no) {
                        line.received_quantity = received.received_quantity_after;
                    }
                }
                self.status = e.status_after;
                self.last_received_at = Some(e.occurred_at);
            }
            PurchaseOrderEvent::PurchaseOrderCancelled { .. } => {
                self.status = PurchaseOrderStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::AddLine { line, occurred_at } => {
                self.handle_add_line(line, *occurred_at)
            }
            PurchaseOrderCommand::Place {
                actor_id,
                occurred_at,
            } => self.handle_place(*actor_id, *occurred_at),
            PurchaseOrderCommand::ReceiveGoods(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::Cancel {
                reason,
                actor_id,
                occurred_at,
            } => self.handle_cancel(reason, *actor_id, *occurred_at),
        }
    }
}

impl PurchaseOrder {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("purchase order", self.id));
        }
        Ok(())
    }

    fn validate_line(line: &NewOrderLine) -> Result<(), DomainError> {
        if line.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if line.unit_price.is_sign_negative() {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        Ok(())
    }

    /// Prices the line and returns the order total after it.
    fn line_added(
        &self,
        line_no: u32,
        line: &NewOrderLine,
        total_before: Money,
        occurred_at: DateTime<Utc>,
    ) -> Result<(PurchaseOrderEvent, Money), DomainError> {
        let line_total = money::extend(line.unit_price, line.quantity)?;
        let total_after = money::add(total_before, line_total)?;
        let event = PurchaseOrderEvent::PurchaseOrderLineAdded(PurchaseOrderLineAdded {
            order_id: self.id,
            line_no,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total,
            occurred_at,
        });
        Ok((event, total_after))
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.order_id != self.id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order_number cannot be empty"));
        }
        for line in &cmd.lines {
            Self::validate_line(line)?;
        }

        let mut events = vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                order_id: cmd.order_id,
                order_number: cmd.order_number.clone(),
                supplier_id: cmd.supplier_id,
                warehouse_id: cmd.warehouse_id,
                expected_date: cmd.expected_date,
                notes: cmd.notes.clone(),
                created_by: cmd.actor_id,
                occurred_at: cmd.occurred_at,
            },
        )];
        let mut total = Money::ZERO;
        for (idx, line) in cmd.lines.iter().enumerate() {
            let (event, total_after) = self.line_added(idx as u32 + 1, line, total, cmd.occurred_at)?;
            events.push(event);
            total = total_after;
        }
        Ok(events)
    }

    fn handle_add_line(
        &self,
        line: &NewOrderLine,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created()?;
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invalid_transition(
                "purchase order",
                self.status,
                "add line",
            ));
        }
        Self::validate_line(line)?;

        let next_line_no = (self.lines.len() as u32) + 1;
        let (event, _) = self.line_added(next_line_no, line, self.total_amount, occurred_at)?;
        Ok(vec![event])
    }

    fn handle_place(
        &self,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created()?;
        if !self.status.can_transition_to(PurchaseOrderStatus::Ordered) {
            return Err(DomainError::invalid_transition(
                "purchase order",
                self.status,
                "place",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot place purchase order without lines",
            ));
        }
        Ok(vec![PurchaseOrderEvent::PurchaseOrderPlaced {
            order_id: self.id,
            placed_by: actor_id,
            occurred_at,
        }])
    }

    fn handle_cancel(
        &self,
        reason: &Option<String>,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created()?;
        if !self.status.can_transition_to(PurchaseOrderStatus::Cancelled) {
            return Err(DomainError::invalid_transition(
                "purchase order",
                self.status,
                "cancel",
            ));
        }
        Ok(vec![PurchaseOrderEvent::PurchaseOrderCancelled {
            order_id: self.id,
            reason: reason.clone(),
            cancelled_by: actor_id,
            occurred_at,
        }])
    }

    fn handle_receive(&self, cmd: &ReceiveGoods) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created()?;

        // Invariant: receiving is only legal against an open order.
        if !self.status.accepts_receipts() {
            return Err(DomainError::invalid_transition(
                "purchase order",
                self.status,
                "receive",
            ));
        }
        let warehouse_id = self
            .warehouse_id
            .ok_or_else(|| DomainError::invariant("warehouse must be set"))?;

        if cmd.receipts.is_empty() {
            return Err(DomainError::validation("at least one line must be received"));
        }

        // Sum repeated lines first so the over-receipt check sees the whole payload.
        let mut requested: BTreeMap<u32, i64> = BTreeMap::new();
        for receipt in &cmd.receipts {
            if receipt.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity for line {} must be positive",
                    receipt.line_no
                )));
            }
            let entry = requested.entry(receipt.line_no).or_default();
            *entry = money::add_units(*entry, receipt.quantity)?;
        }

        let mut received = Vec::with_capacity(requested.len());
        for (line_no, quantity) in requested {
            let line = self
                .lines
                .iter()
                .find(|l| l.line_no == line_no)
                .ok_or_else(|| DomainError::not_found("purchase order line", line_no))?;

            let received_quantity_after = money::add_units(line.received_quantity, quantity)?;
            if received_quantity_after > line.ordered_quantity {
                return Err(DomainError::OverReceipt {
                    line: line_no,
                    product_id: line.product_id,
                    ordered: line.ordered_quantity,
                    received: line.received_quantity,
                    attempted: quantity,
                });
            }

            received.push(ReceivedLine {
                line_no,
                product_id: line.product_id,
                quantity,
                unit_price: line.unit_price,
                received_quantity_after,
            });
        }

        let fully_received = self.lines.iter().all(|line| {
            let after = received
                .iter()
                .find(|r| r.line_no == line.line_no)
                .map(|r| r.received_quantity_after)
                .unwrap_or(line.received_quantity);
            after >= line.ordered_quantity
        });
        let status_after = if fully_received {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::Partial
        };

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            order_id: self.id,
            warehouse_id,
            lines: received,
            status_after,
            notes: cmd.notes.clone(),
            received_by: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

impl EventSourced for PurchaseOrder {
    const AGGREGATE_TYPE: &'static str = "purchasing.order";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: PurchaseOrderId(id),
            order_number: String::new(),
            supplier_id: None,
            warehouse_id: None,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            total_amount: Money::ZERO,
            expected_date: None,
            notes: None,
            ordered_at: None,
            last_received_at: None,
            version: 0,
            created: false,
        }
    }

    fn exists(&self) -> bool {
        self.created
    }
}
