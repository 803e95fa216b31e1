//! Purchase-order receiving.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use storeops_core::{DomainError, LocationId, UserId};
use storeops_inventory::{
    ApplyDelta, DeltaType, LocationKind, MovementEntry, PriceUpdate, ReasonCode, StockLocation,
};
use storeops_purchasing::{
    CreatePurchaseOrder, LineReceipt, NewOrderLine, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderEvent, PurchaseOrderId, ReceiveGoods, ReceivedLine, SupplierId,
};

use super::commit;
use super::ledger::apply_delta;
use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::numbering::{DocumentSeries, next_number};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: SupplierId,
    pub warehouse_id: LocationId,
    pub lines: Vec<NewOrderLine>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptOutcome {
    pub lines: Vec<ReceivedLine>,
    pub movements: Vec<MovementEntry>,
}

#[derive(Debug, Clone)]
pub struct ReceivingService<S> {
    store: S,
}

impl<S: EventStore> ReceivingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, request),
        fields(warehouse_id = %request.warehouse_id, lines = request.lines.len()),
        err(level = "warn")
    )]
    pub fn create(&self, request: NewPurchaseOrder, actor_id: UserId) -> WorkflowResult<PurchaseOrder> {
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        uow.load::<StockLocation>(request.warehouse_id.0)?
            .ensure_active_kind(LocationKind::Warehouse)?;

        let order_id = PurchaseOrderId::new();
        let order_number = next_number(&mut uow, DocumentSeries::PurchaseOrder, now)?;
        uow.execute::<PurchaseOrder>(
            order_id.0,
            PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                order_id,
                order_number,
                supplier_id: request.supplier_id,
                warehouse_id: request.warehouse_id,
                lines: request.lines,
                expected_date: request.expected_date,
                notes: request.notes,
                actor_id,
                occurred_at: now,
            }),
        )?;
        let order = uow.load::<PurchaseOrder>(order_id.0)?;
        commit(uow, "purchasing.create")?;
        Ok(order)
    }

    #[instrument(skip(self, line), err(level = "warn"))]
    pub fn add_line(&self, order_id: PurchaseOrderId, line: NewOrderLine) -> WorkflowResult<PurchaseOrder> {
        self.execute(
            order_id,
            PurchaseOrderCommand::AddLine {
                line,
                occurred_at: Utc::now(),
            },
            "purchasing.add_line",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn place(&self, order_id: PurchaseOrderId, actor_id: UserId) -> WorkflowResult<PurchaseOrder> {
        self.execute(
            order_id,
            PurchaseOrderCommand::Place {
                actor_id,
                occurred_at: Utc::now(),
            },
            "purchasing.place",
        )
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn cancel(
        &self,
        order_id: PurchaseOrderId,
        reason: Option<String>,
        actor_id: UserId,
    ) -> WorkflowResult<PurchaseOrder> {
        self.execute(
            order_id,
            PurchaseOrderCommand::Cancel {
                reason,
                actor_id,
                occurred_at: Utc::now(),
            },
            "purchasing.cancel",
        )
    }

    /// Receive goods against an ORDERED/PARTIAL order. Every received line is
    /// added to the order's warehouse at the line's unit price; an
    /// over-receipt on any line rejects the whole payload.
    #[instrument(skip(self, receipts, notes), fields(lines = receipts.len()), err(level = "warn"))]
    pub fn receive(
        &self,
        order_id: PurchaseOrderId,
        receipts: Vec<LineReceipt>,
        notes: Option<String>,
        actor_id: UserId,
    ) -> WorkflowResult<(PurchaseOrder, ReceiptOutcome)> {
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        let order = uow.get::<PurchaseOrder>(order_id.0, "purchase order")?;
        let warehouse_id = order
            .warehouse_id()
            .ok_or_else(|| DomainError::invariant("purchase order without warehouse"))?;
        uow.load::<StockLocation>(warehouse_id.0)?.ensure_active()?;

        let events = uow.execute::<PurchaseOrder>(
            order_id.0,
            PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                receipts,
                notes,
                actor_id,
                occurred_at: now,
            }),
        )?;
        let lines: Vec<ReceivedLine> = events
            .into_iter()
            .filter_map(|event| match event {
                PurchaseOrderEvent::GoodsReceived(received) => Some(received.lines),
                _ => None,
            })
            .flatten()
            .collect();

        let mut movements = Vec::with_capacity(lines.len());
        for line in &lines {
            movements.push(apply_delta(
                &mut uow,
                ApplyDelta {
                    product_id: line.product_id,
                    location_id: warehouse_id,
                    delta_type: DeltaType::Add,
                    quantity: line.quantity,
                    reason: ReasonCode::PurchaseReceipt,
                    actor_id,
                    reference: Some(order.order_number().to_string()),
                    notes: None,
                    prices: Some(PriceUpdate::cost(line.unit_price)),
                    occurred_at: now,
                },
            )?);
        }

        let order = uow.load::<PurchaseOrder>(order_id.0)?;
        commit(uow, "purchasing.receive")?;
        info!(order = order.order_number(), status = ?order.status(), "goods received");
        Ok((order, ReceiptOutcome { lines, movements }))
    }

    pub fn get(&self, order_id: PurchaseOrderId) -> WorkflowResult<PurchaseOrder> {
        UnitOfWork::new(&self.store).get::<PurchaseOrder>(order_id.0, "purchase order")
    }

    fn execute(
        &self,
        order_id: PurchaseOrderId,
        command: PurchaseOrderCommand,
        operation: &'static str,
    ) -> WorkflowResult<PurchaseOrder> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<PurchaseOrder>(order_id.0, "purchase order")?;
        uow.execute::<PurchaseOrder>(order_id.0, command)?;
        let order = uow.load::<PurchaseOrder>(order_id.0)?;
        commit(uow, operation)?;
        Ok(order)
    }
}
