//! Request bodies and response views.
//!
//! The JSON boundary is camelCase. Requests convert into workflow inputs;
//! views are built from aggregates after a workflow returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_audits::{AuditItem, AuditItemStatus, AuditProgress, AuditStatus, ItemCount};
use storeops_core::{AggregateRoot, CustomerId, LocationId, Money, ProductId, UserId};
use storeops_infra::workflows::{
    CheckoutOutcome, CheckoutRequest, CountOutcome, ManualAdjustment, NewProgram,
    NewPurchaseOrder, NewTransfer, OpeningStock, PaymentRequest, PlanAuditRequest,
    ReceiptOutcome, ReconcileOutcome, ReturnOutcome, ReturnRequest, TransferItemRequest,
    TransferUpdate,
};
use storeops_inventory::{
    DeltaType, InventoryRecordId, LocationKind, MovementEntry, ReasonCode, StockCondition,
    StockLevel, StockLocation, StockStatus,
};
use storeops_loyalty::{
    LoyaltyAccount, LoyaltyProgram, LoyaltyProgramId, LoyaltyTier, LoyaltyTransaction,
    TransactionKind,
};
use storeops_purchasing::{
    LineReceipt, NewOrderLine, OrderLine, PurchaseOrder, PurchaseOrderStatus, ReceivedLine,
    SupplierId,
};
use storeops_sales::{
    NewSaleLine, Payment, PaymentMethod, PaymentStatus, ReturnRequestLine, ReturnedLine, Sale,
    SaleLine, SaleReturn, SaleTotals,
};
use storeops_transfers::{
    ShipTransfer, Transfer, TransferItem, TransferKind, TransferPriority, TransferStatus,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterLocationRequest {
    pub code: String,
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: LocationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentType {
    #[serde(alias = "ADD")]
    Add,
    #[serde(alias = "REMOVE")]
    Remove,
    #[serde(alias = "SET")]
    Set,
}

impl From<AdjustmentType> for DeltaType {
    fn from(value: AdjustmentType) -> Self {
        match value {
            AdjustmentType::Add => DeltaType::Add,
            AdjustmentType::Remove => DeltaType::Remove,
            AdjustmentType::Set => DeltaType::Set,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub adjustment_type: AdjustmentType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl AdjustStockRequest {
    pub fn into_adjustment(self, record_id: InventoryRecordId) -> ManualAdjustment {
        ManualAdjustment {
            record_id,
            delta_type: self.adjustment_type.into(),
            quantity: self.quantity,
            reason: self.reason,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveStockRequest {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub cost_price: Option<Money>,
    pub retail_price: Option<Money>,
    pub notes: Option<String>,
}

impl From<ReceiveStockRequest> for OpeningStock {
    fn from(body: ReceiveStockRequest) -> Self {
        OpeningStock {
            product_id: body.product_id,
            location_id: body.location_id,
            quantity: body.quantity,
            cost_price: body.cost_price,
            retail_price: body.retail_price,
            notes: body.notes,
        }
    }
}

/// Body of both reserve and release-reservation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRequest {
    pub condition: StockCondition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItemBody {
    pub product_id: ProductId,
    pub quantity: i64,
    pub source_cost_price: Option<Money>,
    pub source_retail_price: Option<Money>,
    pub target_cost_price: Option<Money>,
    pub target_retail_price: Option<Money>,
}

impl From<TransferItemBody> for TransferItemRequest {
    fn from(body: TransferItemBody) -> Self {
        TransferItemRequest {
            product_id: body.product_id,
            quantity: body.quantity,
            source_cost_price: body.source_cost_price,
            source_retail_price: body.source_retail_price,
            target_cost_price: body.target_cost_price,
            target_retail_price: body.target_retail_price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    #[serde(default = "default_transfer_kind")]
    pub transfer_type: TransferKind,
    #[serde(default = "default_priority")]
    pub priority: TransferPriority,
    pub items: Vec<TransferItemBody>,
    pub notes: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

fn default_transfer_kind() -> TransferKind {
    TransferKind::Restock
}

fn default_priority() -> TransferPriority {
    TransferPriority::Normal
}

impl From<CreateTransferRequest> for NewTransfer {
    fn from(body: CreateTransferRequest) -> Self {
        NewTransfer {
            from_location: body.from_location_id,
            to_location: body.to_location_id,
            kind: body.transfer_type,
            priority: body.priority,
            items: body.items.into_iter().map(Into::into).collect(),
            notes: body.notes,
            expected_delivery_date: body.expected_delivery_date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTransferRequest {
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub transfer_type: Option<TransferKind>,
    pub priority: Option<TransferPriority>,
    pub items: Option<Vec<TransferItemBody>>,
    pub notes: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

impl From<UpdateTransferRequest> for TransferUpdate {
    fn from(body: UpdateTransferRequest) -> Self {
        TransferUpdate {
            from_location: body.from_location_id,
            to_location: body.to_location_id,
            kind: body.transfer_type,
            priority: body.priority,
            items: body.items.map(|items| items.into_iter().map(Into::into).collect()),
            notes: body.notes,
            expected_delivery_date: body.expected_delivery_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchTransferRequest {
    pub status: TransferStatus,
    /// Recorded for REJECTED / CANCELLED.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferAction {
    Ship,
    Receive,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTransferRequest {
    pub action: TransferAction,
    pub shipping_method: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

impl ProcessTransferRequest {
    pub fn shipment(&self) -> ShipTransfer {
        ShipTransfer {
            shipping_method: self.shipping_method.clone(),
            tracking_number: self.tracking_number.clone(),
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanAuditBody {
    pub warehouse_id: Option<LocationId>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub product_ids: Vec<ProductId>,
}

impl From<PlanAuditBody> for PlanAuditRequest {
    fn from(body: PlanAuditBody) -> Self {
        PlanAuditRequest {
            warehouse_id: body.warehouse_id,
            scheduled_date: body.scheduled_date,
            notes: body.notes,
            product_ids: body.product_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditCountBody {
    pub id: u32,
    pub actual_quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAuditItemsRequest {
    pub items: Vec<AuditCountBody>,
}

impl UpdateAuditItemsRequest {
    pub fn into_counts(self) -> Vec<ItemCount> {
        self.items
            .into_iter()
            .map(|item| ItemCount {
                item_id: item.id,
                counted_quantity: item.actual_quantity,
                notes: item.notes,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineBody {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl From<OrderLineBody> for NewOrderLine {
    fn from(body: OrderLineBody) -> Self {
        NewOrderLine {
            product_id: body.product_id,
            quantity: body.quantity,
            unit_price: body.unit_price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: SupplierId,
    pub warehouse_id: LocationId,
    #[serde(default)]
    pub items: Vec<OrderLineBody>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<CreatePurchaseOrderRequest> for NewPurchaseOrder {
    fn from(body: CreatePurchaseOrderRequest) -> Self {
        NewPurchaseOrder {
            supplier_id: body.supplier_id,
            warehouse_id: body.warehouse_id,
            lines: body.items.into_iter().map(Into::into).collect(),
            expected_date: body.expected_date,
            notes: body.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptLineBody {
    /// Line number on the order.
    pub id: u32,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReceivePurchaseOrderRequest {
    pub items: Vec<ReceiptLineBody>,
    pub notes: Option<String>,
}

impl ReceivePurchaseOrderRequest {
    pub fn receipts(&self) -> Vec<LineReceipt> {
        self.items
            .iter()
            .map(|line| LineReceipt {
                line_no: line.id,
                quantity: line.quantity,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItemBody {
    pub product_id: ProductId,
    pub inventory_item_id: InventoryRecordId,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount_amount: Money,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub store_id: LocationId,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<CheckoutItemBody>,
    pub subtotal_amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub discount_amount: Money,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub amount_paid: Money,
    #[serde(default)]
    pub apply_loyalty_points: bool,
    pub loyalty_points_used: Option<i64>,
}

impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        CheckoutRequest {
            store_id: body.store_id,
            customer_id: body.customer_id,
            lines: body
                .items
                .into_iter()
                .map(|item| NewSaleLine {
                    product_id: item.product_id,
                    record_id: item.inventory_item_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    discount_amount: item.discount_amount,
                })
                .collect(),
            totals: SaleTotals {
                subtotal: body.subtotal_amount,
                tax_amount: body.tax_amount,
                discount_amount: body.discount_amount,
                total_amount: body.total_amount,
            },
            payment: PaymentRequest {
                method: body.payment_method,
                amount: body.amount_paid,
            },
            redeem_points: body.loyalty_points_used.filter(|_| body.apply_loyalty_points),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLineBody {
    pub line_no: u32,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct SaleReturnRequest {
    pub items: Vec<ReturnLineBody>,
    pub reason: String,
}

impl From<SaleReturnRequest> for ReturnRequest {
    fn from(body: SaleReturnRequest) -> Self {
        ReturnRequest {
            lines: body
                .items
                .into_iter()
                .map(|line| ReturnRequestLine {
                    line_no: line.line_no,
                    quantity: line.quantity,
                })
                .collect(),
            reason: body.reason,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierBody {
    pub name: String,
    pub required_points: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProgramRequest {
    pub name: String,
    pub points_per_currency_unit: Money,
    #[serde(default)]
    pub tiers: Vec<TierBody>,
}

impl From<CreateProgramRequest> for NewProgram {
    fn from(body: CreateProgramRequest) -> Self {
        NewProgram {
            name: body.name,
            points_per_currency_unit: body.points_per_currency_unit,
            tiers: body
                .tiers
                .into_iter()
                .map(|t| LoyaltyTier {
                    name: t.name,
                    required_points: t.required_points,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub customer_id: CustomerId,
    pub program_id: Option<LoyaltyProgramId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyTransactionRequest {
    #[serde(rename = "type", alias = "kind")]
    pub kind: TransactionKind,
    pub points: i64,
    pub reference: Option<String>,
    pub description: Option<String>,
}

// -------------------------
// Response views
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationView {
    pub id: LocationId,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LocationKind,
    pub is_active: bool,
}

impl From<&StockLocation> for LocationView {
    fn from(location: &StockLocation) -> Self {
        Self {
            id: *location.id(),
            code: location.code().to_string(),
            name: location.name().to_string(),
            kind: location.kind(),
            is_active: location.is_active(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevelView {
    pub id: InventoryRecordId,
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

impl From<StockLevel> for StockLevelView {
    fn from(level: StockLevel) -> Self {
        Self {
            id: level.record_id,
            product_id: level.product_id,
            location_id: level.location_id,
            quantity: level.quantity,
            reserved_quantity: level.reserved_quantity,
            available_quantity: level.available_quantity,
            cost_price: level.cost_price,
            retail_price: level.retail_price,
            status: level.status,
            condition: level.condition,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementView {
    pub inventory_item_id: InventoryRecordId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub movement_type: DeltaType,
    pub quantity: i64,
    pub delta: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub reason: ReasonCode,
    pub performed_by: UserId,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MovementEntry> for MovementView {
    fn from(m: MovementEntry) -> Self {
        Self {
            inventory_item_id: m.record_id,
            product_id: m.product_id,
            location_id: m.location_id,
            movement_type: m.movement_type,
            quantity: m.quantity,
            delta: m.quantity_delta,
            previous_quantity: m.previous_quantity,
            new_quantity: m.new_quantity,
            reason: m.reason,
            performed_by: m.actor_id,
            reference: m.reference,
            notes: m.notes,
            created_at: m.occurred_at,
        }
    }
}

pub fn movements(entries: Vec<MovementEntry>) -> Vec<MovementView> {
    entries.into_iter().map(Into::into).collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItemView {
    pub product_id: ProductId,
    pub quantity: i64,
    pub source_cost_price: Money,
    pub source_retail_price: Money,
    pub target_cost_price: Money,
    pub target_retail_price: Money,
}

impl From<&TransferItem> for TransferItemView {
    fn from(item: &TransferItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            source_cost_price: item.source_cost_price,
            source_retail_price: item.source_retail_price,
            target_cost_price: item.target_cost_price,
            target_retail_price: item.target_retail_price,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
    pub id: storeops_transfers::TransferId,
    pub transfer_number: String,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub transfer_type: TransferKind,
    pub priority: TransferPriority,
    pub status: TransferStatus,
    pub items: Vec<TransferItemView>,
    pub total_items: i64,
    pub total_cost: Money,
    pub total_retail: Money,
    pub notes: Option<String>,
    pub requested_by: Option<UserId>,
    pub approved_by: Option<UserId>,
    pub approved_date: Option<DateTime<Utc>>,
    pub shipped_date: Option<DateTime<Utc>>,
    pub shipping_method: Option<String>,
    pub tracking_number: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Transfer> for TransferView {
    fn from(t: &Transfer) -> Self {
        let totals = t.totals();
        Self {
            id: *t.id(),
            transfer_number: t.transfer_number().to_string(),
            from_location_id: t.from_location(),
            to_location_id: t.to_location(),
            transfer_type: t.kind(),
            priority: t.priority(),
            status: t.status(),
            items: t.items().iter().map(Into::into).collect(),
            total_items: totals.total_items,
            total_cost: totals.total_cost,
            total_retail: totals.total_retail,
            notes: t.notes().map(str::to_string),
            requested_by: t.requested_by(),
            approved_by: t.approved_by(),
            approved_date: t.approved_date(),
            shipped_date: t.shipped_date(),
            shipping_method: t.shipping_method().map(str::to_string),
            tracking_number: t.tracking_number().map(str::to_string),
            expected_delivery_date: t.expected_delivery_date(),
            actual_delivery_date: t.actual_delivery_date(),
            completed_date: t.completed_date(),
            rejection_reason: t.rejection_reason().map(str::to_string),
            cancellation_reason: t.cancellation_reason().map(str::to_string),
            created_at: t.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessTransferResponse {
    pub transfer: TransferView,
    pub movements: Vec<MovementView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditItemView {
    pub id: u32,
    pub product_id: ProductId,
    pub inventory_item_id: InventoryRecordId,
    pub expected_quantity: i64,
    pub counted_quantity: Option<i64>,
    pub discrepancy: Option<i64>,
    pub status: AuditItemStatus,
    pub notes: Option<String>,
    pub counted_by: Option<UserId>,
    pub counted_at: Option<DateTime<Utc>>,
}

impl From<&AuditItem> for AuditItemView {
    fn from(item: &AuditItem) -> Self {
        Self {
            id: item.item_id,
            product_id: item.product_id,
            inventory_item_id: item.record_id,
            expected_quantity: item.expected_quantity,
            counted_quantity: item.counted_quantity,
            discrepancy: item.discrepancy,
            status: item.status,
            notes: item.notes.clone(),
            counted_by: item.counted_by,
            counted_at: item.counted_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub total_items: usize,
    /// COUNTED or RECONCILED.
    pub completed_items: usize,
    pub discrepancy_items: usize,
    pub pending_items: usize,
    pub percentage: u8,
}

impl From<AuditProgress> for ProgressView {
    fn from(p: AuditProgress) -> Self {
        Self {
            total_items: p.total_items,
            completed_items: p.settled_items,
            discrepancy_items: p.discrepancy_items,
            pending_items: p.pending_items,
            percentage: p.percentage,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditView {
    pub id: storeops_audits::AuditId,
    pub audit_number: String,
    pub warehouse_id: Option<LocationId>,
    pub status: AuditStatus,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub items: Vec<AuditItemView>,
    pub progress: ProgressView,
}

impl From<&storeops_audits::Audit> for AuditView {
    fn from(a: &storeops_audits::Audit) -> Self {
        Self {
            id: *a.id(),
            audit_number: a.audit_number().to_string(),
            warehouse_id: a.warehouse_id(),
            status: a.status(),
            scheduled_date: a.scheduled_date(),
            start_date: a.start_date(),
            end_date: a.end_date(),
            notes: a.notes().map(str::to_string),
            items: a.items().iter().map(Into::into).collect(),
            progress: a.progress().into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub items: Vec<AuditItemView>,
    pub progress: ProgressView,
    pub completed: bool,
}

impl From<CountOutcome> for CountResponse {
    fn from(outcome: CountOutcome) -> Self {
        Self {
            items: outcome.items.iter().map(Into::into).collect(),
            progress: outcome.progress.into(),
            completed: outcome.completed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub item: AuditItemView,
    pub movement: MovementView,
    pub progress: ProgressView,
    pub completed: bool,
}

impl From<ReconcileOutcome> for ReconcileResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        Self {
            item: (&outcome.item).into(),
            movement: outcome.movement.into(),
            progress: outcome.progress.into(),
            completed: outcome.completed,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub id: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub received_quantity: i64,
    pub unit_price: Money,
}

impl From<&OrderLine> for OrderLineView {
    fn from(line: &OrderLine) -> Self {
        Self {
            id: line.line_no,
            product_id: line.product_id,
            quantity: line.ordered_quantity,
            received_quantity: line.received_quantity,
            unit_price: line.unit_price,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderView {
    pub id: storeops_purchasing::PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: Option<SupplierId>,
    pub warehouse_id: Option<LocationId>,
    pub status: PurchaseOrderStatus,
    pub items: Vec<OrderLineView>,
    pub total_amount: Money,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub last_received_at: Option<DateTime<Utc>>,
}

impl From<&PurchaseOrder> for PurchaseOrderView {
    fn from(o: &PurchaseOrder) -> Self {
        Self {
            id: *o.id(),
            order_number: o.order_number().to_string(),
            supplier_id: o.supplier_id(),
            warehouse_id: o.warehouse_id(),
            status: o.status(),
            items: o.lines().iter().map(Into::into).collect(),
            total_amount: o.total_amount(),
            expected_date: o.expected_date(),
            notes: o.notes().map(str::to_string),
            ordered_at: o.ordered_at(),
            last_received_at: o.last_received_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedLineView {
    pub id: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub received_quantity: i64,
}

impl From<&ReceivedLine> for ReceivedLineView {
    fn from(line: &ReceivedLine) -> Self {
        Self {
            id: line.line_no,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            received_quantity: line.received_quantity_after,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivePurchaseOrderResponse {
    pub purchase_order: PurchaseOrderView,
    pub received: Vec<ReceivedLineView>,
    pub movements: Vec<MovementView>,
}

impl From<(PurchaseOrder, ReceiptOutcome)> for ReceivePurchaseOrderResponse {
    fn from((order, outcome): (PurchaseOrder, ReceiptOutcome)) -> Self {
        Self {
            purchase_order: (&order).into(),
            received: outcome.lines.iter().map(Into::into).collect(),
            movements: movements(outcome.movements),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineView {
    pub line_no: u32,
    pub product_id: ProductId,
    pub inventory_item_id: InventoryRecordId,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount_amount: Money,
    pub total_price: Money,
    pub returned_quantity: i64,
}

impl From<&SaleLine> for SaleLineView {
    fn from(line: &SaleLine) -> Self {
        Self {
            line_no: line.line_no,
            product_id: line.product_id,
            inventory_item_id: line.record_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount_amount: line.discount_amount,
            total_price: line.total_price,
            returned_quantity: line.returned_quantity,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub received_by: UserId,
    pub paid_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentView {
    fn from(p: &Payment) -> Self {
        Self {
            payment_method: p.method,
            amount: p.amount,
            received_by: p.received_by,
            paid_at: p.paid_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleView {
    pub id: storeops_sales::SaleId,
    pub receipt_number: String,
    pub store_id: Option<LocationId>,
    pub customer_id: Option<CustomerId>,
    pub cashier_id: Option<UserId>,
    pub items: Vec<SaleLineView>,
    pub subtotal_amount: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub payment_status: PaymentStatus,
    pub payments: Vec<PaymentView>,
    pub loyalty_points_used: i64,
    pub loyalty_points_earned: i64,
    pub refunded_amount: Money,
    pub sold_at: Option<DateTime<Utc>>,
}

impl From<&Sale> for SaleView {
    fn from(s: &Sale) -> Self {
        let totals = s.totals();
        Self {
            id: *s.id(),
            receipt_number: s.receipt_number().to_string(),
            store_id: s.store_id(),
            customer_id: s.customer_id(),
            cashier_id: s.cashier_id(),
            items: s.lines().iter().map(Into::into).collect(),
            subtotal_amount: totals.subtotal,
            tax_amount: totals.tax_amount,
            discount_amount: totals.discount_amount,
            total_amount: totals.total_amount,
            amount_paid: s.amount_paid(),
            payment_status: s.payment_status(),
            payments: s.payments().iter().map(Into::into).collect(),
            loyalty_points_used: s.loyalty_points_used(),
            loyalty_points_earned: s.loyalty_points_earned(),
            refunded_amount: s.refunded_amount(),
            sold_at: s.sold_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub sale: SaleView,
    pub movements: Vec<MovementView>,
    pub loyalty: Option<LoyaltyAccountView>,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        Self {
            sale: (&outcome.sale).into(),
            movements: movements(outcome.movements),
            loyalty: outcome.loyalty.as_ref().map(Into::into),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnedLineView {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub refund_amount: Money,
}

impl From<&ReturnedLine> for ReturnedLineView {
    fn from(line: &ReturnedLine) -> Self {
        Self {
            line_no: line.line_no,
            product_id: line.product_id,
            quantity: line.quantity,
            refund_amount: line.refund_amount,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReturnView {
    pub id: storeops_sales::SaleReturnId,
    pub return_number: String,
    pub sale_id: Option<storeops_sales::SaleId>,
    pub store_id: Option<LocationId>,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<ReturnedLineView>,
    pub refund_amount: Money,
    pub reason: String,
    pub points_reversed: i64,
    pub processed_by: Option<UserId>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl From<&SaleReturn> for SaleReturnView {
    fn from(r: &SaleReturn) -> Self {
        Self {
            id: *r.id(),
            return_number: r.return_number().to_string(),
            sale_id: r.sale_id(),
            store_id: r.store_id(),
            customer_id: r.customer_id(),
            items: r.lines().iter().map(Into::into).collect(),
            refund_amount: r.refund_amount(),
            reason: r.reason().to_string(),
            points_reversed: r.points_reversed(),
            processed_by: r.processed_by(),
            returned_at: r.returned_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnResponse {
    pub sale_return: SaleReturnView,
    pub movements: Vec<MovementView>,
}

impl From<ReturnOutcome> for ReturnResponse {
    fn from(outcome: ReturnOutcome) -> Self {
        Self {
            sale_return: (&outcome.sale_return).into(),
            movements: movements(outcome.movements),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierView {
    pub name: String,
    pub required_points: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramView {
    pub id: LoyaltyProgramId,
    pub name: String,
    pub points_per_currency_unit: Money,
    pub tiers: Vec<TierView>,
    pub is_active: bool,
}

impl From<&LoyaltyProgram> for ProgramView {
    fn from(p: &LoyaltyProgram) -> Self {
        Self {
            id: *p.id(),
            name: p.name().to_string(),
            points_per_currency_unit: p.points_per_currency_unit(),
            tiers: p
                .tiers()
                .iter()
                .map(|t| TierView {
                    name: t.name.clone(),
                    required_points: t.required_points,
                })
                .collect(),
            is_active: p.is_active(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyTransactionView {
    pub sequence: u64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub points: i64,
    pub balance_after: i64,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&LoyaltyTransaction> for LoyaltyTransactionView {
    fn from(t: &LoyaltyTransaction) -> Self {
        Self {
            sequence: t.sequence,
            kind: t.kind,
            points: t.points,
            balance_after: t.balance_after,
            reference: t.reference.clone(),
            description: t.description.clone(),
            created_at: t.occurred_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyAccountView {
    pub customer_id: CustomerId,
    pub program_id: Option<LoyaltyProgramId>,
    pub loyalty_points: i64,
    pub tier: Option<String>,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub transactions: Vec<LoyaltyTransactionView>,
}

impl From<&LoyaltyAccount> for LoyaltyAccountView {
    fn from(a: &LoyaltyAccount) -> Self {
        Self {
            customer_id: a.customer_id(),
            program_id: a.program_id(),
            loyalty_points: a.points(),
            tier: a.tier().map(str::to_string),
            enrolled_at: a.enrolled_at(),
            transactions: a.transactions().iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn checkout_body_only_redeems_when_asked() {
        let store = LocationId::new();
        let product = ProductId::new();
        let body: CheckoutBody = serde_json::from_value(json!({
            "storeId": store,
            "items": [{
                "productId": product,
                "inventoryItemId": InventoryRecordId::for_stock(product, store),
                "quantity": 2,
                "unitPrice": "5.00",
            }],
            "subtotalAmount": "10.00",
            "totalAmount": "10.00",
            "paymentMethod": "cash",
            "amountPaid": "10.00",
            "loyaltyPointsUsed": 40,
        }))
        .unwrap();

        let request = CheckoutRequest::from(body);
        assert_eq!(request.redeem_points, None);
        assert_eq!(request.lines[0].discount_amount, Decimal::ZERO);
        assert_eq!(request.totals.total_amount, Decimal::new(1000, 2));
    }

    #[test]
    fn condition_uses_upper_case_names() {
        let body: ConditionRequest =
            serde_json::from_value(json!({"condition": "DAMAGED"})).unwrap();
        assert_eq!(body.condition, StockCondition::Damaged);
        assert!(serde_json::from_value::<ConditionRequest>(json!({"condition": "broken"})).is_err());
    }

    #[test]
    fn adjustment_type_accepts_either_case() {
        let lower: AdjustStockRequest =
            serde_json::from_value(json!({"adjustmentType": "remove", "quantity": 3})).unwrap();
        let upper: AdjustStockRequest =
            serde_json::from_value(json!({"adjustmentType": "SET", "quantity": 0})).unwrap();
        assert_eq!(DeltaType::from(lower.adjustment_type), DeltaType::Remove);
        assert_eq!(DeltaType::from(upper.adjustment_type), DeltaType::Set);
    }
}
