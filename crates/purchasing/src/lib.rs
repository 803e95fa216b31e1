//! Purchasing domain module (Purchase Orders, event-sourced).
//!
//! This crate contains business rules for purchase orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Stock movements caused
//! by receiving are applied by the receiving workflow in the infra crate.

pub mod order;

pub use order::{
    CreatePurchaseOrder, GoodsReceived, LineReceipt, NewOrderLine, OrderLine, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderId,
    PurchaseOrderLineAdded, PurchaseOrderStatus, ReceiveGoods, ReceivedLine, SupplierId,
};
