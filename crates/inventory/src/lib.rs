//! Inventory domain module (event-sourced).
//!
//! Stock locations and the per-location, per-product stock ledger, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod location;
pub mod record;

pub use location::{LocationCommand, LocationEvent, LocationKind, RegisterLocation, StockLocation};
pub use record::{
    ApplyDelta, DeltaType, InventoryRecord, InventoryRecordCommand, InventoryRecordEvent,
    InventoryRecordId, MovementEntry, PriceUpdate, ReasonCode, StockCondition, StockLevel,
    StockStatus,
};
