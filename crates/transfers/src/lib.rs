//! Transfers domain module (event-sourced).
//!
//! Moves stock between locations through an explicit status lifecycle. The
//! aggregate decides transitions only; the ledger movements that accompany
//! shipping and receiving are issued by the transfer workflow in `infra`.

pub mod transfer;

pub use transfer::{
    CreateTransfer, ShipTransfer, Transfer, TransferCommand, TransferEvent, TransferId,
    TransferItem, TransferKind, TransferPriority, TransferStatus, TransferTotals, UpdateTransfer,
};
