//! Physical-inventory audits (event-sourced).
//!
//! Expected quantities are snapshotted from the stock ledger when items are
//! created; counting never touches the ledger. Reconciling a discrepancy does,
//! through the audit workflow in `infra`.

pub mod audit;

pub use audit::{
    Audit, AuditCommand, AuditEvent, AuditId, AuditItem, AuditItemSeed, AuditItemStatus,
    AuditProgress, AuditStatus, ItemCount, ItemCounted, PlanAudit,
};
