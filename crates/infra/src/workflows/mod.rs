//! Application workflows.
//!
//! Each service call runs in one [`UnitOfWork`]: it rehydrates what it needs,
//! lets the aggregates decide, issues ledger mutations through
//! [`ledger::apply_delta`], and commits everything in a single append. A
//! failure at any step drops the unit of work, so nothing partial persists.

pub mod audits;
pub mod checkout;
pub mod ledger;
pub mod locations;
pub mod loyalty;
pub mod receiving;
pub mod returns;
pub mod transfers;

pub use audits::{AuditService, CountOutcome, PlanAuditRequest, ReconcileOutcome};
pub use checkout::{CheckoutOutcome, CheckoutRequest, CheckoutService, PaymentRequest};
pub use ledger::{LedgerService, ManualAdjustment, OpeningStock};
pub use locations::LocationService;
pub use loyalty::{DEFAULT_PROGRAM_NAME, LoyaltyService, NewProgram, default_program_id};
pub use receiving::{NewPurchaseOrder, ReceiptOutcome, ReceivingService};
pub use returns::{ReturnOutcome, ReturnRequest, ReturnService};
pub use transfers::{NewTransfer, TransferItemRequest, TransferService, TransferUpdate};

use tracing::info;

use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::unit_of_work::UnitOfWork;

/// Commit and log the outcome of a workflow step.
pub(crate) fn commit<S: EventStore + ?Sized>(
    uow: UnitOfWork<'_, S>,
    operation: &'static str,
) -> WorkflowResult<()> {
    let stored = uow.commit()?;
    info!(operation, events = stored.len(), "workflow committed");
    Ok(())
}
