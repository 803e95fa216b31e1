//! Sale returns: stock goes back to the sale's store, the refund is quoted
//! from the original line totals, and earned points are reversed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use storeops_core::{DomainError, Money, UserId, money};
use storeops_inventory::{ApplyDelta, DeltaType, MovementEntry, ReasonCode};
use storeops_loyalty::TransactionKind;
use storeops_sales::{
    RecordReturn, ReturnRequestLine, Sale, SaleCommand, SaleId, SaleReturn, SaleReturnCommand,
    SaleReturnId,
};

use super::commit;
use super::ledger::apply_delta;
use super::loyalty::{enrolled, post};
use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::numbering::{DocumentSeries, next_number};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub lines: Vec<ReturnRequestLine>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub sale_return: SaleReturn,
    pub movements: Vec<MovementEntry>,
}

#[derive(Debug, Clone)]
pub struct ReturnService<S> {
    store: S,
}

impl<S: EventStore> ReturnService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request), fields(lines = request.lines.len()), err(level = "warn"))]
    pub fn process_return(
        &self,
        sale_id: SaleId,
        request: ReturnRequest,
        actor_id: UserId,
    ) -> WorkflowResult<ReturnOutcome> {
        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        let sale = uow.get::<Sale>(sale_id.0, "sale")?;
        let store_id = sale
            .store_id()
            .ok_or_else(|| DomainError::invariant("sale without store"))?;
        let quote = sale.quote_return(&request.lines)?;

        let return_id = SaleReturnId::new();
        let return_number = next_number(&mut uow, DocumentSeries::Return, now)?;

        let mut movements = Vec::with_capacity(quote.lines.len());
        for line in &quote.lines {
            movements.push(apply_delta(
                &mut uow,
                ApplyDelta {
                    product_id: line.product_id,
                    location_id: store_id,
                    delta_type: DeltaType::Add,
                    quantity: line.quantity,
                    reason: ReasonCode::SaleReturn,
                    actor_id,
                    reference: Some(return_number.clone()),
                    notes: Some(request.reason.clone()),
                    prices: None,
                    occurred_at: now,
                },
            )?);
        }

        let mut points_reversed = 0;
        if let Some(customer_id) = sale.customer_id().filter(|_| sale.loyalty_points_earned() > 0) {
            if let Some((account, program)) = enrolled(&mut uow, customer_id)? {
                points_reversed = reversal(quote.refund_amount, program.points_per_currency_unit(), account.points())?;
                if points_reversed > 0 {
                    post(
                        &mut uow,
                        &account,
                        &program,
                        TransactionKind::Adjust,
                        -points_reversed,
                        Some(return_number.clone()),
                        Some(format!("Reversal for return of {}", sale.receipt_number())),
                    )?;
                }
            }
        }

        uow.execute::<Sale>(
            sale_id.0,
            SaleCommand::ApplyReturn {
                return_id: return_id.0,
                lines: request.lines,
                occurred_at: now,
            },
        )?;
        uow.execute::<SaleReturn>(
            return_id.0,
            SaleReturnCommand::RecordReturn(RecordReturn {
                return_id,
                return_number: return_number.clone(),
                sale_id,
                store_id,
                customer_id: sale.customer_id(),
                lines: quote.lines,
                refund_amount: quote.refund_amount,
                reason: request.reason,
                points_reversed,
                processed_by: actor_id,
                occurred_at: now,
            }),
        )?;

        let sale_return = uow.load::<SaleReturn>(return_id.0)?;
        commit(uow, "sales.return")?;
        info!(
            return_number = %return_number,
            refund = %quote.refund_amount,
            points_reversed,
            "sale return processed"
        );
        Ok(ReturnOutcome {
            sale_return,
            movements,
        })
    }

    pub fn get(&self, return_id: SaleReturnId) -> WorkflowResult<SaleReturn> {
        UnitOfWork::new(&self.store).get::<SaleReturn>(return_id.0, "sale return")
    }
}

/// `floor(refund * rate)`, capped at the current balance.
fn reversal(refund: Money, rate: Money, balance: i64) -> WorkflowResult<i64> {
    let points = refund
        .checked_mul(rate)
        .and_then(money::floor_to_i64)
        .ok_or_else(|| DomainError::validation("loyalty reversal out of range"))?;
    Ok(points.clamp(0, balance.max(0)))
}
