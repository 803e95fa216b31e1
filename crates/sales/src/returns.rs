use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::money::Money;
use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, EventSourced, LocationId,
    UserId, aggregate_id,
};
use storeops_events::Event;

use crate::sale::{ReturnedLine, SaleId};

aggregate_id!(
    /// Sale return identifier.
    SaleReturnId
);

/// Aggregate root: SaleReturn. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReturn {
    id: SaleReturnId,
    return_number: String,
    sale_id: Option<SaleId>,
    store_id: Option<LocationId>,
    customer_id: Option<CustomerId>,
    lines: Vec<ReturnedLine>,
    refund_amount: Money,
    reason: String,
    points_reversed: i64,
    processed_by: Option<UserId>,
    returned_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl SaleReturn {
    pub fn return_number(&self) -> &str {
        &self.return_number
    }

    pub fn sale_id(&self) -> Option<SaleId> {
        self.sale_id
    }

    pub fn store_id(&self) -> Option<LocationId> {
        self.store_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn lines(&self) -> &[ReturnedLine] {
        &self.lines
    }

    pub fn refund_amount(&self) -> Money {
        self.refund_amount
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn points_reversed(&self) -> i64 {
        self.points_reversed
    }

    pub fn processed_by(&self) -> Option<UserId> {
        self.processed_by
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }
}

impl AggregateRoot for SaleReturn {
    type Id = SaleReturnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReturn {
    pub return_id: SaleReturnId,
    pub return_number: String,
    pub sale_id: SaleId,
    pub store_id: LocationId,
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<ReturnedLine>,
    pub refund_amount: Money,
    pub reason: String,
    pub points_reversed: i64,
    pub processed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleReturnCommand {
    RecordReturn(RecordReturn),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleReturnEvent {
    ReturnRecorded(RecordReturn),
}

impl Event for SaleReturnEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleReturnEvent::ReturnRecorded(_) => "sales.return.recorded",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleReturnEvent::ReturnRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SaleReturn {
    type Command = SaleReturnCommand;
    type Event = SaleReturnEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleReturnEvent::ReturnRecorded(e) => {
                self.id = e.return_id;
                self.return_number = e.return_number.clone();
                self.sale_id = Some(e.sale_id);
                self.store_id = Some(e.store_id);
                self.customer_id = e.customer_id;
                self.lines = e.lines.clone();
                self.refund_amount = e.refund_amount;
                self.reason = e.reason.clone();
                self.points_reversed = e.points_reversed;
                self.processed_by = Some(e.processed_by);
                self.returned_at = Some(e.occurred_at);
                self.created = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleReturnCommand::RecordReturn(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("sale return already recorded"));
                }
                if cmd.return_id != self.id {
                    return Err(DomainError::invariant("return_id mismatch"));
                }
                if cmd.lines.is_empty() {
                    return Err(DomainError::validation("return must contain at least one item"));
                }
                if cmd.reason.trim().is_empty() {
                    return Err(DomainError::validation("return reason cannot be empty"));
                }
                if cmd.refund_amount.is_sign_negative() || cmd.points_reversed < 0 {
                    return Err(DomainError::validation(
                        "refund amount and reversed points cannot be negative",
                    ));
                }
                Ok(vec![SaleReturnEvent::ReturnRecorded(cmd.clone())])
            }
        }
    }
}

impl EventSourced for SaleReturn {
    const AGGREGATE_TYPE: &'static str = "sales.return";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: SaleReturnId(id),
            return_number: String::new(),
            sale_id: None,
            store_id: None,
            customer_id: None,
            lines: Vec::new(),
            refund_amount: Money::ZERO,
            reason: String::new(),
            points_reversed: 0,
            processed_by: None,
            returned_at: None,
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
    use storeops_core::ProductId;

    fn command(return_id: SaleReturnId) -> RecordReturn {
        RecordReturn {
            return_id,
            return_number: "RTN-260101-0001".to_string(),
            sale_id: SaleId::new(),
            store_id: LocationId::new(),
            customer_id: None,
            lines: vec![ReturnedLine {
                line_no: 1,
                product_id: ProductId::new(),
                quantity: 1,
                refund_amount: Money::new(500, 2),
            }],
            refund_amount: Money::new(500, 2),
            reason: "damaged packaging".to_string(),
            points_reversed: 5,
            processed_by: UserId::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn return_is_recorded_once() {
        let id = SaleReturnId::new();
        let mut ret = SaleReturn::empty(id.0);
        let events = ret
            .handle(&SaleReturnCommand::RecordReturn(command(id)))
            .unwrap();
        for e in &events {
            ret.apply(e);
        }
        assert!(ret.exists());
        assert_eq!(ret.points_reversed(), 5);

        let err = ret
            .handle(&SaleReturnCommand::RecordReturn(command(id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn reason_is_required() {
        let id = SaleReturnId::new();
        let ret = SaleReturn::empty(id.0);
        let mut cmd = command(id);
        cmd.reason = "  ".to_string();
        assert!(matches!(
            ret.handle(&SaleReturnCommand::RecordReturn(cmd)),
            Err(DomainError::Validation(_))
        ));
    }
}
