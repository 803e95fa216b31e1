//! Sequential, per-day document numbers (`TRF-20260101-0001`, `S260101-0001`, ...).
//!
//! Each `(series, day)` pair is its own `DocumentCounter` stream. Allocation goes
//! through the caller's unit of work, so a number is only consumed when the
//! document that carries it commits, and two concurrent allocations of the same
//! number cannot both commit.
//!
//! Every document of one series and day shares the counter stream, so
//! concurrent checkouts on one day contend on it. The loser's whole
//! unit of work fails with a retryable `WorkflowError::ConcurrencyConflict`
//! (HTTP 409 `concurrency_conflict`) and nothing of it persists; callers resubmit
//! the request, which reloads the counter and takes the next number. No retry
//! happens inside the workflows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::{Aggregate, AggregateId, AggregateRoot, DomainError, EventSourced};
use storeops_events::Event;

use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentSeries {
    Transfer,
    Audit,
    PurchaseOrder,
    Receipt,
    Return,
}

impl DocumentSeries {
    fn key(self) -> &'static str {
        match self {
            DocumentSeries::Transfer => "transfer",
            DocumentSeries::Audit => "audit",
            DocumentSeries::PurchaseOrder => "purchase_order",
            DocumentSeries::Receipt => "receipt",
            DocumentSeries::Return => "return",
        }
    }

    /// Render a document number for `day` and 1-based `sequence`.
    pub fn format(self, day: NaiveDate, sequence: u32) -> String {
        match self {
            DocumentSeries::Transfer => format!("TRF-{}-{sequence:04}", day.format("%Y%m%d")),
            DocumentSeries::Audit => format!("AUD-{}-{sequence:04}", day.format("%Y%m%d")),
            DocumentSeries::PurchaseOrder => format!("PO-{}-{sequence:04}", day.format("%Y%m%d")),
            DocumentSeries::Receipt => format!("S{}-{sequence:04}", day.format("%y%m%d")),
            DocumentSeries::Return => format!("RTN-{}-{sequence:04}", day.format("%y%m%d")),
        }
    }

    pub fn counter_id(self, day: NaiveDate) -> AggregateId {
        AggregateId::derived(DocumentCounter::AGGREGATE_TYPE, &format!("{}:{day}", self.key()))
    }
}

/// Aggregate root: DocumentCounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCounter {
    id: AggregateId,
    last: u32,
    version: u64,
}

impl DocumentCounter {
    pub fn last(&self) -> u32 {
        self.last
    }
}

impl AggregateRoot for DocumentCounter {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentCounterCommand {
    Allocate {
        series: DocumentSeries,
        day: NaiveDate,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentCounterEvent {
    NumberAllocated {
        series: DocumentSeries,
        day: NaiveDate,
        sequence: u32,
        number: String,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for DocumentCounterEvent {
    fn event_type(&self) -> &'static str {
        "numbering.counter.allocated"
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentCounterEvent::NumberAllocated { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for DocumentCounter {
    type Command = DocumentCounterCommand;
    type Event = DocumentCounterEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DocumentCounterEvent::NumberAllocated { sequence, .. } => self.last = *sequence,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DocumentCounterCommand::Allocate {
                series,
                day,
                occurred_at,
            } => {
                if series.counter_id(*day) != self.id {
                    return Err(DomainError::invariant("counter stream does not match series/day"));
                }
                let sequence = self
                    .last
                    .checked_add(1)
                    .ok_or_else(|| DomainError::invariant("document counter exhausted"))?;
                Ok(vec![DocumentCounterEvent::NumberAllocated {
                    series: *series,
                    day: *day,
                    sequence,
                    number: series.format(*day, sequence),
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

impl EventSourced for DocumentCounter {
    const AGGREGATE_TYPE: &'static str = "numbering.counter";

    fn empty(id: AggregateId) -> Self {
        Self {
            id,
            last: 0,
            version: 0,
        }
    }

    fn exists(&self) -> bool {
        self.version > 0
    }
}

/// Allocate the next number of `series` for the UTC day of `at`.
pub fn next_number<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    series: DocumentSeries,
    at: DateTime<Utc>,
) -> WorkflowResult<String> {
    let day = at.date_naive();
    let events = uow.execute::<DocumentCounter>(
        series.counter_id(day),
        DocumentCounterCommand::Allocate {
            series,
            day,
            occurred_at: at,
        },
    )?;
    match events.into_iter().next() {
        Some(DocumentCounterEvent::NumberAllocated { number, .. }) => Ok(number),
        None => Err(DomainError::invariant("document counter allocated nothing").into()),
    }
}
