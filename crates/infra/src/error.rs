//! Workflow-level error model.

use thiserror::Error;

use storeops_core::{AggregateId, DomainError};

use crate::event_store::EventStoreError;

/// Failure of a workflow invocation. Nothing was committed.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A deterministic business rule rejected the request.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Another writer committed to one of the touched streams first. Retryable.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// The store could not persist or load events.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// A stored stream could not be replayed into its aggregate.
    #[error("corrupt stream {aggregate_id}: {reason}")]
    CorruptStream {
        aggregate_id: AggregateId,
        reason: String,
    },
}

impl WorkflowError {
    pub fn corrupt(aggregate_id: AggregateId, reason: impl Into<String>) -> Self {
        Self::CorruptStream {
            aggregate_id,
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::ConcurrencyConflict(_))
    }

    /// The domain error, if this failure was a business-rule rejection.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            WorkflowError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EventStoreError> for WorkflowError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => WorkflowError::ConcurrencyConflict(msg),
            other => WorkflowError::PersistenceFailure(other.to_string()),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_concurrency_maps_to_retryable_conflict() {
        let err: WorkflowError = EventStoreError::Concurrency("stale".to_string()).into();
        assert!(err.is_retryable());

        let err: WorkflowError = EventStoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err, WorkflowError::PersistenceFailure(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn domain_errors_pass_through() {
        let err: WorkflowError = DomainError::validation("bad").into();
        assert_eq!(err.as_domain(), Some(&DomainError::validation("bad")));
        assert_eq!(err.to_string(), "validation failed: bad");
    }
}
