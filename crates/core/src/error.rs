//! Domain error model.

use thiserror::Error;

use crate::id::{CustomerId, LocationId, ProductId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only. Storage and concurrency failures are
/// modelled by the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requested operation is not legal in the entity's current status.
    #[error("invalid state transition for {entity}: cannot {requested} from {from}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        requested: String,
    },

    /// A REMOVE (or a sale) asked for more units than are on hand.
    #[error(
        "insufficient stock for product {product_id} at location {location_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        location_id: LocationId,
        requested: i64,
        available: i64,
    },

    /// A redemption or deduction exceeds the customer's balance.
    #[error(
        "insufficient loyalty points for customer {customer_id}: requested {requested}, available {available}"
    )]
    InsufficientLoyaltyPoints {
        customer_id: CustomerId,
        requested: i64,
        available: i64,
    },

    /// Receiving would push a line past its ordered quantity.
    #[error(
        "over-receipt on line {line} (product {product_id}): ordered {ordered}, received {received}, attempted {attempted}"
    )]
    OverReceipt {
        line: u32,
        product_id: ProductId,
        ordered: i64,
        received: i64,
        attempted: i64,
    },

    /// An audit was started against a warehouse with nothing on hand.
    #[error("no inventory to audit at warehouse {0}")]
    NoInventoryToAudit(LocationId),

    /// A conflicting entity already exists.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Arithmetic on caller-supplied amounts left the representable range.
    pub fn overflow(what: impl core::fmt::Display) -> Self {
        Self::Validation(format!("{what} is out of range"))
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl core::fmt::Debug,
        requested: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition {
            entity,
            from: format!("{from:?}"),
            requested: requested.into(),
        }
    }
}
