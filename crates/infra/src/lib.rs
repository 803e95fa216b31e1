//! Infrastructure layer: event store, unit of work, document numbering and the
//! workflows that coordinate aggregates with the stock ledger.

pub mod error;
pub mod event_store;
pub mod numbering;
pub mod repository;
pub mod unit_of_work;
pub mod workflows;

pub use error::{WorkflowError, WorkflowResult};
pub use event_store::{EventStore, InMemoryEventStore};
pub use repository::Repository;
pub use unit_of_work::UnitOfWork;
