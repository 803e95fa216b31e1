//! Loyalty domain module (event-sourced).
//!
//! Loyalty programs (earn rate + tier table) and per-customer point ledgers.

pub mod account;
pub mod program;

pub use account::{
    LoyaltyAccount, LoyaltyAccountCommand, LoyaltyAccountEvent, LoyaltyTransaction,
    PostTransaction, TransactionKind,
};
pub use program::{
    CreateProgram, LoyaltyProgram, LoyaltyProgramCommand, LoyaltyProgramEvent, LoyaltyProgramId,
    LoyaltyTier, tier_for,
};
