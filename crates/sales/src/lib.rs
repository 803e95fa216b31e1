//! Sales domain module (event-sourced).
//!
//! Point-of-sale sales and their returns, implemented purely as deterministic
//! domain logic. Stock and loyalty side effects are coordinated by the checkout
//! and return workflows in the infra crate.

pub mod returns;
pub mod sale;

pub use returns::{RecordReturn, SaleReturn, SaleReturnCommand, SaleReturnEvent, SaleReturnId};
pub use sale::{
    NewSaleLine, Payment, PaymentMethod, PaymentStatus, RecordSale, ReturnQuote,
    ReturnRequestLine, ReturnedLine, Sale, SaleCommand, SaleEvent, SaleId, SaleLine,
    SaleRecorded, SaleTotals,
};
