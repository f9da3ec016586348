//! Payment transactions (event-sourced bookkeeping records).
//!
//! A transaction records money received against a sales order. No payment
//! gateway is involved: a transaction is created in draft and then marked done.

pub mod transaction;

pub use transaction::{
    AcquirerId, CreateTransaction, MarkDone, PaymentTransaction, TransactionCommand,
    TransactionCreated, TransactionDone, TransactionEvent, TransactionId, TransactionState,
};
