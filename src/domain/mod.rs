//! Core entities shared by the engine, the monitor and the stores.

pub mod amount;
pub mod business;
pub mod payment_request;
pub mod transaction;
pub mod wallet;

pub use amount::{Amount, AmountError};
pub use business::{Business, NewBusiness};
pub use payment_request::{NewPaymentRequest, PaymentRequest, PaymentRequestStatus};
pub use transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus};
pub use wallet::{NewWallet, Wallet};

pub type BusinessId = i64;
pub type WalletId = i64;
pub type TransactionId = i64;
pub type PaymentRequestId = i64;

/// A stored enum column held a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
