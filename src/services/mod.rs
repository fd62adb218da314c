pub mod accounts;
pub mod balance;
pub mod invoices;
pub mod locks;
pub mod monitor;
pub mod settlement;

use thiserror::Error;

use crate::domain::{BusinessId, PaymentRequestId};
use crate::ports::{LedgerError, RepositoryError};
use crate::validation::ValidationError;

pub use accounts::{AccountService, AdminOverview, BusinessSummary, Profile, Session};
pub use invoices::InvoiceService;
pub use locks::KeyedLocks;
pub use monitor::WalletMonitor;
pub use settlement::{SettlementOutcome, TransferEngine};

/// Failures of the payment workflows.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("no wallet found for business {0}")]
    WalletNotFound(BusinessId),

    #[error("invalid destination address: {0}")]
    InvalidAddress(String),

    #[error("business not found: {0}")]
    BusinessNotFound(String),

    #[error("payment request {0} not found")]
    RequestNotFound(PaymentRequestId),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("settlement failed: {0}")]
    Settlement(#[from] LedgerError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for PaymentError {
    fn from(err: ValidationError) -> Self {
        PaymentError::Validation(err.to_string())
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;
