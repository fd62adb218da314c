//! Ports the core depends on: persistence and the external ledger.
//!
//! Services only ever see these traits, so the durable store, the in-memory
//! store and test doubles are interchangeable.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Amount, Business, BusinessId, NewBusiness, NewPaymentRequest, NewTransaction, NewWallet,
    PaymentRequest, PaymentRequestId, PaymentRequestStatus, Transaction, TransactionId,
    TransactionStatus, Wallet, WalletId,
};
use crate::secrets::SigningSecret;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule or a conditional update did not hold.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait BusinessRepository: Send + Sync {
    /// Persists a business and its wallet as one unit. Fails with
    /// `Conflict` when the email or public key is already taken.
    async fn create_business_with_wallet(
        &self,
        business: NewBusiness,
        wallet: NewWallet,
    ) -> RepositoryResult<(Business, Wallet)>;

    async fn business(&self, id: BusinessId) -> RepositoryResult<Option<Business>>;

    async fn business_by_email(&self, email: &str) -> RepositoryResult<Option<Business>>;

    async fn list_businesses(&self) -> RepositoryResult<Vec<Business>>;
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn wallet_for_business(&self, business_id: BusinessId)
        -> RepositoryResult<Option<Wallet>>;

    async fn wallet_by_public_key(&self, public_key: &str) -> RepositoryResult<Option<Wallet>>;

    async fn list_wallets(&self) -> RepositoryResult<Vec<Wallet>>;

    async fn update_wallet_balance(&self, id: WalletId, balance: Amount) -> RepositoryResult<()>;

    async fn update_monitor_cursor(&self, id: WalletId, cursor: &str) -> RepositoryResult<()>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Fails with `Conflict` if `stellar_tx_hash` is already recorded.
    async fn insert_transaction(&self, tx: NewTransaction) -> RepositoryResult<Transaction>;

    async fn transaction(&self, id: TransactionId) -> RepositoryResult<Option<Transaction>>;

    /// Moves a `pending` row to a terminal status, setting the hash if given.
    /// Rows that are no longer pending are left untouched and `Conflict`
    /// is returned.
    async fn finish_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        stellar_tx_hash: Option<String>,
    ) -> RepositoryResult<Transaction>;

    async fn transaction_by_hash(&self, hash: &str) -> RepositoryResult<Option<Transaction>>;

    /// Rows visible to the business, newest first.
    async fn transactions_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Vec<Transaction>>;

    async fn list_transactions(&self) -> RepositoryResult<Vec<Transaction>>;
}

#[async_trait]
pub trait PaymentRequestRepository: Send + Sync {
    async fn insert_payment_request(
        &self,
        request: NewPaymentRequest,
    ) -> RepositoryResult<PaymentRequest>;

    async fn payment_request(&self, id: PaymentRequestId)
        -> RepositoryResult<Option<PaymentRequest>>;

    /// Requests where the business is payer or requester, newest first.
    async fn payment_requests_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Vec<PaymentRequest>>;

    /// Compare-and-set out of `pending`. `transaction_id` is linked only when
    /// moving to `paid`. Returns `Conflict` if the request is not pending.
    async fn close_payment_request(
        &self,
        id: PaymentRequestId,
        status: PaymentRequestStatus,
        transaction_id: Option<TransactionId>,
    ) -> RepositoryResult<PaymentRequest>;
}

/// Everything the services need from persistence.
pub trait Store:
    BusinessRepository + WalletRepository + TransactionRepository + PaymentRequestRepository
{
}

impl<T> Store for T where
    T: BusinessRepository + WalletRepository + TransactionRepository + PaymentRequestRepository
{
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account funding failed: {0}")]
    Funding(String),

    #[error("payment rejected by the network: {0}")]
    Rejected(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("malformed ledger response: {0}")]
    InvalidResponse(String),

    #[error("invalid signing credential: {0}")]
    Credential(String),
}

/// A fresh account created and funded on the ledger.
#[derive(Debug)]
pub struct FundedAccount {
    pub public_key: String,
    pub secret: SigningSecret,
}

/// A payment entry as reported by the ledger's payment feed.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPayment {
    pub tx_hash: String,
    pub amount: Amount,
    pub destination: String,
    pub asset_type: String,
    pub memo: Option<String>,
    pub paging_token: Option<String>,
}

impl InboundPayment {
    pub fn is_native(&self) -> bool {
        self.asset_type == "native"
    }
}

/// The external settlement network.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn create_funded_account(&self) -> Result<FundedAccount, LedgerError>;

    /// Native balance of the account. Query failures read as zero.
    async fn native_balance(&self, public_key: &str) -> Amount;

    /// Submits a single payment and returns the network transaction hash.
    async fn submit_payment(
        &self,
        signer: &SigningSecret,
        destination: &str,
        amount: Amount,
        memo: Option<&str>,
    ) -> Result<String, LedgerError>;

    /// True when the candidate is a well-formed address of an existing account.
    async fn is_valid_address(&self, candidate: &str) -> bool;

    /// Most recent payments touching the account, newest first.
    async fn recent_inbound_payments(
        &self,
        public_key: &str,
        limit: u32,
    ) -> Result<Vec<InboundPayment>, LedgerError>;
}
