#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use paydesk_core::adapters::InMemoryStore;
use paydesk_core::domain::{
    Amount, Business, BusinessId, NewBusiness, NewPaymentRequest, NewTransaction, NewWallet,
    PaymentRequest, PaymentRequestId, PaymentRequestStatus, Transaction, TransactionId,
    TransactionStatus, Wallet, WalletId,
};
use paydesk_core::middleware::auth::SessionKeys;
use paydesk_core::ports::{
    BusinessRepository, FundedAccount, InboundPayment, LedgerError, LedgerGateway,
    PaymentRequestRepository, RepositoryError, RepositoryResult, TransactionRepository,
    WalletRepository,
};
use paydesk_core::secrets::{SecretBox, SigningSecret};
use paydesk_core::services::Session;
use paydesk_core::{create_app, AppState, CoreSettings};

pub const STARTING_BALANCE: i64 = 10_000 * 10_000_000;
pub const FEE_STROOPS: i64 = 100;
pub const ADMIN_KEY: &str = "test-admin-key";

/// A payment the fake ledger accepted.
#[derive(Debug, Clone)]
pub struct Submission {
    pub source: String,
    pub destination: String,
    pub amount: Amount,
    pub memo: Option<String>,
    pub hash: String,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, i64>,
    externals: HashSet<String>,
    feeds: HashMap<String, Vec<InboundPayment>>,
    submissions: Vec<Submission>,
    next_account: u64,
    next_hash: u64,
    next_token: u64,
    failing_submissions: bool,
    failing_feed: bool,
    balance_queries: usize,
}

/// In-process stand-in for the settlement network.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap()
    }

    /// Makes every following submission fail (or succeed again).
    pub fn fail_submissions(&self, failing: bool) {
        self.state().failing_submissions = failing;
    }

    pub fn fail_feed(&self, failing: bool) {
        self.state().failing_feed = failing;
    }

    /// Registers an account that exists on the ledger but is not managed here.
    pub fn add_external_account(&self) -> String {
        let mut state = self.state();
        state.next_account += 1;
        let key = format!("GEXT{:052}", state.next_account);
        state.balances.insert(key.clone(), STARTING_BALANCE);
        state.externals.insert(key.clone());
        key
    }

    /// Simulates a payment from outside arriving at `destination`.
    pub fn push_inbound(
        &self,
        destination: &str,
        hash: &str,
        amount: &str,
        memo: Option<&str>,
    ) -> String {
        self.push_feed_entry(destination, destination, hash, amount, "native", memo)
    }

    pub fn push_feed_entry(
        &self,
        feed_owner: &str,
        destination: &str,
        hash: &str,
        amount: &str,
        asset_type: &str,
        memo: Option<&str>,
    ) -> String {
        let amount: Amount = amount.parse().unwrap();
        let mut state = self.state();
        state.next_token += 1;
        let token = state.next_token.to_string();
        if asset_type == "native" && feed_owner == destination {
            *state.balances.entry(destination.to_string()).or_default() += amount.stroops();
        }
        state.feeds.entry(feed_owner.to_string()).or_default().insert(
            0,
            InboundPayment {
                tx_hash: hash.to_string(),
                amount,
                destination: destination.to_string(),
                asset_type: asset_type.to_string(),
                memo: memo.map(str::to_string),
                paging_token: Some(token.clone()),
            },
        );
        token
    }

    pub fn balance_of(&self, public_key: &str) -> Amount {
        Amount::from_stroops(self.state().balances.get(public_key).copied().unwrap_or(0))
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    pub fn balance_queries(&self) -> usize {
        self.state().balance_queries
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn create_funded_account(&self) -> Result<FundedAccount, LedgerError> {
        let mut state = self.state();
        state.next_account += 1;
        let public_key = format!("GFAKE{:051}", state.next_account);
        state.balances.insert(public_key.clone(), STARTING_BALANCE);
        Ok(FundedAccount {
            secret: SigningSecret::new(format!("SECRET-{}", public_key)),
            public_key,
        })
    }

    async fn native_balance(&self, public_key: &str) -> Amount {
        let mut state = self.state();
        state.balance_queries += 1;
        Amount::from_stroops(state.balances.get(public_key).copied().unwrap_or(0))
    }

    async fn submit_payment(
        &self,
        signer: &SigningSecret,
        destination: &str,
        amount: Amount,
        memo: Option<&str>,
    ) -> Result<String, LedgerError> {
        let source = signer
            .expose()
            .strip_prefix("SECRET-")
            .ok_or_else(|| LedgerError::Credential("unknown secret".to_string()))?
            .to_string();

        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;

        let mut state = self.state();
        if state.failing_submissions {
            return Err(LedgerError::Rejected("op_underfunded".to_string()));
        }

        state.next_hash += 1;
        let hash = format!("{:064x}", state.next_hash);
        *state.balances.entry(source.clone()).or_default() -= amount.stroops() + FEE_STROOPS;
        *state.balances.entry(destination.to_string()).or_default() += amount.stroops();

        state.next_token += 1;
        let entry = InboundPayment {
            tx_hash: hash.clone(),
            amount,
            destination: destination.to_string(),
            asset_type: "native".to_string(),
            memo: memo.map(str::to_string),
            paging_token: Some(state.next_token.to_string()),
        };
        for owner in [source.clone(), destination.to_string()] {
            state.feeds.entry(owner).or_default().insert(0, entry.clone());
        }

        state.submissions.push(Submission {
            source,
            destination: destination.to_string(),
            amount,
            memo: memo.map(str::to_string),
            hash: hash.clone(),
        });
        Ok(hash)
    }

    async fn is_valid_address(&self, candidate: &str) -> bool {
        self.state().balances.contains_key(candidate)
    }

    async fn recent_inbound_payments(
        &self,
        public_key: &str,
        limit: u32,
    ) -> Result<Vec<InboundPayment>, LedgerError> {
        let state = self.state();
        if state.failing_feed {
            return Err(LedgerError::Unavailable("horizon timed out".to_string()));
        }
        Ok(state
            .feeds
            .get(public_key)
            .map(|feed| feed.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}

/// Wraps the in-memory store and fails chosen writes a set number of times.
#[derive(Default)]
pub struct FaultyStore {
    inner: Arc<InMemoryStore>,
    balance_updates: AtomicU32,
    transaction_inserts: AtomicU32,
    finishes: AtomicU32,
    request_closes: AtomicU32,
}

fn take_fault(counter: &AtomicU32, what: &str) -> RepositoryResult<()> {
    let failed = counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
    if failed {
        Err(RepositoryError::Backend(format!("{}: connection reset", what)))
    } else {
        Ok(())
    }
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_balance_updates(&self, times: u32) {
        self.balance_updates.store(times, Ordering::SeqCst);
    }

    pub fn fail_transaction_inserts(&self, times: u32) {
        self.transaction_inserts.store(times, Ordering::SeqCst);
    }

    pub fn fail_finishes(&self, times: u32) {
        self.finishes.store(times, Ordering::SeqCst);
    }

    pub fn fail_request_closes(&self, times: u32) {
        self.request_closes.store(times, Ordering::SeqCst);
    }
}

#[async_trait]
impl BusinessRepository for FaultyStore {
    async fn create_business_with_wallet(
        &self,
        business: NewBusiness,
        wallet: NewWallet,
    ) -> RepositoryResult<(Business, Wallet)> {
        self.inner.create_business_with_wallet(business, wallet).await
    }

    async fn business(&self, id: BusinessId) -> RepositoryResult<Option<Business>> {
        self.inner.business(id).await
    }

    async fn business_by_email(&self, email: &str) -> RepositoryResult<Option<Business>> {
        self.inner.business_by_email(email).await
    }

    async fn list_businesses(&self) -> RepositoryResult<Vec<Business>> {
        self.inner.list_businesses().await
    }
}

#[async_trait]
impl WalletRepository for FaultyStore {
    async fn wallet_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Option<Wallet>> {
        self.inner.wallet_for_business(business_id).await
    }

    async fn wallet_by_public_key(&self, public_key: &str) -> RepositoryResult<Option<Wallet>> {
        self.inner.wallet_by_public_key(public_key).await
    }

    async fn list_wallets(&self) -> RepositoryResult<Vec<Wallet>> {
        self.inner.list_wallets().await
    }

    async fn update_wallet_balance(&self, id: WalletId, balance: Amount) -> RepositoryResult<()> {
        take_fault(&self.balance_updates, "update_wallet_balance")?;
        self.inner.update_wallet_balance(id, balance).await
    }

    async fn update_monitor_cursor(&self, id: WalletId, cursor: &str) -> RepositoryResult<()> {
        self.inner.update_monitor_cursor(id, cursor).await
    }
}

#[async_trait]
impl TransactionRepository for FaultyStore {
    async fn insert_transaction(&self, tx: NewTransaction) -> RepositoryResult<Transaction> {
        take_fault(&self.transaction_inserts, "insert_transaction")?;
        self.inner.insert_transaction(tx).await
    }

    async fn transaction(&self, id: TransactionId) -> RepositoryResult<Option<Transaction>> {
        self.inner.transaction(id).await
    }

    async fn finish_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        stellar_tx_hash: Option<String>,
    ) -> RepositoryResult<Transaction> {
        take_fault(&self.finishes, "finish_transaction")?;
        self.inner.finish_transaction(id, status, stellar_tx_hash).await
    }

    async fn transaction_by_hash(&self, hash: &str) -> RepositoryResult<Option<Transaction>> {
        self.inner.transaction_by_hash(hash).await
    }

    async fn transactions_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Vec<Transaction>> {
        self.inner.transactions_for_business(business_id).await
    }

    async fn list_transactions(&self) -> RepositoryResult<Vec<Transaction>> {
        self.inner.list_transactions().await
    }
}

#[async_trait]
impl PaymentRequestRepository for FaultyStore {
    async fn insert_payment_request(
        &self,
        request: NewPaymentRequest,
    ) -> RepositoryResult<PaymentRequest> {
        self.inner.insert_payment_request(request).await
    }

    async fn payment_request(
        &self,
        id: PaymentRequestId,
    ) -> RepositoryResult<Option<PaymentRequest>> {
        self.inner.payment_request(id).await
    }

    async fn payment_requests_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Vec<PaymentRequest>> {
        self.inner.payment_requests_for_business(business_id).await
    }

    async fn close_payment_request(
        &self,
        id: PaymentRequestId,
        status: PaymentRequestStatus,
        transaction_id: Option<TransactionId>,
    ) -> RepositoryResult<PaymentRequest> {
        take_fault(&self.request_closes, "close_payment_request")?;
        self.inner.close_payment_request(id, status, transaction_id).await
    }
}

pub struct TestContext {
    pub state: AppState,
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<InMemoryStore>,
    /// The store the services see; injects write failures on request.
    pub faults: Arc<FaultyStore>,
}

/// Services over the in-memory store and a fake ledger. Background monitor
/// ticks are an hour apart, so tests drive polling explicitly.
pub fn test_context() -> TestContext {
    let ledger = Arc::new(FakeLedger::new());
    let store = Arc::new(InMemoryStore::new());
    let faults = Arc::new(FaultyStore::new(store.clone()));
    let state = AppState::assemble(
        faults.clone(),
        ledger.clone(),
        SecretBox::from_passphrase("test-wallet-key"),
        SessionKeys::new("test-jwt-secret", 1),
        CoreSettings {
            monitor_interval: Duration::from_secs(3600),
            monitor_page_size: 20,
            admin_api_key: Some(ADMIN_KEY.to_string()),
            bcrypt_cost: 4,
        },
    );

    TestContext {
        state,
        ledger,
        store,
        faults,
    }
}

impl TestContext {
    pub async fn register(&self, name: &str, email: &str) -> Session {
        self.state
            .accounts
            .register(name, email, "password123")
            .await
            .unwrap()
    }

    /// Serves the app on an ephemeral port and returns its base URL.
    pub async fn spawn_server(&self) -> String {
        let app = create_app(self.state.clone());
        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
        let server = axum::Server::bind(&addr).serve(app.into_make_service());
        let actual_addr = server.local_addr();

        tokio::spawn(async move {
            server.await.unwrap();
        });

        format!("http://{}", actual_addr)
    }
}
