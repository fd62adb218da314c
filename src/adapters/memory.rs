//! In-process store used for local runs and tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::domain::{
    Amount, Business, BusinessId, NewBusiness, NewPaymentRequest, NewTransaction, NewWallet,
    PaymentRequest, PaymentRequestId, PaymentRequestStatus, Transaction, TransactionId,
    TransactionStatus, Wallet, WalletId,
};
use crate::ports::{
    BusinessRepository, PaymentRequestRepository, RepositoryError, RepositoryResult,
    TransactionRepository, WalletRepository,
};

#[derive(Default)]
struct State {
    businesses: BTreeMap<BusinessId, Business>,
    business_by_email: HashMap<String, BusinessId>,
    wallets: BTreeMap<WalletId, Wallet>,
    wallet_by_business: HashMap<BusinessId, WalletId>,
    wallet_by_key: HashMap<String, WalletId>,
    transactions: BTreeMap<TransactionId, Transaction>,
    transaction_by_hash: HashMap<String, TransactionId>,
    payment_requests: BTreeMap<PaymentRequestId, PaymentRequest>,
    next_business_id: i64,
    next_wallet_id: i64,
    next_transaction_id: i64,
    next_request_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Every table behind one lock, so multi-entity writes are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BusinessRepository for InMemoryStore {
    async fn create_business_with_wallet(
        &self,
        business: NewBusiness,
        wallet: NewWallet,
    ) -> RepositoryResult<(Business, Wallet)> {
        let mut state = self.state.write().await;

        if state.business_by_email.contains_key(&business.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} already registered",
                business.email
            )));
        }
        if state.wallet_by_key.contains_key(&wallet.public_key) {
            return Err(RepositoryError::Conflict(format!(
                "public key {} already assigned",
                wallet.public_key
            )));
        }

        let now = Utc::now();
        let business = Business {
            id: next(&mut state.next_business_id),
            name: business.name,
            email: business.email,
            password_hash: business.password_hash,
            created_at: now,
        };
        let wallet = Wallet {
            id: next(&mut state.next_wallet_id),
            business_id: business.id,
            public_key: wallet.public_key,
            encrypted_secret: wallet.encrypted_secret,
            balance: wallet.balance,
            monitor_cursor: None,
            created_at: now,
        };

        state
            .business_by_email
            .insert(business.email.clone(), business.id);
        state.wallet_by_business.insert(business.id, wallet.id);
        state
            .wallet_by_key
            .insert(wallet.public_key.clone(), wallet.id);
        state.businesses.insert(business.id, business.clone());
        state.wallets.insert(wallet.id, wallet.clone());

        Ok((business, wallet))
    }

    async fn business(&self, id: BusinessId) -> RepositoryResult<Option<Business>> {
        Ok(self.state.read().await.businesses.get(&id).cloned())
    }

    async fn business_by_email(&self, email: &str) -> RepositoryResult<Option<Business>> {
        let state = self.state.read().await;
        Ok(state
            .business_by_email
            .get(email)
            .and_then(|id| state.businesses.get(id))
            .cloned())
    }

    async fn list_businesses(&self) -> RepositoryResult<Vec<Business>> {
        Ok(self.state.read().await.businesses.values().cloned().collect())
    }
}

#[async_trait]
impl WalletRepository for InMemoryStore {
    async fn wallet_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Option<Wallet>> {
        let state = self.state.read().await;
        Ok(state
            .wallet_by_business
            .get(&business_id)
            .and_then(|id| state.wallets.get(id))
            .cloned())
    }

    async fn wallet_by_public_key(&self, public_key: &str) -> RepositoryResult<Option<Wallet>> {
        let state = self.state.read().await;
        Ok(state
            .wallet_by_key
            .get(public_key)
            .and_then(|id| state.wallets.get(id))
            .cloned())
    }

    async fn list_wallets(&self) -> RepositoryResult<Vec<Wallet>> {
        Ok(self.state.read().await.wallets.values().cloned().collect())
    }

    async fn update_wallet_balance(&self, id: WalletId, balance: Amount) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let wallet = state
            .wallets
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("wallet {}", id)))?;
        wallet.balance = balance;
        Ok(())
    }

    async fn update_monitor_cursor(&self, id: WalletId, cursor: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let wallet = state
            .wallets
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("wallet {}", id)))?;
        wallet.monitor_cursor = Some(cursor.to_string());
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn insert_transaction(&self, tx: NewTransaction) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;

        if let Some(hash) = &tx.stellar_tx_hash {
            if state.transaction_by_hash.contains_key(hash) {
                return Err(RepositoryError::Conflict(format!(
                    "transaction hash {} already recorded",
                    hash
                )));
            }
        }

        let transaction = Transaction {
            id: next(&mut state.next_transaction_id),
            from_business_id: tx.from_business_id,
            to_address: tx.to_address,
            to_business_id: tx.to_business_id,
            amount: tx.amount,
            memo: tx.memo,
            stellar_tx_hash: tx.stellar_tx_hash,
            status: tx.status,
            kind: tx.kind,
            created_at: Utc::now(),
        };

        if let Some(hash) = &transaction.stellar_tx_hash {
            state
                .transaction_by_hash
                .insert(hash.clone(), transaction.id);
        }
        state
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn transaction(&self, id: TransactionId) -> RepositoryResult<Option<Transaction>> {
        Ok(self.state.read().await.transactions.get(&id).cloned())
    }

    async fn finish_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        stellar_tx_hash: Option<String>,
    ) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        let state = &mut *state;

        let transaction = state
            .transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        if !transaction.status.can_transition_to(status) {
            return Err(RepositoryError::Conflict(format!(
                "transaction {} is already {}",
                id, transaction.status
            )));
        }

        if let Some(hash) = stellar_tx_hash {
            match state.transaction_by_hash.get(&hash) {
                Some(owner) if *owner != id => {
                    return Err(RepositoryError::Conflict(format!(
                        "transaction hash {} already recorded",
                        hash
                    )));
                }
                _ => {}
            }
            state.transaction_by_hash.insert(hash.clone(), id);
            transaction.stellar_tx_hash = Some(hash);
        }
        transaction.status = status;
        Ok(transaction.clone())
    }

    async fn transaction_by_hash(&self, hash: &str) -> RepositoryResult<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state
            .transaction_by_hash
            .get(hash)
            .and_then(|id| state.transactions.get(id))
            .cloned())
    }

    async fn transactions_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.is_visible_to(business_id))
            .cloned()
            .collect())
    }

    async fn list_transactions(&self) -> RepositoryResult<Vec<Transaction>> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .values()
            .rev()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRequestRepository for InMemoryStore {
    async fn insert_payment_request(
        &self,
        request: NewPaymentRequest,
    ) -> RepositoryResult<PaymentRequest> {
        let mut state = self.state.write().await;
        let request = PaymentRequest {
            id: next(&mut state.next_request_id),
            from_business_id: request.from_business_id,
            to_business_id: request.to_business_id,
            amount: request.amount,
            memo: request.memo,
            status: PaymentRequestStatus::Pending,
            transaction_id: None,
            created_at: Utc::now(),
        };
        state.payment_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn payment_request(
        &self,
        id: PaymentRequestId,
    ) -> RepositoryResult<Option<PaymentRequest>> {
        Ok(self.state.read().await.payment_requests.get(&id).cloned())
    }

    async fn payment_requests_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Vec<PaymentRequest>> {
        let state = self.state.read().await;
        Ok(state
            .payment_requests
            .values()
            .rev()
            .filter(|request| request.involves(business_id))
            .cloned()
            .collect())
    }

    async fn close_payment_request(
        &self,
        id: PaymentRequestId,
        status: PaymentRequestStatus,
        transaction_id: Option<TransactionId>,
    ) -> RepositoryResult<PaymentRequest> {
        if status == PaymentRequestStatus::Pending {
            return Err(RepositoryError::Conflict(
                "payment request cannot return to pending".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let request = state
            .payment_requests
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("payment request {}", id)))?;
        if request.status != PaymentRequestStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "payment request {} is already {}",
                id, request.status
            )));
        }

        request.status = status;
        if status == PaymentRequestStatus::Paid {
            request.transaction_id = transaction_id;
        }
        Ok(request.clone())
    }
}
