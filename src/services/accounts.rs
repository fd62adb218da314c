use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{Business, BusinessId, NewBusiness, NewWallet, Transaction, Wallet};
use crate::middleware::auth::SessionKeys;
use crate::ports::{LedgerGateway, RepositoryError, Store};
use crate::secrets::SecretBox;
use crate::services::balance::refresh_wallet_balance;
use crate::services::monitor::WalletMonitor;
use crate::services::{PaymentError, PaymentResult};
use crate::validation::{validate_email, validate_name, validate_password};

const INVALID_LOGIN: &str = "Invalid email or password";

/// A signed-in business.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub business: Business,
    pub wallet: Wallet,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub business: Business,
    pub wallet: Wallet,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSummary {
    pub business: Business,
    pub wallet: Option<Wallet>,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub businesses: Vec<BusinessSummary>,
}

pub struct AccountService {
    store: Arc<dyn Store>,
    ledger: Arc<dyn LedgerGateway>,
    vault: Arc<SecretBox>,
    monitor: Arc<WalletMonitor>,
    sessions: Arc<SessionKeys>,
    bcrypt_cost: u32,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<dyn LedgerGateway>,
        vault: Arc<SecretBox>,
        monitor: Arc<WalletMonitor>,
        sessions: Arc<SessionKeys>,
    ) -> Self {
        Self {
            store,
            ledger,
            vault,
            monitor,
            sessions,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Creates a business together with a freshly funded custodial wallet
    /// and starts watching that wallet.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> PaymentResult<Session> {
        let name = validate_name(name)?;
        let email = validate_email(email)?;
        validate_password(password)?;

        if self.store.business_by_email(&email).await?.is_some() {
            return Err(PaymentError::Conflict("email already registered".to_string()));
        }

        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| PaymentError::Internal(e.to_string()))?
            .map_err(|e| PaymentError::Internal(e.to_string()))?;

        let account = self.ledger.create_funded_account().await?;
        let encrypted_secret = self
            .vault
            .seal(&account.secret)
            .map_err(|e| PaymentError::Internal(e.to_string()))?;
        let balance = self.ledger.native_balance(&account.public_key).await;

        let (business, wallet) = self
            .store
            .create_business_with_wallet(
                NewBusiness {
                    name,
                    email,
                    password_hash,
                },
                NewWallet {
                    public_key: account.public_key,
                    encrypted_secret,
                    balance,
                },
            )
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) => PaymentError::Conflict(msg),
                other => PaymentError::Storage(other),
            })?;

        self.monitor.start(&wallet.public_key);
        tracing::info!(
            business_id = business.id,
            public_key = %wallet.public_key,
            "Business registered"
        );

        let token = self.issue_token(business.id)?;
        Ok(Session {
            token,
            business,
            wallet,
        })
    }

    /// Unknown emails and wrong passwords fail the same way.
    pub async fn login(&self, email: &str, password: &str) -> PaymentResult<Session> {
        let email = email.trim().to_lowercase();
        let business = self
            .store
            .business_by_email(&email)
            .await?
            .ok_or_else(|| PaymentError::Unauthorized(INVALID_LOGIN.to_string()))?;

        let password = password.to_string();
        let hash = business.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| PaymentError::Internal(e.to_string()))?
            .unwrap_or(false);
        if !matches {
            return Err(PaymentError::Unauthorized(INVALID_LOGIN.to_string()));
        }

        let wallet = self
            .store
            .wallet_for_business(business.id)
            .await?
            .ok_or(PaymentError::WalletNotFound(business.id))?;

        let token = self.issue_token(business.id)?;
        Ok(Session {
            token,
            business,
            wallet,
        })
    }

    /// The business and its wallet with a balance freshly read from the ledger.
    pub async fn profile(&self, business_id: BusinessId) -> PaymentResult<Profile> {
        let business = self
            .store
            .business(business_id)
            .await?
            .ok_or_else(|| PaymentError::BusinessNotFound(business_id.to_string()))?;
        let mut wallet = self
            .store
            .wallet_for_business(business_id)
            .await?
            .ok_or(PaymentError::WalletNotFound(business_id))?;

        wallet.balance =
            refresh_wallet_balance(self.store.as_ref(), self.ledger.as_ref(), &wallet).await?;
        Ok(Profile { business, wallet })
    }

    /// Every business with its refreshed wallet and transaction count.
    pub async fn admin_overview(&self) -> PaymentResult<AdminOverview> {
        let businesses = self.store.list_businesses().await?;
        let summaries = try_join_all(businesses.into_iter().map(|business| self.summarize(business)))
            .await?;
        Ok(AdminOverview {
            businesses: summaries,
        })
    }

    pub async fn admin_transactions(&self) -> PaymentResult<Vec<Transaction>> {
        Ok(self.store.list_transactions().await?)
    }

    async fn summarize(&self, business: Business) -> PaymentResult<BusinessSummary> {
        let wallet = match self.store.wallet_for_business(business.id).await? {
            Some(mut wallet) => {
                wallet.balance =
                    refresh_wallet_balance(self.store.as_ref(), self.ledger.as_ref(), &wallet)
                        .await?;
                Some(wallet)
            }
            None => None,
        };
        let transaction_count = self
            .store
            .transactions_for_business(business.id)
            .await?
            .len();

        Ok(BusinessSummary {
            business,
            wallet,
            transaction_count,
        })
    }

    fn issue_token(&self, business_id: BusinessId) -> PaymentResult<String> {
        self.sessions
            .issue(business_id)
            .map_err(|e| PaymentError::Internal(e.to_string()))
    }
}
