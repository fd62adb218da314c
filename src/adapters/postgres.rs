//! PostgreSQL implementation of the repository ports.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::str::FromStr;

use crate::domain::{
    Amount, Business, BusinessId, NewBusiness, NewPaymentRequest, NewTransaction, NewWallet,
    PaymentRequest, PaymentRequestId, PaymentRequestStatus, Transaction, TransactionId,
    TransactionStatus, Wallet, WalletId,
};
use crate::ports::{
    BusinessRepository, PaymentRequestRepository, RepositoryError, RepositoryResult,
    TransactionRepository, WalletRepository,
};

const TRANSACTION_COLUMNS: &str = "id, from_business_id, to_address, to_business_id, amount, \
     memo, stellar_tx_hash, status, type AS kind, created_at";
const WALLET_COLUMNS: &str =
    "id, business_id, public_key, encrypted_secret, balance, monitor_cursor, created_at";
const REQUEST_COLUMNS: &str =
    "id, from_business_id, to_business_id, amount, memo, status, transaction_id, created_at";

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}

fn from_decimal(value: &BigDecimal) -> RepositoryResult<Amount> {
    Amount::try_from(value)
        .map_err(|e| RepositoryError::Backend(format!("stored amount {}: {}", value, e)))
}

fn parse_column<T: FromStr>(value: &str) -> RepositoryResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| RepositoryError::Backend(e.to_string()))
}

/// Postgres-backed store for every entity.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BusinessRepository for PostgresStore {
    async fn create_business_with_wallet(
        &self,
        business: NewBusiness,
        wallet: NewWallet,
    ) -> RepositoryResult<(Business, Wallet)> {
        let mut tx = self.pool.begin().await?;

        let business = sqlx::query_as::<_, BusinessRow>(
            r#"
            INSERT INTO businesses (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(&business.name)
        .bind(&business.email)
        .bind(&business.password_hash)
        .fetch_one(&mut *tx)
        .await?
        .into_domain();

        let wallet = sqlx::query_as::<_, WalletRow>(&format!(
            "INSERT INTO wallets (business_id, public_key, encrypted_secret, balance) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            WALLET_COLUMNS
        ))
        .bind(business.id)
        .bind(&wallet.public_key)
        .bind(&wallet.encrypted_secret)
        .bind(wallet.balance.to_decimal())
        .fetch_one(&mut *tx)
        .await?
        .into_domain()?;

        tx.commit().await?;
        Ok((business, wallet))
    }

    async fn business(&self, id: BusinessId) -> RepositoryResult<Option<Business>> {
        let row = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, email, password_hash, created_at FROM businesses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(BusinessRow::into_domain))
    }

    async fn business_by_email(&self, email: &str) -> RepositoryResult<Option<Business>> {
        let row = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, email, password_hash, created_at FROM businesses WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(BusinessRow::into_domain))
    }

    async fn list_businesses(&self) -> RepositoryResult<Vec<Business>> {
        let rows = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, email, password_hash, created_at FROM businesses ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(BusinessRow::into_domain).collect())
    }
}

#[async_trait]
impl WalletRepository for PostgresStore {
    async fn wallet_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM wallets WHERE business_id = $1",
            WALLET_COLUMNS
        ))
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(WalletRow::into_domain).transpose()
    }

    async fn wallet_by_public_key(&self, public_key: &str) -> RepositoryResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM wallets WHERE public_key = $1",
            WALLET_COLUMNS
        ))
        .bind(public_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(WalletRow::into_domain).transpose()
    }

    async fn list_wallets(&self) -> RepositoryResult<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM wallets ORDER BY id",
            WALLET_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WalletRow::into_domain).collect()
    }

    async fn update_wallet_balance(&self, id: WalletId, balance: Amount) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE wallets SET balance = $2 WHERE id = $1")
            .bind(id)
            .bind(balance.to_decimal())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("wallet {}", id)));
        }
        Ok(())
    }

    async fn update_monitor_cursor(&self, id: WalletId, cursor: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE wallets SET monitor_cursor = $2 WHERE id = $1")
            .bind(id)
            .bind(cursor)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("wallet {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for PostgresStore {
    async fn insert_transaction(&self, tx: NewTransaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                from_business_id, to_address, to_business_id, amount,
                memo, stellar_tx_hash, status, type
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(tx.from_business_id)
        .bind(&tx.to_address)
        .bind(tx.to_business_id)
        .bind(tx.amount.to_decimal())
        .bind(&tx.memo)
        .bind(&tx.stellar_tx_hash)
        .bind(tx.status.as_str())
        .bind(tx.kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.into_domain()
    }

    async fn transaction(&self, id: TransactionId) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TransactionRow::into_domain).transpose()
    }

    async fn finish_transaction(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        stellar_tx_hash: Option<String>,
    ) -> RepositoryResult<Transaction> {
        if !TransactionStatus::Pending.can_transition_to(status) {
            return Err(RepositoryError::Conflict(format!(
                "transaction cannot move to {}",
                status
            )));
        }

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $2, stellar_tx_hash = COALESCE($3, stellar_tx_hash)
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(stellar_tx_hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_domain(),
            None => match self.transaction(id).await? {
                Some(existing) => Err(RepositoryError::Conflict(format!(
                    "transaction {} is already {}",
                    id, existing.status
                ))),
                None => Err(RepositoryError::NotFound(format!("transaction {}", id))),
            },
        }
    }

    async fn transaction_by_hash(&self, hash: &str) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE stellar_tx_hash = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TransactionRow::into_domain).transpose()
    }

    async fn transactions_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE (type IN ('send', 'invoice') AND from_business_id = $1)
               OR (type = 'receive' AND to_business_id = $1)
            ORDER BY created_at DESC, id DESC
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn list_transactions(&self) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions ORDER BY created_at DESC, id DESC",
            TRANSACTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

#[async_trait]
impl PaymentRequestRepository for PostgresStore {
    async fn insert_payment_request(
        &self,
        request: NewPaymentRequest,
    ) -> RepositoryResult<PaymentRequest> {
        let row = sqlx::query_as::<_, PaymentRequestRow>(&format!(
            "INSERT INTO payment_requests (from_business_id, to_business_id, amount, memo, status) \
             VALUES ($1, $2, $3, $4, 'pending') RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request.from_business_id)
        .bind(request.to_business_id)
        .bind(request.amount.to_decimal())
        .bind(&request.memo)
        .fetch_one(&self.pool)
        .await?;
        row.into_domain()
    }

    async fn payment_request(
        &self,
        id: PaymentRequestId,
    ) -> RepositoryResult<Option<PaymentRequest>> {
        let row = sqlx::query_as::<_, PaymentRequestRow>(&format!(
            "SELECT {} FROM payment_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PaymentRequestRow::into_domain).transpose()
    }

    async fn payment_requests_for_business(
        &self,
        business_id: BusinessId,
    ) -> RepositoryResult<Vec<PaymentRequest>> {
        let rows = sqlx::query_as::<_, PaymentRequestRow>(&format!(
            "SELECT {} FROM payment_requests \
             WHERE from_business_id = $1 OR to_business_id = $1 \
             ORDER BY created_at DESC, id DESC",
            REQUEST_COLUMNS
        ))
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PaymentRequestRow::into_domain).collect()
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
        let link = match status {
            PaymentRequestStatus::Paid => transaction_id,
            _ => None,
        };

        let row = sqlx::query_as::<_, PaymentRequestRow>(&format!(
            "UPDATE payment_requests SET status = $2, transaction_id = $3 \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_domain(),
            None => match self.payment_request(id).await? {
                Some(existing) => Err(RepositoryError::Conflict(format!(
                    "payment request {} is already {}",
                    id, existing.status
                ))),
                None => Err(RepositoryError::NotFound(format!("payment request {}", id))),
            },
        }
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct BusinessRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl BusinessRow {
    fn into_domain(self) -> Business {
        Business {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: i64,
    business_id: i64,
    public_key: String,
    encrypted_secret: String,
    balance: BigDecimal,
    monitor_cursor: Option<String>,
    created_at: DateTime<Utc>,
}

impl WalletRow {
    fn into_domain(self) -> RepositoryResult<Wallet> {
        Ok(Wallet {
            id: self.id,
            business_id: self.business_id,
            public_key: self.public_key,
            encrypted_secret: self.encrypted_secret,
            balance: from_decimal(&self.balance)?,
            monitor_cursor: self.monitor_cursor,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    from_business_id: Option<i64>,
    to_address: String,
    to_business_id: Option<i64>,
    amount: BigDecimal,
    memo: Option<String>,
    stellar_tx_hash: Option<String>,
    status: String,
    kind: String,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            from_business_id: self.from_business_id,
            to_address: self.to_address,
            to_business_id: self.to_business_id,
            amount: from_decimal(&self.amount)?,
            memo: self.memo,
            stellar_tx_hash: self.stellar_tx_hash,
            status: parse_column(&self.status)?,
            kind: parse_column(&self.kind)?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRequestRow {
    id: i64,
    from_business_id: i64,
    to_business_id: i64,
    amount: BigDecimal,
    memo: Option<String>,
    status: String,
    transaction_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl PaymentRequestRow {
    fn into_domain(self) -> RepositoryResult<PaymentRequest> {
        Ok(PaymentRequest {
            id: self.id,
            from_business_id: self.from_business_id,
            to_business_id: self.to_business_id,
            amount: from_decimal(&self.amount)?,
            memo: self.memo,
            status: parse_column(&self.status)?,
            transaction_id: self.transaction_id,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_survives_numeric_conversion() {
        let amount: Amount = "12.3400000".parse().unwrap();
        let decimal = amount.to_decimal();
        assert_eq!(from_decimal(&decimal).unwrap(), amount);
    }

    #[test]
    fn test_numeric_with_short_scale_is_padded() {
        let decimal = BigDecimal::from_str("5.5").unwrap();
        assert_eq!(from_decimal(&decimal).unwrap().to_string(), "5.5000000");
    }

    #[test]
    fn test_unknown_status_column_is_backend_error() {
        let result = parse_column::<TransactionStatus>("settled");
        assert!(matches!(result, Err(RepositoryError::Backend(_))));
    }
}
