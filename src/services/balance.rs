use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::{Amount, Wallet};
use crate::ports::{LedgerGateway, RepositoryError, RepositoryResult, Store};

/// Attempts made for a write that must land once the ledger has answered.
pub const RECORD_ATTEMPTS: u32 = 4;
const RECORD_BACKOFF: Duration = Duration::from_millis(25);

/// Re-reads the wallet's native balance from the ledger and caches it.
///
/// The stored balance is only ever a copy of a fresh ledger read.
pub async fn refresh_wallet_balance(
    store: &dyn Store,
    ledger: &dyn LedgerGateway,
    wallet: &Wallet,
) -> RepositoryResult<Amount> {
    let balance = ledger.native_balance(&wallet.public_key).await;
    store.update_wallet_balance(wallet.id, balance).await?;

    tracing::debug!(
        wallet_id = wallet.id,
        public_key = %wallet.public_key,
        balance = %balance,
        "Wallet balance refreshed"
    );
    Ok(balance)
}

/// Refresh after a settlement the ledger already accepted. A failed cache
/// write is logged; the fresh ledger reading is returned either way.
pub async fn refresh_after_settlement(
    store: &dyn Store,
    ledger: &dyn LedgerGateway,
    wallet: &Wallet,
) -> Amount {
    let balance = ledger.native_balance(&wallet.public_key).await;
    if let Err(e) = store.update_wallet_balance(wallet.id, balance).await {
        tracing::warn!(
            wallet_id = wallet.id,
            public_key = %wallet.public_key,
            error = %e,
            "Could not cache refreshed balance"
        );
    }
    balance
}

/// Runs a store write, retrying backend failures with exponential backoff.
/// Conflicts and missing rows are definitive and returned at once.
pub async fn persist_with_retry<T, F, Fut>(what: &str, mut write: F) -> RepositoryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RepositoryResult<T>>,
{
    let mut attempt = 0;
    loop {
        match write().await {
            Ok(value) => return Ok(value),
            Err(RepositoryError::Backend(e)) if attempt + 1 < RECORD_ATTEMPTS => {
                attempt += 1;
                let backoff = RECORD_BACKOFF * 2u32.pow(attempt);
                tracing::warn!(
                    "{} failed on attempt {}: {}. Retrying in {:?}",
                    what,
                    attempt,
                    e,
                    backoff
                );
                sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
