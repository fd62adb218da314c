//! Background polling of the ledger for inbound payments.
//!
//! Each monitored wallet gets its own task. A tick takes the wallet lock,
//! reads the newest page of the wallet's payment feed and records every
//! unseen inbound native payment exactly once, keyed by ledger hash.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::NewTransaction;
use crate::ports::{InboundPayment, LedgerGateway, RepositoryError, Store};
use crate::services::balance::refresh_wallet_balance;
use crate::services::locks::KeyedLocks;
use crate::services::PaymentResult;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Result of a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub recorded: usize,
    pub already_known: usize,
    pub cursor: Option<String>,
}

#[derive(Clone)]
struct Poller {
    store: Arc<dyn Store>,
    ledger: Arc<dyn LedgerGateway>,
    wallet_locks: Arc<KeyedLocks<String>>,
    page_size: u32,
}

pub struct WalletMonitor {
    poller: Poller,
    interval: Duration,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl WalletMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<dyn LedgerGateway>,
        wallet_locks: Arc<KeyedLocks<String>>,
        interval: Duration,
        page_size: u32,
    ) -> Self {
        Self {
            poller: Poller {
                store,
                ledger,
                wallet_locks,
                page_size,
            },
            interval,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        match self.tasks.lock() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Starts polling `public_key`. Returns false if it is already monitored.
    pub fn start(&self, public_key: &str) -> bool {
        let mut tasks = self.tasks();
        if let Some(existing) = tasks.get(public_key) {
            if !existing.is_finished() {
                return false;
            }
        }

        let poller = self.poller.clone();
        let key = public_key.to_string();
        let period = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if let Err(e) = poller.poll_once(&key).await {
                    error!(public_key = %key, error = %e, "Wallet monitor tick failed");
                }
            }
        });

        tasks.insert(public_key.to_string(), handle);
        info!(public_key = %public_key, interval_secs = period.as_secs(), "Wallet monitor started");
        true
    }

    /// Stops polling `public_key`. Stopping an unmonitored key is a no-op.
    pub fn stop(&self, public_key: &str) -> bool {
        match self.tasks().remove(public_key) {
            Some(handle) => {
                handle.abort();
                info!(public_key = %public_key, "Wallet monitor stopped");
                true
            }
            None => false,
        }
    }

    /// Starts a task for every stored wallet.
    pub async fn start_all(&self) -> PaymentResult<usize> {
        let wallets = self.poller.store.list_wallets().await?;
        let started = wallets
            .iter()
            .filter(|wallet| self.start(&wallet.public_key))
            .count();
        info!(wallets = wallets.len(), started, "Wallet monitors resumed");
        Ok(started)
    }

    pub fn is_monitoring(&self, public_key: &str) -> bool {
        self.tasks()
            .get(public_key)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn monitored_count(&self) -> usize {
        self.tasks()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn shutdown(&self) {
        let mut tasks = self.tasks();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
        info!("All wallet monitors stopped");
    }

    /// Runs one tick for `public_key` immediately.
    pub async fn poll_once(&self, public_key: &str) -> PaymentResult<PollReport> {
        self.poller.poll_once(public_key).await
    }
}

impl Drop for WalletMonitor {
    fn drop(&mut self) {
        for (_, handle) in self.tasks().drain() {
            handle.abort();
        }
    }
}

impl Poller {
    async fn poll_once(&self, public_key: &str) -> PaymentResult<PollReport> {
        let _guard = self.wallet_locks.lock(&public_key.to_string()).await;

        let wallet = match self.store.wallet_by_public_key(public_key).await? {
            Some(wallet) => wallet,
            None => {
                warn!(public_key = %public_key, "Monitored wallet no longer exists");
                return Ok(PollReport::default());
            }
        };

        let page = self
            .ledger
            .recent_inbound_payments(public_key, self.page_size)
            .await?;

        let cursor = wallet.monitor_cursor.clone();
        let newest = page
            .iter()
            .filter_map(|payment| payment.paging_token.as_deref())
            .fold(cursor.clone(), |best, token| match best {
                Some(current) if !is_after(token, Some(&current)) => Some(current),
                _ => Some(token.to_string()),
            });

        let fresh: Vec<&InboundPayment> = page
            .iter()
            .rev()
            .filter(|payment| payment.destination == public_key && payment.is_native())
            .filter(|payment| match payment.paging_token.as_deref() {
                Some(token) => is_after(token, cursor.as_deref()),
                None => true,
            })
            .collect();

        let mut report = PollReport::default();
        for payment in fresh {
            if self
                .store
                .transaction_by_hash(&payment.tx_hash)
                .await?
                .is_some()
            {
                report.already_known += 1;
                continue;
            }

            let inserted = self
                .store
                .insert_transaction(NewTransaction::observed_receive(
                    wallet.business_id,
                    wallet.public_key.clone(),
                    payment.amount,
                    payment.memo.clone(),
                    payment.tx_hash.clone(),
                ))
                .await;

            match inserted {
                Ok(tx) => {
                    report.recorded += 1;
                    info!(
                        transaction_id = tx.id,
                        tx_hash = %payment.tx_hash,
                        public_key = %public_key,
                        amount = %payment.amount,
                        "Recorded inbound payment"
                    );
                }
                Err(RepositoryError::Conflict(_)) => report.already_known += 1,
                Err(e) => return Err(e.into()),
            }
        }

        if report.recorded > 0 {
            refresh_wallet_balance(self.store.as_ref(), self.ledger.as_ref(), &wallet).await?;
        }

        if let Some(token) = &newest {
            if cursor.as_deref() != Some(token.as_str()) {
                self.store.update_monitor_cursor(wallet.id, token).await?;
            }
        }
        report.cursor = newest;

        debug!(
            public_key = %public_key,
            recorded = report.recorded,
            already_known = report.already_known,
            "Wallet monitor tick finished"
        );
        Ok(report)
    }
}

/// Paging tokens are decimal operation ids; a missing or unreadable cursor
/// admits everything.
fn is_after(token: &str, cursor: Option<&str>) -> bool {
    let cursor = match cursor {
        Some(cursor) => cursor,
        None => return true,
    };
    match (token.parse::<u128>(), cursor.parse::<u128>()) {
        (Ok(token), Ok(cursor)) => token > cursor,
        _ => true,
    }
}
