use std::sync::Arc;

use crate::domain::{
    Amount, BusinessId, NewTransaction, Transaction, TransactionKind, TransactionStatus, Wallet,
};
use crate::ports::{LedgerError, LedgerGateway, Store};
use crate::secrets::SecretBox;
use crate::services::balance::{persist_with_retry, refresh_after_settlement};
use crate::services::locks::KeyedLocks;
use crate::services::{PaymentError, PaymentResult};

/// One outgoing payment, resolved and ready to hit the ledger.
#[derive(Debug, Clone)]
pub struct TransferOrder {
    pub kind: TransactionKind,
    pub sender_business_id: BusinessId,
    pub sender: Wallet,
    pub destination: String,
    /// Set when the destination is a wallet this system manages.
    pub recipient: Option<Wallet>,
    pub amount: Amount,
    pub memo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub transaction: Transaction,
    pub mirrored: Option<Transaction>,
    pub sender_balance: Amount,
}

/// Drives outgoing payments through pending -> completed | failed.
pub struct TransferEngine {
    store: Arc<dyn Store>,
    ledger: Arc<dyn LedgerGateway>,
    vault: Arc<SecretBox>,
    wallet_locks: Arc<KeyedLocks<String>>,
}

impl TransferEngine {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<dyn LedgerGateway>,
        vault: Arc<SecretBox>,
        wallet_locks: Arc<KeyedLocks<String>>,
    ) -> Self {
        Self {
            store,
            ledger,
            vault,
            wallet_locks,
        }
    }

    /// Sends `amount` from the business's wallet to `destination`.
    pub async fn initiate_send(
        &self,
        from_business_id: BusinessId,
        destination: &str,
        amount: Amount,
        memo: Option<String>,
    ) -> PaymentResult<SettlementOutcome> {
        let sender = self
            .store
            .wallet_for_business(from_business_id)
            .await?
            .ok_or(PaymentError::WalletNotFound(from_business_id))?;

        if sender.public_key == destination {
            return Err(PaymentError::Validation(
                "cannot send to your own wallet".to_string(),
            ));
        }
        if !self.ledger.is_valid_address(destination).await {
            return Err(PaymentError::InvalidAddress(destination.to_string()));
        }

        let recipient = self.store.wallet_by_public_key(destination).await?;

        self.settle(TransferOrder {
            kind: TransactionKind::Send,
            sender_business_id: from_business_id,
            sender,
            destination: destination.to_string(),
            recipient,
            amount,
            memo,
        })
        .await
    }

    /// Records and submits one payment. The sender's and the recipient's
    /// wallet locks are held for the whole call.
    ///
    /// Once the ledger accepts the payment this always returns the outcome;
    /// a record that cannot be completed is logged with its hash instead.
    pub async fn settle(&self, order: TransferOrder) -> PaymentResult<SettlementOutcome> {
        let mut keys = vec![order.sender.public_key.clone()];
        if let Some(recipient) = &order.recipient {
            keys.push(recipient.public_key.clone());
        }
        let _guards = self.wallet_locks.lock_all(&keys).await;

        let pending = self
            .store
            .insert_transaction(NewTransaction::pending(
                order.kind,
                order.sender_business_id,
                order.destination.clone(),
                order.recipient.as_ref().map(|wallet| wallet.business_id),
                order.amount,
                order.memo.clone(),
            ))
            .await?;

        tracing::info!(
            transaction_id = pending.id,
            kind = %order.kind,
            from = %order.sender.public_key,
            to = %order.destination,
            amount = %order.amount,
            internal = order.recipient.is_some(),
            "Submitting payment"
        );

        let submitted = match self.vault.open(&order.sender.encrypted_secret) {
            Ok(secret) => {
                self.ledger
                    .submit_payment(
                        &secret,
                        &order.destination,
                        order.amount,
                        order.memo.as_deref(),
                    )
                    .await
            }
            Err(e) => Err(LedgerError::Credential(e.to_string())),
        };

        let hash = match submitted {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!(
                    transaction_id = pending.id,
                    error = %e,
                    "Payment failed"
                );
                persist_with_retry("Marking payment failed", || {
                    self.store
                        .finish_transaction(pending.id, TransactionStatus::Failed, None)
                })
                .await?;
                return Err(PaymentError::Settlement(e));
            }
        };

        // From here on the ledger has moved the funds. Local bookkeeping
        // failures are logged and never turned into an error for the caller.
        let completed = persist_with_retry("Completing payment record", || {
            self.store.finish_transaction(
                pending.id,
                TransactionStatus::Completed,
                Some(hash.clone()),
            )
        })
        .await;
        let transaction = match completed {
            Ok(transaction) => transaction,
            Err(e) => {
                tracing::error!(
                    transaction_id = pending.id,
                    tx_hash = %hash,
                    error = %e,
                    "Payment went through but its record is still pending; reconcile by hash"
                );
                Transaction {
                    status: TransactionStatus::Completed,
                    stellar_tx_hash: Some(hash),
                    ..pending
                }
            }
        };

        let sender_balance =
            refresh_after_settlement(self.store.as_ref(), self.ledger.as_ref(), &order.sender)
                .await;

        let mirrored = match &order.recipient {
            Some(recipient) => {
                let mirrored = match self
                    .store
                    .insert_transaction(NewTransaction::mirrored_receive(
                        &transaction,
                        recipient.business_id,
                    ))
                    .await
                {
                    Ok(mirrored) => Some(mirrored),
                    Err(e) => {
                        tracing::error!(
                            transaction_id = transaction.id,
                            recipient = recipient.business_id,
                            error = %e,
                            "Could not record the receive side of an internal payment"
                        );
                        None
                    }
                };
                refresh_after_settlement(self.store.as_ref(), self.ledger.as_ref(), recipient)
                    .await;
                mirrored
            }
            None => None,
        };

        tracing::info!(
            transaction_id = transaction.id,
            tx_hash = transaction.stellar_tx_hash.as_deref().unwrap_or_default(),
            "Payment completed"
        );

        Ok(SettlementOutcome {
            transaction,
            mirrored,
            sender_balance,
        })
    }
}
