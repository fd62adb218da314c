//! Transaction domain entity.
//! Framework-agnostic record of one settlement attempt or observed payment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Amount, BusinessId, TransactionId, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Only `pending` may move, and only to a terminal state.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(self, TransactionStatus::Pending) && next.is_terminal()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(UnknownVariant::new("transaction status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Send,
    Receive,
    Invoice,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Send => "send",
            TransactionKind::Receive => "receive",
            TransactionKind::Invoice => "invoice",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(TransactionKind::Send),
            "receive" => Ok(TransactionKind::Receive),
            "invoice" => Ok(TransactionKind::Invoice),
            other => Err(UnknownVariant::new("transaction type", other)),
        }
    }
}

/// Domain entity representing a stored transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub from_business_id: Option<BusinessId>,
    pub to_address: String,
    pub to_business_id: Option<BusinessId>,
    pub amount: Amount,
    pub memo: Option<String>,
    pub stellar_tx_hash: Option<String>,
    pub status: TransactionStatus,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether this row belongs in `business_id`'s history.
    ///
    /// Outgoing rows are listed for the sender and receive rows for the
    /// recipient, so an internal transfer shows up once on each side.
    pub fn is_visible_to(&self, business_id: BusinessId) -> bool {
        match self.kind {
            TransactionKind::Send | TransactionKind::Invoice => {
                self.from_business_id == Some(business_id)
            }
            TransactionKind::Receive => self.to_business_id == Some(business_id),
        }
    }
}

/// Insert payload for a transaction row; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub from_business_id: Option<BusinessId>,
    pub to_address: String,
    pub to_business_id: Option<BusinessId>,
    pub amount: Amount,
    pub memo: Option<String>,
    pub stellar_tx_hash: Option<String>,
    pub status: TransactionStatus,
    pub kind: TransactionKind,
}

impl NewTransaction {
    /// An outgoing row written before the ledger is contacted.
    pub fn pending(
        kind: TransactionKind,
        from_business_id: BusinessId,
        to_address: String,
        to_business_id: Option<BusinessId>,
        amount: Amount,
        memo: Option<String>,
    ) -> Self {
        Self {
            from_business_id: Some(from_business_id),
            to_address,
            to_business_id,
            amount,
            memo,
            stellar_tx_hash: None,
            status: TransactionStatus::Pending,
            kind,
        }
    }

    /// Receive-side copy of a completed internal transfer. The ledger hash
    /// stays on the originating row.
    pub fn mirrored_receive(origin: &Transaction, recipient: BusinessId) -> Self {
        Self {
            from_business_id: origin.from_business_id,
            to_address: origin.to_address.clone(),
            to_business_id: Some(recipient),
            amount: origin.amount,
            memo: origin.memo.clone(),
            stellar_tx_hash: None,
            status: TransactionStatus::Completed,
            kind: TransactionKind::Receive,
        }
    }

    /// An inbound payment discovered on the ledger by the wallet monitor.
    pub fn observed_receive(
        owner: BusinessId,
        public_key: String,
        amount: Amount,
        memo: Option<String>,
        tx_hash: String,
    ) -> Self {
        Self {
            from_business_id: Some(owner),
            to_address: public_key,
            to_business_id: Some(owner),
            amount,
            memo,
            stellar_tx_hash: Some(tx_hash),
            status: TransactionStatus::Completed,
            kind: TransactionKind::Receive,
        }
    }
}
