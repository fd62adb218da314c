use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Amount, BusinessId, WalletId};

/// Custodial wallet owned by exactly one business.
///
/// `balance` mirrors the ledger and is only written from a fresh ledger
/// query. `monitor_cursor` is the paging token of the newest ledger payment
/// the monitor has already looked at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: WalletId,
    pub business_id: BusinessId,
    pub public_key: String,
    #[serde(skip_serializing)]
    pub encrypted_secret: String,
    pub balance: Amount,
    #[serde(skip_serializing)]
    pub monitor_cursor: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Wallet fields known before its owner row exists.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWallet {
    pub public_key: String,
    pub encrypted_secret: String,
    pub balance: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_never_serialized() {
        let wallet = Wallet {
            id: 1,
            business_id: 1,
            public_key: "GABC".to_string(),
            encrypted_secret: "sealed-bytes".to_string(),
            balance: Amount::ZERO,
            monitor_cursor: Some("42".to_string()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&wallet).unwrap();
        assert!(!json.contains("sealed-bytes"));
        assert!(!json.contains("encryptedSecret"));
        assert!(json.contains("\"publicKey\":\"GABC\""));
    }
}
