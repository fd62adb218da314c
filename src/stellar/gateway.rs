use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::SigningKey;
use rand::RngCore;

use crate::domain::Amount;
use crate::ports::{FundedAccount, InboundPayment, LedgerError, LedgerGateway};
use crate::secrets::SigningSecret;
use crate::stellar::client::{HorizonClient, HorizonError, PaymentRecord};
use crate::stellar::strkey;
use crate::stellar::xdr::{PaymentTransaction, XdrError};

pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const BASE_FEE: u32 = 100;
pub const TX_TIMEOUT_SECS: i64 = 180;

/// Ledger gateway backed by a Horizon server and a friendbot faucet.
#[derive(Clone)]
pub struct HorizonGateway {
    client: HorizonClient,
    friendbot_url: String,
    network_passphrase: String,
}

impl HorizonGateway {
    pub fn new(client: HorizonClient, friendbot_url: String, network_passphrase: String) -> Self {
        Self {
            client,
            friendbot_url,
            network_passphrase,
        }
    }

    pub fn client(&self) -> &HorizonClient {
        &self.client
    }

    async fn next_sequence(&self, account_id: &str) -> Result<i64, LedgerError> {
        let account = self
            .client
            .get_account(account_id)
            .await
            .map_err(ledger_error)?;
        let current: i64 = account.sequence.parse().map_err(|_| {
            LedgerError::InvalidResponse(format!("bad sequence number {}", account.sequence))
        })?;
        current
            .checked_add(1)
            .ok_or_else(|| LedgerError::InvalidResponse("sequence overflow".to_string()))
    }
}

fn ledger_error(err: HorizonError) -> LedgerError {
    match err {
        HorizonError::RequestError(e) => LedgerError::Unavailable(e.to_string()),
        HorizonError::CircuitBreakerOpen(msg) => LedgerError::Unavailable(msg),
        HorizonError::AccountNotFound(id) => {
            LedgerError::Rejected(format!("account {} does not exist", id))
        }
        HorizonError::InvalidResponse(msg) => LedgerError::InvalidResponse(msg),
        HorizonError::TransactionRejected(detail) => LedgerError::Rejected(detail),
        HorizonError::FundingRefused(id) => LedgerError::Funding(id),
    }
}

fn xdr_error(err: XdrError) -> LedgerError {
    LedgerError::Rejected(err.to_string())
}

fn inbound_payment(record: PaymentRecord) -> Option<InboundPayment> {
    if record.kind != "payment" {
        return None;
    }
    let destination = record.to?;
    let amount = match record.amount.as_deref().map(str::parse::<Amount>) {
        Some(Ok(amount)) => amount,
        _ => {
            tracing::warn!(
                tx_hash = %record.transaction_hash,
                "Skipping payment record with unreadable amount"
            );
            return None;
        }
    };

    Some(InboundPayment {
        tx_hash: record.transaction_hash,
        amount,
        destination,
        asset_type: record.asset_type.unwrap_or_default(),
        memo: record
            .transaction
            .filter(|tx| tx.memo_type.as_deref() == Some("text"))
            .and_then(|tx| tx.memo)
            .filter(|memo| !memo.is_empty()),
        paging_token: Some(record.paging_token),
    })
}

#[async_trait]
impl LedgerGateway for HorizonGateway {
    async fn create_funded_account(&self) -> Result<FundedAccount, LedgerError> {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let key = SigningKey::from_bytes(&seed);

        let public_key = strkey::encode_account_id(&key.verifying_key().to_bytes());
        let secret = SigningSecret::new(strkey::encode_secret_seed(&seed));

        self.client
            .fund_with_friendbot(&self.friendbot_url, &public_key)
            .await
            .map_err(|e| LedgerError::Funding(e.to_string()))?;

        tracing::info!(public_key = %public_key, "Created and funded ledger account");
        Ok(FundedAccount { public_key, secret })
    }

    async fn native_balance(&self, public_key: &str) -> Amount {
        let account = match self.client.get_account(public_key).await {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(public_key = %public_key, error = %e, "Balance query failed, reading as zero");
                return Amount::ZERO;
            }
        };

        match account.native_balance().map(str::parse::<Amount>) {
            Some(Ok(balance)) => balance,
            Some(Err(e)) => {
                tracing::warn!(public_key = %public_key, error = %e, "Unparseable native balance");
                Amount::ZERO
            }
            None => Amount::ZERO,
        }
    }

    async fn submit_payment(
        &self,
        signer: &SigningSecret,
        destination: &str,
        amount: Amount,
        memo: Option<&str>,
    ) -> Result<String, LedgerError> {
        let seed = strkey::decode_secret_seed(signer.expose())
            .map_err(|e| LedgerError::Credential(e.to_string()))?;
        let key = SigningKey::from_bytes(&seed);
        let source = key.verifying_key().to_bytes();
        let destination_key = strkey::decode_account_id(destination)
            .map_err(|e| LedgerError::Rejected(format!("destination: {}", e)))?;

        let source_id = strkey::encode_account_id(&source);
        let sequence = self.next_sequence(&source_id).await?;
        let max_time = (chrono::Utc::now().timestamp() + TX_TIMEOUT_SECS) as u64;

        let tx = PaymentTransaction {
            source,
            fee: BASE_FEE,
            sequence,
            max_time,
            memo,
            destination: destination_key,
            amount_stroops: amount.stroops(),
        };
        let envelope = tx.sign(&key, &self.network_passphrase).map_err(xdr_error)?;

        let response = self
            .client
            .submit_transaction(&STANDARD.encode(&envelope.xdr))
            .await
            .map_err(ledger_error)?;

        tracing::info!(
            tx_hash = %response.hash,
            source = %source_id,
            destination = %destination,
            amount = %amount,
            "Payment accepted by the network"
        );
        Ok(response.hash)
    }

    async fn is_valid_address(&self, candidate: &str) -> bool {
        if !strkey::is_account_id(candidate) {
            return false;
        }
        match self.client.get_account(candidate).await {
            Ok(_) => true,
            Err(HorizonError::AccountNotFound(_)) => false,
            Err(e) => {
                tracing::warn!(address = %candidate, error = %e, "Address lookup failed");
                false
            }
        }
    }

    async fn recent_inbound_payments(
        &self,
        public_key: &str,
        limit: u32,
    ) -> Result<Vec<InboundPayment>, LedgerError> {
        let records = self
            .client
            .account_payments(public_key, limit)
            .await
            .map_err(ledger_error)?;
        Ok(records.into_iter().filter_map(inbound_payment).collect())
    }
}
