//! Minimal XDR encoding for a single native-asset payment transaction.
//!
//! Only the shapes needed to submit a payment are covered: an ed25519 source
//! account, time-bound preconditions, an optional text memo and one PAYMENT
//! operation, wrapped in a v1 transaction envelope.

use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const MEMO_TEXT_MAX_BYTES: usize = 28;

const KEY_TYPE_ED25519: i32 = 0;
const PRECOND_TIME: i32 = 1;
const MEMO_NONE: i32 = 0;
const MEMO_TEXT: i32 = 1;
const OPERATION_PAYMENT: i32 = 1;
const ASSET_TYPE_NATIVE: i32 = 0;
const ENVELOPE_TYPE_TX: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XdrError {
    #[error("memo exceeds {MEMO_TEXT_MAX_BYTES} bytes")]
    MemoTooLong,
    #[error("payment amount must be positive")]
    NonPositiveAmount,
}

#[derive(Default)]
struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    fn int(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn uint(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn hyper(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn uhyper(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.pad(bytes.len());
    }

    fn variable(&mut self, bytes: &[u8]) {
        self.uint(bytes.len() as u32);
        self.fixed(bytes);
    }

    fn pad(&mut self, len: usize) {
        let padding = (4 - len % 4) % 4;
        self.buf.extend(std::iter::repeat(0u8).take(padding));
    }

    fn muxed_account(&mut self, key: &[u8; 32]) {
        self.int(KEY_TYPE_ED25519);
        self.fixed(key);
    }
}

/// A payment of `amount_stroops` native units from `source` to `destination`.
#[derive(Debug, Clone)]
pub struct PaymentTransaction<'a> {
    pub source: [u8; 32],
    pub fee: u32,
    pub sequence: i64,
    pub max_time: u64,
    pub memo: Option<&'a str>,
    pub destination: [u8; 32],
    pub amount_stroops: i64,
}

/// A signed envelope ready for submission.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub xdr: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedEnvelope {
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl<'a> PaymentTransaction<'a> {
    pub fn to_xdr(&self) -> Result<Vec<u8>, XdrError> {
        if self.amount_stroops <= 0 {
            return Err(XdrError::NonPositiveAmount);
        }

        let mut w = XdrWriter::default();
        w.muxed_account(&self.source);
        w.uint(self.fee);
        w.hyper(self.sequence);

        w.int(PRECOND_TIME);
        w.uhyper(0);
        w.uhyper(self.max_time);

        match self.memo {
            Some(text) if text.len() > MEMO_TEXT_MAX_BYTES => return Err(XdrError::MemoTooLong),
            Some(text) => {
                w.int(MEMO_TEXT);
                w.variable(text.as_bytes());
            }
            None => w.int(MEMO_NONE),
        }

        w.uint(1);
        w.uint(0); // no per-operation source account
        w.int(OPERATION_PAYMENT);
        w.muxed_account(&self.destination);
        w.int(ASSET_TYPE_NATIVE);
        w.hyper(self.amount_stroops);

        w.int(0); // ext
        Ok(w.buf)
    }

    /// Hash the network signs: SHA-256 over network id, envelope type and body.
    pub fn hash(&self, network_passphrase: &str) -> Result<[u8; 32], XdrError> {
        let body = self.to_xdr()?;
        Ok(signature_base_hash(network_passphrase, &body))
    }

    pub fn sign(
        &self,
        key: &SigningKey,
        network_passphrase: &str,
    ) -> Result<SignedEnvelope, XdrError> {
        let body = self.to_xdr()?;
        let hash = signature_base_hash(network_passphrase, &body);
        let signature = key.sign(&hash);
        let public_key = key.verifying_key().to_bytes();

        let mut w = XdrWriter::default();
        w.int(ENVELOPE_TYPE_TX);
        w.buf.extend_from_slice(&body);
        w.uint(1);
        w.fixed(&public_key[28..]);
        w.variable(&signature.to_bytes());

        Ok(SignedEnvelope { xdr: w.buf, hash })
    }
}

fn signature_base_hash(network_passphrase: &str, body: &[u8]) -> [u8; 32] {
    let network_id = Sha256::digest(network_passphrase.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(network_id);
    hasher.update(ENVELOPE_TYPE_TX.to_be_bytes());
    hasher.update(body);
    hasher.finalize().into()
}
