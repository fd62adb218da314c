//! Account ids and secret seeds in Stellar "strkey" form, backed by the
//! `stellar-strkey` codec.

use stellar_strkey::ed25519::{PrivateKey, PublicKey};
use thiserror::Error;

pub const ENCODED_LEN: usize = 56;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrkeyError {
    #[error("strkey must be {ENCODED_LEN} characters")]
    Length,
    /// Bad alphabet, wrong version byte or checksum mismatch.
    #[error("strkey is not a valid key of the expected kind")]
    Invalid,
}

pub fn encode_account_id(public_key: &[u8; 32]) -> String {
    PublicKey(*public_key).to_string()
}

pub fn encode_secret_seed(seed: &[u8; 32]) -> String {
    PrivateKey(*seed).to_string()
}

pub fn decode_account_id(encoded: &str) -> Result<[u8; 32], StrkeyError> {
    check_length(encoded)?;
    PublicKey::from_string(encoded)
        .map(|key| key.0)
        .map_err(|_| StrkeyError::Invalid)
}

pub fn decode_secret_seed(encoded: &str) -> Result<[u8; 32], StrkeyError> {
    check_length(encoded)?;
    PrivateKey::from_string(encoded)
        .map(|key| key.0)
        .map_err(|_| StrkeyError::Invalid)
}

pub fn is_account_id(candidate: &str) -> bool {
    decode_account_id(candidate).is_ok()
}

fn check_length(encoded: &str) -> Result<(), StrkeyError> {
    if encoded.len() == ENCODED_LEN {
        Ok(())
    } else {
        Err(StrkeyError::Length)
    }
}
