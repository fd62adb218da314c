//! Custodial signing secrets.
//!
//! Wallet secrets are sealed with AES-256-GCM before they reach the store and
//! opened only for the duration of a single settlement.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("sealed secret is not valid base64")]
    Encoding,
    #[error("sealed secret is truncated")]
    Truncated,
    #[error("secret could not be encrypted")]
    Seal,
    #[error("secret could not be decrypted")]
    Open,
}

/// A ledger signing credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Seals and opens wallet secrets with a key derived from configuration.
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl SecretBox {
    /// Derives the 256-bit key as SHA-256 of the configured passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let key = Sha256::digest(passphrase.as_bytes());
        let cipher = Aes256Gcm::new(&key);
        Self { cipher }
    }

    /// Returns base64(nonce || ciphertext).
    pub fn seal(&self, secret: &SigningSecret) -> Result<String, SecretError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, secret.expose().as_bytes())
            .map_err(|_| SecretError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn open(&self, sealed: &str) -> Result<SigningSecret, SecretError> {
        let bytes = STANDARD.decode(sealed).map_err(|_| SecretError::Encoding)?;
        if bytes.len() <= NONCE_LEN {
            return Err(SecretError::Truncated);
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SecretError::Open)?;

        String::from_utf8(plaintext)
            .map(SigningSecret)
            .map_err(|_| SecretError::Open)
    }
}
