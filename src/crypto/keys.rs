// src/crypto/keys.rs
//! Transfer-key generation and asymmetric key wrapping.
//!
//! Each client session gets a fresh AES transfer key, generated here and
//! handed back wrapped under the client's RSA public key so only the
//! private-key holder can recover it. Keys are base64-encoded strings
//! everywhere outside the cipher itself, matching how they are stored and
//! how they travel on the wire.

use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use thiserror::Error;

use crate::config::constants::TRANSFER_KEY_LEN;

/// Error type for key-related operations
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key format error: {0}")]
    Format(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

/// Generate a fresh random transfer key, base64-encoded for storage and
/// transit.
pub fn generate_transfer_key() -> String {
    let mut key = [0u8; TRANSFER_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    base64::encode(key)
}

/// Wrap an encoded transfer key with a client's RSA public key.
///
/// The public key arrives as base64-encoded SPKI DER; an unparseable key is
/// a [`KeyError::Format`]. The wrapped key is returned as the base64 ASCII
/// bytes that go on the wire.
pub fn wrap_transfer_key(public_key_b64: &str, encoded_key: &str) -> Result<Vec<u8>, KeyError> {
    let der = base64::decode(public_key_b64)
        .map_err(|e| KeyError::Format(format!("public key is not valid base64: {}", e)))?;

    let public_key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| KeyError::Format(format!("unparseable public key: {}", e)))?;

    let wrapped = public_key
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, encoded_key.as_bytes())
        .map_err(|e| KeyError::Crypto(format!("RSA encryption failed: {}", e)))?;

    Ok(base64::encode(wrapped).into_bytes())
}
