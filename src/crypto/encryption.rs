// src/crypto/encryption.rs
//! Symmetric encryption for file-transfer payloads.
//!
//! Payloads are AES-128-CBC encrypted and travel base64-encoded. The IV is
//! all zeros: a known-weak construction (identical plaintext blocks yield
//! identical ciphertext blocks, and the ciphertext carries no integrity
//! protection) kept solely for wire compatibility with deployed clients.
//! PKCS#7 padding is validated explicitly so that corrupt ciphertext or a
//! wrong key surfaces as a padding error rather than garbage plaintext.

use aes::Aes128;
use cbc::cipher::{
    block_padding::{NoPadding, Pkcs7},
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use cbc::{Decryptor, Encryptor};
use thiserror::Error;

use crate::config::constants::{CIPHER_BLOCK_LEN, TRANSFER_KEY_LEN};

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;

/// Error type for encryption operations
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid padding: {0}")]
    InvalidPadding(String),
}

/// Decrypt a base64-encoded transfer payload with a base64-encoded key.
///
/// Returns the plaintext with the block padding stripped. The caller is
/// responsible for truncating to the declared content size; the trailing
/// bytes of the final block are padding artifacts, not content.
pub fn decrypt_transfer_payload(
    encoded_key: &str,
    ciphertext_b64: &str,
) -> Result<Vec<u8>, EncryptionError> {
    let key = decode_key(encoded_key)?;
    let ciphertext = base64::decode(ciphertext_b64)
        .map_err(|e| EncryptionError::InvalidFormat(format!("ciphertext is not valid base64: {}", e)))?;

    if ciphertext.is_empty() || ciphertext.len() % CIPHER_BLOCK_LEN != 0 {
        return Err(EncryptionError::InvalidFormat(format!(
            "ciphertext length {} is not a positive multiple of the {} byte block size",
            ciphertext.len(),
            CIPHER_BLOCK_LEN
        )));
    }

    let iv = [0u8; CIPHER_BLOCK_LEN];
    let decryptor = Aes128CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| EncryptionError::DecryptionFailed(format!("cipher setup failed: {}", e)))?;

    let mut buffer = ciphertext;
    let plaintext = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|e| EncryptionError::DecryptionFailed(format!("block decryption failed: {}", e)))?;

    let unpadded_len = validate_padding(plaintext)?;
    Ok(plaintext[..unpadded_len].to_vec())
}

/// Encrypt a plaintext into a base64-encoded transfer payload.
///
/// The inverse of [`decrypt_transfer_payload`], using the same zero-IV CBC
/// construction so the output is accepted by deployed clients.
pub fn encrypt_transfer_payload(
    encoded_key: &str,
    plaintext: &[u8],
) -> Result<String, EncryptionError> {
    let key = decode_key(encoded_key)?;

    let iv = [0u8; CIPHER_BLOCK_LEN];
    let encryptor = Aes128CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| EncryptionError::EncryptionFailed(format!("cipher setup failed: {}", e)))?;

    let mut buffer = vec![0u8; plaintext.len() + CIPHER_BLOCK_LEN]; // Allow space for padding
    let ciphertext = encryptor
        .encrypt_padded_b2b_mut::<Pkcs7>(plaintext, &mut buffer)
        .map_err(|e| EncryptionError::EncryptionFailed(format!("block encryption failed: {}", e)))?;

    Ok(base64::encode(ciphertext))
}

fn decode_key(encoded_key: &str) -> Result<Vec<u8>, EncryptionError> {
    let key = base64::decode(encoded_key)
        .map_err(|e| EncryptionError::InvalidFormat(format!("key is not valid base64: {}", e)))?;
    if key.len() != TRANSFER_KEY_LEN {
        return Err(EncryptionError::InvalidKeyLength(key.len()));
    }
    Ok(key)
}

/// Validate PKCS#7 padding and return the unpadded length.
///
/// The pad length must lie in [1, block size] and every pad byte must equal
/// the pad length; anything else means corrupt ciphertext or a wrong key.
fn validate_padding(buf: &[u8]) -> Result<usize, EncryptionError> {
    let pad = match buf.last() {
        Some(&b) => b as usize,
        None => return Err(EncryptionError::InvalidPadding("empty buffer".into())),
    };

    if pad == 0 || pad > CIPHER_BLOCK_LEN {
        return Err(EncryptionError::InvalidPadding(format!(
            "pad length {} outside [1, {}]",
            pad, CIPHER_BLOCK_LEN
        )));
    }

    let body_len = buf.len() - pad;
    if buf[body_len..].iter().any(|&b| b as usize != pad) {
        return Err(EncryptionError::InvalidPadding(
            "pad bytes do not all equal the pad length".into(),
        ));
    }

    Ok(body_len)
}
