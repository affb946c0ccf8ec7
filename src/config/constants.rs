// src/config/constants.rs
//! Application constants and fixed settings.
//!
//! This module contains fixed values that are part of the wire protocol or
//! the cryptographic contract with existing clients. The numeric operation
//! codes live in [`crate::protocol::types`]; everything here is a size or
//! version shared across modules.

/// Protocol version stamped into every response header.
pub const PROTOCOL_VERSION: u8 = 3;

/// Length of the client-id field in headers and payloads.
pub const CLIENT_ID_LEN: usize = 16;

/// Length of allocated identity and file record ids.
pub const RECORD_ID_LEN: usize = 16;

/// Fixed width of NUL-padded name fields (client names, file names).
pub const NAME_FIELD_LEN: usize = 255;

/// Upper bound on a declared request payload. Legitimate payloads are a
/// 255-byte name plus a base64 file body; anything near this limit is a
/// corrupt or hostile header.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024; // 16MB

/// Cryptographic constants
pub const TRANSFER_KEY_LEN: usize = 16; // AES-128
pub const CIPHER_BLOCK_LEN: usize = 16;
