// src/protocol/types.rs
//! Protocol message types for client-server communication.
//!
//! This module defines the operation codes and payload layouts used in the
//! transfer protocol. The numeric values are a compatibility contract with
//! deployed clients and must not change without versioning the protocol.

use thiserror::Error;

use crate::config::constants::{CLIENT_ID_LEN, NAME_FIELD_LEN};

/// Request operation codes
pub mod request_code {
    pub const REGISTER: u16 = 1025;
    pub const SHARE_KEY: u16 = 1026;
    pub const LOGIN: u16 = 1027;
    pub const SEND_FILE: u16 = 1028;
    pub const VALID_CRC: u16 = 1029;
    pub const INVALID_CRC: u16 = 1030;
    pub const LAST_INVALID_CRC: u16 = 1031;
}

/// Response codes
pub mod respond_code {
    pub const REGISTER_SUCCESS: u16 = 2100;
    pub const REGISTER_FAIL: u16 = 2101;
    pub const KEY_SHARE: u16 = 2102;
    pub const FILE_ACCEPTED: u16 = 2103;
    pub const MESSAGE_CONFIRMED: u16 = 2104;
    pub const LOGIN_CONFIRMED: u16 = 2105;
    pub const LOGIN_REJECTED: u16 = 2106;
}

/// Error type for payload handling
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Unsupported operation code: {0}")]
    UnknownOpcode(u16),

    #[error("Payload too short: {got} bytes (expected at least {expected})")]
    TooShort { got: usize, expected: usize },

    #[error("Text field is not valid UTF-8")]
    InvalidText,
}

/// Request operations, decoded from the header's opcode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Register,
    ShareKey,
    Login,
    SendFile,
    ValidCrc,
    InvalidCrc,
    LastInvalidCrc,
}

impl TryFrom<u16> for Opcode {
    type Error = PayloadError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            request_code::REGISTER => Ok(Opcode::Register),
            request_code::SHARE_KEY => Ok(Opcode::ShareKey),
            request_code::LOGIN => Ok(Opcode::Login),
            request_code::SEND_FILE => Ok(Opcode::SendFile),
            request_code::VALID_CRC => Ok(Opcode::ValidCrc),
            request_code::INVALID_CRC => Ok(Opcode::InvalidCrc),
            request_code::LAST_INVALID_CRC => Ok(Opcode::LastInvalidCrc),
            other => Err(PayloadError::UnknownOpcode(other)),
        }
    }
}

/// Read a NUL-padded UTF-8 text field, stripping the padding.
pub fn read_fixed_str(buf: &[u8]) -> Result<String, PayloadError> {
    let text = std::str::from_utf8(buf).map_err(|_| PayloadError::InvalidText)?;
    Ok(text.trim_end_matches('\0').to_string())
}

/// Write a text field NUL-padded to `len` bytes, truncating oversize input.
pub fn write_fixed_str(text: &str, len: usize) -> Vec<u8> {
    let mut field = vec![0u8; len];
    let bytes = text.as_bytes();
    let n = bytes.len().min(len);
    field[..n].copy_from_slice(&bytes[..n]);
    field
}

/// Parsed SHARE_KEY request payload: name[255] | public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySharePayload {
    pub name: String,
    pub public_key: String,
}

impl KeySharePayload {
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        if payload.len() < NAME_FIELD_LEN {
            return Err(PayloadError::TooShort {
                got: payload.len(),
                expected: NAME_FIELD_LEN,
            });
        }
        let name = read_fixed_str(&payload[..NAME_FIELD_LEN])?;
        let public_key = read_fixed_str(&payload[NAME_FIELD_LEN..])?;
        Ok(Self { name, public_key })
    }
}

/// Parsed SEND_FILE request payload:
/// declared size(4 LE) | file name[255] | base64 ciphertext (NUL-padded ASCII).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadPayload {
    pub declared_size: u32,
    pub file_name: String,
    pub ciphertext: String,
}

impl FileUploadPayload {
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        const FIXED_LEN: usize = 4 + NAME_FIELD_LEN;
        if payload.len() < FIXED_LEN {
            return Err(PayloadError::TooShort {
                got: payload.len(),
                expected: FIXED_LEN,
            });
        }
        let declared_size = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let file_name = read_fixed_str(&payload[4..FIXED_LEN])?;
        let ciphertext = read_fixed_str(&payload[FIXED_LEN..])?;
        Ok(Self {
            declared_size,
            file_name,
            ciphertext,
        })
    }
}

/// Build the FILE_ACCEPTED response payload:
/// client id[16] | declared size(4 LE) | file name[255] | checksum(4 BE).
///
/// The checksum is big-endian while every other integer in the protocol is
/// little-endian; existing clients depend on this.
pub fn build_file_accepted_payload(
    client_id: &str,
    declared_size: u32,
    file_name: &str,
    checksum: u32,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(CLIENT_ID_LEN + 4 + NAME_FIELD_LEN + 4);
    payload.extend_from_slice(&write_fixed_str(client_id, CLIENT_ID_LEN));
    payload.extend_from_slice(&declared_size.to_le_bytes());
    payload.extend_from_slice(&write_fixed_str(file_name, NAME_FIELD_LEN));
    payload.extend_from_slice(&checksum.to_be_bytes());
    payload
}
