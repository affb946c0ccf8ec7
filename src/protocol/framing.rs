// src/protocol/framing.rs
//! Binary header framing for client-server communication.
//!
//! Requests carry a 23-byte header (16-byte UTF-8 client id, version,
//! operation code, payload length), responses a 7-byte header (version,
//! response code, payload length). All multi-byte integers are
//! little-endian. The framing layer reads and writes headers only; it
//! never interprets payload bytes.

use thiserror::Error;

use crate::config::constants::{CLIENT_ID_LEN, MAX_PAYLOAD_LEN, PROTOCOL_VERSION};

/// Size of an encoded request header on the wire.
pub const REQUEST_HEADER_LEN: usize = 23;

/// Size of an encoded response header on the wire.
pub const RESPONSE_HEADER_LEN: usize = 7;

/// Error type for header framing
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("Header too short: {0} bytes (expected {REQUEST_HEADER_LEN})")]
    Truncated(usize),

    #[error("Client id field is not valid UTF-8")]
    InvalidClientId,

    #[error("Declared payload length {0} exceeds the {MAX_PAYLOAD_LEN} byte limit")]
    PayloadTooLarge(u32),
}

/// Decoded request header.
///
/// The id field keeps the full 16 bytes as received, NUL padding included,
/// so a handler can echo it back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub client_id: String,
    pub version: u8,
    pub opcode: u16,
    pub payload_len: u32,
}

impl RequestHeader {
    /// Decode a request header from the first [`REQUEST_HEADER_LEN`] bytes
    /// of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, FramingError> {
        if buf.len() < REQUEST_HEADER_LEN {
            return Err(FramingError::Truncated(buf.len()));
        }

        let client_id = String::from_utf8(buf[..CLIENT_ID_LEN].to_vec())
            .map_err(|_| FramingError::InvalidClientId)?;
        let version = buf[16];
        let opcode = u16::from_le_bytes([buf[17], buf[18]]);
        let payload_len = u32::from_le_bytes([buf[19], buf[20], buf[21], buf[22]]);

        if payload_len as usize > MAX_PAYLOAD_LEN {
            return Err(FramingError::PayloadTooLarge(payload_len));
        }

        Ok(Self {
            client_id,
            version,
            opcode,
            payload_len,
        })
    }
}

/// Response header, encoded as version | code | payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub version: u8,
    pub code: u16,
    pub payload_len: u32,
}

impl ResponseHeader {
    /// Create a response header for the current protocol version.
    pub fn new(code: u16, payload_len: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            code,
            payload_len,
        }
    }

    /// Encode the header into its 7-byte wire form. Encoding cannot fail.
    pub fn encode(&self) -> [u8; RESPONSE_HEADER_LEN] {
        let mut buf = [0u8; RESPONSE_HEADER_LEN];
        buf[0] = self.version;
        buf[1..3].copy_from_slice(&self.code.to_le_bytes());
        buf[3..7].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }
}
