// src/server/session.rs
//! Per-connection session state machine.
//!
//! A [`Session`] holds everything one connection is allowed to mutate: the
//! client identity it is acting as, the file transfer in flight, and the
//! retry flag. Handlers are dispatched from the header's operation code
//! and answer with an [`Outcome`] telling the connection loop what to
//! write back and whether to keep reading.
//!
//! State progression: unregistered -> registered -> keyed ->
//! (awaiting transfer <-> verifying) -> closed. The retry flag is the only
//! recovery mechanism: it re-opens the transfer step alone, never the
//! registration or handshake.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::constants::CLIENT_ID_LEN;
use crate::crypto::encryption::{self, EncryptionError};
use crate::crypto::keys::{self, KeyError};
use crate::integrity;
use crate::protocol::framing::RequestHeader;
use crate::protocol::types::{
    self, respond_code, FileUploadPayload, KeySharePayload, Opcode, PayloadError,
};
use crate::storage::{
    generate_record_id, ClientIdentity, FileRecord, FileRegistry, FileSink, IdentityStore,
    StorageError,
};

/// Error type for request handling.
///
/// Everything here is fatal to the connection: business-rule failures
/// (duplicate registration, unknown login) are not errors but mapped
/// response codes, handled inside the handlers.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation:?} requires {requirement}")]
    InvalidState {
        operation: Opcode,
        requirement: &'static str,
    },
}

/// A reply to be framed and written back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub payload: Vec<u8>,
}

/// What a handler tells the connection loop to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Option<Reply>,
    pub keep_open: bool,
}

impl Outcome {
    fn reply(code: u16, payload: Vec<u8>) -> Self {
        Self {
            reply: Some(Reply { code, payload }),
            keep_open: true,
        }
    }

    fn closing(code: u16, payload: Vec<u8>) -> Self {
        Self {
            reply: Some(Reply { code, payload }),
            keep_open: false,
        }
    }

    fn silent() -> Self {
        Self {
            reply: None,
            keep_open: true,
        }
    }
}

/// Per-connection session state and request dispatcher.
pub struct Session {
    identities: Arc<dyn IdentityStore>,
    files: Arc<dyn FileRegistry>,
    sink: Arc<dyn FileSink>,
    storage_dir: PathBuf,

    identity: Option<ClientIdentity>,
    pending_file: Option<FileRecord>,
    retry: bool,
}

impl Session {
    /// Create a session for a freshly accepted connection.
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        files: Arc<dyn FileRegistry>,
        sink: Arc<dyn FileSink>,
        storage_dir: PathBuf,
    ) -> Self {
        Self {
            identities,
            files,
            sink,
            storage_dir,
            identity: None,
            pending_file: None,
            retry: false,
        }
    }

    /// The identity this session is acting as, if any.
    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    /// The file record awaiting checksum confirmation, if any.
    pub fn pending_file(&self) -> Option<&FileRecord> {
        self.pending_file.as_ref()
    }

    /// Whether the client reported a checksum mismatch and a retried
    /// transfer is expected.
    pub fn retry(&self) -> bool {
        self.retry
    }

    /// Dispatch a request to its handler by operation code.
    pub fn handle_request(
        &mut self,
        header: &RequestHeader,
        payload: &[u8],
    ) -> Result<Outcome, SessionError> {
        match Opcode::try_from(header.opcode)? {
            Opcode::Register => self.register(payload),
            Opcode::ShareKey => self.share_key(payload),
            Opcode::Login => self.login(header, payload),
            Opcode::SendFile => self.receive_file(payload),
            Opcode::ValidCrc => self.confirm_valid_crc(),
            Opcode::InvalidCrc => self.confirm_invalid_crc(),
            Opcode::LastInvalidCrc => Ok(self.confirm_last_invalid_crc()),
        }
    }

    /// Register a new client name.
    ///
    /// A name that is already taken refuses the request, but still
    /// synchronizes this session with the stored record first, so a client
    /// re-registering after a lost local state can proceed to transfer.
    fn register(&mut self, payload: &[u8]) -> Result<Outcome, SessionError> {
        let name = types::read_fixed_str(payload)?;

        if let Some(existing) = self.identities.get_by_name(&name)? {
            self.identity = Some(existing);
            info!(client = %name, "[REGISTER] refused, name already registered");
            return Ok(Outcome::reply(respond_code::REGISTER_FAIL, Vec::new()));
        }

        let identity = ClientIdentity::new(generate_record_id(), name);
        let reply_payload = identity.id.clone().into_bytes();
        self.identities.insert(identity.clone())?;

        info!(client = %identity.name, id = %identity.id, "[REGISTER] identity assigned");
        self.identity = Some(identity);
        Ok(Outcome::reply(respond_code::REGISTER_SUCCESS, reply_payload))
    }

    /// Accept the client's public key and answer with a wrapped transfer key.
    fn share_key(&mut self, payload: &[u8]) -> Result<Outcome, SessionError> {
        let request = KeySharePayload::parse(payload)?;

        let identity = self.identity.as_mut().ok_or(SessionError::InvalidState {
            operation: Opcode::ShareKey,
            requirement: "a registered identity",
        })?;

        identity.public_key = request.public_key;
        identity.transfer_key = keys::generate_transfer_key();
        self.identities.update(identity)?;

        let wrapped = keys::wrap_transfer_key(&identity.public_key, &identity.transfer_key)?;

        let mut reply_payload = identity.id.clone().into_bytes();
        reply_payload.extend_from_slice(&wrapped);

        info!(client = %identity.name, "[SHARE KEY] transfer key issued");
        Ok(Outcome::reply(respond_code::KEY_SHARE, reply_payload))
    }

    /// Log a returning client in, rotating its transfer key.
    ///
    /// An unknown name is rejected with the request's id field echoed back
    /// exactly as it arrived, NUL padding and all.
    fn login(&mut self, header: &RequestHeader, payload: &[u8]) -> Result<Outcome, SessionError> {
        let name = types::read_fixed_str(payload)?;

        let Some(mut identity) = self.identities.get_by_name(&name)? else {
            info!(client = %name, "[LOGIN] rejected, name not registered");
            return Ok(Outcome::reply(
                respond_code::LOGIN_REJECTED,
                header.client_id.clone().into_bytes(),
            ));
        };

        identity.transfer_key = keys::generate_transfer_key();
        self.identities.update(&identity)?;

        let wrapped = keys::wrap_transfer_key(&identity.public_key, &identity.transfer_key)?;

        let mut reply_payload = identity.id.clone().into_bytes();
        reply_payload.extend_from_slice(&wrapped);

        info!(client = %identity.name, "[LOGIN] confirmed, transfer key rotated");
        self.identity = Some(identity);
        Ok(Outcome::reply(respond_code::LOGIN_CONFIRMED, reply_payload))
    }

    /// Accept an encrypted file upload and answer with its checksum.
    fn receive_file(&mut self, payload: &[u8]) -> Result<Outcome, SessionError> {
        let request = FileUploadPayload::parse(payload)?;

        let identity = self.identity.as_ref().ok_or(SessionError::InvalidState {
            operation: Opcode::SendFile,
            requirement: "a registered identity",
        })?;
        if identity.transfer_key.is_empty() {
            return Err(SessionError::InvalidState {
                operation: Opcode::SendFile,
                requirement: "a shared transfer key",
            });
        }

        let plaintext =
            encryption::decrypt_transfer_payload(&identity.transfer_key, &request.ciphertext)?;

        // The checksum and the stored bytes cover exactly the declared
        // content size, not the decrypted buffer.
        let declared = request.declared_size as usize;
        let content = &plaintext[..declared.min(plaintext.len())];
        let crc = integrity::checksum(content);

        let path = self.storage_dir.join(&request.file_name);
        self.sink.write(&path, content)?;

        if self.retry {
            // A retried transfer reuses the pending record; only the name
            // is refreshed.
            if let Some(record) = self.pending_file.as_mut() {
                record.file_name = request.file_name.clone();
            }
        } else {
            let record = FileRecord {
                id: generate_record_id(),
                file_name: request.file_name.clone(),
                storage_path: self.storage_dir.clone(),
                verified: false,
            };
            self.files.insert(record.clone())?;
            self.pending_file = Some(record);
        }

        info!(
            client = %identity.name,
            file = %request.file_name,
            size = request.declared_size,
            "[RECEIVE FILE] stored, checksum returned"
        );

        let reply_payload = types::build_file_accepted_payload(
            &identity.id,
            request.declared_size,
            &request.file_name,
            crc,
        );
        Ok(Outcome::reply(respond_code::FILE_ACCEPTED, reply_payload))
    }

    /// The client confirmed the checksum matched: mark the transfer
    /// verified and end the session.
    fn confirm_valid_crc(&mut self) -> Result<Outcome, SessionError> {
        let identity = self.identity.as_ref().ok_or(SessionError::InvalidState {
            operation: Opcode::ValidCrc,
            requirement: "a registered identity",
        })?;
        let record = self.pending_file.as_mut().ok_or(SessionError::InvalidState {
            operation: Opcode::ValidCrc,
            requirement: "a pending file transfer",
        })?;

        record.verified = true;
        self.files.update(record)?;
        self.retry = false;

        info!(client = %identity.name, file = %record.file_name, "[CONFIRM CRC] transfer verified");
        Ok(Outcome::closing(
            respond_code::MESSAGE_CONFIRMED,
            types::write_fixed_str(&identity.id, CLIENT_ID_LEN),
        ))
    }

    /// The client reported a checksum mismatch: arm the retry flag and
    /// wait for the transfer to be resent. No reply goes out.
    fn confirm_invalid_crc(&mut self) -> Result<Outcome, SessionError> {
        if self.pending_file.is_none() {
            return Err(SessionError::InvalidState {
                operation: Opcode::InvalidCrc,
                requirement: "a pending file transfer",
            });
        }

        self.retry = true;
        warn!("[CONFIRM CRC] checksum mismatch reported, awaiting resend");
        Ok(Outcome::silent())
    }

    /// The client gave up after its final checksum mismatch: acknowledge
    /// and end the session without verifying the transfer.
    fn confirm_last_invalid_crc(&mut self) -> Outcome {
        self.retry = false;
        warn!("[CONFIRM CRC] retries exhausted, abandoning transfer");
        Outcome::closing(respond_code::MESSAGE_CONFIRMED, Vec::new())
    }
}
