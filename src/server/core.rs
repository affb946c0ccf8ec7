// src/server/core.rs
//! Core server implementation for the vaultport file-transfer service.
//!
//! Owns the TCP accept loop and the per-connection request loop. Every
//! accepted connection gets a fresh [`Session`]; the loop reads a fixed
//! 23-byte header, then exactly the declared payload, dispatches, and
//! writes the reply. Business-rule failures travel inside well-formed
//! responses; framing, crypto, and state errors terminate the connection.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::settings::ServerConfig;
use crate::protocol::framing::{FramingError, RequestHeader, ResponseHeader, REQUEST_HEADER_LEN};
use crate::server::session::{Session, SessionError};
use crate::storage::{
    DiskSink, FileRegistry, FileSink, IdentityStore, MemoryFileRegistry, MemoryIdentityStore,
};

/// Error type for server operations
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// File-transfer server: configuration plus the shared collaborators every
/// session talks to.
pub struct TransferServer {
    config: ServerConfig,
    identities: Arc<dyn IdentityStore>,
    files: Arc<dyn FileRegistry>,
    sink: Arc<dyn FileSink>,
}

impl TransferServer {
    /// Create a server backed by the in-memory stores and the disk sink.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(MemoryFileRegistry::new()),
            Arc::new(DiskSink),
        )
    }

    /// Create a server with explicit collaborator implementations.
    pub fn with_collaborators(
        config: ServerConfig,
        identities: Arc<dyn IdentityStore>,
        files: Arc<dyn FileRegistry>,
        sink: Arc<dyn FileSink>,
    ) -> Self {
        Self {
            config,
            identities,
            files,
            sink,
        }
    }

    /// A fresh session bound to this server's collaborators.
    pub fn new_session(&self) -> Session {
        Session::new(
            self.identities.clone(),
            self.files.clone(),
            self.sink.clone(),
            self.config.storage_dir.clone(),
        )
    }

    /// Bind the listener and serve connections until the task is aborted.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        info!("Listening on {}", self.config.listen_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            debug!("Accepted connection from {}", addr);

            let session = self.new_session();
            tokio::spawn(async move {
                match handle_connection(stream, session).await {
                    Ok(()) => debug!("Connection from {} closed", addr),
                    Err(e) => warn!("Connection from {} terminated: {}", addr, e),
                }
            });
        }
    }
}

/// Serve one connection: read requests, dispatch, write replies.
///
/// Generic over the stream so tests can drive it through an in-memory
/// duplex pipe. Returns `Ok(())` on a clean close: either the client
/// hanging up between requests or a handler signalling completion.
pub async fn handle_connection<S>(mut stream: S, mut session: Session) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let mut header_buf = [0u8; REQUEST_HEADER_LEN];
        match stream.read_exact(&mut header_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("Client closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let header = RequestHeader::decode(&header_buf)?;
        let mut payload = vec![0u8; header.payload_len as usize];
        stream.read_exact(&mut payload).await?;

        let outcome = session.handle_request(&header, &payload)?;

        if let Some(reply) = outcome.reply {
            let response = ResponseHeader::new(reply.code, reply.payload.len() as u32);
            stream.write_all(&response.encode()).await?;
            if !reply.payload.is_empty() {
                stream.write_all(&reply.payload).await?;
            }
            stream.flush().await?;
        }

        if !outcome.keep_open {
            debug!("Session complete, closing connection");
            return Ok(());
        }
    }
}
