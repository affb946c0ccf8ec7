//! End-to-end protocol tests.
//!
//! These drive [`handle_connection`] over an in-memory duplex stream with a
//! scripted client, asserting the exact bytes a real client would see.

use std::sync::Arc;

use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use vaultport::crypto::encryption::encrypt_transfer_payload;
use vaultport::integrity;
use vaultport::protocol::types::{request_code, respond_code, write_fixed_str};
use vaultport::server::{handle_connection, ServerError, Session};
use vaultport::storage::{
    DiskSink, IdentityStore, MemoryFileRegistry, MemoryIdentityStore,
};

const CLIENT_VERSION: u8 = 3;
const NAME_FIELD_LEN: usize = 255;

struct Fixture {
    identities: Arc<MemoryIdentityStore>,
    files: Arc<MemoryFileRegistry>,
    storage_dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            identities: Arc::new(MemoryIdentityStore::new()),
            files: Arc::new(MemoryFileRegistry::new()),
            storage_dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Spawn a connection handler, returning the client end of the pipe.
    fn connect(&self) -> (DuplexStream, JoinHandle<Result<(), ServerError>>) {
        let session = Session::new(
            self.identities.clone(),
            self.files.clone(),
            Arc::new(DiskSink),
            self.storage_dir.path().to_path_buf(),
        );
        let (client, server) = tokio::io::duplex(64 * 1024);
        let handle = tokio::spawn(handle_connection(server, session));
        (client, handle)
    }
}

struct Client {
    stream: DuplexStream,
    id: [u8; 16],
}

impl Client {
    fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            id: [0u8; 16],
        }
    }

    async fn send_request(&mut self, opcode: u16, payload: &[u8]) {
        let mut buf = Vec::with_capacity(23 + payload.len());
        buf.extend_from_slice(&self.id);
        buf.push(CLIENT_VERSION);
        buf.extend_from_slice(&opcode.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
        self.stream.write_all(&buf).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Read a response header and payload, asserting the header layout.
    async fn read_response(&mut self) -> (u16, Vec<u8>) {
        let mut header = [0u8; 7];
        self.stream.read_exact(&mut header).await.unwrap();

        assert_eq!(header[0], 3, "response carries the protocol version");
        let code = u16::from_le_bytes([header[1], header[2]]);
        let payload_len = u32::from_le_bytes([header[3], header[4], header[5], header[6]]);

        let mut payload = vec![0u8; payload_len as usize];
        self.stream.read_exact(&mut payload).await.unwrap();
        (code, payload)
    }

    async fn register(&mut self, name: &str) -> (u16, Vec<u8>) {
        self.send_request(request_code::REGISTER, &write_fixed_str(name, NAME_FIELD_LEN))
            .await;
        let (code, payload) = self.read_response().await;
        if code == respond_code::REGISTER_SUCCESS {
            self.id.copy_from_slice(&payload[..16]);
        }
        (code, payload)
    }

    /// Share a public key and return the recovered plaintext transfer key.
    async fn share_key(&mut self, name: &str, private_key: &RsaPrivateKey) -> String {
        let public_b64 = base64::encode(
            private_key
                .to_public_key()
                .to_public_key_der()
                .unwrap()
                .as_bytes(),
        );
        let mut payload = write_fixed_str(name, NAME_FIELD_LEN);
        payload.extend_from_slice(public_b64.as_bytes());
        self.send_request(request_code::SHARE_KEY, &payload).await;

        let (code, payload) = self.read_response().await;
        assert_eq!(code, respond_code::KEY_SHARE);
        assert_eq!(&payload[..16], &self.id);

        let wrapped = base64::decode(&payload[16..]).unwrap();
        String::from_utf8(private_key.decrypt(Pkcs1v15Encrypt, &wrapped).unwrap()).unwrap()
    }

    async fn send_file(&mut self, transfer_key: &str, name: &str, content: &[u8]) -> (u16, Vec<u8>) {
        let ciphertext = encrypt_transfer_payload(transfer_key, content).unwrap();
        let mut payload = (content.len() as u32).to_le_bytes().to_vec();
        payload.extend_from_slice(&write_fixed_str(name, NAME_FIELD_LEN));
        payload.extend_from_slice(ciphertext.as_bytes());
        self.send_request(request_code::SEND_FILE, &payload).await;
        self.read_response().await
    }
}

fn test_keypair() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap()
}

#[tokio::test]
async fn full_transfer_scenario() {
    let fixture = Fixture::new();
    let (stream, handle) = fixture.connect();
    let mut client = Client::new(stream);
    let private_key = test_keypair();

    // Register a fresh name.
    let (code, payload) = client.register("alice").await;
    assert_eq!(code, respond_code::REGISTER_SUCCESS);
    assert_eq!(payload.len(), 16);
    assert!(payload.iter().all(|b| b.is_ascii_alphanumeric()));

    // Handshake: the wrapped key decrypts to the key the server stored.
    let transfer_key = client.share_key("alice", &private_key).await;
    let stored = fixture.identities.get_by_name("alice").unwrap().unwrap();
    assert_eq!(stored.transfer_key, transfer_key);

    // Upload "hello" and check the FILE_ACCEPTED payload byte for byte.
    let (code, payload) = client.send_file(&transfer_key, "a.txt", b"hello").await;
    assert_eq!(code, respond_code::FILE_ACCEPTED);
    assert_eq!(payload.len(), 16 + 4 + 255 + 4);
    assert_eq!(&payload[..16], &client.id);
    assert_eq!(u32::from_le_bytes(payload[16..20].try_into().unwrap()), 5);
    assert_eq!(&payload[20..25], b"a.txt");
    assert!(payload[25..275].iter().all(|&b| b == 0));
    // Checksum tail is big-endian, unlike the rest of the protocol.
    assert_eq!(&payload[275..], &integrity::checksum(b"hello").to_be_bytes());

    let written = std::fs::read(fixture.storage_dir.path().join("a.txt")).unwrap();
    assert_eq!(written, b"hello");

    // Confirm the checksum: MESSAGE_CONFIRMED with the client id, then the
    // server closes the connection.
    client.send_request(request_code::VALID_CRC, &[]).await;
    let (code, payload) = client.read_response().await;
    assert_eq!(code, respond_code::MESSAGE_CONFIRMED);
    assert_eq!(&payload[..16], &client.id);

    assert!(matches!(handle.await.unwrap(), Ok(())));
    assert_eq!(fixture.files.len(), 1);
}

#[tokio::test]
async fn checksum_retry_reuses_record() {
    let fixture = Fixture::new();
    let (stream, handle) = fixture.connect();
    let mut client = Client::new(stream);
    let private_key = test_keypair();

    client.register("bob").await;
    let transfer_key = client.share_key("bob", &private_key).await;

    let (code, _) = client.send_file(&transfer_key, "b.txt", b"payload").await;
    assert_eq!(code, respond_code::FILE_ACCEPTED);
    assert_eq!(fixture.files.len(), 1);

    // Report a mismatch: no response, the connection stays open.
    client.send_request(request_code::INVALID_CRC, &[]).await;

    // Resend: still exactly one record.
    let (code, _) = client.send_file(&transfer_key, "b.txt", b"payload").await;
    assert_eq!(code, respond_code::FILE_ACCEPTED);
    assert_eq!(fixture.files.len(), 1);

    client.send_request(request_code::VALID_CRC, &[]).await;
    let (code, _) = client.read_response().await;
    assert_eq!(code, respond_code::MESSAGE_CONFIRMED);

    assert!(matches!(handle.await.unwrap(), Ok(())));
}

#[tokio::test]
async fn abandoned_transfer_confirms_without_payload() {
    let fixture = Fixture::new();
    let (stream, handle) = fixture.connect();
    let mut client = Client::new(stream);
    let private_key = test_keypair();

    client.register("carol").await;
    let transfer_key = client.share_key("carol", &private_key).await;
    client.send_file(&transfer_key, "c.txt", b"data").await;

    client.send_request(request_code::INVALID_CRC, &[]).await;
    client.send_request(request_code::LAST_INVALID_CRC, &[]).await;

    let (code, payload) = client.read_response().await;
    assert_eq!(code, respond_code::MESSAGE_CONFIRMED);
    assert!(payload.is_empty());

    assert!(matches!(handle.await.unwrap(), Ok(())));
}

#[tokio::test]
async fn login_unknown_name_echoes_id() {
    let fixture = Fixture::new();
    let (stream, _handle) = fixture.connect();
    let mut client = Client::new(stream);

    // A client that believes it is registered presents its old id.
    client.id.copy_from_slice(b"stale-id-0123456");

    client
        .send_request(request_code::LOGIN, &write_fixed_str("nobody", NAME_FIELD_LEN))
        .await;

    let (code, payload) = client.read_response().await;
    assert_eq!(code, respond_code::LOGIN_REJECTED);
    assert_eq!(payload, b"stale-id-0123456");
}

#[tokio::test]
async fn duplicate_register_fails_on_second_connection() {
    let fixture = Fixture::new();

    let (stream, _handle) = fixture.connect();
    let mut first = Client::new(stream);
    let (code, _) = first.register("dave").await;
    assert_eq!(code, respond_code::REGISTER_SUCCESS);

    let (stream, _handle) = fixture.connect();
    let mut second = Client::new(stream);
    let (code, payload) = second.register("dave").await;
    assert_eq!(code, respond_code::REGISTER_FAIL);
    assert!(payload.is_empty());

    // The stored identity is unchanged.
    let stored = fixture.identities.get_by_name("dave").unwrap().unwrap();
    assert_eq!(stored.id.as_bytes(), &first.id);
}

#[tokio::test]
async fn corrupt_upload_terminates_connection() {
    let fixture = Fixture::new();
    let (stream, handle) = fixture.connect();
    let mut client = Client::new(stream);
    let private_key = test_keypair();

    client.register("eve").await;
    let _ = client.share_key("eve", &private_key).await;

    // Ciphertext truncated mid-block: never decryptable, whatever the key.
    let ciphertext = base64::encode([0x5Au8; 15]);
    let mut payload = 8u32.to_le_bytes().to_vec();
    payload.extend_from_slice(&write_fixed_str("e.txt", NAME_FIELD_LEN));
    payload.extend_from_slice(ciphertext.as_bytes());
    client.send_request(request_code::SEND_FILE, &payload).await;

    // The handler aborts the connection with a session error.
    assert!(matches!(
        handle.await.unwrap(),
        Err(ServerError::Session(_))
    ));
}
