// Export all modules for public use
pub mod config;
pub mod crypto;
pub mod integrity;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod utils;

// Re-export the most commonly used items for convenience
pub use crate::config::settings::{ServerArgs, ServerConfig};
pub use crate::server::core::{handle_connection, TransferServer};
pub use crate::server::session::{Outcome, Reply, Session, SessionError};
pub use crate::storage::{ClientIdentity, FileRecord};
