// src/config/defaults.rs
//! Default configurations for the vaultport server.
//!
//! This module provides sensible default values for configuration settings
//! when not explicitly specified by the user.

/// Default server listening address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:1234";

/// Default directory for uploaded files
pub const DEFAULT_STORAGE_DIR: &str = "received";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
