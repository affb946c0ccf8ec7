// src/config/settings.rs
//! Server configuration settings.
//!
//! This module contains the server configuration structures and
//! implementation for loading, parsing, and validating user-provided
//! settings.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::defaults;

/// Error type for configuration-related operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(#[from] std::net::AddrParseError),
}

/// Command line arguments for the server
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "vaultport",
    about = "Encrypted file-transfer server with RSA key exchange and CRC-verified uploads",
    version,
    author
)]
pub struct ServerArgs {
    /// Server address to listen on
    #[clap(long, default_value = defaults::DEFAULT_LISTEN_ADDR)]
    pub listen: String,

    /// Directory where uploaded files are written
    #[clap(long, default_value = defaults::DEFAULT_STORAGE_DIR)]
    pub storage_dir: PathBuf,

    /// JSON configuration file; when given, it replaces the other flags
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Log level
    #[clap(long, default_value = defaults::DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

/// Validated server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the TCP listener binds to
    pub listen_addr: SocketAddr,
    /// Directory where uploaded files are written
    pub storage_dir: PathBuf,
    /// Log level passed to the tracing filter
    pub log_level: String,
}

impl ServerConfig {
    /// Build the effective configuration from command line arguments,
    /// or from a JSON configuration file when one is given.
    pub fn from_args(args: &ServerArgs) -> Result<Self, ConfigError> {
        if let Some(path) = &args.config {
            let config = Self::load(path)?;
            info!("Loaded configuration from {}", path.display());
            return config.validate();
        }

        let listen_addr: SocketAddr = args.listen.parse()?;
        Self {
            listen_addr,
            storage_dir: args.storage_dir.clone(),
            log_level: args.log_level.clone(),
        }
        .validate()
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage directory must not be empty".into(),
            ));
        }
        Ok(self)
    }
}
