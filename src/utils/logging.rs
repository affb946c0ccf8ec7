// src/utils/logging.rs
//! Logging utilities for the application.
//!
//! This module provides functions for initializing and configuring
//! the logging system.

use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging system with console output
pub fn init_logging(log_level: &str) -> io::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::new(log_level), // Use provided level as fallback
    };

    // Configure console logging layer
    let console_layer = fmt::layer()
        .with_target(true) // Log target (module path)
        .with_writer(io::stdout); // Log to standard output

    tracing_subscriber::registry()
        .with(console_layer.with_filter(filter))
        .try_init()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to initialize logging: {}", e),
            )
        })?;

    Ok(())
}
