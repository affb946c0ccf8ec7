use clap::Parser;

use vaultport::config::settings::{ServerArgs, ServerConfig};
use vaultport::server::TransferServer;
use vaultport::utils::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = ServerArgs::parse();
    let config = ServerConfig::from_args(&args)?;

    // Initialize logging
    init_logging(&config.log_level)?;

    tracing::info!("Starting vaultport file-transfer server");
    tracing::info!("Server version: {}", env!("CARGO_PKG_VERSION"));

    // Make sure the upload directory exists before accepting transfers
    std::fs::create_dir_all(&config.storage_dir)?;
    tracing::info!("Uploads are written to {}", config.storage_dir.display());

    let server = TransferServer::new(config);
    server.run().await?;

    Ok(())
}
