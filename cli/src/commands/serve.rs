use anyhow::{anyhow, Result};
use api::ApiConfig;
use std::path::Path;
use tracing::info;

use super::load_components;

/// Serve the configured routes until interrupted
pub async fn execute(path: &Path, host: String, port: u16) -> Result<()> {
    let components = load_components(path)?;
    info!(
        "Starting development server with configuration {}",
        path.display()
    );

    let config = ApiConfig::new().with_host(host).with_port(port);
    api::start_server_with_config(components, config)
        .await
        .map_err(|e| anyhow!("API server error: {}", e))
}
