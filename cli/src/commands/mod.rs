use anyhow::{Context, Result};
use settings::{Components, PortcullisConfig};
use std::path::Path;

pub mod acl;
pub mod auth;
pub mod config;
pub mod serve;

/// Load and validate the configuration at `path`
pub fn load_config(path: &Path) -> Result<PortcullisConfig> {
    PortcullisConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Load the configuration and build every component
pub fn load_components(path: &Path) -> Result<Components> {
    let config = load_config(path)?;
    config
        .build()
        .with_context(|| format!("Failed to build components from {}", path.display()))
}
