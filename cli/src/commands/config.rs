use anyhow::{anyhow, Result};
use colored::*;
use serde_json::json;
use std::path::Path;

use super::load_config;

/// Parse, validate and build the configuration, then summarize it
pub fn validate(path: &Path, format: &str) -> Result<()> {
    let config = load_config(path)?;
    let components = config.build()?;

    let adapters: Vec<&String> = config.authentication.adapters.keys().collect();
    let types = components.authentication.authentication_types();

    match format {
        "json" => {
            let summary = json!({
                "valid": true,
                "path": path.display().to_string(),
                "adapters": adapters,
                "authentication_types": types,
                "deny_by_default": config.authorization.deny_by_default,
                "controllers": config.authorization.rules.len(),
                "routes": components.routes.len(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            println!("{}", "=== Portcullis Configuration ===".bold());
            println!();
            println!("{}: {}", "Path".bold(), path.display().to_string().cyan());
            println!("{}", "✓ Configuration is valid".green().bold());
            println!();
            println!(
                "  {}: {}",
                "Adapters".cyan(),
                if adapters.is_empty() {
                    "none".yellow().to_string()
                } else {
                    adapters
                        .iter()
                        .map(|name| name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            );
            println!("  {}: {}", "Authentication types".cyan(), types.join(", "));
            println!(
                "  {}: {}",
                "Default policy".cyan(),
                if config.authorization.deny_by_default {
                    "deny".red()
                } else {
                    "allow".green()
                }
            );
            println!(
                "  {}: {}",
                "Controllers with rules".cyan(),
                config.authorization.rules.len()
            );
            println!("  {}: {}", "Routes".cyan(), components.routes.len());
        }
    }

    Ok(())
}

/// Print the parsed configuration
pub fn show(path: &Path, format: &str) -> Result<()> {
    let config = load_config(path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        "yaml" => print!("{}", config.to_yaml()?),
        other => return Err(anyhow!("Unsupported format '{}' (expected json or yaml)", other)),
    }

    Ok(())
}
