//! Config command handlers

use anyhow::{bail, Context, Result};

use anotar_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "api_endpoint": config.api_endpoint,
                    "sync_interval_secs": config.sync_interval_secs,
                    "auth_domain": config.auth_domain,
                    "client_id": config.client_id,
                    "redirect_uri": config.redirect_uri
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:           {}", config.data_dir.display());
            println!(
                "  api_endpoint:       {}",
                config.api_endpoint.as_deref().unwrap_or("(not set)")
            );
            println!("  sync_interval_secs: {}", config.sync_interval_secs);
            println!(
                "  auth_domain:        {}",
                config.auth_domain.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  client_id:          {}",
                config.client_id.as_deref().unwrap_or("(not set)")
            );
            println!("  redirect_uri:       {}", config.redirect_uri);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;
    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Write one key into a configuration
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "api_endpoint" => {
            config.api_endpoint = optional(value);
        }
        "sync_interval_secs" => {
            config.sync_interval_secs = value
                .trim()
                .parse()
                .context("Invalid value for sync_interval_secs. Use a whole number of seconds.")?;
        }
        "auth_domain" => {
            config.auth_domain = optional(value);
        }
        "client_id" => {
            config.client_id = optional(value);
        }
        "redirect_uri" => {
            if value.is_empty() {
                bail!("redirect_uri cannot be empty");
            }
            config.redirect_uri = value.to_string();
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, api_endpoint, sync_interval_secs, auth_domain, \
                 client_id, redirect_uri",
                key
            );
        }
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}
