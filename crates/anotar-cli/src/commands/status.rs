//! Status command handler

use anyhow::Result;

use anotar_core::{Config, CredentialProvider, TokenFile};

use super::Session;
use crate::output::{Output, OutputFormat};

/// Show session, endpoint and task counts
pub async fn show(config: Config, output: &Output) -> Result<()> {
    let signed_in = TokenFile::from_config(&config).token().is_some();
    let endpoint = config.api_endpoint.clone();
    let interval = config.sync_interval().as_secs();

    // Counts need both a session and an endpoint
    let counts = match (signed_in, endpoint.is_some()) {
        (true, true) => {
            let session = Session::open(config)?;
            match session.load().await {
                Ok(tasks) => {
                    let done = tasks.iter().filter(|t| t.is_complete()).count();
                    Some((tasks.len(), done))
                }
                Err(e) => {
                    output.warn(&format!("{:#}", e));
                    None
                }
            }
        }
        _ => None,
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "signed_in": signed_in,
                    "api_endpoint": endpoint,
                    "sync_interval_secs": interval,
                    "tasks": counts.map(|(total, _)| total),
                    "complete": counts.map(|(_, done)| done)
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", if signed_in { "signed-in" } else { "signed-out" });
        }
        OutputFormat::Human => {
            println!("Anotar Status");
            println!("=============");
            println!();
            println!("Session:");
            println!(
                "  Status:   {}",
                if signed_in { "signed in" } else { "signed out" }
            );
            println!();
            println!("Sync:");
            println!(
                "  Endpoint: {}",
                endpoint.as_deref().unwrap_or("(not set)")
            );
            println!("  Interval: {}s", interval);
            if let Some((total, done)) = counts {
                println!();
                println!("Tasks:");
                println!("  Total:    {}", total);
                println!("  Complete: {}", done);
            }
        }
    }

    Ok(())
}
