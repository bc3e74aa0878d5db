//! Sign-in command handlers

use anyhow::{bail, Context, Result};

use anotar_core::{parse_callback, AuthSettings, Config, CredentialProvider, TokenFile};

use crate::output::{Output, OutputFormat};

/// Store a session token, or print the hosted sign-in URL
pub fn login(
    config: &Config,
    token: Option<String>,
    callback: Option<String>,
    output: &Output,
) -> Result<()> {
    let token_file = TokenFile::from_config(config);

    let token = match (token, callback) {
        (Some(token), _) => token,
        (None, Some(callback)) => {
            let tokens = parse_callback(&callback)
                .context("No id_token found in the callback URL")?;
            tokens.id_token
        }
        (None, None) => return print_login_url(config, output),
    };

    if token.trim().is_empty() {
        bail!("Token is empty");
    }
    token_file.store(&token)?;
    output.success(&format!(
        "Signed in (token stored in {})",
        token_file.path().display()
    ));
    Ok(())
}

/// Forget the stored session
pub fn logout(config: &Config, output: &Output) -> Result<()> {
    let token_file = TokenFile::from_config(config);
    let was_signed_in = token_file.token().is_some();
    token_file.sign_out();

    let logout_url = AuthSettings::from_config(config)
        .map(|settings| settings.logout_url())
        .transpose()?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "signed_out": was_signed_in,
                    "logout_url": logout_url
                })
            );
        }
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            if was_signed_in {
                println!("✓ Signed out");
            } else {
                println!("Not signed in.");
            }
            if let Some(url) = logout_url {
                println!();
                println!("To end the hosted session as well, open:");
                println!("  {}", url);
            }
        }
    }
    Ok(())
}

fn print_login_url(config: &Config, output: &Output) -> Result<()> {
    let Some(settings) = AuthSettings::from_config(config) else {
        bail!(
            "Hosted sign-in not configured. Either pass a token:\n  \
             anotar login --token <id_token>\n\
             or configure the sign-in domain:\n  \
             anotar config set auth_domain https://your-domain.auth.example.com\n  \
             anotar config set client_id <client id>"
        );
    };
    let url = settings.login_url()?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "login_url": url }));
        }
        OutputFormat::Quiet => println!("{}", url),
        OutputFormat::Human => {
            println!("Open this URL in your browser to sign in:");
            println!("  {}", url);
            println!();
            println!("After signing in, copy the address you were redirected to and run:");
            println!("  anotar login --callback '<redirected URL>'");
        }
    }
    Ok(())
}
