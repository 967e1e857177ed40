use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::cli::config::{self, SessionConfig};
use crate::cli::utils::{output_success, print_fields};
use crate::cli::OutputFormat;
use crate::client::{SessionBridge, SessionState, StoredTokenSession};

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Create a resident account and log in")]
    Register {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (at least 6 characters)")]
        password: String,
        #[arg(long, help = "Display name")]
        name: Option<String>,
    },

    #[command(about = "Log in and store the session token")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password")]
        password: String,
    },

    #[command(about = "Forget the stored session token")]
    Logout,

    #[command(about = "Show the signed-in profile as the server sees it")]
    Whoami,

    #[command(about = "Change the account password; other sessions stop working")]
    ChangePassword {
        #[arg(long, help = "Current password")]
        current: String,
        #[arg(long, help = "New password (at least 6 characters)")]
        new: String,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Register { email, password, name } => {
            let client = config::anonymous_client()?;
            let session = client.register(&email, &password, name.as_deref()).await?;
            config::save_session_config(&SessionConfig::signed_in(
                session.token,
                session.user.record.email.clone(),
                session.expires_in,
            ))?;
            output_success(
                &output_format,
                &format!("Registered {}", session.user.record.email),
                Some(serde_json::to_value(&session.user)?),
            )
        }
        AuthCommands::Login { email, password } => {
            let client = config::anonymous_client()?;
            let session = client.login(&email, &password).await?;
            config::save_session_config(&SessionConfig::signed_in(
                session.token,
                session.user.record.email.clone(),
                session.expires_in,
            ))?;
            output_success(
                &output_format,
                &format!("Logged in as {} ({})", session.user.record.email, session.user.record.role.as_str()),
                Some(serde_json::to_value(&session.user)?),
            )
        }
        AuthCommands::Logout => {
            config::save_session_config(&SessionConfig::default())?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Whoami => whoami(output_format).await,
        AuthCommands::ChangePassword { current, new } => {
            let client = config::anonymous_client()?.with_token(config::stored_token()?);
            client.change_password(&current, &new).await?;
            // The stored token predates the change and no longer verifies
            config::save_session_config(&SessionConfig::default())?;
            output_success(&output_format, "Password changed, log in again with the new password", None)
        }
    }
}

/// Resolve the stored token through the session bridge, so the role shown is the server's.
async fn whoami(output_format: OutputFormat) -> anyhow::Result<()> {
    let identity = Arc::new(StoredTokenSession::new(Some(config::stored_token()?)));
    let bridge = SessionBridge::new(config::anonymous_client()?, identity.clone());

    match bridge.on_signed_in().await {
        SessionState::Authenticated(user) => {
            let profile = serde_json::to_value(&user.profile)?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "user": profile }))?),
                OutputFormat::Text => {
                    print_fields(&profile, &["id", "email", "role", "displayName", "unit", "block", "flatNumber"]);
                    if user.profile.record.role.is_admin() {
                        println!("Admin actions: enabled");
                    }
                }
            }
            Ok(())
        }
        _ => {
            if identity.token().await.is_none() {
                config::save_session_config(&SessionConfig::default())?;
                return Err(anyhow::anyhow!("Session is no longer valid, run `portal auth login`"));
            }
            Err(anyhow::anyhow!("Could not load the profile from the server"))
        }
    }
}
