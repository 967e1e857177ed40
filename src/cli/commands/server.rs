use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{self, ServerConfig, ServerStatus};
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::client::PortalClient;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Point the CLI at an API server")]
    Set {
        #[arg(help = "Server URL, e.g. http://localhost:5000")]
        url: String,
    },

    #[command(about = "Show the configured server")]
    Show,

    #[command(about = "Health check the configured server")]
    Ping,
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Set { url } => {
            // Reject unparsable URLs before they are persisted
            PortalClient::new(&url)?;
            config::save_server_config(&ServerConfig::new(url.clone()))?;
            output_success(&output_format, &format!("Server set to {}", url), Some(json!({ "url": url })))
        }
        ServerCommands::Show => {
            let server = config::load_server_config()?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&server)?),
                OutputFormat::Text => {
                    println!("URL: {}", server.url);
                    println!("Status: {:?}", server.status);
                    if let Some(at) = server.last_ping {
                        println!("Last ping: {}", at.to_rfc3339());
                    }
                }
            }
            Ok(())
        }
        ServerCommands::Ping => {
            let mut server = config::load_server_config()?;
            let client = PortalClient::new(&server.url)?;
            let status = config::ping_server(&client).await;
            server.update_ping(status);
            config::save_server_config(&server)?;

            match status {
                ServerStatus::Up => output_success(
                    &output_format,
                    &format!("{} is up", server.url),
                    Some(json!({ "url": server.url, "status": status })),
                ),
                _ => {
                    output_error(&output_format, &format!("{} is not responding", server.url), Some("SERVER_DOWN"))?;
                    Err(anyhow::anyhow!("Health check failed"))
                }
            }
        }
    }
}
