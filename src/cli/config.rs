use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::client::PortalClient;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    pub last_ping: Option<DateTime<Utc>>,
    pub status: ServerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
    Unknown,
}

/// Token and identity from the last successful login.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub token: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ServerConfig {
    pub fn new(url: String) -> Self {
        Self { url, last_ping: None, status: ServerStatus::Unknown }
    }

    pub fn update_ping(&mut self, status: ServerStatus) {
        self.last_ping = Some(Utc::now());
        self.status = status;
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL.to_string())
    }
}

impl SessionConfig {
    pub fn signed_in(token: String, email: String, expires_in: u64) -> Self {
        let expires_at = i64::try_from(expires_in)
            .ok()
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
        Self { token: Some(token), email: Some(email), expires_at }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at <= Utc::now()).unwrap_or(false)
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("PORTAL_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("estate-portal").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn load<T: Default + for<'de> Deserialize<'de>>(file: &str) -> anyhow::Result<T> {
    let path = get_config_dir()?.join(file);
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save<T: Serialize>(file: &str, value: &T) -> anyhow::Result<()> {
    let path = get_config_dir()?.join(file);
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    load("server.json")
}

pub fn save_server_config(config: &ServerConfig) -> anyhow::Result<()> {
    save("server.json", config)
}

pub fn load_session_config() -> anyhow::Result<SessionConfig> {
    load("session.json")
}

pub fn save_session_config(config: &SessionConfig) -> anyhow::Result<()> {
    save("session.json", config)
}

/// Client for the configured server, without credentials.
pub fn anonymous_client() -> anyhow::Result<PortalClient> {
    let server = load_server_config()?;
    Ok(PortalClient::new(&server.url)?)
}

/// Stored token, rejecting sessions that have already expired.
pub fn stored_token() -> anyhow::Result<String> {
    let session = load_session_config()?;
    match session.token {
        Some(_) if session.is_expired() => Err(anyhow::anyhow!("Session expired, run `portal auth login`")),
        Some(token) => Ok(token),
        None => Err(anyhow::anyhow!("Not logged in, run `portal auth login`")),
    }
}

pub async fn ping_server(client: &PortalClient) -> ServerStatus {
    match client.health().await {
        Ok(_) => ServerStatus::Up,
        Err(_) => ServerStatus::Down,
    }
}
