pub mod session;

use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::database::models::{Event, UserUpdate};
use crate::filter::Page;
use crate::handlers::public::auth::SessionResponse;
use crate::services::Profile;

pub use session::{IdentitySession, SessionBridge, SessionState, SessionUser, StoredTokenSession};

/// Errors seen by API consumers, decoded from the response envelope.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    Validation {
        message: String,
        fields: Option<HashMap<String, String>>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Server error ({status}): {message}")]
    Server {
        status: u16,
        message: String,
        reference: Option<String>,
    },

    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    fields: Option<HashMap<String, String>>,
    #[serde(default)]
    reference: Option<String>,
}

impl Envelope {
    fn into_error(self, status: u16) -> ClientError {
        let detail = self.error.unwrap_or(ErrorDetail { code: String::new(), fields: None, reference: None });
        let message = self.message;
        match (detail.code.as_str(), status) {
            ("UNAUTHENTICATED", _) | (_, 401) => ClientError::Unauthenticated(message),
            ("FORBIDDEN", _) | (_, 403) => ClientError::Forbidden(message),
            ("VALIDATION_ERROR", _) | (_, 400) => ClientError::Validation { message, fields: detail.fields },
            ("NOT_FOUND", _) | (_, 404) => ClientError::NotFound(message),
            _ => ClientError::Server { status, message, reference: detail.reference },
        }
    }
}

/// HTTP client for the portal API.
#[derive(Debug, Clone)]
pub struct PortalClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl PortalClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, base_url: Url::parse(base_url)?, token: None })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;
        let mut request = self.http.request(method, url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let envelope: Envelope = serde_json::from_str(&text)
            .map_err(|e| ClientError::Decode(format!("status {}: {}", status, e)))?;

        if !envelope.success {
            return Err(envelope.into_error(status));
        }
        serde_json::from_value(envelope.data.unwrap_or(Value::Null)).map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn body<B: Serialize>(body: &B) -> Result<Value, ClientError> {
        serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        self.request(Method::GET, "/health", &[], None).await
    }

    pub async fn info(&self) -> Result<Value, ClientError> {
        self.request(Method::GET, "/api", &[], None).await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SessionResponse, ClientError> {
        let body = json!({ "email": email, "password": password, "displayName": display_name });
        self.request(Method::POST, "/api/auth/register", &[], Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionResponse, ClientError> {
        let body = json!({ "email": email, "password": password });
        self.request(Method::POST, "/api/auth/login", &[], Some(body)).await
    }

    pub async fn me(&self) -> Result<Profile, ClientError> {
        self.request(Method::GET, "/api/auth/me", &[], None).await
    }

    pub async fn update_me(&self, update: &UserUpdate) -> Result<Profile, ClientError> {
        self.request(Method::PUT, "/api/auth/me", &[], Some(Self::body(update)?)).await
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), ClientError> {
        let body = json!({ "currentPassword": current, "newPassword": new });
        let _: Value = self.request(Method::POST, "/api/auth/change-password", &[], Some(body)).await?;
        Ok(())
    }

    pub async fn list_events(&self, query: &[(&str, String)]) -> Result<Page<Event>, ClientError> {
        self.request(Method::GET, "/api/events", query, None).await
    }

    pub async fn get_event(&self, id: &str) -> Result<Event, ClientError> {
        self.request(Method::GET, &format!("/api/events/{}", id), &[], None).await
    }

    pub async fn rsvp(&self, id: &str) -> Result<Event, ClientError> {
        self.request(Method::POST, &format!("/api/events/{}/rsvp", id), &[], None).await
    }

    pub async fn cancel_rsvp(&self, id: &str) -> Result<Event, ClientError> {
        self.request(Method::DELETE, &format!("/api/events/{}/rsvp", id), &[], None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(body: Value) -> Envelope {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn error_envelope_maps_to_kinds() {
        let err = envelope(json!({
            "success": false, "message": "Event has reached maximum attendees.",
            "error": { "code": "VALIDATION_ERROR" }, "timestamp": "x"
        }))
        .into_error(400);
        assert!(matches!(err, ClientError::Validation { ref message, .. } if message == "Event has reached maximum attendees."));

        let err = envelope(json!({ "success": false, "message": "nope" })).into_error(403);
        assert!(matches!(err, ClientError::Forbidden(_)));

        let err = envelope(json!({
            "success": false, "message": "An error occurred",
            "error": { "code": "UPSTREAM_ERROR", "reference": "abc" }
        }))
        .into_error(500);
        assert!(matches!(err, ClientError::Server { status: 500, reference: Some(_), .. }));
    }

    #[test]
    fn base_url_must_parse() {
        assert!(PortalClient::new("not a url").is_err());
        assert!(PortalClient::new("http://localhost:5000").is_ok());
    }
}
