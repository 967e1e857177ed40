use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{check_password, IdentityError, IdentityProvider, IssuedSession, NewAccount, VerifiedIdentity};
use crate::config::IdentityConfig;

/// Identity Toolkit style REST identity service.
pub struct RemoteIdentityProvider {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<RemoteUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    /// Seconds since epoch; tokens issued earlier are revoked
    #[serde(default)]
    valid_since: Option<String>,
    /// Custom claims as a JSON string
    #[serde(default)]
    custom_attributes: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssuedAt {
    #[serde(default)]
    iat: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

impl RemoteIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| IdentityError::Unavailable("IDENTITY_API_KEY is not set".to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        info!(
            "Remote identity provider at {} (project {})",
            config.base_url,
            config.project_id.as_deref().unwrap_or("unset")
        );
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_string(), api_key })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, IdentityError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("{}: {}", method, e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| IdentityError::Unavailable(format!("{}: malformed response: {}", method, e)));
        }

        let code = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_default();
        debug!("Identity provider {} failed with {} {}", method, status, code);
        Err(map_provider_error(status.as_u16(), &code))
    }

    async fn lookup(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let response: LookupResponse = self.call("lookup", json!({ "idToken": token })).await?;
        let user = response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::InvalidToken("no user for token".to_string()))?;

        if user.disabled {
            return Err(IdentityError::InvalidToken("account disabled".to_string()));
        }

        if let Some(valid_since) = user.valid_since.as_deref().and_then(|v| v.parse::<i64>().ok()) {
            match issued_at(token) {
                Some(iat) if iat >= valid_since => {}
                _ => return Err(IdentityError::InvalidToken("token revoked".to_string())),
            }
        }

        let role_claim = user
            .custom_attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .and_then(|claims| claims.get("role").and_then(Value::as_str).map(str::to_string));

        Ok(VerifiedIdentity {
            id: user.local_id,
            email: user.email.unwrap_or_default(),
            email_verified: user.email_verified,
            display_name: user.display_name,
            phone: user.phone_number,
            role_claim,
        })
    }

    async fn session_for(&self, tokens: TokenResponse) -> Result<IssuedSession, IdentityError> {
        let identity = self.lookup(&tokens.id_token).await?;
        let expires_in = tokens
            .expires_in
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);
        Ok(IssuedSession { identity, token: tokens.id_token, expires_in })
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.lookup(token).await
    }

    async fn create_account(&self, account: NewAccount) -> Result<IssuedSession, IdentityError> {
        check_password(&account.password)?;
        let body = serde_json::to_value(PasswordRequest {
            email: account.email.trim(),
            password: &account.password,
            return_secure_token: true,
        })
        .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        let tokens: TokenResponse = self.call("signUp", body).await?;

        if account.display_name.is_some() {
            let update = json!({
                "idToken": tokens.id_token,
                "displayName": account.display_name,
                "returnSecureToken": false,
            });
            if let Err(e) = self.call::<Value>("update", update).await {
                // The account exists at this point; the profile record still carries the name
                warn!("Could not set display name on new identity: {}", e);
            }
        }

        self.session_for(tokens).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IssuedSession, IdentityError> {
        let body = serde_json::to_value(PasswordRequest { email: email.trim(), password, return_secure_token: true })
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        let tokens: TokenResponse = self.call("signInWithPassword", body).await?;
        self.session_for(tokens).await
    }

    async fn change_password(&self, email: &str, current: &str, new: &str) -> Result<(), IdentityError> {
        check_password(new)?;
        let session = self.sign_in(email, current).await?;
        self.call::<Value>(
            "update",
            json!({ "idToken": session.token, "password": new, "returnSecureToken": false }),
        )
        .await?;
        Ok(())
    }
}

/// Provider error codes never leave this module.
fn map_provider_error(status: u16, code: &str) -> IdentityError {
    // Codes may carry a detail suffix, e.g. "WEAK_PASSWORD : Password should be at least 6 characters"
    let key = code.split([' ', ':']).next().unwrap_or_default();
    match key {
        "EMAIL_EXISTS" => IdentityError::EmailExists,
        "INVALID_EMAIL" | "MISSING_EMAIL" => IdentityError::InvalidEmail,
        "WEAK_PASSWORD" | "MISSING_PASSWORD" => IdentityError::WeakPassword(format!(
            "Password must be at least {} characters",
            super::MIN_PASSWORD_LENGTH
        )),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            IdentityError::InvalidCredentials
        }
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
            IdentityError::InvalidToken(key.to_string())
        }
        _ if status == 400 => IdentityError::InvalidToken(format!("provider rejected request ({})", key)),
        _ => IdentityError::Unavailable(format!("status {} {}", status, key)),
    }
}

/// `iat` of a token the provider has already accepted.
fn issued_at(token: &str) -> Option<i64> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    decode::<IssuedAt>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .and_then(|data| data.claims.iat)
}
