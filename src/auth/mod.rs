pub mod local;
pub mod remote;
pub mod verifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalIdentityProvider;
pub use remote::RemoteIdentityProvider;
pub use verifier::{TokenVerifier, DEV_TOKEN_PREFIX};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Identity as asserted by a verified bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    /// Custom role claim carried by the token. Logged on mismatch, never used for authorization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_claim: Option<String>,
}

/// Result of a successful sign-up or sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub identity: VerifiedIdentity,
    pub token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailExists,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// External identity service: token verification and credential flows.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;

    async fn create_account(&self, account: NewAccount) -> Result<IssuedSession, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<IssuedSession, IdentityError>;

    /// Tokens issued before a successful change stop verifying.
    async fn change_password(&self, email: &str, current: &str, new: &str) -> Result<(), IdentityError>;
}

pub fn check_email(email: &str) -> Result<(), IdentityError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(IdentityError::InvalidEmail);
    };
    let domain_ok = domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.');
    if local.is_empty() || !domain_ok || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(IdentityError::InvalidEmail);
    }
    Ok(())
}

pub fn check_password(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::WeakPassword(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
