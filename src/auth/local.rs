use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{check_email, check_password, IdentityError, IdentityProvider, IssuedSession, NewAccount, VerifiedIdentity};

const ISSUER: &str = "estate-portal-local";

#[derive(Debug, Serialize, Deserialize)]
struct LocalClaims {
    sub: String,
    email: String,
    /// Session generation; tokens from an older generation are revoked
    gen: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    iss: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
struct Account {
    id: String,
    email: String,
    display_name: Option<String>,
    phone: Option<String>,
    email_verified: bool,
    /// PHC string, algorithm and salt included
    password_hash: String,
    generation: u32,
    role_claim: Option<String>,
}

impl Account {
    fn identity(&self) -> VerifiedIdentity {
        VerifiedIdentity {
            id: self.id.clone(),
            email: self.email.clone(),
            email_verified: self.email_verified,
            display_name: self.display_name.clone(),
            phone: self.phone.clone(),
            role_claim: self.role_claim.clone(),
        }
    }
}

#[derive(Default)]
struct Accounts {
    by_id: HashMap<String, Account>,
    // lowercased email -> id
    by_email: HashMap<String, String>,
}

impl Accounts {
    fn by_email(&self, email: &str) -> Option<&Account> {
        self.by_email
            .get(&email.trim().to_lowercase())
            .and_then(|id| self.by_id.get(id))
    }
}

/// In-process identity provider issuing HS256 tokens. Used in development and tests.
pub struct LocalIdentityProvider {
    accounts: RwLock<Accounts>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl LocalIdentityProvider {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            accounts: RwLock::new(Accounts::default()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// Embed a custom role claim in tokens issued from now on.
    pub async fn set_custom_role_claim(&self, identity_id: &str, role: Option<&str>) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.by_id.get_mut(identity_id).ok_or(IdentityError::AccountNotFound)?;
        account.role_claim = role.map(str::to_string);
        Ok(())
    }

    pub async fn mark_email_verified(&self, identity_id: &str) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.by_id.get_mut(identity_id).ok_or(IdentityError::AccountNotFound)?;
        account.email_verified = true;
        Ok(())
    }

    /// Fresh token for an existing account, without a password round trip.
    pub async fn issue_token(&self, identity_id: &str) -> Result<IssuedSession, IdentityError> {
        let accounts = self.accounts.read().await;
        let account = accounts.by_id.get(identity_id).ok_or(IdentityError::AccountNotFound)?;
        self.issue(account)
    }

    fn issue(&self, account: &Account) -> Result<IssuedSession, IdentityError> {
        let now = Utc::now();
        let claims = LocalClaims {
            sub: account.id.clone(),
            email: account.email.clone(),
            gen: account.generation,
            role: account.role_claim.clone(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.ttl_secs as i64)).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| IdentityError::Unavailable(format!("token signing failed: {}", e)))?;

        Ok(IssuedSession { identity: account.identity(), token, expires_in: self.ttl_secs })
    }

    /// Account id and session generation when `password` verifies.
    async fn check_credentials(&self, email: &str, password: &str) -> Result<(String, u32), IdentityError> {
        let stored = {
            let accounts = self.accounts.read().await;
            accounts
                .by_email(email)
                .map(|account| (account.id.clone(), account.generation, account.password_hash.clone()))
        };

        if let Some((id, generation, hash)) = stored {
            if verify_password(password.to_string(), hash).await {
                return Ok((id, generation));
            }
        }
        debug!("Local sign-in rejected");
        Err(IdentityError::InvalidCredentials)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        let claims = decode::<LocalClaims>(token, &self.decoding, &validation)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?
            .claims;

        let accounts = self.accounts.read().await;
        let account = accounts
            .by_id
            .get(&claims.sub)
            .ok_or_else(|| IdentityError::InvalidToken("unknown subject".to_string()))?;
        if claims.gen != account.generation {
            return Err(IdentityError::InvalidToken("token revoked".to_string()));
        }

        let mut identity = account.identity();
        // The claim travels with the token, so report what was signed
        identity.role_claim = claims.role;
        Ok(identity)
    }

    async fn create_account(&self, account: NewAccount) -> Result<IssuedSession, IdentityError> {
        let email = account.email.trim().to_lowercase();
        check_email(&email)?;
        check_password(&account.password)?;

        // Hashing is slow on purpose; keep it outside the lock
        let password_hash = hash_password(account.password).await?;

        let mut accounts = self.accounts.write().await;
        if accounts.by_email.contains_key(&email) {
            return Err(IdentityError::EmailExists);
        }

        let record = Account {
            id: Uuid::new_v4().simple().to_string(),
            email: email.clone(),
            display_name: account.display_name,
            phone: account.phone,
            email_verified: false,
            password_hash,
            generation: 0,
            role_claim: None,
        };
        info!("Created local identity {}", record.id);

        let session = self.issue(&record)?;
        accounts.by_email.insert(email, record.id.clone());
        accounts.by_id.insert(record.id.clone(), record);
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IssuedSession, IdentityError> {
        let (id, generation) = self.check_credentials(email, password).await?;

        let accounts = self.accounts.read().await;
        match accounts.by_id.get(&id) {
            // A password change in between invalidates this attempt
            Some(account) if account.generation == generation => self.issue(account),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn change_password(&self, email: &str, current: &str, new: &str) -> Result<(), IdentityError> {
        check_password(new)?;
        let (id, generation) = self.check_credentials(email, current).await?;
        let password_hash = hash_password(new.to_string()).await?;

        let mut accounts = self.accounts.write().await;
        let account = accounts.by_id.get_mut(&id).ok_or(IdentityError::AccountNotFound)?;
        if account.generation != generation {
            return Err(IdentityError::InvalidCredentials);
        }
        account.password_hash = password_hash;
        account.generation += 1;
        info!("Password changed for local identity {}, earlier tokens revoked", id);
        Ok(())
    }
}

/// Argon2id with a random salt, encoded as a PHC string.
async fn hash_password(password: String) -> Result<String, IdentityError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| IdentityError::Unavailable(format!("password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| IdentityError::Unavailable(format!("password hashing task failed: {}", e)))?
}

/// Constant-time check against a stored PHC string. Unparsable hashes never match.
async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    })
    .await
    .unwrap_or(false)
}
