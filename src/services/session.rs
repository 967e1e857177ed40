use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{TokenVerifier, VerifiedIdentity};
use crate::database::models::{NewUser, Role, UserRecord};
use crate::database::UserStore;
use crate::error::ApiError;

/// Request-scoped identity. The role is whatever the user record says at request time.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: VerifiedIdentity,
    pub record: UserRecord,
}

impl AuthContext {
    pub fn identity_id(&self) -> &str {
        &self.identity.id
    }

    pub fn email(&self) -> &str {
        &self.identity.email
    }

    pub fn role(&self) -> Role {
        self.record.role
    }

    pub fn is_admin(&self) -> bool {
        self.record.role.is_admin()
    }

    pub fn owns(&self, identity_id: &str) -> bool {
        self.identity.id == identity_id
    }
}

/// Identity fields merged over the application record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub record: UserRecord,
    pub email_verified: bool,
}

impl Profile {
    pub fn merge(identity: &VerifiedIdentity, mut record: UserRecord) -> Self {
        // The provider owns the email address
        if !identity.email.is_empty() {
            record.email = identity.email.clone();
        }
        if record.display_name.is_none() {
            record.display_name = identity.display_name.clone();
        }
        if record.phone.is_none() {
            record.phone = identity.phone.clone();
        }
        Self { record, email_verified: identity.email_verified }
    }
}

impl From<&AuthContext> for Profile {
    fn from(ctx: &AuthContext) -> Self {
        Profile::merge(&ctx.identity, ctx.record.clone())
    }
}

/// Look up the user record for a verified identity, creating the default resident record on first sight.
pub async fn resolve_role(users: &dyn UserStore, identity: &VerifiedIdentity) -> Result<UserRecord, ApiError> {
    let seed = NewUser {
        display_name: identity.display_name.clone(),
        phone: identity.phone.clone(),
        ..NewUser::resident(identity.id.clone(), identity.email.clone())
    };
    let record = users.get_or_create(seed).await?;

    if let Some(claim) = identity.role_claim.as_deref() {
        if claim != record.role.as_str() {
            warn!(
                identity = %identity.id,
                "Token role claim '{}' disagrees with stored role '{}'; using stored role",
                claim,
                record.role
            );
        }
    }
    Ok(record)
}

/// Verify the bearer token and resolve a fresh role for this request.
pub async fn resolve_context(
    verifier: &TokenVerifier,
    users: &dyn UserStore,
    token: &str,
) -> Result<AuthContext, ApiError> {
    let identity = verifier.verify(token).await?;
    let record = resolve_role(users, &identity).await?;
    debug!(identity = %identity.id, role = %record.role, "Resolved request identity");
    Ok(AuthContext { identity, record })
}
