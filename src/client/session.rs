use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

use super::{ClientError, PortalClient};
use crate::database::models::{Role, UserUpdate};
use crate::services::Profile;

/// Client-side identity SDK: owns the provider session and hands out bearer tokens.
#[async_trait]
pub trait IdentitySession: Send + Sync {
    /// Current bearer token; `force_refresh` asks the provider for a new one.
    async fn id_token(&self, force_refresh: bool) -> Result<String, ClientError>;

    async fn sign_out(&self);
}

/// A signed-in user whose application record has been merged.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub profile: Profile,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Provider session known, record merge pending. No role is exposed.
    Loading,
    Anonymous,
    Authenticated(SessionUser),
    /// Fetching a fresh token for an authenticated user
    Refreshing(SessionUser),
}

impl SessionState {
    /// Role for UI decisions; only a completed merge yields one.
    pub fn role(&self) -> Option<Role> {
        match self {
            SessionState::Authenticated(user) => Some(user.profile.record.role),
            _ => None,
        }
    }

    pub fn can_perform_privileged(&self) -> bool {
        self.role().map(|role| role.is_admin()).unwrap_or(false)
    }

    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            SessionState::Authenticated(user) | SessionState::Refreshing(user) => Some(user),
            _ => None,
        }
    }
}

/// Drives `SessionState` from provider events and API calls.
///
/// Every transition takes a new epoch; a result that arrives after a newer transition
/// started is dropped, so a slow profile fetch can never overwrite a later sign-out.
pub struct SessionBridge {
    client: PortalClient,
    identity: Arc<dyn IdentitySession>,
    state: watch::Sender<SessionState>,
    epoch: Mutex<u64>,
}

impl SessionBridge {
    pub fn new(client: PortalClient, identity: Arc<dyn IdentitySession>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self { client, identity, state, epoch: Mutex::new(0) }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, state: SessionState) -> u64 {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.state.send_replace(state);
        *epoch
    }

    fn commit(&self, epoch: u64, state: SessionState) -> SessionState {
        let current = self.lock_epoch();
        if *current == epoch {
            self.state.send_replace(state);
        } else {
            debug!("Discarding session result from superseded transition {}", epoch);
        }
        drop(current);
        self.state()
    }

    /// Provider reported a signed-in user: fetch a token, merge the record, then expose the role.
    pub async fn on_signed_in(&self) -> SessionState {
        let epoch = self.begin(SessionState::Loading);

        let token = match self.identity.id_token(false).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Could not obtain a token for the signed-in user: {}", e);
                return self.force_sign_out(epoch).await;
            }
        };

        match self.client.clone().with_token(token.clone()).me().await {
            Ok(profile) => self.commit(epoch, SessionState::Authenticated(SessionUser { profile, token })),
            Err(ClientError::Unauthenticated(reason)) => {
                warn!("Token rejected while loading the profile: {}", reason);
                self.force_sign_out(epoch).await
            }
            Err(e) => {
                warn!("Profile merge failed: {}", e);
                self.commit(epoch, SessionState::Anonymous)
            }
        }
    }

    /// Provider reported a sign-out.
    pub fn on_signed_out(&self) -> SessionState {
        self.begin(SessionState::Anonymous);
        self.state()
    }

    /// Get a fresh token for the current user. A failed refresh signs the user out.
    pub async fn refresh_token(&self) -> SessionState {
        let user = match self.state() {
            SessionState::Authenticated(user) => user,
            other => return other,
        };
        let epoch = self.begin(SessionState::Refreshing(user.clone()));

        match self.identity.id_token(true).await {
            Ok(token) => self.commit(epoch, SessionState::Authenticated(SessionUser { token, ..user })),
            Err(e) => {
                warn!("Token refresh failed, signing out: {}", e);
                self.force_sign_out(epoch).await
            }
        }
    }

    /// Write through the API, then take the server's record as the new session user.
    pub async fn update_profile(&self, update: &UserUpdate) -> Result<Profile, ClientError> {
        let user = match self.state() {
            SessionState::Authenticated(user) => user,
            _ => return Err(ClientError::NotSignedIn),
        };

        let profile = match self.authorized_client(&user).update_me(update).await {
            Ok(profile) => profile,
            Err(ClientError::Unauthenticated(reason)) => {
                let epoch = *self.lock_epoch();
                self.force_sign_out(epoch).await;
                return Err(ClientError::Unauthenticated(reason));
            }
            Err(e) => return Err(e),
        };

        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated(current) if current.profile.record.id == profile.record.id => {
                current.profile = profile.clone();
                true
            }
            _ => false,
        });
        Ok(profile)
    }

    /// API client carrying the current user's token.
    pub fn client(&self) -> Result<PortalClient, ClientError> {
        match self.state() {
            SessionState::Authenticated(user) | SessionState::Refreshing(user) => Ok(self.authorized_client(&user)),
            _ => Err(ClientError::NotSignedIn),
        }
    }

    fn authorized_client(&self, user: &SessionUser) -> PortalClient {
        self.client.clone().with_token(user.token.clone())
    }

    async fn force_sign_out(&self, epoch: u64) -> SessionState {
        self.identity.sign_out().await;
        self.commit(epoch, SessionState::Anonymous)
    }
}

/// Identity session over a token obtained elsewhere (CLI login, tests).
#[derive(Debug, Default)]
pub struct StoredTokenSession {
    token: RwLock<Option<String>>,
}

impl StoredTokenSession {
    pub fn new(token: Option<String>) -> Self {
        Self { token: RwLock::new(token) }
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}

#[async_trait]
impl IdentitySession for StoredTokenSession {
    async fn id_token(&self, _force_refresh: bool) -> Result<String, ClientError> {
        self.token.read().await.clone().ok_or(ClientError::NotSignedIn)
    }

    async fn sign_out(&self) {
        *self.token.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewUser;

    fn user(role: Role) -> SessionUser {
        let record = NewUser { role, ..NewUser::resident("u1", "u1@example.com") }.into_record(chrono::Utc::now());
        SessionUser { profile: Profile { record, email_verified: true }, token: "t".to_string() }
    }

    #[test]
    fn only_authenticated_exposes_role() {
        assert_eq!(SessionState::Loading.role(), None);
        assert!(!SessionState::Loading.can_perform_privileged());
        assert!(!SessionState::Refreshing(user(Role::Admin)).can_perform_privileged());
        assert!(SessionState::Authenticated(user(Role::Admin)).can_perform_privileged());
        assert!(!SessionState::Authenticated(user(Role::Resident)).can_perform_privileged());
    }

    #[tokio::test]
    async fn unreachable_server_lands_anonymous() {
        // Port 9 (discard) on loopback refuses connections
        let client = PortalClient::new("http://127.0.0.1:9").unwrap();
        let bridge = SessionBridge::new(client, Arc::new(StoredTokenSession::new(Some("t".to_string()))));
        assert_eq!(bridge.state(), SessionState::Loading);
        assert_eq!(bridge.on_signed_in().await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn missing_token_signs_out() {
        let client = PortalClient::new("http://127.0.0.1:9").unwrap();
        let identity = Arc::new(StoredTokenSession::new(None));
        let bridge = SessionBridge::new(client, identity);
        assert_eq!(bridge.on_signed_in().await, SessionState::Anonymous);
        assert!(matches!(bridge.client(), Err(ClientError::NotSignedIn)));
    }
}
