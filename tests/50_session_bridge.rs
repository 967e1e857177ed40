mod common;

use std::sync::Arc;

use common::TestApp;
use estate_portal_api::client::{
    ClientError, IdentitySession, PortalClient, SessionBridge, SessionState, StoredTokenSession,
};
use estate_portal_api::database::models::{Role, UserUpdate};

async fn bridge_for(app: &TestApp, email: &str) -> (Arc<SessionBridge>, Arc<StoredTokenSession>, common::TestUser) {
    let base_url = app.serve_loopback().await;
    let user = app.register(email).await;
    let identity = Arc::new(StoredTokenSession::new(Some(user.token.clone())));
    let bridge = Arc::new(SessionBridge::new(PortalClient::new(&base_url).unwrap(), identity.clone()));
    (bridge, identity, user)
}

#[tokio::test]
async fn sign_in_exposes_server_role_only_after_merge() {
    let app = TestApp::new();
    let (bridge, _, user) = bridge_for(&app, "bridge@example.com").await;

    assert_eq!(bridge.state(), SessionState::Loading);
    assert_eq!(bridge.state().role(), None);

    let state = bridge.on_signed_in().await;
    assert_eq!(state.role(), Some(Role::Resident));
    assert!(!state.can_perform_privileged());
    assert_eq!(state.user().unwrap().profile.record.id, user.id);

    // A promotion shows up on the next merge, same token
    app.set_role(&user, Role::Admin).await;
    let state = bridge.on_signed_in().await;
    assert!(state.can_perform_privileged());
}

#[tokio::test]
async fn profile_update_replaces_session_user() {
    let app = TestApp::new();
    let (bridge, _, _) = bridge_for(&app, "editme@example.com").await;
    bridge.on_signed_in().await;

    let update = UserUpdate { display_name: Some("Riley".to_string()), role: Some(Role::Admin), ..UserUpdate::default() };
    let profile = bridge.update_profile(&update).await.unwrap();
    assert_eq!(profile.record.display_name.as_deref(), Some("Riley"));
    assert_eq!(profile.record.role, Role::Resident);

    let state = bridge.state();
    assert_eq!(state.user().unwrap().profile.record.display_name.as_deref(), Some("Riley"));
    assert!(!state.can_perform_privileged());
}

#[tokio::test]
async fn rejected_token_forces_sign_out() {
    let app = TestApp::new();
    let (bridge, identity, _) = bridge_for(&app, "revoked@example.com").await;
    bridge.on_signed_in().await;

    bridge.client().unwrap().change_password("secret123", "newsecret").await.unwrap();

    let update = UserUpdate { phone: Some("555".to_string()), ..UserUpdate::default() };
    let err = bridge.update_profile(&update).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthenticated(_)));
    assert_eq!(bridge.state(), SessionState::Anonymous);
    assert!(identity.token().await.is_none());
    assert!(matches!(bridge.client(), Err(ClientError::NotSignedIn)));
}

#[tokio::test]
async fn sign_out_supersedes_pending_sign_in() {
    let app = TestApp::new();
    let (bridge, _, _) = bridge_for(&app, "race@example.com").await;
    let mut states = bridge.subscribe();

    let pending = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.on_signed_in().await })
    };
    tokio::task::yield_now().await;
    bridge.on_signed_out();

    pending.await.unwrap();
    assert_eq!(bridge.state(), SessionState::Anonymous);
    assert_eq!(*states.borrow_and_update(), SessionState::Anonymous);
}

#[tokio::test]
async fn refresh_keeps_profile_and_failure_signs_out() {
    let app = TestApp::new();
    let (bridge, identity, _) = bridge_for(&app, "refresh@example.com").await;
    let before = bridge.on_signed_in().await;

    let after = bridge.refresh_token().await;
    assert_eq!(after, before);

    // Provider session gone: no token to refresh with
    identity.sign_out().await;
    assert_eq!(bridge.refresh_token().await, SessionState::Anonymous);
}
