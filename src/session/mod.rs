//! Session management.
//!
//! A [`SessionManager`] is one tab's view of authentication. It owns the
//! current [`AuthStatus`], derives identity from the stored credential or the
//! backend, and keeps every tab sharing the same [`SharedStorage`] consistent:
//! each login or logout is announced on the storage bus, and every other tab
//! re-runs [`SessionManager::check_auth`] when it hears about it.
//!
//! Only login, logout and the purge of an expired credential write the
//! credential keys.

pub mod claims;
pub mod storage;

pub use claims::{decode_claims, CredentialClaims};
pub use storage::{
    FileStore, KeyValueStore, MemoryStore, SharedStorage, StorageEvent, StorageOp, TabId,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::validation::{validate_credentials, validate_signup};
use crate::api::Backend;
use crate::error::ClientError;
use crate::inflight::InFlight;
use crate::models::{AuthStatus, Identity, LoginOutcome, LoginRequest, SignupForm};

/// Storage key of the bearer credential
pub const AUTH_TOKEN_KEY: &str = "authToken";
/// Storage key of the role cached at login
pub const USER_ROLE_KEY: &str = "userRole";

pub struct SessionManager {
    tab: TabId,
    storage: SharedStorage,
    backend: Arc<dyn Backend>,
    state: watch::Sender<AuthStatus>,
    /// Bumped on every credential write by this tab
    generation: AtomicU64,
    login_flight: InFlight,
    signup_flight: InFlight,
}

impl SessionManager {
    /// Open a tab on `storage`. The tab starts signed out until the first
    /// [`check_auth`](Self::check_auth).
    pub fn new(storage: SharedStorage, backend: Arc<dyn Backend>) -> Arc<Self> {
        let (state, _) = watch::channel(AuthStatus::signed_out());
        Arc::new(Self {
            tab: Uuid::new_v4(),
            storage,
            backend,
            state,
            generation: AtomicU64::new(0),
            login_flight: InFlight::new(),
            signup_flight: InFlight::new(),
        })
    }

    pub fn tab_id(&self) -> TabId {
        self.tab
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn status(&self) -> AuthStatus {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    /// Follow auth state changes of this tab
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.state.subscribe()
    }

    /// The stored bearer credential, if any
    pub fn token(&self) -> Option<String> {
        self.storage.get(AUTH_TOKEN_KEY)
    }

    pub fn is_logging_in(&self) -> bool {
        self.login_flight.is_busy()
    }

    /// Exchange credentials for a session.
    ///
    /// On success the credential is stored, the identity is decoded from its
    /// claims and the change is broadcast to the other tabs. A deployment that
    /// answers without a credential (cookie sessions) gets its identity from
    /// the status endpoint instead.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<LoginOutcome, ClientError> {
        validate_credentials(email, password)?;
        let _guard = self.login_flight.begin("Login")?;

        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            remember,
        };
        let response = self
            .backend
            .login(&request)
            .await
            .map_err(ClientError::into_auth)?;

        let identity = match response.token.as_deref() {
            Some(token) => self.store_credential(token)?,
            None => {
                debug!("Login answered without a credential, asking the backend who we are");
                self.check_auth().await.identity
            }
        };

        info!(
            email = %request.email,
            role = ?identity.as_ref().map(|i| i.role),
            "Logged in"
        );

        Ok(LoginOutcome {
            message: response.message,
            identity,
        })
    }

    fn store_credential(&self, token: &str) -> Result<Option<Identity>, ClientError> {
        let claims = match decode_claims(token) {
            Ok(claims) => Some(claims),
            Err(err) => {
                warn!(error = %err, "Could not decode the new credential's claims");
                None
            }
        };

        let role_op = match claims.as_ref().and_then(|c| c.claimed_role()) {
            Some(role) => StorageOp::set(USER_ROLE_KEY, role.as_str()),
            // Never let a previous account's role leak into this one
            None => StorageOp::remove(USER_ROLE_KEY),
        };
        self.storage
            .apply(&[StorageOp::set(AUTH_TOKEN_KEY, token), role_op])?;
        self.bump_generation();

        let identity = claims.map(|c| c.identity(None));
        self.set_status(match &identity {
            Some(identity) => AuthStatus::signed_in(identity.clone()),
            None => AuthStatus::signed_out(),
        });
        self.broadcast_change();

        Ok(identity)
    }

    /// Register a new account. Does not sign in.
    pub async fn signup(&self, form: &SignupForm) -> Result<String, ClientError> {
        let request = validate_signup(form)?;
        let _guard = self.signup_flight.begin("Signup")?;

        let response = self.backend.signup(&request).await?;
        info!(email = %request.email, role = %request.role, "Account created");

        Ok(if response.message.is_empty() {
            "Your account has been created successfully".to_string()
        } else {
            response.message
        })
    }

    /// Resolve the current authentication verdict.
    ///
    /// Asks the backend first. If that fails for any reason the stored
    /// credential is decoded locally: an expired one is purged, a valid one
    /// yields its identity. Never fails; the worst case is "signed out".
    ///
    /// A verdict that was overtaken while the backend was answering (a
    /// login or logout finished in the meantime, or another tab replaced the
    /// credential) is dropped and the current state is returned instead.
    pub async fn check_auth(&self) -> AuthStatus {
        let generation = self.generation.load(Ordering::Acquire);
        let token = self.token();

        let answer = self.backend.auth_status(token.as_deref()).await;

        if self.generation.load(Ordering::Acquire) != generation || self.token() != token {
            debug!("Credential changed during the auth check, keeping the newer state");
            return self.status();
        }

        let status = match answer {
            Ok(status) if !status.authenticated => AuthStatus::signed_out(),
            Ok(AuthStatus {
                identity: Some(identity),
                ..
            }) => AuthStatus::signed_in(identity),
            Ok(_) => {
                debug!("Backend reported a session without a user record, using credential claims");
                self.status_from_credential()
            }
            Err(err) => {
                warn!(error = %err, "Auth status check failed, falling back to stored credential");
                self.status_from_credential()
            }
        };

        self.set_status(status.clone());
        status
    }

    /// Verdict from the credential as it is stored right now
    fn status_from_credential(&self) -> AuthStatus {
        let Some(token) = self.token() else {
            return AuthStatus::signed_out();
        };

        let claims = match decode_claims(&token) {
            Ok(claims) => claims,
            Err(err) => {
                warn!(error = %err, "Stored credential is unreadable, treating as signed out");
                return AuthStatus::signed_out();
            }
        };

        if claims.is_expired() {
            info!(user_id = claims.user_id, "Stored credential expired, logging out");
            self.purge_expired(&token);
            return AuthStatus::signed_out();
        }

        let cached_role = self.storage.get(USER_ROLE_KEY);
        AuthStatus::signed_in(claims.identity(cached_role.as_deref()))
    }

    /// Sign out.
    ///
    /// Local state is cleared and broadcast before the backend is told, and
    /// stays cleared whatever the backend says. A backend (or storage) failure
    /// is still returned so the caller can warn about it.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let token = self.token();

        let cleared = self.clear_credential();
        self.bump_generation();
        if let Err(err) = &cleared {
            warn!(error = %err, "Failed to clear stored credential");
        }
        self.set_status(AuthStatus::signed_out());
        self.broadcast_change();
        info!("Logged out");

        let remote = self.backend.logout(token.as_deref()).await;
        if let Err(err) = &remote {
            warn!(error = %err, "Backend logout failed; local session already cleared");
        }

        cleared.and(remote)
    }

    fn clear_credential(&self) -> Result<(), ClientError> {
        self.storage.apply(&[
            StorageOp::remove(AUTH_TOKEN_KEY),
            StorageOp::remove(USER_ROLE_KEY),
        ])
    }

    /// Remove `expired`, unless a newer credential has replaced it
    fn purge_expired(&self, expired: &str) {
        if self.token().as_deref() != Some(expired) {
            debug!("Expired credential already replaced, nothing to purge");
            return;
        }
        if let Err(err) = self.clear_credential() {
            warn!(error = %err, "Failed to purge expired credential");
        }
        self.bump_generation();
        self.broadcast_change();
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn set_status(&self, status: AuthStatus) {
        // send_replace never fails, even with nobody watching
        self.state.send_replace(status);
    }

    /// Announce a credential change to the other tabs
    pub fn broadcast_change(&self) {
        self.storage.notify(self.tab, AUTH_TOKEN_KEY);
    }

    /// Re-check auth whenever another tab changes the credential.
    ///
    /// The task holds only a weak reference and ends once this tab is dropped
    /// or the storage bus closes.
    pub fn watch_changes(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.storage.subscribe();
        let session = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Missed storage events, resynchronizing");
                        None
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(manager) = session.upgrade() else {
                    break;
                };

                if let Some(event) = event {
                    if event.key != AUTH_TOKEN_KEY || event.origin == manager.tab {
                        continue;
                    }
                }

                debug!(tab = %manager.tab, "Credential changed in another tab, re-checking auth");
                manager.check_auth().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::testing::{credential_for, identity, FakeBackend};
    use std::time::Duration;

    fn tab(storage: &SharedStorage, backend: &Arc<FakeBackend>) -> Arc<SessionManager> {
        SessionManager::new(storage.clone(), backend.clone())
    }

    fn setup() -> (SharedStorage, Arc<FakeBackend>, Arc<SessionManager>) {
        let storage = SharedStorage::in_memory();
        let backend = Arc::new(FakeBackend::new());
        backend.add_user(&identity(7, Role::Ngo), "secret1");
        backend.add_user(&identity(2, Role::Farmer), "secret2");
        let session = tab(&storage, &backend);
        (storage, backend, session)
    }

    async fn wait_for(rx: &mut watch::Receiver<AuthStatus>, authenticated: bool) {
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|status| status.authenticated == authenticated),
        )
        .await
        .expect("tab did not resynchronize in time")
        .unwrap();
    }

    #[tokio::test]
    async fn test_login_then_check_auth_reports_claimed_role() {
        let (storage, _backend, session) = setup();

        let outcome = session
            .login("user7@example.org", "secret1", false)
            .await
            .unwrap();
        assert_eq!(outcome.identity.as_ref().map(|i| i.role), Some(Role::Ngo));
        assert_eq!(storage.get(USER_ROLE_KEY).as_deref(), Some("NGO"));
        assert!(storage.get(AUTH_TOKEN_KEY).is_some());

        let status = session.check_auth().await;
        assert!(status.authenticated);
        assert_eq!(status.role(), Some(Role::Ngo));
        assert_eq!(status.identity.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_login_with_bad_password_is_auth_error() {
        let (storage, _backend, session) = setup();

        let err = session
            .login("user7@example.org", "wrong", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth(ref m) if m == "Invalid email or password"));
        assert!(storage.get(AUTH_TOKEN_KEY).is_none());
        assert!(!session.is_authenticated());
        assert!(!session.is_logging_in());
    }

    #[tokio::test]
    async fn test_login_unreachable_backend_is_network_error() {
        let (_storage, backend, session) = setup();
        backend.set_offline(true);

        let err = session
            .login("user7@example.org", "secret1", true)
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_login_validates_before_network() {
        let (_storage, backend, session) = setup();

        let err = session.login("not-an-email", "", false).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
        assert_eq!(backend.calls("login"), 0);
    }

    #[tokio::test]
    async fn test_login_without_credential_asks_backend() {
        let (storage, backend, session) = setup();
        backend.set_login_without_token(true);

        let outcome = session
            .login("user2@example.org", "secret2", false)
            .await
            .unwrap();
        // No credential and no cookie session in the fake: nothing to derive
        assert!(outcome.identity.is_none());
        assert!(storage.get(AUTH_TOKEN_KEY).is_none());
        assert_eq!(backend.calls("auth_status"), 1);
    }

    #[tokio::test]
    async fn test_check_auth_falls_back_to_claims_when_offline() {
        let (storage, backend, session) = setup();
        session
            .login("user2@example.org", "secret2", false)
            .await
            .unwrap();

        backend.set_offline(true);
        let status = session.check_auth().await;
        assert!(status.authenticated);
        assert_eq!(status.role(), Some(Role::Farmer));
        assert!(storage.get(AUTH_TOKEN_KEY).is_some());
    }

    #[tokio::test]
    async fn test_fallback_prefers_cached_role() {
        let (storage, backend, session) = setup();
        let token = credential_for(&identity(9, Role::Farmer), 3600);
        storage
            .apply(&[
                StorageOp::set(AUTH_TOKEN_KEY, token),
                StorageOp::set(USER_ROLE_KEY, "Retailer"),
            ])
            .unwrap();

        backend.set_offline(true);
        assert_eq!(session.check_auth().await.role(), Some(Role::Retailer));
    }

    #[tokio::test]
    async fn test_expired_credential_is_purged_in_fallback() {
        let (storage, backend, session) = setup();
        let expired = credential_for(&identity(7, Role::Ngo), -60);
        storage
            .apply(&[
                StorageOp::set(AUTH_TOKEN_KEY, expired),
                StorageOp::set(USER_ROLE_KEY, "NGO"),
            ])
            .unwrap();

        backend.set_offline(true);
        let status = session.check_auth().await;
        assert!(!status.authenticated);
        assert!(status.identity.is_none());
        assert!(storage.get(AUTH_TOKEN_KEY).is_none());
        assert!(storage.get(USER_ROLE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_unreadable_credential_degrades_to_signed_out() {
        let (storage, backend, session) = setup();
        storage
            .apply(&[StorageOp::set(AUTH_TOKEN_KEY, "garbage")])
            .unwrap();

        backend.set_offline(true);
        let status = session.check_auth().await;
        assert!(!status.authenticated);
    }

    #[tokio::test]
    async fn test_backend_verdict_wins_over_local_credential() {
        let (storage, _backend, session) = setup();
        // Valid-looking credential the backend has never issued
        let token = credential_for(&identity(7, Role::Ngo), 3600);
        storage.apply(&[StorageOp::set(AUTH_TOKEN_KEY, token)]).unwrap();

        assert!(!session.check_auth().await.authenticated);
    }

    #[tokio::test]
    async fn test_logout_clears_local_state_even_when_backend_fails() {
        let (storage, backend, session) = setup();
        session
            .login("user7@example.org", "secret1", false)
            .await
            .unwrap();

        backend.set_fail_logout(true);
        let result = session.logout().await;
        assert!(matches!(result, Err(ClientError::Api { status: 500, .. })));
        assert!(!session.is_authenticated());
        assert!(storage.get(AUTH_TOKEN_KEY).is_none());
        assert!(storage.get(USER_ROLE_KEY).is_none());

        // Even with the status endpoint down, nothing brings the session back
        backend.set_offline(true);
        assert!(!session.check_auth().await.authenticated);
    }

    #[tokio::test]
    async fn test_slow_status_check_does_not_undo_logout() {
        let (storage, backend, session) = setup();
        session
            .login("user7@example.org", "secret1", false)
            .await
            .unwrap();

        backend.set_offline(true);
        backend.set_status_delay(Duration::from_millis(100));
        let check = tokio::spawn({
            let session = session.clone();
            async move { session.check_auth().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Backend unreachable, local sign-out still happens
        assert!(session.logout().await.is_err());
        let status = check.await.unwrap();

        assert!(!status.authenticated);
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert!(storage.get(AUTH_TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn test_slow_status_check_does_not_undo_login() {
        let (storage, backend, session) = setup();
        backend.set_status_delay(Duration::from_millis(100));
        let check = tokio::spawn({
            let session = session.clone();
            async move { session.check_auth().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        session
            .login("user2@example.org", "secret2", false)
            .await
            .unwrap();
        let status = check.await.unwrap();

        assert!(status.authenticated);
        assert_eq!(session.status().role(), Some(Role::Farmer));
        assert!(storage.get(AUTH_TOKEN_KEY).is_some());
    }

    #[tokio::test]
    async fn test_expiry_purge_spares_credential_written_by_another_tab() {
        let (storage, backend, tab_a) = setup();
        let tab_b = tab(&storage, &backend);
        let expired = credential_for(&identity(7, Role::Ngo), -60);
        storage
            .apply(&[
                StorageOp::set(AUTH_TOKEN_KEY, expired),
                StorageOp::set(USER_ROLE_KEY, "NGO"),
            ])
            .unwrap();

        backend.set_status_delay(Duration::from_millis(100));
        let check = tokio::spawn({
            let tab_a = tab_a.clone();
            async move { tab_a.check_auth().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tab_b
            .login("user2@example.org", "secret2", false)
            .await
            .unwrap();
        let fresh = storage.get(AUTH_TOKEN_KEY);
        // Status endpoint goes down before the pending check reaches it
        backend.set_offline(true);
        check.await.unwrap();

        assert!(fresh.is_some());
        assert_eq!(storage.get(AUTH_TOKEN_KEY), fresh);
        assert_eq!(storage.get(USER_ROLE_KEY).as_deref(), Some("Farmer"));
        assert_eq!(tab_a.check_auth().await.role(), Some(Role::Farmer));
    }

    #[tokio::test]
    async fn test_logout_in_one_tab_signs_out_the_other() {
        let (storage, backend, tab_a) = setup();
        let tab_b = tab(&storage, &backend);
        let _watcher = tab_b.watch_changes();
        let mut b_state = tab_b.subscribe();

        tab_a
            .login("user7@example.org", "secret1", false)
            .await
            .unwrap();
        wait_for(&mut b_state, true).await;
        assert_eq!(tab_b.identity().map(|i| i.id), Some(7));

        tokio_test::assert_ok!(tab_a.logout().await);
        wait_for(&mut b_state, false).await;
        assert!(tab_b.identity().is_none());
    }

    #[tokio::test]
    async fn test_tab_ignores_its_own_broadcasts() {
        let (_storage, backend, session) = setup();
        let _watcher = session.watch_changes();

        session
            .login("user7@example.org", "secret1", false)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(backend.calls("auth_status"), 0);
    }

    #[tokio::test]
    async fn test_watcher_ends_when_tab_dropped() {
        let (storage, backend, session) = setup();
        let watcher = session.watch_changes();
        drop(session);

        let other = tab(&storage, &backend);
        other.broadcast_change();

        tokio::time::timeout(Duration::from_secs(2), watcher)
            .await
            .expect("watcher kept running after its tab was dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn test_signup_validates_and_registers() {
        let (storage, backend, session) = setup();
        let form = SignupForm {
            username: "Green Farms".to_string(),
            email: "green@example.org".to_string(),
            password: "harvest".to_string(),
            confirm_password: "harvest".to_string(),
            role: Some(Role::Farmer),
        };

        let message = session.signup(&form).await.unwrap();
        assert_eq!(message, "User created successfully");
        assert!(storage.get(AUTH_TOKEN_KEY).is_none());

        let bad = SignupForm {
            confirm_password: "other".to_string(),
            ..form
        };
        assert!(matches!(
            session.signup(&bad).await,
            Err(ClientError::Validation { .. })
        ));
        assert_eq!(backend.calls("signup"), 1);
    }
}
