//! Authentication session lifecycle.
//!
//! `SessionManager` is the single owner of session state. It is an
//! explicitly injected object (no globals): the composition root
//! builds one, the presentation layer watches its snapshots to pick a
//! navigation graph, and every mutation goes through its operations.
//!
//! Invariant: `is_authenticated == (token.is_some() && user.is_some())`.
//! Snapshots are only built through the constructors below, so no
//! reachable state can violate it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use swwap_shared::{AuthResponse, ClientError, UserPatch, UserRecord};

use crate::expiry::ExpiryEvents;
use crate::storage::{CredentialStore, AUTH_TOKEN_KEY, USER_DATA_KEY};

/// Immutable snapshot of the session state.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub is_authenticated: bool,
    pub token: Option<String>,
    pub user: Option<UserRecord>,
    /// True only during initial hydration; never returns to true.
    pub is_loading: bool,
}

impl Session {
    fn hydrating() -> Self {
        Self {
            is_authenticated: false,
            token: None,
            user: None,
            is_loading: true,
        }
    }

    fn logged_out() -> Self {
        Self {
            is_authenticated: false,
            token: None,
            user: None,
            is_loading: false,
        }
    }

    fn authenticated(token: String, user: UserRecord) -> Self {
        Self {
            is_authenticated: true,
            token: Some(token),
            user: Some(user),
            is_loading: false,
        }
    }
}

/// Server-side sign-out hook, implemented by the auth gateway.
/// A trait seam so the session manager stays free of HTTP concerns.
#[async_trait]
pub trait RemoteSignOut: Send + Sync {
    async fn sign_out(&self) -> Result<(), ClientError>;
}

/// Owns session state, keeps it in sync with the credential store, and
/// serializes every mutating operation through one internal lock
/// (overlapping login/logout calls queue instead of racing).
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    remote: Option<Arc<dyn RemoteSignOut>>,
    state: watch::Sender<Session>,
    op_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(Session::hydrating());
        Self {
            store,
            remote: None,
            state,
            op_lock: Mutex::new(()),
        }
    }

    /// Attach the server-side logout hook.
    pub fn with_remote_sign_out(mut self, remote: Arc<dyn RemoteSignOut>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Current state; cheap to call.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Watch session transitions (the presentation layer re-renders on
    /// changes).
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Load persisted credentials once at startup.
    ///
    /// Both keys are read concurrently. A partial record (token without
    /// user or vice versa), an unreadable store, or an unparseable user
    /// all resolve to logged-out; `is_loading` always ends up false.
    /// Calling again after hydration is a no-op.
    pub async fn hydrate(&self) {
        let _guard = self.op_lock.lock().await;
        if !self.state.borrow().is_loading {
            return;
        }

        let (token, user_json) = tokio::join!(
            self.store.get(AUTH_TOKEN_KEY),
            self.store.get(USER_DATA_KEY)
        );

        let next = match (token, user_json) {
            (Ok(Some(token)), Ok(Some(json))) => match serde_json::from_str::<UserRecord>(&json) {
                Ok(user) => {
                    info!("restored session for user {}", user.id);
                    Session::authenticated(token, user)
                }
                Err(e) => {
                    warn!("stored user record is unreadable, starting logged out: {e}");
                    Session::logged_out()
                }
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!("credential store unavailable, starting logged out: {e}");
                Session::logged_out()
            }
            _ => {
                debug!("no stored session");
                Session::logged_out()
            }
        };
        self.state.send_replace(next);
    }

    /// Persist a successful auth response and switch to authenticated.
    ///
    /// Both keys are written concurrently; in-memory state flips only
    /// after both succeed. On any write failure the partial record is
    /// cleared best-effort, the session stays logged out, and the
    /// storage error is returned.
    pub async fn login(&self, response: AuthResponse) -> Result<(), ClientError> {
        let _guard = self.op_lock.lock().await;

        let user_json = serde_json::to_string(&response.user)
            .map_err(|e| ClientError::Storage(format!("cannot serialize user: {e}")))?;

        let (wrote_token, wrote_user) = tokio::join!(
            self.store.set(AUTH_TOKEN_KEY, &response.token),
            self.store.set(USER_DATA_KEY, &user_json)
        );
        if let Err(e) = wrote_token.and(wrote_user) {
            warn!("persisting credentials failed, rolling back: {e}");
            let _ = tokio::join!(
                self.store.remove(AUTH_TOKEN_KEY),
                self.store.remove(USER_DATA_KEY)
            );
            return Err(e);
        }

        info!("session established for user {}", response.user.id);
        self.state
            .send_replace(Session::authenticated(response.token, response.user));
        Ok(())
    }

    /// Sign out: best-effort server-side logout, then unconditionally
    /// clear both persisted keys and reset in-memory state. A stuck
    /// authenticated state with a dead token is worse than a premature
    /// local logout, so local clearing happens regardless; the first
    /// failure is re-raised afterwards for observability.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let _guard = self.op_lock.lock().await;

        let remote = match &self.remote {
            Some(remote) => remote.sign_out().await,
            None => Ok(()),
        };
        if let Err(e) = &remote {
            warn!("server-side logout failed: {e}");
        }

        let (removed_token, removed_user) = tokio::join!(
            self.store.remove(AUTH_TOKEN_KEY),
            self.store.remove(USER_DATA_KEY)
        );

        self.state.send_replace(Session::logged_out());
        info!("session cleared");

        remote.and(removed_token).and(removed_user)
    }

    /// Merge a partial update into the user record and persist it. The
    /// token is untouched and the auth state does not change.
    pub async fn update_user(&self, patch: UserPatch) -> Result<(), ClientError> {
        let _guard = self.op_lock.lock().await;

        let current = self.state.borrow().clone();
        let (Some(token), Some(mut user)) = (current.token, current.user) else {
            return Err(ClientError::AuthRequired);
        };

        user.apply(patch);
        let user_json = serde_json::to_string(&user)
            .map_err(|e| ClientError::Storage(format!("cannot serialize user: {e}")))?;
        self.store.set(USER_DATA_KEY, &user_json).await?;

        self.state.send_replace(Session::authenticated(token, user));
        Ok(())
    }

    /// Spawn the single consumer of session-expiry events.
    ///
    /// Each event forces a logout through the same operation lock as
    /// everything else, so rapid-fire expiry events serialize and a
    /// logout while already logged out is a harmless no-op.
    pub fn watch_expiry(self: &Arc<Self>, mut events: ExpiryEvents) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while events.recv().await.is_some() {
                if !manager.snapshot().is_authenticated {
                    debug!("expiry event while logged out, ignoring");
                    continue;
                }
                info!("credentials rejected by server, forcing logout");
                if let Err(e) = manager.logout().await {
                    warn!("forced logout cleanup failed: {e}");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_user() -> UserRecord {
        UserRecord {
            id: "1".into(),
            email: "a@b.com".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            email_verified: true,
        }
    }

    fn auth_response(token: &str) -> AuthResponse {
        AuthResponse {
            token: token.into(),
            user: test_user(),
        }
    }

    fn assert_invariant(session: &Session) {
        assert_eq!(
            session.is_authenticated,
            session.token.is_some() && session.user.is_some()
        );
    }

    #[tokio::test]
    async fn hydrate_with_empty_store_is_logged_out() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        assert!(manager.snapshot().is_loading);

        manager.hydrate().await;

        let session = manager.snapshot();
        assert!(!session.is_authenticated);
        assert!(!session.is_loading);
        assert_invariant(&session);
    }

    #[tokio::test]
    async fn hydrate_restores_stored_credentials() {
        let store = Arc::new(MemoryStore::new());
        store.set(AUTH_TOKEN_KEY, "t1").await.unwrap();
        store
            .set(USER_DATA_KEY, &serde_json::to_string(&test_user()).unwrap())
            .await
            .unwrap();

        let manager = SessionManager::new(store);
        manager.hydrate().await;

        let session = manager.snapshot();
        assert!(session.is_authenticated);
        assert_eq!(session.token.as_deref(), Some("t1"));
        assert_eq!(session.user.unwrap().email, "a@b.com");
        assert!(!session.is_loading);
    }

    #[tokio::test]
    async fn partial_record_hydrates_logged_out() {
        let store = Arc::new(MemoryStore::new());
        store.set(AUTH_TOKEN_KEY, "orphan-token").await.unwrap();

        let manager = SessionManager::new(store);
        manager.hydrate().await;

        let session = manager.snapshot();
        assert!(!session.is_authenticated);
        assert_invariant(&session);
    }

    #[tokio::test]
    async fn hydrate_survives_storage_failure() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next();

        let manager = SessionManager::new(store);
        manager.hydrate().await;

        let session = manager.snapshot();
        assert!(!session.is_authenticated);
        assert!(!session.is_loading);
    }

    #[tokio::test]
    async fn hydrate_twice_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.set(AUTH_TOKEN_KEY, "t1").await.unwrap();
        store
            .set(USER_DATA_KEY, &serde_json::to_string(&test_user()).unwrap())
            .await
            .unwrap();

        let manager = SessionManager::new(store.clone());
        manager.hydrate().await;
        let first = manager.snapshot();

        // Store mutations after hydration do not re-trigger loading.
        store.remove(AUTH_TOKEN_KEY).await.unwrap();
        manager.hydrate().await;
        assert_eq!(manager.snapshot(), first);
    }

    #[tokio::test]
    async fn login_persists_and_authenticates() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone());
        manager.hydrate().await;

        manager.login(auth_response("t1")).await.unwrap();

        let session = manager.snapshot();
        assert!(session.is_authenticated);
        assert_eq!(session.token.as_deref(), Some("t1"));
        assert_invariant(&session);
        assert_eq!(
            store.get(AUTH_TOKEN_KEY).await.unwrap(),
            Some("t1".to_string())
        );
        assert!(store.get(USER_DATA_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn login_round_trips_through_restart() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone());
        manager.hydrate().await;
        manager.login(auth_response("t1")).await.unwrap();
        let before = manager.snapshot();

        // Fresh manager over the same store simulates an app restart.
        let restarted = SessionManager::new(store);
        restarted.hydrate().await;
        assert_eq!(restarted.snapshot(), before);
    }

    #[tokio::test]
    async fn failed_login_write_leaves_no_partial_record() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone());
        manager.hydrate().await;

        store.fail_next();
        let err = manager.login(auth_response("t1")).await.unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));

        let session = manager.snapshot();
        assert!(!session.is_authenticated);
        assert_invariant(&session);
        // Rollback removed whichever key the concurrent write landed.
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get(USER_DATA_KEY).await.unwrap(), None);
    }

    struct FailingSignOut(AtomicUsize);

    #[async_trait]
    impl RemoteSignOut for FailingSignOut {
        async fn sign_out(&self) -> Result<(), ClientError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::unreachable())
        }
    }

    #[tokio::test]
    async fn logout_clears_local_state_even_when_remote_fails() {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(FailingSignOut(AtomicUsize::new(0)));
        let manager =
            SessionManager::new(store.clone()).with_remote_sign_out(remote.clone());
        manager.hydrate().await;
        manager.login(auth_response("t1")).await.unwrap();

        let err = manager.logout().await.unwrap_err();
        assert_eq!(err, ClientError::unreachable());

        let session = manager.snapshot();
        assert!(!session.is_authenticated);
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get(USER_DATA_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_user_merges_and_persists_without_touching_token() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone());
        manager.hydrate().await;
        manager.login(auth_response("t1")).await.unwrap();

        manager
            .update_user(UserPatch {
                last_name: Some("Lovelace".into()),
                ..UserPatch::default()
            })
            .await
            .unwrap();

        let session = manager.snapshot();
        assert_eq!(session.token.as_deref(), Some("t1"));
        let user = session.user.unwrap();
        assert_eq!(user.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(user.first_name.as_deref(), Some("Ada"));

        let persisted: UserRecord =
            serde_json::from_str(&store.get(USER_DATA_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted.last_name.as_deref(), Some("Lovelace"));
    }

    #[tokio::test]
    async fn update_user_requires_authentication() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        manager.hydrate().await;
        assert_eq!(
            manager.update_user(UserPatch::default()).await.unwrap_err(),
            ClientError::AuthRequired
        );
    }

    struct CountingSignOut(AtomicUsize);

    #[async_trait]
    impl RemoteSignOut for CountingSignOut {
        async fn sign_out(&self) -> Result<(), ClientError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn rapid_expiry_events_log_out_once() {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(CountingSignOut(AtomicUsize::new(0)));
        let manager = Arc::new(
            SessionManager::new(store.clone()).with_remote_sign_out(remote.clone()),
        );
        manager.hydrate().await;
        manager.login(auth_response("t1")).await.unwrap();

        let (publisher, events) = expiry::channel();
        let handle = manager.watch_expiry(events);

        publisher.publish();
        publisher.publish();
        publisher.publish();
        drop(publisher);
        handle.await.unwrap();

        assert!(!manager.snapshot().is_authenticated);
        // Events after the first found the session already cleared.
        assert_eq!(remote.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expiry_while_logged_out_is_a_no_op() {
        let remote = Arc::new(CountingSignOut(AtomicUsize::new(0)));
        let manager = Arc::new(
            SessionManager::new(Arc::new(MemoryStore::new()))
                .with_remote_sign_out(remote.clone()),
        );
        manager.hydrate().await;

        let (publisher, events) = expiry::channel();
        let handle = manager.watch_expiry(events);
        publisher.publish();
        drop(publisher);
        handle.await.unwrap();

        assert_eq!(remote.0.load(Ordering::SeqCst), 0);
    }
}
