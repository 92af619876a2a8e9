//!
//! castify session store
//! ----------------------
//! Single source of truth for "who is signed in". The store owns the in-memory
//! `SessionState` and is the only writer of persisted session keys, apart from the
//! API client clearing them on a 401.
//!
//! Lifecycle:
//! - `Unknown` until `init` reads persisted storage.
//! - `init` → `Authenticated` when all three persisted markers agree, otherwise
//!   `Unauthenticated` (partial state is wiped).
//! - `login` is the only way from `Unauthenticated` to `Authenticated`.
//! - `logout` and `invalidate` move `Authenticated` → `Unauthenticated`.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{AuthError, AuthResult};
use crate::identity::session::{clear_persisted, read_persisted, write_persisted};
use crate::identity::{LoginRequest, PersistedState, Session, SessionState};
use crate::routes::{is_unauthenticated_view, Navigation};
use crate::storage::SharedStorage;

pub struct SessionStore {
    storage: SharedStorage,
    api: Arc<ApiClient>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// The store shares the API client's storage so both see the same session keys.
    pub fn new(api: Arc<ApiClient>) -> Self {
        let storage = api.storage().clone();
        Self { storage, api, state: RwLock::new(SessionState::Unknown) }
    }

    pub fn api(&self) -> &Arc<ApiClient> { &self.api }

    pub fn state(&self) -> SessionState { self.state.read().clone() }

    pub fn current(&self) -> Option<Session> { self.state.read().session().cloned() }

    pub fn is_authenticated(&self) -> bool { self.state.read().is_authenticated() }

    /// Re-enter `Unknown`, as a fresh page load would. `init` must follow.
    pub fn reset(&self) {
        *self.state.write() = SessionState::Unknown;
    }

    /// Restore from persisted storage. Returns a hard redirect to sign-in when no
    /// session could be restored and `current_path` is not an unauthenticated view.
    pub fn init(&self, current_path: &str) -> Option<Navigation> {
        match self.restore() {
            Ok(Some(session)) => {
                info!(target: "session", "restored session for user id={} role={}", session.identity.id, session.identity.role);
                *self.state.write() = SessionState::Authenticated(session);
                return None;
            }
            Ok(None) => debug!(target: "session", "no persisted session"),
            Err(e) if e.is_handled_centrally() => warn!(target: "session", "discarding persisted session [{}]: {}", e.code_str(), e),
            Err(e) => warn!(target: "session", "session storage unreadable [{}]: {}", e.code_str(), e),
        }
        self.purge_persisted();
        *self.state.write() = SessionState::Unauthenticated;
        Self::sign_in_redirect(current_path)
    }

    /// Read the persisted session without touching state or storage.
    /// `Ok(None)` means nothing is stored; partial or inconsistent keys are
    /// `CorruptPersistedState`.
    pub fn restore(&self) -> AuthResult<Option<Session>> {
        match read_persisted(self.storage.as_ref()) {
            Ok(session) => Ok(Some(session)),
            Err(PersistedState::Empty) => Ok(None),
            Err(PersistedState::Corrupt(why)) => Err(AuthError::CorruptPersistedState(why)),
            Err(PersistedState::Unreadable(e)) => Err(AuthError::Storage(e)),
        }
    }

    /// Exchange credentials for a session. State and storage change only on success;
    /// the three keys are written as one batch before memory is updated.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput("Email and password are required".into()));
        }
        let req = LoginRequest::admin(email.trim(), password);
        let resp = self.api.login(&req).await.map_err(|e| {
            warn!(target: "session", "login failed for {} (status {:?}): {}", req.email, e.status(), e);
            AuthError::from(e)
        })?;
        write_persisted(self.storage.as_ref(), &resp)?;
        let session = Session::from_login(&resp);
        *self.state.write() = SessionState::Authenticated(session.clone());
        info!(target: "session", "signed in user id={} role={}", session.identity.id, session.identity.role);
        if !session.identity.is_admin() {
            warn!(target: "session", "user id={} signed in to the admin portal with role '{}'", session.identity.id, session.identity.role);
        }
        Ok(session)
    }

    /// Drop the session everywhere. Returns a hard redirect to sign-in unless
    /// `current_path` is already an unauthenticated view.
    pub fn logout(&self, current_path: &str) -> Option<Navigation> {
        let was = self.state.read().label();
        *self.state.write() = SessionState::Unauthenticated;
        self.purge_persisted();
        info!(target: "session", "signed out (was {})", was);
        Self::sign_in_redirect(current_path)
    }

    /// Server rejected the token. Returns true if this changed the state.
    pub fn invalidate(&self) -> bool {
        let mut st = self.state.write();
        let changed = !matches!(*st, SessionState::Unauthenticated);
        *st = SessionState::Unauthenticated;
        changed
    }

    /// Whether persisted storage still describes exactly the in-memory session.
    pub fn persisted_matches(&self, session: &Session) -> bool {
        match read_persisted(self.storage.as_ref()) {
            Ok(stored) => &stored == session,
            Err(_) => false,
        }
    }

    /// Remove any persisted session keys; failures are logged, never fatal.
    pub fn purge_persisted(&self) -> usize {
        match clear_persisted(self.storage.as_ref()) {
            Ok(n) => n,
            Err(e) => {
                warn!(target: "session", "failed to clear session storage: {}", e);
                0
            }
        }
    }

    fn sign_in_redirect(current_path: &str) -> Option<Navigation> {
        if is_unauthenticated_view(current_path) { None } else { Some(Navigation::hard_to_sign_in()) }
    }
}
