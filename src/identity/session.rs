use crate::storage::{SessionStorage, StorageError, StorageResult};

use super::principal::Identity;
use super::provider::LoginResponse;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const AUTH_FLAG_KEY: &str = "isAuthenticated";
pub const AUTH_FLAG_VALUE: &str = "true";

/// Every key the session owns; written together, cleared together.
pub const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, USER_KEY, AUTH_FLAG_KEY];

pub type SessionToken = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub identity: Identity,
}

impl Session {
    pub fn from_login(resp: &LoginResponse) -> Self {
        Self { token: resp.token.clone(), identity: resp.user.clone() }
    }
}

/// In-memory session lifecycle. A fresh process starts in `Unknown`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unknown,
    Authenticated(Session),
    Unauthenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool { matches!(self, SessionState::Authenticated(_)) }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(s) => Some(s),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unknown => "unknown",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Unauthenticated => "unauthenticated",
        }
    }
}

/// Why persisted state did not yield a session.
#[derive(Debug)]
pub enum PersistedState {
    /// No session keys at all.
    Empty,
    /// Some keys present but they do not describe one consistent session.
    Corrupt(String),
    /// Storage itself failed.
    Unreadable(StorageError),
}

/// Restore a session from storage. All three markers must be present and agree:
/// a non-empty `token`, the literal `"true"` flag, and a `user` record that parses
/// as a login response carrying that same token.
pub fn read_persisted(storage: &dyn SessionStorage) -> Result<Session, PersistedState> {
    let read = |k: &str| storage.get(k).map_err(PersistedState::Unreadable);
    let token = read(TOKEN_KEY)?;
    let flag = read(AUTH_FLAG_KEY)?;
    let user = read(USER_KEY)?;

    if token.is_none() && flag.is_none() && user.is_none() {
        return Err(PersistedState::Empty);
    }
    let token = token.filter(|t| !t.is_empty()).ok_or_else(|| PersistedState::Corrupt("token missing".into()))?;
    if flag.as_deref() != Some(AUTH_FLAG_VALUE) {
        return Err(PersistedState::Corrupt("authenticated flag missing or not \"true\"".into()));
    }
    let user = user.ok_or_else(|| PersistedState::Corrupt("user record missing".into()))?;
    let resp: LoginResponse = serde_json::from_str(&user)
        .map_err(|e| PersistedState::Corrupt(format!("user record unreadable: {}", e)))?;
    if !resp.user.is_present() {
        return Err(PersistedState::Corrupt("user record has no id".into()));
    }
    if resp.token != token {
        return Err(PersistedState::Corrupt("user record token disagrees with token key".into()));
    }
    Ok(Session { token, identity: resp.user })
}

/// Persist a fresh login as one batch.
pub fn write_persisted(storage: &dyn SessionStorage, resp: &LoginResponse) -> StorageResult<()> {
    let user = serde_json::to_string(resp)?;
    storage.set_many(&[(TOKEN_KEY, resp.token.as_str()), (USER_KEY, user.as_str()), (AUTH_FLAG_KEY, AUTH_FLAG_VALUE)])
}

/// Remove every session key; returns how many were present.
pub fn clear_persisted(storage: &dyn SessionStorage) -> StorageResult<usize> {
    storage.remove_many(&SESSION_KEYS)
}

/// Bearer token as the API client sees it: whatever sits under `token`.
pub fn persisted_token(storage: &dyn SessionStorage) -> StorageResult<Option<String>> {
    Ok(storage.get(TOKEN_KEY)?.filter(|t| !t.is_empty()))
}
