//! Error model for the admin client.
//! `ApiError` describes what happened to one HTTP exchange; `AuthError` is the
//! session-level taxonomy surfaced to the sign-in form and the shell.

use crate::storage::StorageError;

/// Generic message shown when the login endpoint rejects without saying why.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials.";

/// Uniform user-facing notice for a rejected bearer token.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered 401; persisted session keys are already gone.
    #[error("session invalidated: {}", .message.as_deref().unwrap_or(SESSION_EXPIRED_MESSAGE))]
    SessionInvalidated { message: Option<String> },
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("request failed"))]
    Status { status: u16, message: Option<String> },
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::SessionInvalidated { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_session_invalidated(&self) -> bool { matches!(self, ApiError::SessionInvalidated { .. }) }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{}", .0.as_deref().unwrap_or(SESSION_EXPIRED_MESSAGE))]
    SessionExpiredOrInvalid(Option<String>),
    #[error("persisted session is corrupt: {0}")]
    CorruptPersistedState(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::SessionExpiredOrInvalid(_) => "session_expired",
            AuthError::CorruptPersistedState(_) => "corrupt_persisted_state",
            AuthError::Network(_) => "network_failure",
            AuthError::MalformedResponse(_) => "malformed_response",
            AuthError::Storage(_) => "storage_error",
        }
    }

    /// Authentication failures are handled centrally; everything else belongs to the caller.
    pub fn is_handled_centrally(&self) -> bool {
        matches!(self, AuthError::SessionExpiredOrInvalid(_) | AuthError::CorruptPersistedState(_))
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::SessionInvalidated { message } => AuthError::SessionExpiredOrInvalid(message),
            ApiError::Status { message, .. } => AuthError::InvalidCredentials(message.unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_string())),
            ApiError::Network(e) => AuthError::Network(e.to_string()),
            ApiError::Decode(m) => AuthError::MalformedResponse(m),
            ApiError::InvalidUrl(m) => AuthError::Network(m),
            ApiError::Storage(e) => AuthError::Storage(e),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
