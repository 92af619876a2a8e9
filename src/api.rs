//!
//! castify API client
//! -------------------
//! Thin wrapper over `reqwest` that enforces the session contract on every call:
//! - Before dispatch, the bearer token found in persisted storage (if any) is attached
//!   as `Authorization: Bearer <token>`.
//! - A 401 from any endpoint clears every persisted session key and broadcasts a
//!   `SessionInvalidated` signal; the call itself fails with `ApiError::SessionInvalidated`.
//! - Any other status passes through to the caller (`ApiError::Status` for non-2xx).
//!
//! The client never navigates and never retries. Reacting to an invalidation is the
//! shell's job (see `shell::AppShell::handle_invalidations`).

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::identity::session::{clear_persisted, persisted_token};
use crate::identity::{ErrorEnvelope, LoginRequest, LoginResponse};
use crate::storage::SharedStorage;

pub const LOGIN_PATH: &str = "auth/login";

/// Signals buffered per subscriber before the oldest are dropped.
pub const SIGNAL_CAPACITY: usize = 64;

/// Raised whenever the server rejects the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInvalidated {
    /// Endpoint that answered 401.
    pub path: String,
    /// Bearer the rejected request carried; `None` when it went out without one.
    pub token: Option<String>,
    /// Server-provided message, if the body carried one.
    pub message: Option<String>,
    /// Session keys actually removed by this invalidation; 0 when an earlier one got there first.
    pub cleared_keys: usize,
}

pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    storage: SharedStorage,
    signals: broadcast::Sender<SessionInvalidated>,
}

impl ApiClient {
    pub fn new(base: Url, storage: SharedStorage, timeout: Option<Duration>) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(t) = timeout { builder = builder.timeout(t); }
        let http = builder.build()?;
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Ok(Self { base, http, storage, signals })
    }

    pub fn from_config(cfg: &ClientConfig, storage: SharedStorage) -> anyhow::Result<Self> {
        let base = cfg.base_url()?;
        Ok(Self::new(base, storage, cfg.timeout)?)
    }

    pub fn base_url(&self) -> &Url { &self.base }

    pub fn storage(&self) -> &SharedStorage { &self.storage }

    /// Observe session invalidations raised by any call made through this client.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionInvalidated> { self.signals.subscribe() }

    pub fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Credential exchange. Bypasses bearer attachment and 401 interception: a rejected
    /// login is a credentials problem, not an expired session.
    pub async fn login(&self, req: &LoginRequest) -> ApiResult<LoginResponse> {
        let url = self.endpoint(LOGIN_PATH)?;
        debug!(target: "api", "POST {} portal={}", url, req.portal);
        let resp = self.http.post(url).json(req).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), message: ErrorEnvelope::message_from(&body) });
        }
        let parsed: LoginResponse = decode(LOGIN_PATH, &body)?;
        parsed.validate().map_err(ApiError::Decode)?;
        Ok(parsed)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let body = self.dispatch::<()>(Method::GET, path, None).await?;
        decode(path, &body)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let out = self.dispatch(Method::POST, path, Some(body)).await?;
        decode(path, &out)
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let out = self.dispatch(Method::PUT, path, Some(body)).await?;
        decode(path, &out)
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let out = self.dispatch(Method::PATCH, path, Some(body)).await?;
        decode(path, &out)
    }

    /// DELETE; any response body is ignored.
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.dispatch::<()>(Method::DELETE, path, None).await.map(|_| ())
    }

    async fn dispatch<B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let mut rb = self.http.request(method.clone(), url);
        let token = self.current_token();
        if let Some(t) = &token {
            rb = rb.bearer_auth(t);
        }
        if let Some(b) = body { rb = rb.json(b); }
        let resp = rb.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        debug!(target: "api", "{} {} -> {}", method, path, status.as_u16());
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.invalidate(path, token, &bytes));
        }
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), message: ErrorEnvelope::message_from(&bytes) });
        }
        Ok(bytes.to_vec())
    }

    fn current_token(&self) -> Option<String> {
        match persisted_token(self.storage.as_ref()) {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "api", "session storage unreadable, sending request without credentials: {}", e);
                None
            }
        }
    }

    fn invalidate(&self, path: &str, token: Option<String>, body: &[u8]) -> ApiError {
        let message = ErrorEnvelope::message_from(body);
        let cleared_keys = match clear_persisted(self.storage.as_ref()) {
            Ok(n) => n,
            Err(e) => {
                warn!(target: "api", "failed to clear session after 401: {}", e);
                0
            }
        };
        if cleared_keys > 0 {
            info!(target: "api", "401 from {}: session cleared ({} keys)", path, cleared_keys);
        } else {
            debug!(target: "api", "401 from {}: session already clear", path);
        }
        // no receivers simply means nobody is listening yet
        let _ = self.signals.send(SessionInvalidated { path: path.to_string(), token, message: message.clone(), cleared_keys });
        ApiError::SessionInvalidated { message }
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryStorage;

    fn client() -> ApiClient {
        let base = crate::config::normalize_base_url("http://localhost:5174/api").unwrap();
        ApiClient::new(base, Arc::new(MemoryStorage::new()), None).unwrap()
    }

    #[test]
    fn endpoints_resolve_under_api_prefix() {
        let c = client();
        assert_eq!(c.endpoint("auth/login").unwrap().as_str(), "http://localhost:5174/api/auth/login");
        assert_eq!(c.endpoint("/me/").unwrap().as_str(), "http://localhost:5174/api/me/");
        assert_eq!(c.endpoint("candidate/abc%201").unwrap().as_str(), "http://localhost:5174/api/candidate/abc%201");
    }

    #[test]
    fn invalidate_clears_once_and_signals_every_time() {
        let c = client();
        let mut rx = c.subscribe();
        c.storage().set_many(&[("token", "abc"), ("user", "{}"), ("isAuthenticated", "true")]).unwrap();

        let e1 = c.invalidate("me/", Some("abc".into()), br#"{"message":"token expired"}"#);
        let e2 = c.invalidate("me/", None, b"");
        assert!(e1.is_session_invalidated() && e2.is_session_invalidated());

        let s1 = rx.try_recv().unwrap();
        let s2 = rx.try_recv().unwrap();
        assert_eq!(s1.cleared_keys, 3);
        assert_eq!(s1.token.as_deref(), Some("abc"));
        assert_eq!(s2.token, None);
        assert_eq!(s1.message.as_deref(), Some("token expired"));
        assert_eq!(s2.cleared_keys, 0);
        assert_eq!(c.current_token(), None);
    }

    #[test]
    fn decode_reports_path() {
        let err = decode::<Vec<String>>("candidate", b"{}").unwrap_err();
        assert!(err.to_string().contains("candidate"));
    }
}
