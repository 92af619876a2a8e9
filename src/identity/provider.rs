use serde::{Deserialize, Serialize};

use super::principal::Identity;

/// Portal discriminator sent with every login from this client.
pub const ADMIN_PORTAL: &str = "admin";

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub portal: String,
}

impl LoginRequest {
    pub fn admin(email: &str, password: &str) -> Self {
        Self { email: email.to_string(), password: password.to_string(), portal: ADMIN_PORTAL.to_string() }
    }
}

/// Success body of `POST /auth/login`. Persisted verbatim under the `user` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

impl LoginResponse {
    /// Boundary check: serde guarantees the shape, this guarantees the content.
    pub fn validate(&self) -> Result<(), String> {
        if self.token.trim().is_empty() { return Err("login response carried an empty token".into()); }
        if !self.user.is_present() { return Err("login response carried no user id".into()); }
        Ok(())
    }
}

/// Generic error envelope; any non-2xx body may carry a `message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    /// Extract a non-empty server message from a raw body, if there is one.
    pub fn message_from(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.message)
            .filter(|m| !m.trim().is_empty())
    }
}
