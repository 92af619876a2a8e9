//!
//! castify client configuration
//! -----------------------------
//! Settings come from environment variables and may be overridden by command-line
//! flags in the binary. Unset or unparsable values fall back to defaults.
//!
//! - `CASTIFY_API_URL`            API base URL (default `http://localhost:5174/api`)
//! - `CASTIFY_SESSION_FILE`       session file path (default `.castify/session.json` under HOME)
//! - `CASTIFY_HTTP_TIMEOUT_SECS`  per-request timeout, `0` disables (default 30)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:5174/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    /// `None` keeps the session in memory only.
    pub session_file: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_file: default_session_file(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

fn default_session_file() -> Option<PathBuf> {
    let home = env::var("HOME").or_else(|_| env::var("USERPROFILE")).ok()?;
    Some(PathBuf::from(home).join(".castify").join("session.json"))
}

fn parse_string_env(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn parse_u64_env(name: &str) -> Option<u64> {
    match env::var(name) {
        Ok(val) => val.trim().parse::<u64>().ok(),
        Err(_) => None,
    }
}

impl ClientConfig {
    /// Defaults overlaid with whatever the environment provides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(url) = parse_string_env("CASTIFY_API_URL") { cfg.api_url = url; }
        if let Some(path) = parse_string_env("CASTIFY_SESSION_FILE") { cfg.session_file = Some(PathBuf::from(path)); }
        if let Some(secs) = parse_u64_env("CASTIFY_HTTP_TIMEOUT_SECS") { cfg.timeout = timeout_from_secs(secs); }
        cfg
    }

    /// Parsed base URL, always ending in `/` so relative joins append rather than replace.
    pub fn base_url(&self) -> Result<Url> {
        normalize_base_url(&self.api_url)
    }
}

pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 { None } else { Some(Duration::from_secs(secs)) }
}

pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut s = raw.trim().to_string();
    if !s.ends_with('/') { s.push('/'); }
    Url::parse(&s).with_context(|| format!("invalid API base URL '{}'", raw))
}
