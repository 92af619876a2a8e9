//! Route guard for protected views.
//!
//! The guard never renders a protected view while the session is `Unknown`, and it
//! requires all persisted markers to agree with the in-memory session before
//! admitting; a session that exists only in memory is treated as signed out.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::identity::SessionState;
use crate::routes::{Location, Navigation, PendingNavigation, SIGN_IN_PATH};
use crate::session_store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still initializing; show a placeholder, do not navigate.
    Loading,
    /// Render the protected view.
    Admit,
    /// Replace the current route with sign-in, remembering where the user was headed.
    Redirect(Navigation),
}

pub struct RouteGuard {
    store: Arc<SessionStore>,
}

impl RouteGuard {
    pub fn new(store: Arc<SessionStore>) -> Self { Self { store } }

    pub fn evaluate(&self, requested: &Location) -> GuardDecision {
        match self.store.state() {
            SessionState::Unknown => {
                debug!(target: "guard", "{} pending session init", requested);
                GuardDecision::Loading
            }
            SessionState::Authenticated(session) if self.store.persisted_matches(&session) => GuardDecision::Admit,
            SessionState::Authenticated(_) => {
                info!(target: "guard", "persisted session markers inconsistent; treating as signed out");
                self.store.invalidate();
                self.deny(requested, "inconsistent")
            }
            SessionState::Unauthenticated => self.deny(requested, "unauthenticated"),
        }
    }

    /// `reason` travels with the pending target as its navigation state.
    fn deny(&self, requested: &Location, reason: &str) -> GuardDecision {
        let removed = self.store.purge_persisted();
        if removed > 0 {
            debug!(target: "guard", "removed {} stale session keys", removed);
        }
        info!(target: "guard", "redirecting {} to {}", requested, SIGN_IN_PATH);
        let nav = Navigation::replace(Location::parse(SIGN_IN_PATH))
            .with_from(PendingNavigation::new(requested.clone()).with_state(json!({ "reason": reason })));
        GuardDecision::Redirect(nav)
    }
}
