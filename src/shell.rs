//!
//! castify application shell
//! --------------------------
//! Top-level owner of the current location. It wires the session store, the route
//! guard and the API client's invalidation signals together:
//! - `boot` plays the page-load sequence (store init, possible hard redirect).
//! - `navigate` runs protected routes through the guard and remembers the denied
//!   location as the pending navigation target.
//! - `sign_in` logs in and returns the user to the pending target (consuming it) or home.
//! - `handle_invalidations` reacts to 401 signals with one hard redirect to sign-in.
//!
//! Actual navigation effects are delegated to a `Navigator`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::api::SessionInvalidated;
use crate::error::{AuthResult, SESSION_EXPIRED_MESSAGE};
use crate::guard::{GuardDecision, RouteGuard};
use crate::routes::{is_unauthenticated_view, Location, Navigation, NavigationKind, PendingNavigation, Route, HOME_PATH};
use crate::session_store::SessionStore;

/// Performs navigations decided by the shell.
pub trait Navigator: Send + Sync {
    fn navigate(&self, nav: &Navigation);
}

/// Navigator that only logs; the shell's own location is the source of truth.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, nav: &Navigation) {
        match nav.kind {
            NavigationKind::Hard => info!(target: "shell", "reload -> {}", nav.to),
            NavigationKind::Replace => info!(target: "shell", "navigate -> {}", nav.to),
        }
    }
}

/// What the shell shows for the current location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Loading,
    Render(Route),
}

pub struct AppShell {
    store: Arc<SessionStore>,
    guard: RouteGuard,
    navigator: Arc<dyn Navigator>,
    location: Mutex<Location>,
    pending: Mutex<Option<PendingNavigation>>,
    signals: Mutex<broadcast::Receiver<SessionInvalidated>>,
    notices: Mutex<Vec<String>>,
}

impl AppShell {
    pub fn new(store: Arc<SessionStore>, navigator: Arc<dyn Navigator>, start: &str) -> Self {
        let signals = Mutex::new(store.api().subscribe());
        Self {
            guard: RouteGuard::new(store.clone()),
            store,
            navigator,
            location: Mutex::new(Location::parse(start)),
            pending: Mutex::new(None),
            signals,
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> { &self.store }

    pub fn location(&self) -> Location { self.location.lock().clone() }

    pub fn pending(&self) -> Option<PendingNavigation> { self.pending.lock().clone() }

    /// User-facing notices accumulated since the last call.
    pub fn take_notices(&self) -> Vec<String> { std::mem::take(&mut *self.notices.lock()) }

    /// Page load: initialize the session for the current location, then render it.
    pub fn boot(&self) -> View {
        self.store.reset();
        let current = self.location();
        if let Some(nav) = self.store.init(&current.path) {
            self.apply(nav);
        }
        let now = self.location();
        self.navigate(&now.to_string())
    }

    pub fn navigate(&self, raw: &str) -> View {
        let requested = Location::parse(raw);
        let route = requested.route();
        if !route.is_protected() {
            *self.location.lock() = requested;
            return View::Render(route);
        }
        match self.guard.evaluate(&requested) {
            GuardDecision::Loading => {
                *self.location.lock() = requested;
                View::Loading
            }
            GuardDecision::Admit => {
                *self.location.lock() = requested;
                View::Render(route)
            }
            GuardDecision::Redirect(nav) => {
                self.apply(nav);
                View::Render(self.location().route())
            }
        }
    }

    /// Log in, then go back to where the guard stopped the user (or home).
    /// Invalidations queued before this point belong to the old session and are dropped.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<View> {
        let stale = self.discard_invalidations();
        if stale > 0 {
            debug!(target: "shell", "dropped {} invalidation signals from before sign-in", stale);
        }
        self.store.login(email, password).await?;
        let pending = self.pending.lock().take();
        if let Some(state) = pending.as_ref().and_then(|p| p.state.as_ref()) {
            debug!(target: "shell", "returning to pending target ({})", state);
        }
        let target = pending.map(|p| p.location).unwrap_or_else(|| Location::parse(HOME_PATH));
        self.apply(Navigation::replace(target.clone()));
        Ok(self.navigate(&target.to_string()))
    }

    pub fn sign_out(&self) -> View {
        let current = self.location();
        self.pending.lock().take();
        if let Some(nav) = self.store.logout(&current.path) {
            self.apply(nav);
        }
        View::Render(self.location().route())
    }

    /// Drain pending invalidation signals. Returns how many redirects were performed;
    /// signals arriving while already on an unauthenticated view cause none.
    pub fn handle_invalidations(&self) -> usize {
        let mut redirects = 0;
        loop {
            let next = self.signals.lock().try_recv();
            match next {
                Ok(sig) => {
                    if self.on_invalidated(sig.token.as_deref(), sig.message.as_deref()) { redirects += 1; }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(target: "shell", "missed {} invalidation signals", missed);
                    if self.on_invalidated(None, None) { redirects += 1; }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        redirects
    }

    fn discard_invalidations(&self) -> usize {
        let mut rx = self.signals.lock();
        let mut dropped = 0;
        loop {
            match rx.try_recv() {
                Ok(_) => dropped += 1,
                Err(TryRecvError::Lagged(missed)) => dropped += missed as usize,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        dropped
    }

    /// `rejected` is the bearer the failing request carried, when known.
    fn on_invalidated(&self, rejected: Option<&str>, server_message: Option<&str>) -> bool {
        if let (Some(current), Some(rejected)) = (self.store.current(), rejected) {
            if current.token != rejected {
                debug!(target: "shell", "ignoring invalidation of a token no longer in use");
                return false;
            }
        }
        self.store.invalidate();
        let current = self.location();
        if is_unauthenticated_view(&current.path) {
            debug!(target: "shell", "invalidation while on {}; no redirect", current.path);
            return false;
        }
        warn!(target: "shell", "{} (server: {})", SESSION_EXPIRED_MESSAGE, server_message.unwrap_or("-"));
        self.notices.lock().push(SESSION_EXPIRED_MESSAGE.to_string());
        self.apply(Navigation::hard_to_sign_in());
        true
    }

    fn apply(&self, nav: Navigation) {
        if let Some(from) = nav.from.clone() {
            *self.pending.lock() = Some(from);
        }
        *self.location.lock() = nav.to.clone();
        self.navigator.navigate(&nav);
        if nav.kind == NavigationKind::Hard {
            // a reload drops router state and re-reads the session from storage
            self.pending.lock().take();
            self.store.reset();
            if let Some(next) = self.store.init(&nav.to.path) {
                self.apply(next);
            }
        }
    }
}
