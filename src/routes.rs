//! Route surface of the admin dashboard and the navigation values exchanged
//! between the session store, the guard and the shell.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub const HOME_PATH: &str = "/";
pub const SIGN_IN_PATH: &str = "/signin";
pub const FORGOT_PASSWORD_PATH: &str = "/forgot-password";
pub const SIGN_UP_PATH: &str = "/signup";

/// Views reachable without a session. Neither the store nor the API client ever
/// redirect away from these, which is what keeps redirects from looping.
pub const UNAUTHENTICATED_VIEWS: [&str; 2] = [SIGN_IN_PATH, FORGOT_PASSWORD_PATH];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Profile,
    Elections,
    ElectionResults,
    ElectionResultView { id: String },
    Candidates,
    Voters,
    SignIn,
    ForgotPassword,
    SignUp,
    NotFound,
}

impl Route {
    pub fn resolve(path: &str) -> Route {
        let p = normalize_path(path);
        let segs: Vec<&str> = p.split('/').filter(|s| !s.is_empty()).collect();
        match segs.as_slice() {
            [] => Route::Home,
            ["profile"] => Route::Profile,
            ["elections"] => Route::Elections,
            ["electionResults"] => Route::ElectionResults,
            ["electionResults", id] => Route::ElectionResultView { id: (*id).to_string() },
            ["candidates"] => Route::Candidates,
            ["voters"] => Route::Voters,
            ["signin"] => Route::SignIn,
            ["forgot-password"] => Route::ForgotPassword,
            ["signup"] => Route::SignUp,
            _ => Route::NotFound,
        }
    }

    /// Views rendered inside the guarded application layout.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Route::Home
                | Route::Profile
                | Route::Elections
                | Route::ElectionResults
                | Route::ElectionResultView { .. }
                | Route::Candidates
                | Route::Voters
        )
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => HOME_PATH.to_string(),
            Route::Profile => "/profile".to_string(),
            Route::Elections => "/elections".to_string(),
            Route::ElectionResults => "/electionResults".to_string(),
            Route::ElectionResultView { id } => format!("/electionResults/{}", id),
            Route::Candidates => "/candidates".to_string(),
            Route::Voters => "/voters".to_string(),
            Route::SignIn => SIGN_IN_PATH.to_string(),
            Route::ForgotPassword => FORGOT_PASSWORD_PATH.to_string(),
            Route::SignUp => SIGN_UP_PATH.to_string(),
            Route::NotFound => "/404".to_string(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "Dashboard",
            Route::Profile => "Profile",
            Route::Elections => "Elections",
            Route::ElectionResults => "Election Results",
            Route::ElectionResultView { .. } => "Election Result",
            Route::Candidates => "Candidates",
            Route::Voters => "Voters",
            Route::SignIn => "Sign In",
            Route::ForgotPassword => "Forgot Password",
            Route::SignUp => "Sign Up",
            Route::NotFound => "Not Found",
        }
    }
}

/// Leading slash, no trailing slash (except root), query and fragment dropped.
pub fn normalize_path(path: &str) -> String {
    let p = path.split(['?', '#']).next().unwrap_or("").trim();
    let trimmed = p.trim_matches('/');
    if trimmed.is_empty() { HOME_PATH.to_string() } else { format!("/{}", trimmed) }
}

pub fn is_unauthenticated_view(path: &str) -> bool {
    let p = normalize_path(path);
    UNAUTHENTICATED_VIEWS.iter().any(|v| *v == p)
}

/// A requested location: path plus optional query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    #[serde(default)]
    pub query: Option<String>,
}

impl Location {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.split('#').next().unwrap_or("");
        let (path, query) = match raw.split_once('?') {
            Some((p, q)) if !q.is_empty() => (p, Some(q.to_string())),
            Some((p, _)) => (p, None),
            None => (raw, None),
        };
        Self { path: normalize_path(path), query }
    }

    pub fn route(&self) -> Route { Route::resolve(&self.path) }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.query {
            Some(q) => write!(f, "{}?{}", self.path, q),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Where the user was headed before being sent to sign-in. Consumed after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNavigation {
    pub location: Location,
    #[serde(default)]
    pub state: Option<serde_json::Value>,
}

impl PendingNavigation {
    pub fn new(location: Location) -> Self { Self { location, state: None } }

    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = Some(state);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// In-app route replacement; application state survives.
    Replace,
    /// Full reload; all in-memory state is rebuilt from storage.
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub to: Location,
    pub kind: NavigationKind,
    pub from: Option<PendingNavigation>,
}

impl Navigation {
    pub fn replace(to: Location) -> Self { Self { to, kind: NavigationKind::Replace, from: None } }

    pub fn hard(to: Location) -> Self { Self { to, kind: NavigationKind::Hard, from: None } }

    pub fn hard_to_sign_in() -> Self { Self::hard(Location::parse(SIGN_IN_PATH)) }

    pub fn with_from(mut self, from: PendingNavigation) -> Self {
        self.from = Some(from);
        self
    }
}
