//! Session data model for the admin client: who is signed in, what the login
//! endpoint exchanges, and how a session is laid out in persisted storage.

mod principal;
mod provider;
pub mod session;

pub use principal::Identity;
pub use provider::{ErrorEnvelope, LoginRequest, LoginResponse, ADMIN_PORTAL};
pub use session::{PersistedState, Session, SessionState, SessionToken};
