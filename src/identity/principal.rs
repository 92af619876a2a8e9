use serde::{Deserialize, Serialize};

/// The signed-in admin as reported by the login endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl Identity {
    pub fn is_admin(&self) -> bool { self.role.eq_ignore_ascii_case("admin") }

    /// An identity without an id is not an identity.
    pub fn is_present(&self) -> bool { !self.id.trim().is_empty() }
}
