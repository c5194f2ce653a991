use serde::{Deserialize, Serialize};

/// Login credentials for the API.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub name: String,
    pub password: String,
}

// Keep the password out of log output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("password", &"***")
            .finish()
    }
}

/// Payload of a successful login or autologin response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    /// Opaque session token attached to nearly every subsequent request.
    pub session: String,
    pub user: Option<String>,
    pub user_id: Option<i64>,
    pub context_id: Option<i64>,
}
