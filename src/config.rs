use serde::{Deserialize, Serialize};

use crate::http::Module;
use crate::http::session::Credentials;

/// Connection settings for one backend.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ApiConfig {
    /// API root, e.g. `https://mail.example.com/api`. Trailing slashes are
    /// tolerated.
    pub base_url: String,
    /// Credentials used for login and for re-login after session expiry.
    /// Without them, an expired session surfaces as an error.
    pub credentials: Option<Credentials>,
    /// Client identifier sent with the login request.
    pub client: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            credentials: None,
            client: "portico".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, name: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            name: name.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Full URL for a module endpoint: `<root>/{module}`.
    pub fn module_url(&self, module: Module) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), module)
    }
}
