use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Error codes like `SES-0203` signal an expired or invalid session.
static SESSION_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^SES-\d+").expect("session code regex")
});

/// A structured error payload reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code, e.g. `SES-0203` or `MSG-0032`.
    pub code: Option<String>,
    /// Positional parameters for the message template, passed through verbatim.
    pub error_params: Vec<Value>,
    /// The complete payload as received, for callers that need more.
    pub raw: Value,
}

impl ServerError {
    /// Build from a server `error` payload. Tolerates both the structured
    /// object form and a bare message string.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => ServerError {
                error: map
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown server error")
                    .to_string(),
                code: map
                    .get("code")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                error_params: map
                    .get("error_params")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default(),
                raw: value.clone(),
            },
            Value::String(message) => ServerError {
                error: message.clone(),
                code: None,
                error_params: Vec::new(),
                raw: value.clone(),
            },
            other => ServerError {
                error: other.to_string(),
                code: None,
                error_params: Vec::new(),
                raw: other.clone(),
            },
        }
    }

    /// Whether this error is the server's session-expiry signal.
    pub fn is_session_expired(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| SESSION_CODE_RE.is_match(code))
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.error, code),
            None => f.write_str(&self.error),
        }
    }
}

/// Everything that can go wrong between a caller and the backend, decided
/// once at the response boundary. `Clone` so one settled result can fan out
/// to every caller sharing a de-duplicated request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Network or HTTP-level failure, carrying "<status> <reason>" or the
    /// underlying I/O message. Never retried by this layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with an error payload.
    #[error("server error: {0}")]
    Server(ServerError),

    /// The session token was rejected. Recovered internally by re-login
    /// where credentials are available; surfaced only when recovery fails.
    #[error("session expired: {0}")]
    SessionExpired(ServerError),

    /// The response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Rejected by the configured failure injector before any network call.
    #[error("request rejected by failure injector")]
    Injected,

    /// The request was queued or attached to a shared call that went away
    /// without settling.
    #[error("request abandoned before completion")]
    Abandoned,
}
