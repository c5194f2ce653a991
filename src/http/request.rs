use std::time::Duration;

use serde_json::Value;

use super::{Module, columns};
use crate::config::ApiConfig;

/// HTTP verbs the backend understands. `Upload` is a POST carrying a
/// multipart body whose response is not auto-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Upload,
}

impl Verb {
    pub fn method(&self) -> reqwest::Method {
        match self {
            Verb::Get => reqwest::Method::GET,
            Verb::Post | Verb::Upload => reqwest::Method::POST,
            Verb::Put => reqwest::Method::PUT,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One part of an `Upload` multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A logical request before transport encoding. Created fresh per call.
///
/// `data` is kept un-stringified here so a queued request can be replayed
/// verbatim inside a batch flush.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub module: Module,
    /// The `action` request parameter; empty means none (batch envelope).
    pub action: String,
    pub verb: Verb,
    pub params: Vec<(String, String)>,
    pub data: Option<Value>,
    /// Multipart parts, used by `Verb::Upload` only.
    pub parts: Vec<UploadPart>,
    /// Attach the session token. Login/autologin opt out.
    pub append_session: bool,
    /// Attach the module's column list. `None` picks the verb default:
    /// mutating verbs get columns, GET/UPLOAD do not.
    pub append_columns: Option<bool>,
    /// Explicit column list, overriding the module's full set.
    pub columns: Option<Vec<u32>>,
    /// Module whose column namespace applies, when it differs from `module`.
    pub column_module: Option<Module>,
    /// Opt-in timeout forwarded straight to the transport.
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(module: Module, action: &str, verb: Verb) -> Self {
        Self {
            module,
            action: action.to_string(),
            verb,
            params: Vec::new(),
            data: None,
            parts: Vec::new(),
            append_session: true,
            append_columns: None,
            columns: None,
            column_module: None,
            timeout: None,
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn columns(mut self, columns: Vec<u32>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// The module whose columns decode this request's rows.
    pub fn column_module(&self) -> Module {
        self.column_module.unwrap_or(self.module)
    }

    /// Whether columns get attached: explicit choice, else the verb default.
    pub fn wants_columns(&self) -> bool {
        self.append_columns
            .unwrap_or(!matches!(self.verb, Verb::Get | Verb::Upload))
    }
}

/// How the request body travels.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// URL-encoded form body (POST).
    Form(Vec<(String, String)>),
    /// JSON-stringified payload (PUT/DELETE).
    Json(String),
    /// Multipart body (UPLOAD).
    Multipart(Vec<UploadPart>),
}

/// A fully-encoded request, ready for the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub verb: Verb,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
    /// When false (uploads), the response body is handed back raw.
    pub process_response: bool,
}

impl TransportRequest {
    /// Key identifying this request for GET de-duplication.
    pub fn dedupe_key(&self) -> String {
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{:?} {}?{}", self.verb, self.url, query.join("&"))
    }
}

/// Decorate a logical request with session and columns, then encode it for
/// its verb: GET puts parameters on the query string, POST in a form body,
/// PUT/DELETE put parameters on the query string with the JSON payload as
/// body, UPLOAD is the PUT query handling with a multipart body.
pub fn build(
    descriptor: &RequestDescriptor,
    config: &ApiConfig,
    session: Option<&str>,
) -> TransportRequest {
    let mut params: Vec<(String, String)> = Vec::new();
    if !descriptor.action.is_empty() {
        params.push(("action".to_string(), descriptor.action.clone()));
    }
    params.extend(descriptor.params.iter().cloned());

    if descriptor.append_session {
        if let Some(token) = session {
            params.push(("session".to_string(), token.to_string()));
        }
    }

    let has_explicit_columns = descriptor.params.iter().any(|(k, _)| k == "columns");
    if descriptor.wants_columns() && !has_explicit_columns {
        let ids = match &descriptor.columns {
            Some(ids) => ids.clone(),
            None => columns::columns(descriptor.column_module()),
        };
        if !ids.is_empty() {
            let joined = ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            params.push(("columns".to_string(), joined));
        }
    }

    let url = config.module_url(descriptor.module);

    match descriptor.verb {
        Verb::Get => TransportRequest {
            verb: Verb::Get,
            url,
            query: params,
            body: RequestBody::Empty,
            timeout: descriptor.timeout,
            process_response: true,
        },
        Verb::Post => TransportRequest {
            verb: Verb::Post,
            url,
            query: Vec::new(),
            body: RequestBody::Form(params),
            timeout: descriptor.timeout,
            process_response: true,
        },
        Verb::Put | Verb::Delete => TransportRequest {
            verb: descriptor.verb,
            url,
            query: params,
            body: match &descriptor.data {
                Some(data) => RequestBody::Json(data.to_string()),
                None => RequestBody::Empty,
            },
            timeout: descriptor.timeout,
            process_response: true,
        },
        Verb::Upload => TransportRequest {
            verb: Verb::Upload,
            url,
            query: params,
            body: RequestBody::Multipart(descriptor.parts.clone()),
            timeout: descriptor.timeout,
            process_response: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ApiConfig {
        ApiConfig::new("https://mail.example.com/api")
    }

    fn query_value<'a>(req: &'a TransportRequest, key: &str) -> Option<&'a str> {
        req.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn get_puts_params_on_query_without_columns() {
        let desc = RequestDescriptor::new(Module::Mail, "all", Verb::Get)
            .param("folder", "default0/INBOX");
        let req = build(&desc, &config(), Some("tok"));
        assert_eq!(req.url, "https://mail.example.com/api/mail");
        assert_eq!(query_value(&req, "action"), Some("all"));
        assert_eq!(query_value(&req, "folder"), Some("default0/INBOX"));
        assert_eq!(query_value(&req, "session"), Some("tok"));
        assert_eq!(query_value(&req, "columns"), None);
        assert_eq!(req.body, RequestBody::Empty);
    }

    #[test]
    fn put_appends_columns_by_default_and_carries_json_body() {
        let desc = RequestDescriptor::new(Module::Tasks, "update", Verb::Put)
            .data(json!({"title": "Water plants"}));
        let req = build(&desc, &config(), Some("tok"));
        let cols = query_value(&req, "columns").expect("columns appended");
        assert!(cols.starts_with("1,2,3,4,5,20,"));
        assert_eq!(
            req.body,
            RequestBody::Json(r#"{"title":"Water plants"}"#.to_string())
        );
        // The descriptor still holds the un-stringified payload for replay.
        assert_eq!(desc.data, Some(json!({"title": "Water plants"})));
    }

    #[test]
    fn explicit_column_list_is_comma_joined_ascending() {
        let desc = RequestDescriptor::new(Module::Mail, "list", Verb::Get);
        let mut desc = desc.columns(vec![600, 603, 607]);
        desc.append_columns = Some(true);
        let req = build(&desc, &config(), None);
        assert_eq!(query_value(&req, "columns"), Some("600,603,607"));
    }

    #[test]
    fn columns_param_already_present_wins() {
        let mut desc = RequestDescriptor::new(Module::Mail, "list", Verb::Get)
            .param("columns", "600,607");
        desc.append_columns = Some(true);
        let req = build(&desc, &config(), None);
        let columns: Vec<_> = req.query.iter().filter(|(k, _)| k == "columns").collect();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].1, "600,607");
    }

    #[test]
    fn session_can_be_suppressed() {
        let mut desc = RequestDescriptor::new(Module::Login, "login", Verb::Post);
        desc.append_session = false;
        let req = build(&desc, &config(), Some("tok"));
        let RequestBody::Form(fields) = &req.body else {
            panic!("POST should carry a form body");
        };
        assert!(fields.iter().all(|(k, _)| k != "session"));
        assert!(req.query.is_empty());
    }

    #[test]
    fn upload_disables_response_processing() {
        let mut desc = RequestDescriptor::new(Module::Mail, "new", Verb::Upload);
        desc.parts.push(UploadPart {
            name: "file_0".into(),
            filename: Some("cat.png".into()),
            content_type: Some("image/png".into()),
            bytes: vec![1, 2, 3],
        });
        let req = build(&desc, &config(), Some("tok"));
        assert!(!req.process_response);
        assert_eq!(query_value(&req, "session"), Some("tok"));
        assert_eq!(query_value(&req, "columns"), None);
        assert!(matches!(req.body, RequestBody::Multipart(ref p) if p.len() == 1));
    }

    #[test]
    fn dedupe_key_covers_verb_url_and_query() {
        let a = build(
            &RequestDescriptor::new(Module::Mail, "all", Verb::Get).param("folder", "x"),
            &config(),
            Some("tok"),
        );
        let b = build(
            &RequestDescriptor::new(Module::Mail, "all", Verb::Get).param("folder", "y"),
            &config(),
            Some("tok"),
        );
        assert_ne!(a.dedupe_key(), b.dedupe_key());
        let a2 = build(
            &RequestDescriptor::new(Module::Mail, "all", Verb::Get).param("folder", "x"),
            &config(),
            Some("tok"),
        );
        assert_eq!(a.dedupe_key(), a2.dedupe_key());
    }
}
