use std::future::Future;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use super::error::ApiError;
use super::request::{RequestBody, TransportRequest};

/// What comes back from the wire, before any envelope processing.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// The seam between the gateway and the network. Tests substitute a mock.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, ApiError>> + Send;
}

/// Production transport over a shared `reqwest::Client`.
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ApiError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ApiError> {
        let mut builder = self
            .http
            .request(request.verb.method(), &request.url)
            .query(&request.query);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Json(body) => builder
                .header(CONTENT_TYPE, "text/javascript; charset=UTF-8")
                .body(body),
            RequestBody::Multipart(parts) => {
                let mut form = reqwest::multipart::Form::new();
                for part in parts {
                    let mut piece = reqwest::multipart::Part::bytes(part.bytes);
                    if let Some(filename) = part.filename {
                        piece = piece.file_name(filename);
                    }
                    if let Some(mime) = &part.content_type {
                        piece = piece.mime_str(mime).map_err(|e| {
                            ApiError::Transport(format!("invalid part content type: {}", e))
                        })?;
                    }
                    form = form.part(part.name, piece);
                }
                builder.multipart(form)
            }
        };

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Transport(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read response: {}", e)))?;

        Ok(TransportResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
