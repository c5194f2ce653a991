use serde_json::Value;

use super::columns::row_to_object;
use super::error::{ApiError, ServerError};
use super::request::RequestDescriptor;
use super::transport::TransportResponse;

/// A successful, normalized response.
#[derive(Debug, Clone)]
pub struct ApiData {
    /// The payload, with positional rows mapped back to named fields.
    pub data: Value,
    /// Server timestamp in epoch milliseconds; falls back to local time.
    pub timestamp: i64,
    /// Non-fatal error the server reported alongside the data. The original
    /// client dropped these on the floor; surfacing them is deliberate.
    pub warning: Option<ServerError>,
}

/// One slot of a batch ("multiple") response.
pub type BatchItem = Result<ApiData, ServerError>;

/// A response body, either parsed JSON or raw text.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Text(String),
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Decode a transport response body. JSON content types must parse; anything
/// else (plain text, HTML progress pages) passes through raw, as do
/// responses whose requests disabled processing.
pub fn parse_payload(response: &TransportResponse, process: bool) -> Result<Payload, ApiError> {
    let is_json = response
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.contains("json") || ct.contains("javascript"));
    if !process || !is_json {
        return Ok(Payload::Text(response.body.clone()));
    }
    serde_json::from_str(&response.body)
        .map(Payload::Json)
        .map_err(|e| ApiError::Protocol(format!("invalid JSON in response: {}", e)))
}

/// Decide, once, whether a response body is a terminal error. A payload
/// carrying `error` without `data` is an error; a `SES-*` code means the
/// session expired, except on the login call itself where it is just a
/// failed login.
pub fn classify_error(value: &Value, is_login: bool) -> Option<ApiError> {
    let map = value.as_object()?;
    if !map.contains_key("error") || map.contains_key("data") {
        return None;
    }
    let error = ServerError::from_value(value);
    if error.is_session_expired() && !is_login {
        Some(ApiError::SessionExpired(error))
    } else {
        Some(ApiError::Server(error))
    }
}

/// Map a `data` payload through the column registry: arrays are treated as
/// row lists and mapped element-wise, everything else passes through.
fn normalize_data(descriptor: &RequestDescriptor, data: &Value) -> Value {
    let module = descriptor.column_module();
    let explicit = descriptor.columns.as_deref();
    match data.as_array() {
        Some(rows) => Value::Array(
            rows.iter()
                .map(|row| row_to_object(module, row, explicit))
                .collect(),
        ),
        None => data.clone(),
    }
}

/// Normalize a single (non-batch) JSON response. Assumes terminal errors
/// were already split off via [`classify_error`].
pub fn into_api_data(value: &Value, descriptor: &RequestDescriptor) -> ApiData {
    let warning = value
        .as_object()
        .and_then(|map| map.get("error"))
        .map(|_| ServerError::from_value(value));
    if let Some(w) = &warning {
        log::warn!("{} response carried a warning: {}", descriptor.module, w);
    }

    // Envelopes wrap the payload in `data`; bare objects (login) are the
    // payload themselves.
    let data = match value.as_object().and_then(|map| map.get("data")) {
        Some(inner) => normalize_data(descriptor, inner),
        None => value.clone(),
    };

    let timestamp = value
        .as_object()
        .and_then(|map| map.get("timestamp"))
        .and_then(|t| t.as_i64())
        .unwrap_or_else(now_millis);

    ApiData {
        data,
        timestamp,
        warning,
    }
}

/// Unwrap a batch ("multiple") response: an ordered array with one entry per
/// sub-request, each either `{data, timestamp}` or `{error, timestamp}`.
/// Per-item errors stay in their slot and never fail the whole batch.
pub fn into_batch(
    value: &Value,
    descriptors: &[RequestDescriptor],
) -> Result<Vec<BatchItem>, ApiError> {
    let entries = value
        .as_array()
        .or_else(|| value.as_object().and_then(|m| m.get("data")).and_then(|d| d.as_array()))
        .ok_or_else(|| ApiError::Protocol("batch response is not an array".to_string()))?;

    let mut items = Vec::with_capacity(entries.len());
    for (entry, descriptor) in entries.iter().zip(descriptors) {
        let item = match entry.as_object() {
            Some(map) if map.contains_key("data") => Ok(into_api_data(entry, descriptor)),
            Some(map) if map.contains_key("error") => Err(ServerError::from_value(entry)),
            _ => Ok(into_api_data(entry, descriptor)),
        };
        items.push(item);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Module, Verb};
    use serde_json::json;

    fn get_descriptor(module: Module, columns: Option<Vec<u32>>) -> RequestDescriptor {
        let mut desc = RequestDescriptor::new(module, "all", Verb::Get);
        desc.columns = columns;
        desc
    }

    #[test]
    fn single_response_maps_rows_and_extracts_timestamp() {
        let desc = get_descriptor(Module::Mail, Some(vec![600, 607]));
        let value = json!({
            "data": [["abc", "Hello"], ["def", "Re: Hello"]],
            "timestamp": 1700000000000i64,
        });
        assert!(classify_error(&value, false).is_none());
        let result = into_api_data(&value, &desc);
        assert_eq!(result.timestamp, 1700000000000);
        assert!(result.warning.is_none());
        assert_eq!(
            result.data,
            json!([
                {"id": "abc", "subject": "Hello"},
                {"id": "def", "subject": "Re: Hello"},
            ])
        );
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let desc = get_descriptor(Module::Mail, None);
        let before = now_millis();
        let result = into_api_data(&json!({"data": {}}), &desc);
        assert!(result.timestamp >= before);
    }

    #[test]
    fn bare_object_response_is_the_payload() {
        let desc = RequestDescriptor::new(Module::Login, "login", Verb::Post);
        let result = into_api_data(&json!({"session": "tok", "user_id": 3}), &desc);
        assert_eq!(result.data["session"], json!("tok"));
    }

    #[test]
    fn error_without_data_is_terminal() {
        let value = json!({"error": "Mail not found", "code": "MSG-0032"});
        match classify_error(&value, false) {
            Some(ApiError::Server(e)) => assert_eq!(e.code.as_deref(), Some("MSG-0032")),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[test]
    fn session_expiry_is_typed_except_during_login() {
        let value = json!({"error": "Session expired", "code": "SES-0001"});
        assert!(matches!(
            classify_error(&value, false),
            Some(ApiError::SessionExpired(_))
        ));
        // A failed login is a plain server error, not an expiry to recover.
        assert!(matches!(
            classify_error(&value, true),
            Some(ApiError::Server(_))
        ));
    }

    #[test]
    fn warning_alongside_data_is_surfaced_not_dropped() {
        let desc = get_descriptor(Module::Tasks, None);
        let value = json!({
            "data": {"id": 7},
            "error": "Some appointments could not be loaded",
            "code": "CAL-4060",
            "timestamp": 5,
        });
        assert!(classify_error(&value, false).is_none());
        let result = into_api_data(&value, &desc);
        assert_eq!(result.data, json!({"id": 7}));
        let warning = result.warning.expect("warning surfaced");
        assert_eq!(warning.code.as_deref(), Some("CAL-4060"));
    }

    #[test]
    fn batch_isolates_per_item_errors() {
        let descs = vec![
            get_descriptor(Module::Mail, Some(vec![600])),
            get_descriptor(Module::Mail, Some(vec![600])),
        ];
        let value = json!([
            {"data": [["abc"]], "timestamp": 1},
            {"error": "Folder not found", "code": "FLD-0008", "timestamp": 2},
        ]);
        let items = into_batch(&value, &descs).unwrap();
        assert_eq!(items.len(), 2);
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.data, json!([{"id": "abc"}]));
        let second = items[1].as_ref().unwrap_err();
        assert_eq!(second.code.as_deref(), Some("FLD-0008"));
    }

    #[test]
    fn batch_accepts_data_wrapped_envelope() {
        let descs = vec![get_descriptor(Module::Tasks, None)];
        let value = json!({"data": [{"data": {"id": 1}, "timestamp": 9}]});
        let items = into_batch(&value, &descs).unwrap();
        assert_eq!(items[0].as_ref().unwrap().data, json!({"id": 1}));
    }

    #[test]
    fn non_json_bodies_pass_through_raw() {
        let response = TransportResponse {
            status: 200,
            content_type: Some("text/html".to_string()),
            body: "<html>done</html>".to_string(),
        };
        match parse_payload(&response, true).unwrap() {
            Payload::Text(t) => assert_eq!(t, "<html>done</html>"),
            Payload::Json(_) => panic!("should not parse html"),
        }
    }

    #[test]
    fn processing_can_be_disabled_per_request() {
        let response = TransportResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: r#"{"data": 1}"#.to_string(),
        };
        assert!(matches!(
            parse_payload(&response, false).unwrap(),
            Payload::Text(_)
        ));
        assert!(matches!(
            parse_payload(&response, true).unwrap(),
            Payload::Json(_)
        ));
    }
}
