use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio::sync::oneshot;

use super::Module;
use super::error::{ApiError, ServerError};
use super::request::{self, RequestDescriptor, Verb};
use super::response::{self, ApiData, Payload};
use super::session::{Credentials, LoginInfo};
use super::transport::{HttpTransport, Transport};
use crate::config::ApiConfig;

type SendResult = Result<ApiData, ApiError>;
type FailureInjector = Box<dyn Fn(&RequestDescriptor) -> bool + Send + Sync>;

struct QueueEntry {
    tx: oneshot::Sender<SendResult>,
    descriptor: RequestDescriptor,
}

#[derive(Default)]
struct GatewayState {
    paused: bool,
    session: Option<String>,
    queue: Vec<QueueEntry>,
    in_flight: HashMap<String, Vec<oneshot::Sender<SendResult>>>,
}

/// The single funnel between callers and the transport. One gateway per
/// session; it owns the paused flag, the buffered queue, the in-flight GET
/// map, and the session token — none of this is global state.
///
/// State machine: Flowing ⇄ Paused via [`pause`](Gateway::pause) and
/// [`resume`](Gateway::resume), last writer wins on the flag.
pub struct Gateway<T: Transport> {
    transport: T,
    config: ApiConfig,
    state: Mutex<GatewayState>,
    debug_delay: Option<Duration>,
    failure_injector: Option<FailureInjector>,
}

impl Gateway<HttpTransport> {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        Ok(Self::with_transport(config, HttpTransport::new()?))
    }
}

impl<T: Transport> Gateway<T> {
    pub fn with_transport(config: ApiConfig, transport: T) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(GatewayState::default()),
            debug_delay: None,
            failure_injector: None,
        }
    }

    /// Artificial delay before every request. Manual-testing aid.
    pub fn set_debug_delay(&mut self, delay: Option<Duration>) {
        self.debug_delay = delay;
    }

    /// Reject matching requests before any network call. Manual-testing aid.
    pub fn set_failure_injector(&mut self, injector: Option<FailureInjector>) {
        self.failure_injector = injector;
    }

    pub fn session(&self) -> Option<String> {
        self.state.lock().unwrap().session.clone()
    }

    pub fn set_session(&self, token: Option<String>) {
        self.state.lock().unwrap().session = token;
    }

    /// Stop sending: subsequent requests accumulate in arrival order until
    /// [`resume`](Gateway::resume) flushes them as one batch.
    pub fn pause(&self) {
        self.state.lock().unwrap().paused = true;
        log::debug!("gateway paused");
    }

    /// Send a request. Depending on gateway state this either goes straight
    /// to the transport, joins an identical in-flight GET, or waits in the
    /// paused queue for the next batch flush.
    pub async fn send(&self, descriptor: RequestDescriptor) -> SendResult {
        if let Some(inject) = &self.failure_injector {
            if inject(&descriptor) {
                log::debug!(
                    "failure injector rejected {}?action={}",
                    descriptor.module,
                    descriptor.action
                );
                return Err(ApiError::Injected);
            }
        }
        if let Some(delay) = self.debug_delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.paused {
                let (tx, rx) = oneshot::channel();
                state.queue.push(QueueEntry { tx, descriptor });
                drop(state);
                return rx.await.unwrap_or(Err(ApiError::Abandoned));
            }
        }

        self.dispatch(descriptor).await
    }

    /// Manual re-dispatch of a failed request. No policy beyond this.
    pub async fn retry(&self, descriptor: RequestDescriptor) -> SendResult {
        self.send(descriptor).await
    }

    /// Resume sending and drain the queue. A non-empty queue becomes exactly
    /// one PUT to the `multiple` module; the ordered response is fanned back
    /// out so entry *i* settles the *i*-th caller.
    pub async fn resume(&self) -> Result<(), ApiError> {
        let entries = {
            let mut state = self.state.lock().unwrap();
            state.paused = false;
            std::mem::take(&mut state.queue)
        };
        if entries.is_empty() {
            log::debug!("gateway resumed, queue empty");
            return Ok(());
        }
        log::info!("gateway resumed, flushing {} queued requests", entries.len());

        let items: Vec<Value> = entries.iter().map(|e| batch_item(&e.descriptor)).collect();
        let mut batch = RequestDescriptor::new(Module::Multiple, "", Verb::Put)
            .param("continue", "true")
            .data(Value::Array(items));
        batch.append_columns = Some(false);

        let settle_all = |error: ApiError, entries: Vec<QueueEntry>| {
            for entry in entries {
                let _ = entry.tx.send(Err(error.clone()));
            }
            Err(error)
        };

        let payload = match self.payload_with_retry(&batch).await {
            Ok(payload) => payload,
            Err(e) => return settle_all(e, entries),
        };
        let Payload::Json(value) = payload else {
            let e = ApiError::Protocol("batch response was not JSON".to_string());
            return settle_all(e, entries);
        };

        let descriptors: Vec<RequestDescriptor> =
            entries.iter().map(|e| e.descriptor.clone()).collect();
        let items = match response::into_batch(&value, &descriptors) {
            Ok(items) => items,
            Err(e) => return settle_all(e, entries),
        };

        let mut items = items.into_iter();
        for entry in entries {
            let result = match items.next() {
                Some(Ok(data)) => Ok(data),
                Some(Err(server)) => Err(ApiError::Server(server)),
                None => Err(ApiError::Protocol(
                    "batch response shorter than queue".to_string(),
                )),
            };
            let _ = entry.tx.send(result);
        }
        Ok(())
    }

    /// Log in with the configured credentials and store the session token.
    pub async fn login(&self) -> Result<LoginInfo, ApiError> {
        let creds = self
            .config
            .credentials
            .clone()
            .ok_or_else(|| ApiError::Protocol("no credentials configured".to_string()))?;
        self.login_with(&creds).await
    }

    async fn login_with(&self, creds: &Credentials) -> Result<LoginInfo, ApiError> {
        let mut descriptor = RequestDescriptor::new(Module::Login, "login", Verb::Post)
            .param("name", &creds.name)
            .param("password", &creds.password)
            .param("client", &self.config.client);
        descriptor.append_session = false;

        // Goes straight to the transport: login must work while paused and
        // never joins the dedupe map.
        let payload = self.round_trip(&descriptor).await?;
        let Payload::Json(value) = payload else {
            return Err(ApiError::Protocol("login response was not JSON".to_string()));
        };
        let data = response::into_api_data(&value, &descriptor);
        let info: LoginInfo = serde_json::from_value(data.data)
            .map_err(|e| ApiError::Protocol(format!("malformed login response: {}", e)))?;
        self.set_session(Some(info.session.clone()));
        log::info!("logged in as {}", creds.name);
        Ok(info)
    }

    /// Flowing-mode dispatch. Identical in-flight GETs are shared: late
    /// callers attach to the first call and all settle together, in attach
    /// order, when it does.
    async fn dispatch(&self, descriptor: RequestDescriptor) -> SendResult {
        if descriptor.verb != Verb::Get {
            return self.perform(&descriptor).await;
        }

        let key = request::build(&descriptor, &self.config, self.session().as_deref())
            .dedupe_key();
        let attached = {
            let mut state = self.state.lock().unwrap();
            match state.in_flight.get_mut(&key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    state.in_flight.insert(key.clone(), Vec::new());
                    None
                }
            }
        };
        if let Some(rx) = attached {
            log::debug!("joining in-flight GET: {}", key);
            return rx.await.unwrap_or(Err(ApiError::Abandoned));
        }

        let result = self.perform(&descriptor).await;

        let waiters = {
            let mut state = self.state.lock().unwrap();
            state.in_flight.remove(&key).unwrap_or_default()
        };
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
        result
    }

    /// One request with a single re-login retry on session expiry.
    async fn perform(&self, descriptor: &RequestDescriptor) -> SendResult {
        let payload = self.payload_with_retry(descriptor).await?;
        Ok(self.finish(payload, descriptor))
    }

    async fn payload_with_retry(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Payload, ApiError> {
        match self.round_trip(descriptor).await {
            Err(ApiError::SessionExpired(cause)) => {
                log::info!("session expired ({}), re-authenticating", cause);
                self.relogin(cause).await?;
                self.round_trip(descriptor).await
            }
            other => other,
        }
    }

    async fn relogin(&self, cause: ServerError) -> Result<(), ApiError> {
        let Some(creds) = self.config.credentials.clone() else {
            log::warn!("session expired and no credentials to re-login with");
            return Err(ApiError::SessionExpired(cause));
        };
        self.login_with(&creds).await.map(|_| ())
    }

    /// Build, execute, decode, and classify. Terminal server errors come
    /// back typed; success leaves the payload for the caller to normalize.
    async fn round_trip(&self, descriptor: &RequestDescriptor) -> Result<Payload, ApiError> {
        let built = request::build(descriptor, &self.config, self.session().as_deref());
        let process = built.process_response;
        let response = self.transport.execute(built).await?;
        let payload = response::parse_payload(&response, process)?;
        if let Payload::Json(value) = &payload {
            if let Some(error) = response::classify_error(value, descriptor.module == Module::Login)
            {
                return Err(error);
            }
        }
        Ok(payload)
    }

    fn finish(&self, payload: Payload, descriptor: &RequestDescriptor) -> ApiData {
        match payload {
            Payload::Json(value) => response::into_api_data(&value, descriptor),
            Payload::Text(text) => ApiData {
                data: Value::String(text),
                timestamp: chrono::Utc::now().timestamp_millis(),
                warning: None,
            },
        }
    }
}

/// One slot of the batch body: `{module, action, data, ...params}`, with the
/// session param stripped (the batch request carries its own).
fn batch_item(descriptor: &RequestDescriptor) -> Value {
    let mut item = Map::new();
    item.insert("module".to_string(), json!(descriptor.module.as_str()));
    if !descriptor.action.is_empty() {
        item.insert("action".to_string(), json!(descriptor.action));
    }
    for (key, value) in &descriptor.params {
        if key == "session" {
            continue;
        }
        item.insert(key.clone(), json!(value));
    }
    if let Some(data) = &descriptor.data {
        item.insert("data".to_string(), data.clone());
    }
    Value::Object(item)
}
