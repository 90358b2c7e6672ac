//! Message relay — a generic asynchronous request/response port between
//! isolated execution contexts.
//!
//! The clustering core must not assume which side of an isolation boundary it
//! runs on: `RelayBackend` speaks `{ action, payload }` envelopes through a
//! `RelayPort`, and `BackendRelayHandler` answers them from a local
//! `ModelBackend` on the far side. Envelopes are delivered at most once per
//! call and the response is correlated by the call itself. Ports open their
//! channel lazily; opening twice must not error.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Availability, BackendError, ModelBackend, ModelSession, SessionOptions};

/// One request envelope crossing the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRequest {
    pub action: String,
    pub payload: Value,
}

impl RelayRequest {
    pub fn new(action: &str, payload: Value) -> Self {
        RelayRequest {
            action: action.to_string(),
            payload,
        }
    }
}

#[async_trait]
pub trait RelayPort: Send + Sync {
    /// Delivers one envelope and returns the correlated response.
    async fn call(&self, request: RelayRequest) -> Result<Value, BackendError>;
}

/// The far side of a port: dispatches envelopes by action.
#[async_trait]
pub trait RelayHandler: Send + Sync {
    async fn handle(&self, request: RelayRequest) -> Result<Value, BackendError>;
}

/// Port whose two sides share a process. The channel is still set up lazily
/// and idempotently so the calling contract matches a real isolated context.
pub struct InProcessRelay {
    handler: Arc<dyn RelayHandler>,
    channel: OnceCell<()>,
}

impl InProcessRelay {
    pub fn new(handler: Arc<dyn RelayHandler>) -> Self {
        InProcessRelay {
            handler,
            channel: OnceCell::new(),
        }
    }

    async fn ensure_channel(&self) {
        self.channel
            .get_or_init(|| async {
                debug!("Relay channel opened");
            })
            .await;
    }
}

#[async_trait]
impl RelayPort for InProcessRelay {
    async fn call(&self, request: RelayRequest) -> Result<Value, BackendError> {
        self.ensure_channel().await;
        self.handler.handle(request).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ModelBackend over a port
// ────────────────────────────────────────────────────────────────────────────

/// Speaks the backend contract through a relay port. Sessions are correlated
/// across envelopes by a handler-issued session id.
pub struct RelayBackend {
    port: Arc<dyn RelayPort>,
}

impl RelayBackend {
    pub fn new(port: Arc<dyn RelayPort>) -> Self {
        RelayBackend { port }
    }
}

#[async_trait]
impl ModelBackend for RelayBackend {
    async fn availability(&self) -> Availability {
        let reply = self
            .port
            .call(RelayRequest::new("availability", Value::Null))
            .await;
        match reply {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                Availability::Unavailable {
                    detail: format!("Unrecognized availability reply from relay: {e}."),
                }
            }),
            Err(e) => Availability::Unavailable {
                detail: format!("Relay call failed: {e}."),
            },
        }
    }

    async fn create_session(
        &self,
        options: SessionOptions,
    ) -> Result<Box<dyn ModelSession>, BackendError> {
        let reply = self
            .port
            .call(RelayRequest::new(
                "create_session",
                json!({ "temperature": options.temperature, "top_k": options.top_k }),
            ))
            .await?;

        let session_id = reply
            .get("session_id")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Channel("reply missing session_id".to_string()))?
            .to_string();

        Ok(Box::new(RelaySession {
            port: Arc::clone(&self.port),
            session_id,
        }))
    }
}

struct RelaySession {
    port: Arc<dyn RelayPort>,
    session_id: String,
}

#[async_trait]
impl ModelSession for RelaySession {
    async fn prompt(&mut self, text: &str) -> Result<String, BackendError> {
        let reply = self
            .port
            .call(RelayRequest::new(
                "prompt",
                json!({ "session_id": self.session_id, "text": text }),
            ))
            .await?;

        reply
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BackendError::Channel("prompt reply missing text".to_string()))
    }

    async fn release(self: Box<Self>) {
        let result = self
            .port
            .call(RelayRequest::new(
                "release",
                json!({ "session_id": self.session_id }),
            ))
            .await;
        if let Err(e) = result {
            warn!(session_id = %self.session_id, "Failed to release relayed session: {e}");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handler side
// ────────────────────────────────────────────────────────────────────────────

/// Serves relay envelopes from a local backend, holding the live sessions the
/// near side only knows by id.
pub struct BackendRelayHandler {
    backend: Arc<dyn ModelBackend>,
    sessions: Mutex<HashMap<String, Box<dyn ModelSession>>>,
}

impl BackendRelayHandler {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        BackendRelayHandler {
            backend,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RelayHandler for BackendRelayHandler {
    async fn handle(&self, request: RelayRequest) -> Result<Value, BackendError> {
        match request.action.as_str() {
            "availability" => {
                let availability = self.backend.availability().await;
                serde_json::to_value(availability).map_err(|e| BackendError::Channel(e.to_string()))
            }
            "create_session" => {
                let defaults = SessionOptions::default();
                let options = SessionOptions {
                    temperature: request
                        .payload
                        .get("temperature")
                        .and_then(Value::as_f64)
                        .map(|t| t as f32)
                        .unwrap_or(defaults.temperature),
                    top_k: request
                        .payload
                        .get("top_k")
                        .and_then(Value::as_u64)
                        .map(|k| k as u32)
                        .unwrap_or(defaults.top_k),
                };

                let session = self.backend.create_session(options).await?;
                let session_id = Uuid::new_v4().to_string();
                self.sessions
                    .lock()
                    .await
                    .insert(session_id.clone(), session);
                Ok(json!({ "session_id": session_id }))
            }
            "prompt" => {
                let session_id = required_str(&request.payload, "session_id")?;
                let text = required_str(&request.payload, "text")?;

                let mut sessions = self.sessions.lock().await;
                let session = sessions
                    .get_mut(session_id)
                    .ok_or_else(|| BackendError::Channel(format!("unknown session {session_id}")))?;
                let reply = session.prompt(text).await?;
                Ok(json!({ "text": reply }))
            }
            "release" => {
                let session_id = required_str(&request.payload, "session_id")?;
                let session = self.sessions.lock().await.remove(session_id);
                let released = session.is_some();
                if let Some(session) = session {
                    session.release().await;
                }
                Ok(json!({ "released": released }))
            }
            other => Err(BackendError::Channel(format!(
                "unknown relay action '{other}'"
            ))),
        }
    }
}

fn required_str<'a>(payload: &'a Value, key: &str) -> Result<&'a str, BackendError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::Channel(format!("payload missing '{key}'")))
}
