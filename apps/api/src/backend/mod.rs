//! Generative backend boundary.
//!
//! ARCHITECTURAL RULE: the clustering core never talks to a model runtime
//! directly — every prompt goes through a `ModelSession` obtained from a
//! `ModelBackend`. Sessions are scarce, stateful resources: acquired once per
//! orchestration run, threaded through every call, released on every exit
//! path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ollama;
pub mod relay;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model runtime error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned empty content")]
    EmptyContent,

    #[error("relay channel error: {0}")]
    Channel(String),
}

/// Backend readiness. Probe failures fold into `Unavailable` — the caller only
/// ever sees the tri-state, never a transport error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    Available,
    NeedsDownload { detail: String },
    Unavailable { detail: String },
}

impl Availability {
    /// User-facing reason this backend cannot serve a run, or `None` when it
    /// can. Each non-available state gets its own message.
    pub fn blocking_reason(&self) -> Option<String> {
        match self {
            Availability::Available => None,
            Availability::NeedsDownload { detail } => Some(format!(
                "The on-device model must be downloaded before clustering can run. {detail}"
            )),
            Availability::Unavailable { detail } => {
                Some(format!("On-device AI is not available. {detail}"))
            }
        }
    }
}

/// Sampling options for a session. The defaults match the clustering
/// pipeline's tuning: low temperature, narrow top-k.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub temperature: f32,
    pub top_k: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            temperature: 0.3,
            top_k: 3,
        }
    }
}

/// A stateful conversation with the generative backend.
#[async_trait]
pub trait ModelSession: Send {
    /// One prompt round trip. The session keeps conversational state between
    /// calls.
    async fn prompt(&mut self, text: &str) -> Result<String, BackendError>;

    /// Releases backend resources. Infallible by contract: failures are
    /// logged inside the implementation, never surfaced.
    async fn release(self: Box<Self>);
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn availability(&self) -> Availability;

    async fn create_session(
        &self,
        options: SessionOptions,
    ) -> Result<Box<dyn ModelSession>, BackendError>;
}

#[cfg(test)]
pub(crate) mod stub {
    //! Scripted backend for tests: replies are consumed in order, prompt and
    //! session counts are observable.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{Availability, BackendError, ModelBackend, ModelSession, SessionOptions};

    pub struct StubBackend {
        availability: Availability,
        script: Arc<Mutex<VecDeque<Result<String, String>>>>,
        prompt_count: Arc<AtomicUsize>,
        sessions_created: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
    }

    impl StubBackend {
        pub fn available_with(replies: Vec<Result<String, String>>) -> Self {
            Self::new(Availability::Available, replies)
        }

        pub fn new(availability: Availability, replies: Vec<Result<String, String>>) -> Self {
            StubBackend {
                availability,
                script: Arc::new(Mutex::new(replies.into_iter().collect())),
                prompt_count: Arc::new(AtomicUsize::new(0)),
                sessions_created: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn prompt_count(&self) -> usize {
            self.prompt_count.load(Ordering::SeqCst)
        }

        pub fn sessions_created(&self) -> usize {
            self.sessions_created.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> bool {
            self.released.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelBackend for StubBackend {
        async fn availability(&self) -> Availability {
            self.availability.clone()
        }

        async fn create_session(
            &self,
            _options: SessionOptions,
        ) -> Result<Box<dyn ModelSession>, BackendError> {
            self.sessions_created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubSession {
                script: Arc::clone(&self.script),
                prompt_count: Arc::clone(&self.prompt_count),
                released: Arc::clone(&self.released),
            }))
        }
    }

    pub struct StubSession {
        script: Arc<Mutex<VecDeque<Result<String, String>>>>,
        prompt_count: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
    }

    impl StubSession {
        pub fn with_replies(replies: Vec<Result<String, String>>) -> Self {
            StubSession {
                script: Arc::new(Mutex::new(replies.into_iter().collect())),
                prompt_count: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn prompt_count(&self) -> usize {
            self.prompt_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelSession for StubSession {
        async fn prompt(&mut self, _text: &str) -> Result<String, BackendError> {
            self.prompt_count.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(message)) => Err(BackendError::Api {
                    status: 500,
                    message,
                }),
                None => Err(BackendError::Api {
                    status: 500,
                    message: "stub script exhausted".to_string(),
                }),
            }
        }

        async fn release(self: Box<Self>) {
            self.released.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_has_no_blocking_reason() {
        assert_eq!(Availability::Available.blocking_reason(), None);
    }

    #[test]
    fn test_needs_download_and_unavailable_have_distinct_messages() {
        let download = Availability::NeedsDownload {
            detail: "run `ollama pull`".to_string(),
        }
        .blocking_reason()
        .unwrap();
        let unavailable = Availability::Unavailable {
            detail: "runtime unreachable".to_string(),
        }
        .blocking_reason()
        .unwrap();

        assert!(download.contains("downloaded"));
        assert!(unavailable.contains("not available"));
        assert_ne!(download, unavailable);
    }

    #[test]
    fn test_default_session_options() {
        let options = SessionOptions::default();
        assert!((options.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(options.top_k, 3);
    }
}
