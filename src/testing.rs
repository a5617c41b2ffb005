//! Scripted backend and event recorder for exercising the pipeline without a
//! live generation service.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{GenerationApi, StepResponse};
use crate::error::ApiError;
use crate::progress::{ProgressSink, RunEvent};

#[derive(Debug, Clone)]
enum Scripted {
    Respond(StepResponse),
    Transport(String),
}

#[derive(Debug, Default)]
struct MockInner {
    scripted: HashMap<String, VecDeque<Scripted>>,
    calls: Vec<(String, Value)>,
    delay: Duration,
}

/// In-memory [`GenerationApi`].
///
/// Endpoints without a scripted answer reply `{"success": true}`. Scripted
/// answers are consumed in order, one per call. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockGenerationApi {
    inner: Arc<Mutex<MockInner>>,
}

impl MockGenerationApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, endpoint: &str, item: Scripted) {
        self.lock()
            .scripted
            .entry(endpoint.to_string())
            .or_default()
            .push_back(item);
    }

    pub fn respond(&self, endpoint: &str, resp: StepResponse) {
        self.push(endpoint, Scripted::Respond(resp));
    }

    /// Next call to `endpoint` answers `success: false` with `error`.
    pub fn fail_step(&self, endpoint: &str, error: &str) {
        self.respond(
            endpoint,
            StepResponse::from_body(json!({"success": false, "error": error})),
        );
    }

    /// Next call to `endpoint` fails before any answer arrives.
    pub fn fail_transport(&self, endpoint: &str, message: &str) {
        self.push(endpoint, Scripted::Transport(message.to_string()));
    }

    /// Simulated latency applied to every call.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.lock().calls.clone()
    }

    pub fn endpoints_called(&self) -> Vec<String> {
        self.lock().calls.iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }
}

#[async_trait]
impl GenerationApi for MockGenerationApi {
    async fn post_step(&self, endpoint: &str, body: Value) -> Result<StepResponse, ApiError> {
        let (scripted, delay) = {
            let mut inner = self.lock();
            inner.calls.push((endpoint.to_string(), body));
            let next = inner
                .scripted
                .get_mut(endpoint)
                .and_then(VecDeque::pop_front);
            (next, inner.delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match scripted {
            Some(Scripted::Respond(resp)) => Ok(resp),
            Some(Scripted::Transport(message)) => Err(ApiError::Other(message)),
            None => Ok(StepResponse::from_body(json!({"success": true}))),
        }
    }
}

/// [`ProgressSink`] that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn progress_values(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::Progress { percent } => Some(percent),
                _ => None,
            })
            .collect()
    }

    pub fn started_steps(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::StepStarted { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
