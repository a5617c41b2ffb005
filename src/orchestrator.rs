use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::{GenerationApi, StepResponse};
use crate::config::{self, Config};
use crate::error::{ApiError, GenerationError};
use crate::progress::{NullSink, ProgressSink, RunEvent};
use crate::session::SessionId;
use crate::steps::{self, PIPELINE, StepDescriptor, StepKind};
use crate::video_url::resolve_video_url;
use crate::{logi, logok, logw};

/// Share of a step's progress band the ticker may fill before the step
/// actually resolves.
const INTERIM_BAND_FRACTION: f64 = 0.9;

/// User inputs handed to the pipeline by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub mothership: String,
    pub prompt: String,
    pub genre: String,
    pub agent: String,
}

impl GenerationRequest {
    pub fn new(mothership: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            mothership: mothership.into(),
            prompt: prompt.into(),
            genre: config::default_genre(),
            agent: config::default_agent(),
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        let mut missing = Vec::new();
        if self.mothership.trim().is_empty() {
            missing.push("mothership");
        }
        if self.prompt.trim().is_empty() {
            missing.push("prompt");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::Validation(format!(
                "missing {}",
                missing.join(" and ")
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunPhase {
    Running,
    Completed,
    Failed(GenerationError),
}

/// Mutable state of one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    session: SessionId,
    total_steps: usize,
    current_step: usize,
    progress: f64,
    phase: RunPhase,
    video_url: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    fn new(session: SessionId, total_steps: usize) -> Self {
        Self {
            session,
            total_steps,
            current_step: 0,
            progress: 0.0,
            phase: RunPhase::Running,
            video_url: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Aggregate progress in percent, `0.0..=100.0`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    pub fn is_completed(&self) -> bool {
        self.phase == RunPhase::Completed
    }

    pub fn failure(&self) -> Option<&GenerationError> {
        match &self.phase {
            RunPhase::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Playable URL of the finished video. `None` while running, after a
    /// failure, or when the backend did not hand one out.
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    fn step_floor(&self, index: usize) -> f64 {
        index as f64 * 100.0 / self.total_steps as f64
    }

    fn step_ceiling(&self, index: usize) -> f64 {
        (index + 1) as f64 * 100.0 / self.total_steps as f64
    }

    fn interim_cap(&self, index: usize) -> f64 {
        let floor = self.step_floor(index);
        floor + (self.step_ceiling(index) - floor) * INTERIM_BAND_FRACTION
    }

    fn enter_step(&mut self, index: usize) {
        self.current_step = index;
        self.progress = self.progress.max(self.step_floor(index));
    }

    /// Simulated progress while the current step is in flight. Returns
    /// whether the value moved.
    fn tick(&mut self, increment: f64) -> bool {
        if !self.is_running() {
            return false;
        }
        let cap = self.interim_cap(self.current_step);
        let next = (self.progress + increment).min(cap);
        if next > self.progress {
            self.progress = next;
            true
        } else {
            false
        }
    }

    fn complete_step(&mut self) {
        let index = self.current_step;
        if index + 1 >= self.total_steps {
            self.progress = 100.0;
            self.phase = RunPhase::Completed;
            self.finished_at = Some(Utc::now());
        } else {
            self.progress = self.progress.max(self.step_ceiling(index));
            self.current_step = index + 1;
        }
    }

    fn fail(&mut self, err: GenerationError) {
        self.phase = RunPhase::Failed(err);
        self.finished_at = Some(Utc::now());
    }
}

/// Drives the fixed generation pipeline for one session.
///
/// Steps run strictly in order; the first failure ends the run. Nothing is
/// retried automatically, see [`Orchestrator::retry`].
pub struct Orchestrator<A> {
    api: A,
    steps: &'static [StepDescriptor],
    request: GenerationRequest,
    state: RunState,
    origin: String,
    tick: Duration,
    tick_increment: f64,
    sink: Arc<dyn ProgressSink>,
}

impl<A: GenerationApi> Orchestrator<A> {
    /// New run with a fresh session id. `origin` absolutises server-relative
    /// video paths.
    pub fn new(api: A, request: GenerationRequest, origin: impl Into<String>) -> Self {
        Self {
            api,
            steps: &PIPELINE,
            request,
            state: RunState::new(SessionId::new(), PIPELINE.len()),
            origin: origin.into(),
            tick: Duration::from_millis(100),
            tick_increment: 0.5,
            sink: Arc::new(NullSink),
        }
    }

    pub fn from_config(api: A, request: GenerationRequest, cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(api, request, cfg.origin()?)
            .with_tick(cfg.progress_tick(), cfg.progress_tick_increment))
    }

    pub fn with_session(mut self, session: SessionId) -> Self {
        self.state = RunState::new(session, self.steps.len());
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_tick(mut self, interval: Duration, increment: f64) -> Self {
        self.tick = interval.max(Duration::from_millis(1));
        self.tick_increment = increment;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn session(&self) -> &SessionId {
        &self.state.session
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn steps(&self) -> &'static [StepDescriptor] {
        self.steps
    }

    /// Step being executed, or the one that failed. `None` once completed.
    pub fn current_step_descriptor(&self) -> Option<&'static StepDescriptor> {
        if self.state.is_completed() {
            return None;
        }
        self.steps.get(self.state.current_step)
    }

    /// Run the pipeline until it completes or a step fails.
    ///
    /// On success yields the resolved video URL, which is `None` when the
    /// backend did not provide one. A run that already ended returns its
    /// stored outcome without calling the backend.
    pub async fn run(&mut self) -> Result<Option<String>, GenerationError> {
        match &self.state.phase {
            RunPhase::Completed => return Ok(self.state.video_url.clone()),
            RunPhase::Failed(err) => return Err(err.clone()),
            RunPhase::Running => {}
        }

        if let Err(err) = self.validate() {
            return Err(self.fail(err));
        }

        if self.state.started_at.is_none() {
            self.state.started_at = Some(Utc::now());
        }
        self.sink.emit(RunEvent::Started {
            session: self.state.session.clone(),
        });

        let steps = self.steps;
        while self.state.is_running() {
            let index = self.state.current_step;
            let step = &steps[index];

            self.state.enter_step(index);
            self.sink.emit(RunEvent::StepStarted {
                index,
                name: step.name,
            });
            self.emit_progress();

            let resp = match self.call_with_progress(step).await {
                Ok(resp) if resp.success => resp,
                Ok(resp) => {
                    return Err(self.fail(GenerationError::Step {
                        step: step.name,
                        message: resp.failure_reason(),
                    }));
                }
                Err(err) => {
                    return Err(self.fail(GenerationError::Transport {
                        step: step.name,
                        message: err.to_string(),
                    }));
                }
            };

            if step.kind == StepKind::ResolveVideoUrl {
                self.accept_video_url(&resp);
            }

            self.state.complete_step();
            self.sink.emit(RunEvent::StepCompleted {
                index,
                name: step.name,
            });
            self.emit_progress();
        }

        logok("All steps completed. Generation process finished.");
        self.sink.emit(RunEvent::Completed {
            video_url: self.state.video_url.clone(),
        });
        Ok(self.state.video_url.clone())
    }

    /// Clear a failed run back to step 0, keeping the session id.
    pub fn restart(&mut self) {
        logi(format!("Restarting session {} from the first step", self.state.session));
        self.state = RunState::new(self.state.session.clone(), self.steps.len());
    }

    /// User-initiated retry after a failure: restart from step 0 with the same
    /// session and run again. Other phases are left as they are.
    pub async fn retry(&mut self) -> Result<Option<String>, GenerationError> {
        if self.state.failure().is_some() {
            self.restart();
        }
        self.run().await
    }

    /// Discard all run state and hand the backend handle back to the caller.
    pub fn reset(self) -> A {
        self.api
    }

    fn validate(&self) -> Result<(), GenerationError> {
        if self.state.session.as_str().trim().is_empty() {
            return Err(GenerationError::Validation("missing session id".into()));
        }
        self.request.validate()
    }

    fn fail(&mut self, err: GenerationError) -> GenerationError {
        logw(err.to_string());
        self.state.fail(err.clone());
        self.sink.emit(RunEvent::Failed {
            message: err.to_string(),
        });
        err
    }

    fn emit_progress(&self) {
        self.sink.emit(RunEvent::Progress {
            percent: self.state.progress,
        });
    }

    fn accept_video_url(&mut self, resp: &StepResponse) {
        match resolve_video_url(resp, &self.origin) {
            Some(url) => {
                logi(format!("Resolved video URL: {}", url));
                self.state.video_url = Some(url);
            }
            None => logw("No video URL found in final response"),
        }
    }

    /// Await the step's backend call while the ticker nudges progress along
    /// inside the step's band. Dropping this future drops the ticker too.
    async fn call_with_progress(
        &mut self,
        step: &'static StepDescriptor,
    ) -> Result<StepResponse, ApiError> {
        let session = self.state.session.clone();
        let call = steps::execute_step(&self.api, step, &session, &self.request);
        tokio::pin!(call);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                outcome = &mut call => return outcome,
                _ = ticker.tick() => {
                    if self.state.tick(self.tick_increment) {
                        self.sink.emit(RunEvent::Progress { percent: self.state.progress });
                    }
                }
            }
        }
    }
}
