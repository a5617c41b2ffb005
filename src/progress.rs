use crate::session::SessionId;
use crate::{logi, logok, logw};

/// Notification emitted while a generation run advances.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started { session: SessionId },
    StepStarted { index: usize, name: &'static str },
    Progress { percent: f64 },
    StepCompleted { index: usize, name: &'static str },
    Completed { video_url: Option<String> },
    Failed { message: String },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: RunEvent) {}
}

/// Writes run events through the pipeline log helpers.
#[derive(Debug, Clone)]
pub struct LogSink {
    total_steps: usize,
}

impl LogSink {
    pub fn new(total_steps: usize) -> Self {
        Self { total_steps }
    }
}

impl ProgressSink for LogSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::Started { session } => logi(format!("Generation session {}", session)),
            RunEvent::StepStarted { index, name } => {
                logi(format!("Step {}/{}: {}", index + 1, self.total_steps, name))
            }
            RunEvent::Progress { percent } => tracing::debug!(percent, "progress"),
            RunEvent::StepCompleted { index, name } => {
                logok(format!("Completed step {}/{}: {}", index + 1, self.total_steps, name))
            }
            RunEvent::Completed { video_url: Some(url) } => logok(format!("Video ready: {}", url)),
            RunEvent::Completed { video_url: None } => logw("Video URL not available"),
            RunEvent::Failed { message } => logw(message),
        }
    }
}
