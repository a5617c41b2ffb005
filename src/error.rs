use thiserror::Error;

/// Failure talking to the generation backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{}", status_message(.status, .detail))]
    Status { status: u16, detail: Option<String> },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

fn status_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(detail) if !detail.is_empty() => format!("{detail} (HTTP {status})"),
        _ => format!("backend responded with HTTP {status}"),
    }
}

/// Terminal failure of a generation run.
///
/// All three variants end the run in the same failed phase; the display
/// text names the step (if any) and the cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Bad or missing input, caught before any network call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The backend answered but reported `success: false`.
    #[error("Error in {step}: {message}")]
    Step { step: &'static str, message: String },

    /// The call itself failed: network, non-2xx status, undecodable body.
    #[error("Exception in {step}: {message}")]
    Transport { step: &'static str, message: String },
}

impl GenerationError {
    /// Name of the step that failed, `None` for validation failures.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            Self::Validation(_) => None,
            Self::Step { step, .. } | Self::Transport { step, .. } => Some(step),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("settings backend rejected {object}: {message}")]
    Rejected { object: String, message: String },

    #[error("settings cache {path}: {source}")]
    Cache {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("settings cache is corrupt: {0}")]
    CacheFormat(#[source] serde_json::Error),

    #[error("unexpected {object} settings payload: {source}")]
    Payload {
        object: String,
        #[source]
        source: serde_json::Error,
    },
}
