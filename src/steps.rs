use serde::Serialize;
use serde_json::Value;

use crate::api::{GenerationApi, StepResponse};
use crate::error::ApiError;
use crate::orchestrator::GenerationRequest;
use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    GenerateScript,
    ParseScript,
    CreateSpeech,
    MergeVideos,
    AddCaptions,
    AddMusic,
    ResolveVideoUrl,
}

/// One fixed entry of the generation pipeline: what to show and where to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDescriptor {
    pub kind: StepKind,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub endpoint: &'static str,
}

pub const PIPELINE: [StepDescriptor; 7] = [
    StepDescriptor {
        kind: StepKind::GenerateScript,
        name: "Generate Script",
        description: "Creating an optimized script for your video using advanced AI language models.",
        icon: "code",
        endpoint: "generate-script",
    },
    StepDescriptor {
        kind: StepKind::ParseScript,
        name: "Parse Script",
        description: "Analyzing and extracting key information from your content and structuring it for the video.",
        icon: "database",
        endpoint: "parse-script",
    },
    StepDescriptor {
        kind: StepKind::CreateSpeech,
        name: "Create Speech",
        description: "Converting text to natural-sounding speech with voice synthesis.",
        icon: "mic",
        endpoint: "create-speech",
    },
    StepDescriptor {
        kind: StepKind::MergeVideos,
        name: "Merge Videos",
        description: "Combining visual elements into a seamless video from multiple sources.",
        icon: "video",
        endpoint: "merge-videos",
    },
    StepDescriptor {
        kind: StepKind::AddCaptions,
        name: "Add Captions",
        description: "Generating captions synchronized with the speech.",
        icon: "type",
        endpoint: "add-captions",
    },
    StepDescriptor {
        kind: StepKind::AddMusic,
        name: "Add Music",
        description: "Enhancing your video with a soundtrack to complement the content.",
        icon: "music",
        endpoint: "add-music",
    },
    StepDescriptor {
        kind: StepKind::ResolveVideoUrl,
        name: "Resolve Video URL",
        description: "Finalizing your video and preparing it for viewing and sharing.",
        icon: "link",
        endpoint: "get-video-url",
    },
];

#[derive(Debug, Serialize)]
struct GenerateScriptBody<'a> {
    mothership: &'a str,
    prompt: &'a str,
    genre: &'a str,
    agent: &'a str,
    session_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SessionBody<'a> {
    session_id: &'a str,
}

impl StepKind {
    /// JSON body posted for this step. Only script generation carries the
    /// user inputs; the backend keys everything else by session.
    pub fn request_body(self, session: &SessionId, request: &GenerationRequest) -> Value {
        let body = match self {
            Self::GenerateScript => serde_json::to_value(GenerateScriptBody {
                mothership: &request.mothership,
                prompt: &request.prompt,
                genre: &request.genre,
                agent: &request.agent,
                session_id: session.as_str(),
            }),
            _ => serde_json::to_value(SessionBody {
                session_id: session.as_str(),
            }),
        };
        body.unwrap_or(Value::Null)
    }
}

/// Run one pipeline step against the backend.
pub async fn execute_step<A>(
    api: &A,
    step: &StepDescriptor,
    session: &SessionId,
    request: &GenerationRequest,
) -> Result<StepResponse, ApiError>
where
    A: GenerationApi + ?Sized,
{
    let body = step.kind.request_body(session, request);
    api.post_step(step.endpoint, body).await
}
