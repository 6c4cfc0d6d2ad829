use std::fmt;

/// The stage-level failure taxonomy. Every kind except `ResponseFormat`
/// bubbles to the request handler; a response-format mismatch is recovered
/// in the scoring stage with a score of 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    InputRetrieval,
    Parse,
    RenderOrUpload,
    Inference,
    ResponseFormat,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::InputRetrieval => "input_retrieval",
            StageKind::Parse => "parse",
            StageKind::RenderOrUpload => "render_or_upload",
            StageKind::Inference => "inference",
            StageKind::ResponseFormat => "response_format",
        }
    }
}

/// Tagged pipeline error. Handlers downcast this out of `anyhow::Error`
/// when they want more than the generic failure message.
#[derive(Debug, Clone)]
pub struct StageError {
    pub kind: StageKind,
    pub detail: String,
}

impl StageError {
    pub fn wrap(kind: StageKind, err: anyhow::Error) -> Self {
        Self {
            kind,
            detail: format!("{err:#}"),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline stage failed (kind={}): {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for StageError {}
