use std::fmt;

use crate::decoder::DecodeError;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("stream chunk could not be decoded: {0}")]
    Stream(String),

    #[error("completion service reported an error: {0}")]
    Service(String),

    #[error("empty completion from {model}")]
    EmptyResponse { model: String },

    #[error("{0}")]
    Other(String),
}

/// Pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Extraction,
    Synthesis,
    QaGeneration,
    Answering,
    Summary,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Extraction => "extraction",
            Stage::Synthesis => "synthesis",
            Stage::QaGeneration => "qa-generation",
            Stage::Answering => "answering",
            Stage::Summary => "summary",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} [{locator}]: malformed response: {source}")]
    MalformedResponse {
        stage: Stage,
        locator: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{stage} [{locator}]: schema violation: {detail}")]
    SchemaViolation {
        stage: Stage,
        locator: String,
        detail: String,
    },

    #[error("{stage} [{locator}]: completion failed: {source}")]
    Completion {
        stage: Stage,
        locator: String,
        #[source]
        source: LlmError,
    },

    #[error("acquisition failed for {source_id}: {reason}")]
    AcquisitionFailure { source_id: String, reason: String },
}

impl PipelineError {
    pub fn decode(stage: Stage, locator: impl Into<String>, err: DecodeError) -> Self {
        let locator = locator.into();
        match err {
            DecodeError::Malformed { source, .. } => PipelineError::MalformedResponse {
                stage,
                locator,
                source,
            },
            DecodeError::Schema { source } => PipelineError::SchemaViolation {
                stage,
                locator,
                detail: source.to_string(),
            },
        }
    }

    pub fn completion(stage: Stage, locator: impl Into<String>, source: LlmError) -> Self {
        PipelineError::Completion {
            stage,
            locator: locator.into(),
            source,
        }
    }

    pub fn acquisition(source_id: impl Into<String>, reason: impl fmt::Display) -> Self {
        PipelineError::AcquisitionFailure {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::MalformedResponse { stage, .. }
            | PipelineError::SchemaViolation { stage, .. }
            | PipelineError::Completion { stage, .. } => *stage,
            PipelineError::AcquisitionFailure { .. } => Stage::Ingest,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
