use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the analysis pipeline.
///
/// Decoding failures are not part of this taxonomy; they are reported by the
/// decoder before a signal ever reaches the pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("numeric instability in {stage}: {detail}")]
    NumericInstability { stage: &'static str, detail: String },
    #[error("analysis exceeded {limit:?} (stopped before {stage})")]
    Timeout { stage: &'static str, limit: Duration },
}

impl AnalysisError {
    pub fn invalid_input<T: Into<String>>(message: T) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_config<T: Into<String>>(message: T) -> Self {
        Self::InvalidConfig(message.into())
    }
}
