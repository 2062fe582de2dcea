use std::path::PathBuf;
use thiserror::Error;

/// Failures the pipeline reports to its caller as distinct cases.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unable to determine the start time for {}", path.display())]
    MissingStartTime { path: PathBuf },

    #[error("segment length must be positive, got {0}s")]
    InvalidSegmentLength(f64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("stored gps_data for clip {clip_id} is malformed: {source}")]
    CorruptGpsData {
        clip_id: String,
        #[source]
        source: serde_json::Error,
    },
}
