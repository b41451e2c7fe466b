use std::path::PathBuf;

use crate::time::Timestamp;

/// Failure kinds of a merge run. Everything except `InputResolution` and
/// `FrameDecode` aborts the run.
#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    #[error("invalid argument: {0}")]
    ArgumentValidation(String),

    #[error("cannot expand input pattern '{pattern}': {reason}")]
    InputResolution { pattern: String, reason: String },

    #[error("file name of {} does not match '{template}'", .path.display())]
    FilenameFormat { path: PathBuf, template: String },

    #[error("cannot open video source {}: {reason:#}", .path.display())]
    SourceOpen {
        path: PathBuf,
        reason: anyhow::Error,
    },

    #[error("failed to decode frame in {}: {reason:#}", .path.display())]
    FrameDecode {
        path: PathBuf,
        reason: anyhow::Error,
    },

    #[error("cannot create output container {}: {reason:#}", .path.display())]
    SinkOpen {
        path: PathBuf,
        reason: anyhow::Error,
    },

    #[error("cannot encode frame from {} as a message: {reason:#}", .path.display())]
    MessageEncode {
        path: PathBuf,
        reason: anyhow::Error,
    },

    #[error("failed to write to channel '{channel}': {reason:#}")]
    SinkWrite {
        channel: String,
        reason: anyhow::Error,
    },

    #[error(
        "timestamp regression in {}: {current} precedes previously written {previous}",
        .path.display()
    )]
    OrderingViolation {
        path: PathBuf,
        previous: Timestamp,
        current: Timestamp,
    },
}

impl MergeError {
    /// Whether the run may continue with the next file after this error.
    pub fn is_file_scoped(&self) -> bool {
        matches!(self, MergeError::FrameDecode { .. })
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
