use crate::time::Timestamp;
use std::time::Duration;

/// Frame id stamped into every image header.
pub const CAMERA_FRAME_ID: &str = "camera";

/// What to do with a frame whose timestamp is earlier than the last one written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RegressionPolicy {
    /// Abort the run.
    #[default]
    Reject,
    /// Drop the frame and keep going.
    Skip,
}

#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub channel: String,
    pub frame_id: String,
    /// Frames stamped before this instant are not written.
    pub start_floor: Option<Timestamp>,
    pub on_regression: RegressionPolicy,
    pub show_progress: bool,
}

impl MergeConfig {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            frame_id: CAMERA_FRAME_ID.to_string(),
            start_floor: None,
            on_regression: RegressionPolicy::default(),
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Idle,
    PerFileLoop,
    PerFrameLoop,
    Done,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeStats {
    pub files: usize,
    pub frames_written: u64,
    pub frames_before_start: u64,
    pub frames_out_of_order: u64,
    /// Files whose frame sequence ended on a decode error.
    pub truncated_files: usize,
    pub first_timestamp: Option<Timestamp>,
    pub last_timestamp: Option<Timestamp>,
    pub duration: Duration,
}
