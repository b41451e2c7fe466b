use crate::bag::SinkOptions;
use crate::error::MergeError;
use crate::pipeline::{MergeConfig, RegressionPolicy};
use crate::time::Timestamp;
use crate::video::Backend;
use clap::Parser;
use std::path::PathBuf;

/// Joins time-stamped camera recordings into a single MCAP file of
/// sensor_msgs/msg/Image messages.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The output MCAP file to create
    #[arg(short = 'o', long)]
    pub outfile: PathBuf,

    /// Earliest message stamp in the output (Unix seconds)
    #[arg(long = "start_unixtime", allow_negative_numbers = true)]
    pub start_unixtime: f64,

    /// Output topic name
    #[arg(long = "topic_name", env = "MP4BAG_TOPIC_NAME")]
    pub topic_name: String,

    /// The input video files to join (glob patterns are expanded)
    #[arg(value_name = "INFILE", required = true, num_args = 1..)]
    pub infiles: Vec<String>,

    /// Compress the output file
    #[arg(long, conflicts_with = "uncompress")]
    pub compress: bool,

    /// Do not compress the output file (default)
    #[arg(long)]
    pub uncompress: bool,

    /// Video decoding backend
    #[arg(long, value_enum, default_value_t = Backend::Opencv, env = "MP4BAG_BACKEND")]
    pub backend: Backend,

    /// What to do with a frame stamped earlier than the one written before it
    #[arg(long = "on_regression", value_enum, default_value_t = RegressionPolicy::Reject)]
    pub on_regression: RegressionPolicy,

    /// Hide per-file progress bars
    #[arg(long = "no_progress")]
    pub no_progress: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn merge_config(&self) -> Result<MergeConfig, MergeError> {
        let topic = self.topic_name.trim();
        if topic.is_empty() || topic.contains(char::is_whitespace) {
            return Err(MergeError::ArgumentValidation(format!(
                "--topic_name must be a non-empty name without spaces, got '{}'",
                self.topic_name
            )));
        }
        if !self.start_unixtime.is_finite() {
            return Err(MergeError::ArgumentValidation(format!(
                "--start_unixtime must be a finite number, got {}",
                self.start_unixtime
            )));
        }

        let mut config = MergeConfig::new(topic);
        config.start_floor = Some(Timestamp::from_secs_f64(self.start_unixtime));
        config.on_regression = self.on_regression;
        config.show_progress = !self.no_progress;
        Ok(config)
    }

    pub fn sink_options(&self) -> SinkOptions {
        SinkOptions {
            compress: self.compress,
        }
    }
}
