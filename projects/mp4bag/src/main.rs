mod bag;
mod cli;
mod error;
mod input;
mod pipeline;
mod time;
mod video;

use anyhow::{Context, Result};
use bag::mcap_writer::McapSink;
use cli::Args;
use error::MergeError;
use pipeline::MergePipeline;
use time::CameraFilenameParser;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse_args();
    let config = args.merge_config()?;

    let paths = input::resolve_input_set(&args.infiles);
    if paths.is_empty() {
        tracing::warn!("No input files matched {:?}", args.infiles);
    } else {
        tracing::info!("Resolved {} input files", paths.len());
    }

    let mut sink = McapSink::create(&args.outfile, args.sink_options()).map_err(|reason| {
        MergeError::SinkOpen {
            path: args.outfile.clone(),
            reason,
        }
    })?;

    let mut pipeline = MergePipeline::new(config, CameraFilenameParser::default(), args.backend);
    let stats = pipeline
        .run(&paths, &mut sink)
        .with_context(|| format!("Failed to build {}", args.outfile.display()))?;

    tracing::info!(
        "Wrote {} frames from {} files to {} in {:.2?} (before start: {}, out of order: {}, truncated files: {})",
        stats.frames_written,
        stats.files,
        args.outfile.display(),
        stats.duration,
        stats.frames_before_start,
        stats.frames_out_of_order,
        stats.truncated_files
    );
    if let (Some(first), Some(last)) = (stats.first_timestamp, stats.last_timestamp) {
        tracing::info!(
            "Covered {} .. {} ({:.3}s)",
            first,
            last,
            last.as_secs_f64() - first.as_secs_f64()
        );
    }

    Ok(())
}
