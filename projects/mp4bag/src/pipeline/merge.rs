use crate::bag::image_msg::encode_frame;
use crate::bag::{ContainerSink, TimestampedRecord};
use crate::error::{MergeError, Result};
use crate::input::{parse_input_set, InputFile};
use crate::pipeline::types::{MergeConfig, MergeState, MergeStats, RegressionPolicy};
use crate::time::{frame_time, StartTimeParser, Timestamp};
use crate::video::processor::FileSession;
use crate::video::{DecoderBackend, RawFrame};
use anyhow::anyhow;
use std::path::PathBuf;
use std::time::Instant;

/// Drains input files one after another into a single sink, stamping each
/// frame with its file's start time plus its playback offset.
pub struct MergePipeline<P, B> {
    config: MergeConfig,
    parser: P,
    backend: B,
    state: MergeState,
    last_written: Option<Timestamp>,
    stats: MergeStats,
}

impl<P: StartTimeParser, B: DecoderBackend> MergePipeline<P, B> {
    pub fn new(config: MergeConfig, parser: P, backend: B) -> Self {
        Self {
            config,
            parser,
            backend,
            state: MergeState::Idle,
            last_written: None,
            stats: MergeStats::default(),
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Merges `paths` (already resolved and ordered) into `sink`.
    ///
    /// The sink is finished whether or not the merge succeeds. Records written
    /// before a failure stay in it.
    pub fn run<S: ContainerSink>(&mut self, paths: &[PathBuf], sink: &mut S) -> Result<MergeStats> {
        let start_time = Instant::now();
        self.state = MergeState::Idle;
        self.last_written = None;
        self.stats = MergeStats::default();

        let merged = self.merge_files(paths, sink);
        let closed = sink.finish().map_err(|reason| MergeError::SinkWrite {
            channel: self.config.channel.clone(),
            reason,
        });
        self.stats.duration = start_time.elapsed();

        let outcome = match (merged, closed) {
            (Ok(()), closed) => closed,
            (Err(e), Err(close_err)) => {
                tracing::warn!("Closing output after failure also failed: {}", close_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.state = MergeState::Done;
                Ok(self.stats.clone())
            }
            Err(e) => {
                self.state = MergeState::Failed;
                tracing::error!(
                    "Merge aborted after {} frames: {}",
                    self.stats.frames_written,
                    e
                );
                Err(e)
            }
        }
    }

    fn merge_files<S: ContainerSink>(&mut self, paths: &[PathBuf], sink: &mut S) -> Result<()> {
        // Every name is checked before anything is decoded or written.
        let inputs = parse_input_set(paths, &self.parser)?;

        for input in &inputs {
            self.state = MergeState::PerFileLoop;
            let mut session = FileSession::open(input, &self.backend, self.config.show_progress)?;
            tracing::info!(
                "Merging {} (starts at {})",
                input.path.display(),
                input.start_time
            );

            self.state = MergeState::PerFrameLoop;
            while let Some(frame) = session.next_frame() {
                match frame.and_then(|frame| self.emit(input, frame, sink)) {
                    Ok(()) => {}
                    Err(e) if e.is_file_scoped() => {
                        tracing::warn!("{}; continuing with the next file", e);
                        self.stats.truncated_files += 1;
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            let session_stats = session.finish();
            self.stats.files += 1;
            tracing::info!(
                "Finished {}: {} frames in {:.2?}",
                input.display_name(),
                session_stats.frames,
                session_stats.duration
            );
        }

        Ok(())
    }

    fn emit<S: ContainerSink>(
        &mut self,
        input: &InputFile,
        frame: RawFrame,
        sink: &mut S,
    ) -> Result<()> {
        let timestamp = frame_time(input.start_time, frame.offset_ms).ok_or_else(|| {
            MergeError::FrameDecode {
                path: input.path.clone(),
                reason: anyhow!("frame offset {} ms is out of range", frame.offset_ms),
            }
        })?;

        if let Some(floor) = self.config.start_floor {
            if timestamp < floor {
                tracing::trace!("Dropping frame at {} (before {})", timestamp, floor);
                self.stats.frames_before_start += 1;
                return Ok(());
            }
        }

        if let Some(previous) = self.last_written {
            if timestamp < previous {
                match self.config.on_regression {
                    RegressionPolicy::Reject => {
                        return Err(MergeError::OrderingViolation {
                            path: input.path.clone(),
                            previous,
                            current: timestamp,
                        });
                    }
                    RegressionPolicy::Skip => {
                        tracing::warn!(
                            "Skipping frame at {} from {}: earlier than {}",
                            timestamp,
                            input.display_name(),
                            previous
                        );
                        self.stats.frames_out_of_order += 1;
                        return Ok(());
                    }
                }
            }
        }

        let payload = encode_frame(frame, timestamp, &self.config.frame_id).map_err(|reason| {
            MergeError::MessageEncode {
                path: input.path.clone(),
                reason,
            }
        })?;
        let record = TimestampedRecord {
            channel: &self.config.channel,
            frame_id: &self.config.frame_id,
            payload,
            timestamp,
        };
        sink.write(&record).map_err(|reason| MergeError::SinkWrite {
            channel: self.config.channel.clone(),
            reason,
        })?;

        self.last_written = Some(timestamp);
        self.stats.first_timestamp.get_or_insert(timestamp);
        self.stats.last_timestamp = Some(timestamp);
        self.stats.frames_written += 1;
        Ok(())
    }
}
