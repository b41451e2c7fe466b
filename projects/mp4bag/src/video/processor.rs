use crate::error::Result;
use crate::input::InputFile;
use crate::video::{DecoderBackend, FrameSource, RawFrame};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

pub struct SessionStats {
    pub frames: u64,
    pub duration: Duration,
}

/// Everything held open while one input file is being drained: the frame
/// source (and through it the decoder) plus progress reporting.
/// Dropping the session releases the decoder.
pub struct FileSession {
    pub frames: FrameSource,
    pub pb: ProgressBar,
    pub start_time: Instant,
    pub processed_frames: u64,
}

impl FileSession {
    pub fn open(
        input: &InputFile,
        backend: &dyn DecoderBackend,
        show_progress: bool,
    ) -> Result<Self> {
        let frames = FrameSource::open(backend, &input.path)?;

        let pb = if !show_progress {
            ProgressBar::hidden()
        } else {
            match frames.frame_count_hint() {
                Some(total) => {
                    let pb = ProgressBar::new(total);
                    pb.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow}, {eta}) {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("#>-"),
                    );
                    pb
                }
                None => ProgressBar::new_spinner(),
            }
        };
        pb.set_message(input.display_name());

        Ok(Self {
            frames,
            pb,
            start_time: Instant::now(),
            processed_frames: 0,
        })
    }

    pub fn next_frame(&mut self) -> Option<Result<RawFrame>> {
        let frame = self.frames.next();
        if let Some(Ok(_)) = frame {
            self.processed_frames += 1;
            self.pb.inc(1);
        }
        frame
    }

    pub fn finish(self) -> SessionStats {
        self.pb.finish_and_clear();
        SessionStats {
            frames: self.processed_frames,
            duration: self.start_time.elapsed(),
        }
    }
}
