pub mod ffmpeg_reader;
pub mod opencv_reader;
pub mod processor;

use crate::error::MergeError;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Pixel layouts a decoder may hand out, named the way ROS names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelEncoding {
    Mono8,
    Bgr8,
    Bgra8,
}

impl PixelEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            PixelEncoding::Mono8 => "mono8",
            PixelEncoding::Bgr8 => "bgr8",
            PixelEncoding::Bgra8 => "bgra8",
        }
    }

    pub fn channels(self) -> u32 {
        match self {
            PixelEncoding::Mono8 => 1,
            PixelEncoding::Bgr8 => 3,
            PixelEncoding::Bgra8 => 4,
        }
    }
}

/// A decoded frame, tightly packed (`step` bytes per row).
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub step: u32,
    pub encoding: PixelEncoding,
    /// Playback position of this frame relative to the start of its file.
    pub offset_ms: f64,
}

/// Sequential access to one opened video file.
pub trait VideoDecoder {
    /// Decodes the next frame. `None` at end of stream.
    /// The returned frame's `offset_ms` is filled in by [`FrameSource`].
    fn read_next_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Position of the most recently decoded frame, in milliseconds.
    fn current_offset_ms(&self) -> Result<f64>;

    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}

/// Opens decoders. Implemented by every concrete backend.
pub trait DecoderBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoDecoder>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    Opencv,
    Ffmpeg,
}

impl DecoderBackend for Backend {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoDecoder>> {
        let decoder: Box<dyn VideoDecoder> = match self {
            Backend::Opencv => Box::new(opencv_reader::OpencvDecoder::new(path)?),
            Backend::Ffmpeg => Box::new(ffmpeg_reader::FfmpegDecoder::new(path)?),
        };
        Ok(decoder)
    }
}

/// Single-pass stream of frames from one file.
///
/// Holds the decoder for its whole lifetime; the decoder is released when the
/// source is dropped. After end of stream or the first decode error the
/// source yields nothing more.
pub struct FrameSource {
    path: PathBuf,
    decoder: Option<Box<dyn VideoDecoder>>,
    frame_count_hint: Option<u64>,
}

impl FrameSource {
    pub fn open(backend: &dyn DecoderBackend, path: &Path) -> Result<Self, MergeError> {
        let decoder = backend.open(path).map_err(|reason| MergeError::SourceOpen {
            path: path.to_path_buf(),
            reason,
        })?;
        let frame_count_hint = decoder.frame_count_hint();
        Ok(Self {
            path: path.to_path_buf(),
            decoder: Some(decoder),
            frame_count_hint,
        })
    }

    pub fn frame_count_hint(&self) -> Option<u64> {
        self.frame_count_hint
    }

    fn decode_error(&self, reason: anyhow::Error) -> MergeError {
        MergeError::FrameDecode {
            path: self.path.clone(),
            reason,
        }
    }
}

impl Iterator for FrameSource {
    type Item = Result<RawFrame, MergeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let decoder = self.decoder.as_mut()?;

        let frame = decoder.read_next_frame();
        // The position is taken before looking at what the read returned.
        let offset = decoder.current_offset_ms();

        let item = match (frame, offset) {
            (Ok(Some(mut frame)), Ok(offset_ms)) if offset_ms.is_finite() => {
                frame.offset_ms = offset_ms;
                return Some(Ok(frame));
            }
            (Ok(Some(_)), Ok(offset_ms)) => Some(Err(
                self.decode_error(anyhow!("decoder reported offset {} ms", offset_ms)),
            )),
            (Ok(None), _) => None,
            (Err(e), _) | (Ok(Some(_)), Err(e)) => Some(Err(self.decode_error(e))),
        };

        // Exhausted or failed: release the decoder now.
        self.decoder = None;
        item
    }
}

impl std::iter::FusedIterator for FrameSource {}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedBackend, Step};
    use super::*;

    #[test]
    fn yields_frames_with_offsets_in_order() {
        let backend = ScriptedBackend::default().frames("a.mp4", &[0.0, 33.0, 67.0, 100.0]);
        let source = FrameSource::open(&backend, Path::new("a.mp4")).unwrap();
        assert_eq!(source.frame_count_hint(), Some(4));

        let offsets: Vec<f64> = source.map(|f| f.unwrap().offset_ms).collect();
        assert_eq!(offsets, vec![0.0, 33.0, 67.0, 100.0]);
    }

    #[test]
    fn end_of_stream_is_not_an_error() {
        let backend = ScriptedBackend::default().frames("empty.mp4", &[]);
        let mut source = FrameSource::open(&backend, Path::new("empty.mp4")).unwrap();
        assert!(source.next().is_none());
        assert!(source.next().is_none());
        assert_eq!(backend.released.borrow().len(), 1);
    }

    #[test]
    fn decode_error_ends_the_sequence() {
        let backend = ScriptedBackend::default().with_file(
            "bad.mp4",
            vec![Step::Frame(0.0), Step::Fail("corrupt packet"), Step::Frame(66.0)],
        );
        let mut source = FrameSource::open(&backend, Path::new("bad.mp4")).unwrap();

        assert!(source.next().unwrap().is_ok());
        match source.next() {
            Some(Err(MergeError::FrameDecode { path, reason })) => {
                assert_eq!(path, Path::new("bad.mp4"));
                assert!(reason.to_string().contains("corrupt packet"));
            }
            other => panic!("expected FrameDecode, got {:?}", other.map(|r| r.err())),
        }
        assert!(source.next().is_none());
        assert_eq!(backend.released.borrow().as_slice(), [PathBuf::from("bad.mp4")]);
    }

    fn expect_bad_offset(offset_ms: f64) {
        let backend = ScriptedBackend::default().frames("a.mp4", &[0.0, offset_ms, 67.0]);
        let mut source = FrameSource::open(&backend, Path::new("a.mp4")).unwrap();

        assert_eq!(source.next().unwrap().unwrap().offset_ms, 0.0);
        match source.next() {
            Some(Err(MergeError::FrameDecode { path, reason })) => {
                assert_eq!(path, Path::new("a.mp4"));
                assert!(reason.to_string().contains("offset"), "{reason}");
            }
            other => panic!("expected FrameDecode, got {:?}", other.map(|r| r.err())),
        }
        assert!(source.next().is_none());
        assert_eq!(backend.released.borrow().len(), 1);
    }

    #[test]
    fn nan_offset_is_a_decode_error() {
        expect_bad_offset(f64::NAN);
    }

    #[test]
    fn infinite_offset_is_a_decode_error() {
        expect_bad_offset(f64::INFINITY);
        expect_bad_offset(f64::NEG_INFINITY);
    }

    #[test]
    fn open_failure_names_the_file() {
        let backend = ScriptedBackend::default();
        match FrameSource::open(&backend, Path::new("missing.mp4")) {
            Err(MergeError::SourceOpen { path, .. }) => {
                assert_eq!(path, Path::new("missing.mp4"))
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("open should fail"),
        }
    }

    #[test]
    fn dropping_early_releases_the_decoder() {
        let backend = ScriptedBackend::default().frames("a.mp4", &[0.0, 33.0, 67.0]);
        {
            let mut source = FrameSource::open(&backend, Path::new("a.mp4")).unwrap();
            source.next();
            assert!(backend.released.borrow().is_empty());
        }
        assert_eq!(backend.released.borrow().len(), 1);
    }
}
