use super::{PixelEncoding, RawFrame, VideoDecoder};
use anyhow::{anyhow, bail, Context, Result};
use opencv::{
    core::{Mat, CV_8UC1, CV_8UC3, CV_8UC4},
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_POS_MSEC},
};
use std::path::Path;

pub struct OpencvDecoder {
    capture: VideoCapture,
    total_frames: u64,
}

impl OpencvDecoder {
    pub fn new(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Path is not valid UTF-8: {:?}", path))?;
        let capture = VideoCapture::from_file(path_str, CAP_ANY)?;
        if !capture.is_opened()? {
            bail!("Failed to open video file: {}", path_str);
        }

        let fps = capture.get(CAP_PROP_FPS)?;
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?.max(0.0) as u64;
        let duration_secs = if fps > 0.0 {
            raw_count as f64 / fps
        } else {
            0.0
        };

        tracing::info!(
            "OpencvDecoder: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}",
            path_str,
            duration_secs,
            fps,
            raw_count
        );

        Ok(Self {
            capture,
            total_frames: raw_count,
        })
    }
}

/// Copies a Mat into a packed buffer, mapping its type to a ROS encoding the
/// same way cv_bridge does for 8-bit images.
fn mat_to_frame(mat: &Mat) -> Result<RawFrame> {
    let encoding = match mat.typ() {
        t if t == CV_8UC1 => PixelEncoding::Mono8,
        t if t == CV_8UC3 => PixelEncoding::Bgr8,
        t if t == CV_8UC4 => PixelEncoding::Bgra8,
        t => bail!("Unsupported Mat type {}", t),
    };

    let packed;
    let mat = if mat.is_continuous() {
        mat
    } else {
        packed = mat.try_clone()?;
        &packed
    };

    let width = mat.cols() as u32;
    let height = mat.rows() as u32;
    let data = mat.data_bytes().context("Mat data not accessible")?.to_vec();

    Ok(RawFrame {
        data,
        width,
        height,
        step: width * encoding.channels(),
        encoding,
        offset_ms: 0.0,
    })
}

impl VideoDecoder for OpencvDecoder {
    fn read_next_frame(&mut self) -> Result<Option<RawFrame>> {
        if !self.capture.is_opened()? {
            return Ok(None);
        }

        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Ok(None);
        }

        mat_to_frame(&frame).map(Some)
    }

    fn current_offset_ms(&self) -> Result<f64> {
        Ok(self.capture.get(CAP_PROP_POS_MSEC)?)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (self.total_frames > 0).then_some(self.total_frames)
    }
}

impl Drop for OpencvDecoder {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("OpencvDecoder: release failed: {}", e);
        }
    }
}
