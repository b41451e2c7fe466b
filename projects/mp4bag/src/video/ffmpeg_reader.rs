use super::{PixelEncoding, RawFrame, VideoDecoder};
use anyhow::{anyhow, Context, Result};
use ffmpeg_next::ffi;
use std::path::Path;

/// Video decoder backed by FFmpeg via ffmpeg-next. Software decoding only;
/// every frame is converted to BGR24.
pub struct FfmpegDecoder {
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::codec::decoder::Video,
    video_stream_index: usize,
    /// Seconds per pts tick of the video stream.
    time_base: f64,
    /// Lazily created on first frame (source format is only known then).
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    total_frames: u64,
    /// pts of the first decoded frame; offsets are relative to it.
    first_pts: Option<i64>,
    last_offset_ms: f64,
    packet: ffmpeg_next::codec::packet::Packet,
    eof_sent: bool,
}

impl FfmpegDecoder {
    pub fn new(path: &Path) -> Result<Self> {
        ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

        if !path.exists() {
            return Err(anyhow!("Video file not found: {}", path.display()));
        }

        let input_ctx = ffmpeg_next::format::input(&path).context("Failed to open video file")?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow!("No video stream found in {}", path.display()))?;

        let video_stream_index = video_stream.index();
        let time_base = f64::from(video_stream.time_base());
        let total_frames = video_stream.frames().max(0) as u64;
        let duration_secs = input_ctx.duration() as f64 / ffi::AV_TIME_BASE as f64;

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())
                .context("Failed to create decoder context")?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .context("Failed to open video decoder")?;

        let width = decoder.width();
        let height = decoder.height();

        tracing::info!(
            "FfmpegDecoder: opened {}, duration={:.2}s, {}x{}, stream_frames={}",
            path.display(),
            duration_secs,
            width,
            height,
            total_frames
        );

        Ok(Self {
            input_ctx,
            decoder,
            video_stream_index,
            time_base,
            scaler: None,
            width,
            height,
            total_frames,
            first_pts: None,
            last_offset_ms: 0.0,
            packet: ffmpeg_next::codec::packet::Packet::empty(),
            eof_sent: false,
        })
    }

    /// Pulls the next decoded frame, feeding packets as needed.
    /// Returns `false` once the decoder is drained.
    fn decode_loop(&mut self, target: &mut ffmpeg_next::util::frame::Video) -> Result<bool> {
        loop {
            match self.decoder.receive_frame(target) {
                Ok(()) => return Ok(true),
                Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN }) => {
                    if self.eof_sent {
                        return Ok(false);
                    }
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(false),
                Err(e) => return Err(anyhow!("Decoder error: {}", e)),
            }

            let mut found_packet = false;
            while self.packet.read(&mut self.input_ctx).is_ok() {
                if self.packet.stream() == self.video_stream_index {
                    self.decoder
                        .send_packet(&self.packet)
                        .context("Failed to send packet to decoder")?;
                    found_packet = true;
                    break;
                }
            }

            if !found_packet {
                // Input exhausted: flush whatever the decoder still buffers.
                self.decoder
                    .send_eof()
                    .context("Failed to send EOF to decoder")?;
                self.eof_sent = true;
            }
        }
    }

    fn to_bgr(
        &mut self,
        frame: &ffmpeg_next::util::frame::Video,
    ) -> Result<ffmpeg_next::util::frame::Video> {
        if self.scaler.is_none() {
            let scaler = ffmpeg_next::software::scaling::Context::get(
                frame.format(),
                self.width,
                self.height,
                ffmpeg_next::format::Pixel::BGR24,
                self.width,
                self.height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .context("Failed to create scaler")?;
            self.scaler = Some(scaler);
        }

        let mut bgr = ffmpeg_next::util::frame::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(frame, &mut bgr).context("Scaler failed")?;
        }
        Ok(bgr)
    }

    fn record_offset(&mut self, frame: &ffmpeg_next::util::frame::Video) {
        let Some(pts) = frame.timestamp().or_else(|| frame.pts()) else {
            return;
        };
        let first = *self.first_pts.get_or_insert(pts);
        self.last_offset_ms = (pts - first) as f64 * self.time_base * 1000.0;
    }
}

/// Copies a BGR24 frame row by row, dropping the stride padding.
fn pack_bgr(frame: &ffmpeg_next::util::frame::Video) -> RawFrame {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let src = frame.data(0);

    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        data.extend_from_slice(&src[start..start + row_bytes]);
    }

    RawFrame {
        data,
        width,
        height,
        step: row_bytes as u32,
        encoding: PixelEncoding::Bgr8,
        offset_ms: 0.0,
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn read_next_frame(&mut self) -> Result<Option<RawFrame>> {
        let mut decoded = ffmpeg_next::util::frame::Video::empty();
        if !self.decode_loop(&mut decoded)? {
            return Ok(None);
        }
        self.record_offset(&decoded);
        let bgr = self.to_bgr(&decoded)?;
        Ok(Some(pack_bgr(&bgr)))
    }

    fn current_offset_ms(&self) -> Result<f64> {
        Ok(self.last_offset_ms)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (self.total_frames > 0).then_some(self.total_frames)
    }
}
