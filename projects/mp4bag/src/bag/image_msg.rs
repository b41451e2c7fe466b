// ROS 2 sensor_msgs/msg/Image, CDR encoded.

use crate::time::Timestamp;
use crate::video::RawFrame;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const SCHEMA_NAME: &str = "sensor_msgs/msg/Image";
pub const SCHEMA_ENCODING: &str = "ros2msg";
pub const MESSAGE_ENCODING: &str = "cdr";

/// Message definition stored alongside the channel so readers can decode it.
pub const SCHEMA_TEXT: &str = "\
std_msgs/Header header
uint32 height
uint32 width
string encoding
uint8 is_bigendian
uint32 step
uint8[] data

================================================================================
MSG: std_msgs/Header
builtin_interfaces/Time stamp
string frame_id

================================================================================
MSG: builtin_interfaces/Time
int32 sec
uint32 nanosec
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    pub is_bigendian: u8,
    pub step: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub fn from_frame(frame: RawFrame, stamp: Timestamp, frame_id: &str) -> Result<Self> {
        let sec = stamp
            .sec()
            .ok_or_else(|| anyhow!("stamp {} is outside the ROS time range", stamp))?;
        Ok(Self {
            header: Header {
                stamp: Time {
                    sec,
                    nanosec: stamp.nanosec(),
                },
                frame_id: frame_id.to_string(),
            },
            height: frame.height,
            width: frame.width,
            encoding: frame.encoding.as_str().to_string(),
            is_bigendian: 0,
            step: frame.step,
            data: frame.data,
        })
    }
}

/// Encodes a frame as a little-endian CDR `Image`, including the
/// encapsulation header.
pub fn encode_frame(frame: RawFrame, stamp: Timestamp, frame_id: &str) -> Result<Vec<u8>> {
    let image = Image::from_frame(frame, stamp, frame_id)?;
    Ok(cdr::serialize::<_, _, cdr::CdrLe>(&image, cdr::Infinite)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::PixelEncoding;

    fn frame() -> RawFrame {
        RawFrame {
            data: (0..12).collect(),
            width: 2,
            height: 2,
            step: 6,
            encoding: PixelEncoding::Bgr8,
            offset_ms: 33.0,
        }
    }

    #[test]
    fn encodes_header_and_pixels() {
        let frame = frame();
        let stamp = Timestamp::from_nanos(1_577_804_400_033_000_000);

        let bytes = encode_frame(frame, stamp, "camera").unwrap();
        // Little-endian CDR encapsulation.
        assert_eq!(&bytes[..4], &[0x00, 0x01, 0x00, 0x00]);

        let image: Image = cdr::deserialize(&bytes).unwrap();
        assert_eq!(image.header.frame_id, "camera");
        assert_eq!(image.header.stamp.sec, 1_577_804_400);
        assert_eq!(image.header.stamp.nanosec, 33_000_000);
        assert_eq!((image.width, image.height, image.step), (2, 2, 6));
        assert_eq!(image.encoding, "bgr8");
        assert_eq!(image.data, (0..12).collect::<Vec<u8>>());
    }

    #[test]
    fn stamps_past_2038_are_not_encoded() {
        // 2039-09-18, beyond int32 seconds.
        let stamp = Timestamp::from_nanos(2_200_000_000 * 1_000_000_000);
        let err = encode_frame(frame(), stamp, "camera").unwrap_err();
        assert!(err.to_string().contains("ROS time range"), "{err}");
    }
}
