// Output containers and the messages written into them.

pub mod image_msg;
pub mod mcap_writer;

use crate::time::Timestamp;
use anyhow::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct SinkOptions {
    pub compress: bool,
}

/// One encoded message ready to be persisted.
#[derive(Debug, Clone)]
pub struct TimestampedRecord<'a> {
    pub channel: &'a str,
    pub frame_id: &'a str,
    pub payload: Vec<u8>,
    pub timestamp: Timestamp,
}

/// Destination for timestamped records.
///
/// `finish` flushes and closes the container. It must be safe to call more
/// than once, and nothing may be written after it.
pub trait ContainerSink {
    fn write(&mut self, record: &TimestampedRecord<'_>) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
