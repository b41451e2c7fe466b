use super::image_msg::{MESSAGE_ENCODING, SCHEMA_ENCODING, SCHEMA_NAME, SCHEMA_TEXT};
use super::{ContainerSink, SinkOptions, TimestampedRecord};
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Writes image records into an MCAP file using the ros2 profile.
/// Channels are registered the first time a record names them.
pub struct McapSink {
    path: PathBuf,
    writer: mcap::Writer<BufWriter<File>>,
    schema_id: u16,
    channels: BTreeMap<String, u16>,
    sequence: u32,
    finished: bool,
}

impl McapSink {
    pub fn create(path: &Path, options: SinkOptions) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let compression = options.compress.then_some(mcap::Compression::Zstd);
        let mut writer = mcap::WriteOptions::new()
            .profile("ros2")
            .compression(compression)
            .create(BufWriter::new(file))
            .context("Failed to start MCAP file")?;

        let schema_id = writer
            .add_schema(SCHEMA_NAME, SCHEMA_ENCODING, SCHEMA_TEXT.as_bytes())
            .context("Failed to register image schema")?;

        tracing::info!(
            "McapSink: writing {} (compression: {})",
            path.display(),
            if options.compress { "zstd" } else { "none" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            schema_id,
            channels: BTreeMap::new(),
            sequence: 0,
            finished: false,
        })
    }

    fn channel_id(&mut self, topic: &str) -> Result<u16> {
        if let Some(&id) = self.channels.get(topic) {
            return Ok(id);
        }
        let id = self
            .writer
            .add_channel(self.schema_id, topic, MESSAGE_ENCODING, &BTreeMap::new())
            .with_context(|| format!("Failed to register channel '{}'", topic))?;
        tracing::debug!("McapSink: channel '{}' -> id {}", topic, id);
        self.channels.insert(topic.to_string(), id);
        Ok(id)
    }
}

impl ContainerSink for McapSink {
    fn write(&mut self, record: &TimestampedRecord<'_>) -> Result<()> {
        if self.finished {
            bail!("{} is already closed", self.path.display());
        }
        let channel_id = self.channel_id(record.channel)?;
        let log_time = u64::try_from(record.timestamp.as_nanos())
            .with_context(|| format!("Timestamp {} precedes the epoch", record.timestamp))?;

        self.sequence = self.sequence.wrapping_add(1);
        let header = mcap::records::MessageHeader {
            channel_id,
            sequence: self.sequence,
            log_time,
            publish_time: log_time,
        };
        self.writer.write_to_known_channel(&header, &record.payload)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer
            .finish()
            .with_context(|| format!("Failed to finalize {}", self.path.display()))?;
        tracing::info!(
            "McapSink: closed {} after {} messages",
            self.path.display(),
            self.sequence
        );
        Ok(())
    }
}
