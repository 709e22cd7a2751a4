//! Where chunk bytes come from

use std::io::Read;

use async_trait::async_trait;
use bytes::Bytes;
use turbo_core::{SignedDataItemStreamFactory, StreamingSignedDataItem};

use crate::error::{ClientError, Result};

/// Sequential reader of a signed item's bytes, chunk by chunk
#[async_trait]
pub trait ChunkSource: Send {
    fn total_size(&self) -> u64;

    /// Bytes `offset..offset + len`. Offsets only ever move forward.
    async fn read_chunk(&mut self, offset: u64, len: u64) -> Result<Bytes>;
}

/// Chunks sliced out of an item held in memory
#[derive(Debug, Clone)]
pub struct MemoryChunkSource {
    bytes: Bytes,
}

impl MemoryChunkSource {
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }
}

impl From<&SignedDataItemStreamFactory> for MemoryChunkSource {
    fn from(item: &SignedDataItemStreamFactory) -> Self {
        Self::new(item.bytes())
    }
}

#[async_trait]
impl ChunkSource for MemoryChunkSource {
    fn total_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn read_chunk(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        let start = usize::try_from(offset).map_err(|_| out_of_range(offset, len))?;
        let end = start
            .checked_add(usize::try_from(len).map_err(|_| out_of_range(offset, len))?)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| out_of_range(offset, len))?;
        Ok(self.bytes.slice(start..end))
    }
}

/// Chunks read from a streaming item without buffering the whole payload.
///
/// The payload stream is opened on the blocking pool by the first read.
pub struct StreamingChunkSource {
    item: StreamingSignedDataItem,
    position: u64,
    reader: Option<Box<dyn Read + Send>>,
}

impl StreamingChunkSource {
    pub fn new(item: &StreamingSignedDataItem) -> Self {
        Self {
            item: item.clone(),
            position: 0,
            reader: None,
        }
    }
}

#[async_trait]
impl ChunkSource for StreamingChunkSource {
    fn total_size(&self) -> u64 {
        self.item.size()
    }

    async fn read_chunk(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        if offset != self.position {
            return Err(ClientError::ProtocolViolation(format!(
                "streaming source is at {}, chunk requested at {offset}",
                self.position
            )));
        }
        let size = self.item.size();
        if offset + len > size {
            return Err(out_of_range(offset, len));
        }
        let reader = self.reader.take();
        if reader.is_none() && self.position != 0 {
            return Err(ClientError::Task(
                "previous chunk read was interrupted".to_string(),
            ));
        }
        let item = self.item.clone();

        let (reader, buf) = tokio::task::spawn_blocking(move || -> std::io::Result<_> {
            let mut reader = match reader {
                Some(reader) => reader,
                None => Box::new(item.stream()?) as Box<dyn Read + Send>,
            };
            let mut buf = Vec::new();
            (&mut reader).take(len).read_to_end(&mut buf)?;
            Ok((reader, buf))
        })
        .await??;
        self.reader = Some(reader);

        if buf.len() as u64 != len {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("source ended at {} of {size}", offset + buf.len() as u64),
            )));
        }
        self.position += len;
        Ok(Bytes::from(buf))
    }
}

fn out_of_range(offset: u64, len: u64) -> ClientError {
    ClientError::ProtocolViolation(format!("chunk {offset}+{len} is outside the item"))
}
