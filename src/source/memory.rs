use async_trait::async_trait;
use bytes::Bytes;
use std::io;

use super::{OpenedTail, RangeSource, RangeStream, SourceError};

/// In-memory object, mostly useful for tests and for wrapping data that has
/// already been fetched.
///
/// Streams hand out at most `chunk_size` bytes per read so callers see the
/// same short reads a network body produces.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    chunk_size: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            chunk_size: usize::MAX,
        }
    }

    /// Limit every stream read to `chunk_size` bytes (at least one).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    fn slice(&self, start: u64, end: u64) -> Result<Bytes, SourceError> {
        let len = self.data.len() as u64;
        if start > end || end > len {
            return Err(SourceError::range_open(
                start,
                Some(end),
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("range outside object of {} bytes", len),
                ),
            ));
        }
        Ok(self.data.slice(start as usize..end as usize))
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    async fn length(&self) -> Result<u64, SourceError> {
        Ok(self.data.len() as u64)
    }

    async fn open_tail(&self, start: u64) -> Result<OpenedTail, SourceError> {
        let len = self.data.len() as u64;
        let data = self.slice(start, len)?;
        Ok(OpenedTail {
            stream: Box::new(MemoryStream::new(data, self.chunk_size)),
            declared_length: len,
        })
    }

    async fn open_window(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn RangeStream>, SourceError> {
        let data = self.slice(start, end)?;
        Ok(Box::new(MemoryStream::new(data, self.chunk_size)))
    }
}

struct MemoryStream {
    data: Bytes,
    chunk_size: usize,
}

impl MemoryStream {
    fn new(data: Bytes, chunk_size: usize) -> Self {
        Self { data, chunk_size }
    }
}

#[async_trait]
impl RangeStream for MemoryStream {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len()).min(self.chunk_size);
        let chunk = self.data.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        Ok(n)
    }
}
