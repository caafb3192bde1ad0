//! Shared helpers: a source that records every range request and how each
//! stream ended.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex};

use rangeseek::{
    ChannelConfig, MemorySource, OpenedTail, RangeSource, RangeStream, SeekableRangeChannel,
    SourceError,
};

/// Deterministic, non-periodic test content
pub fn reference(len: usize) -> Vec<u8> {
    (0..len as u64)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Open {
    pub start: u64,
    /// `None` for tail requests
    pub end: Option<u64>,
}

#[derive(Debug, Default, Clone)]
pub struct Log {
    pub opens: Vec<Open>,
    /// Bytes handed out by all streams
    pub streamed: u64,
    pub aborts: u64,
    /// Bytes left unread in aborted streams
    pub aborted_bytes: u64,
}

pub struct CountingSource {
    inner: MemorySource,
    log: Arc<Mutex<Log>>,
}

impl CountingSource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            log: Arc::new(Mutex::new(Log::default())),
        }
    }

    pub fn log(&self) -> Log {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, open: Open, stream: Box<dyn RangeStream>) -> Box<dyn RangeStream> {
        let len = self.inner.data().len() as u64;
        let remaining = open.end.unwrap_or(len) - open.start;
        self.log.lock().unwrap().opens.push(open);
        Box::new(CountingStream {
            inner: stream,
            remaining,
            log: self.log.clone(),
        })
    }
}

#[async_trait]
impl RangeSource for CountingSource {
    async fn length(&self) -> Result<u64, SourceError> {
        self.inner.length().await
    }

    async fn open_tail(&self, start: u64) -> Result<OpenedTail, SourceError> {
        let tail = self.inner.open_tail(start).await?;
        Ok(OpenedTail {
            stream: self.record(Open { start, end: None }, tail.stream),
            declared_length: tail.declared_length,
        })
    }

    async fn open_window(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn RangeStream>, SourceError> {
        let stream = self.inner.open_window(start, end).await?;
        Ok(self.record(
            Open {
                start,
                end: Some(end),
            },
            stream,
        ))
    }
}

struct CountingStream {
    inner: Box<dyn RangeStream>,
    remaining: u64,
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl RangeStream for CountingStream {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf).await?;
        self.remaining -= n as u64;
        self.log.lock().unwrap().streamed += n as u64;
        Ok(n)
    }

    fn abort(self: Box<Self>) {
        {
            let mut log = self.log.lock().unwrap();
            log.aborts += 1;
            log.aborted_bytes += self.remaining;
        }
        self.inner.abort();
    }
}

pub fn counting(len: usize) -> (Arc<CountingSource>, Vec<u8>) {
    let data = reference(len);
    let source = Arc::new(CountingSource::new(MemorySource::new(data.clone())));
    (source, data)
}

pub fn channel(
    source: &Arc<CountingSource>,
    config: ChannelConfig,
) -> SeekableRangeChannel<CountingSource> {
    let len = source.inner.data().len() as u64;
    SeekableRangeChannel::new(source.clone(), len, config).unwrap()
}

pub async fn read_n<S: RangeSource + ?Sized>(
    channel: &mut SeekableRangeChannel<S>,
    n: usize,
) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    channel.read_exact(&mut buf).await.unwrap();
    buf
}
