//! Range-readable object sources.
//!
//! A [`RangeSource`] knows how to open a byte stream at an offset of one
//! remote object, either to the end of the object or bounded to a window.
//! The channel never talks to a store directly; it only asks a source for
//! streams and decides when to throw them away.

mod http;
mod local;
mod memory;
mod store;

pub use http::{HttpRangeSource, HttpRangeStream};
pub use local::LocalFileSource;
pub use memory::MemorySource;
pub use store::{ObjectStoreSource, ObjectStoreStream};

use async_trait::async_trait;
use std::io;
use thiserror::Error;

/// Failure to produce a stream for a range.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("range request {range} failed: {source}")]
    RangeOpen {
        range: String,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    pub(crate) fn range_open(start: u64, end: Option<u64>, source: io::Error) -> Self {
        SourceError::RangeOpen {
            range: describe_range(start, end),
            source,
        }
    }
}

/// Renders `[start, end)` the way it appears in log lines and errors.
pub(crate) fn describe_range(start: u64, end: Option<u64>) -> String {
    match end {
        Some(end) => format!("[{}, {})", start, end),
        None => format!("[{}, ..)", start),
    }
}

/// A live byte stream returned by a [`RangeSource`].
///
/// Dropping a stream is allowed at any point; [`RangeStream::abort`] makes the
/// intent explicit and lets a source tear the transfer down eagerly.
#[async_trait]
pub trait RangeStream: Send {
    /// Reads the next bytes into `buf`, returning 0 once the stream is done.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Terminates the transfer without consuming the remaining bytes.
    fn abort(self: Box<Self>) {}
}

/// An unbounded stream from some offset to the end of the object.
pub struct OpenedTail {
    pub stream: Box<dyn RangeStream>,
    /// Object length as reported by the source when the stream was opened.
    pub declared_length: u64,
}

/// Trait for opening range streams on a single object
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Total length of the object in bytes
    async fn length(&self) -> Result<u64, SourceError>;

    /// Open a stream covering `[start, length)`
    async fn open_tail(&self, start: u64) -> Result<OpenedTail, SourceError>;

    /// Open a stream covering `[start, end)`
    async fn open_window(&self, start: u64, end: u64)
    -> Result<Box<dyn RangeStream>, SourceError>;
}
