//! # rangeseek
//!
//! A seekable, read-only byte channel over objects that can only be read with
//! range requests: S3 and other [`object_store`] backends, plain HTTP servers,
//! and (for tests and tooling) local files and memory.
//!
//! The channel keeps one range stream open behind a small lookahead buffer and
//! adapts to the caller's access pattern:
//!
//! - a read starting at offset 0 opens one unbounded stream and keeps
//!   streaming from it;
//! - a jump elsewhere opens a small bounded window, so sparse reads such as a
//!   ZIP central directory lookup do not pull the whole object;
//! - small seeks in either direction are served from the open stream and its
//!   buffer without a new request;
//! - streams that are thrown away are drained when little is left and aborted
//!   otherwise.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rangeseek::{ChannelConfig, HttpRangeSource, SeekableRangeChannel};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = Arc::new(HttpRangeSource::new("https://example.com/archive.zip".to_string()).await?);
//!     let mut channel = SeekableRangeChannel::open(source, ChannelConfig::default()).await?;
//!
//!     // Last 22 bytes: the end of central directory record of a comment-less zip
//!     let mut eocd = [0u8; 22];
//!     let at = channel.size() - eocd.len() as u64;
//!     channel.seek(at).await?.read_exact(&mut eocd).await?;
//!
//!     channel.close().await;
//!     println!("{}", channel.stats());
//!     Ok(())
//! }
//! ```

pub mod blocking;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod lookahead;
pub mod source;

pub use blocking::BlockingChannel;
pub use channel::{ChannelStats, SeekableRangeChannel};
pub use cli::Cli;
pub use config::ChannelConfig;
pub use error::{Error, Result};
pub use source::{
    HttpRangeSource, LocalFileSource, MemorySource, ObjectStoreSource, OpenedTail, RangeSource,
    RangeStream, SourceError,
};
