//! Seekable, read-only byte channel over a [`RangeSource`].
//!
//! The channel keeps at most one range stream open and decides on every seek
//! whether the open stream can still serve the target offset (skip forward, or
//! rewind inside the lookahead buffer) or a new range request is needed.
//!
//! ## Access patterns
//!
//! - **Sequential**: the stream is an unbounded tail `[offset, length)`. The
//!   first positioning at offset 0 assumes this, and reading past the end of a
//!   random-access window upgrades to it.
//! - **Random access**: the stream is a bounded window of `buffer_size` bytes.
//!   Any other first positioning and every backward or long jump opens one.
//!
//! A channel has a single owner. All state changes go through `&mut self`;
//! callers that share a channel across tasks must lock around it.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use crate::lookahead::LookaheadBuffer;
use crate::source::{RangeSource, describe_range};

/// Counters describing the work a channel has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Bytes delivered to callers
    pub bytes_read: u64,
    /// Bytes passed over by forward seeks inside an open stream
    pub bytes_skipped: u64,
    /// Bytes served again after backward seeks inside the buffer
    pub bytes_rewound: u64,
    /// Bytes fetched only to reposition or to drain a discarded stream
    pub overhead_bytes: u64,
    /// Range requests issued
    pub opens: u64,
    /// Range requests issued as unbounded tail reads
    pub sequential_opens: u64,
    /// Discarded streams that were read to the end
    pub drains: u64,
    pub drained_bytes: u64,
    /// Discarded streams that were aborted
    pub aborts: u64,
}

impl fmt::Display for ChannelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read {} bytes, skipped {}, rewound {}, overhead {}; {} opens ({} sequential), {} drains ({} bytes), {} aborts",
            self.bytes_read,
            self.bytes_skipped,
            self.bytes_rewound,
            self.overhead_bytes,
            self.opens,
            self.sequential_opens,
            self.drains,
            self.drained_bytes,
            self.aborts
        )
    }
}

/// Outcome of comparing a seek target with the open stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reposition {
    Stay,
    Rewind,
    Skip(u64),
    Reopen { sequential: bool },
}

/// Read-only random-access view of a remote object
pub struct SeekableRangeChannel<S: RangeSource + ?Sized> {
    source: Arc<S>,
    config: ChannelConfig,
    length: u64,
    /// `None` until the first positioning call
    position: Option<u64>,
    pos_at_open: u64,
    /// Exclusive end of the bytes the open stream can deliver
    window_end: u64,
    sequential: bool,
    stream: Option<LookaheadBuffer>,
    stats: ChannelStats,
    closed: bool,
}

impl<S: RangeSource + ?Sized> SeekableRangeChannel<S> {
    /// Create a channel over an object of known `length`. Nothing is
    /// requested from the source until the first seek or read.
    pub fn new(source: Arc<S>, length: u64, config: ChannelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            length,
            position: None,
            pos_at_open: 0,
            window_end: 0,
            sequential: false,
            stream: None,
            stats: ChannelStats::default(),
            closed: false,
        })
    }

    /// Create a channel, asking the source for the object length
    pub async fn open(source: Arc<S>, config: ChannelConfig) -> Result<Self> {
        let length = source
            .length()
            .await
            .map_err(|source| Error::Open { offset: 0, source })?;
        Self::new(source, length, config)
    }

    /// Current read offset
    pub fn position(&self) -> u64 {
        self.position.unwrap_or(0)
    }

    /// Total length of the object
    pub fn size(&self) -> u64 {
        self.length
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    pub fn is_sequential(&self) -> bool {
        self.sequential
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Move the read offset to `target`.
    ///
    /// Small moves are served from the open stream; anything else replaces it
    /// with a new range request, which is where this can fail.
    pub async fn seek(&mut self, target: u64) -> Result<&mut Self> {
        self.ensure_open()?;
        if target > self.length {
            return Err(Error::OutOfBounds {
                target,
                length: self.length,
            });
        }

        let Some(position) = self.position else {
            // Starting at 0 usually means the whole object is wanted; zip
            // readers and friends start somewhere near the end instead
            self.open_stream_at(target, target == 0).await?;
            return Ok(self);
        };

        match self.plan(position, target) {
            Reposition::Stay => {}
            Reposition::Rewind => {
                if let Err(e) = self.rewind(position, target).await {
                    debug!(
                        "Couldn't reset: offset {} from {} ({}) - need to reopen stream",
                        target as i128 - position as i128,
                        position,
                        e
                    );
                    self.open_stream_at(target, false).await?;
                }
            }
            Reposition::Skip(offset) => {
                if let Err(e) = self.skip_forward(offset).await {
                    warn!("Skip failed, reopening stream: {}", e);
                    self.open_stream_at(target, false).await?;
                }
            }
            Reposition::Reopen { sequential } => {
                debug!(
                    "Offset {} from {} - need to reopen stream",
                    target as i128 - position as i128,
                    position
                );
                self.open_stream_at(target, sequential).await?;
            }
        }
        Ok(self)
    }

    /// Read into `buf` from the current position.
    ///
    /// Returns the number of bytes read; `Ok(0)` for a non-empty buffer means
    /// the position has reached the end of the object.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if self.position.is_none() {
            self.seek(0).await?;
        }

        let position = self.position();
        if position >= self.length {
            return Ok(0);
        }
        if self.stream.is_none() {
            self.open_stream_at(position, self.sequential).await?;
        }

        let mut n = self.read_stream(buf).await?;
        if n == 0 {
            // The sub-range is used up but the object is not
            debug!("Read all bytes of {} at {}, reopening", self.describe_window(), position);
            self.open_stream_at(position, true).await?;
            n = self.read_stream(buf).await?;
            if n == 0 {
                return Err(Error::Truncated {
                    position,
                    length: self.length,
                });
            }
        }

        self.position = Some(position + n as u64);
        self.stats.bytes_read += n as u64;
        Ok(n)
    }

    /// Fill `buf` completely, failing if the object ends first
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(Error::Truncated {
                    position: self.position(),
                    length: self.length,
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Always fails, the channel is read-only
    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(Error::ReadOnly)
    }

    /// Always fails, the channel is read-only
    pub fn truncate(&mut self, _size: u64) -> Result<()> {
        Err(Error::ReadOnly)
    }

    /// Release the open stream, draining or aborting it.
    ///
    /// Calling this more than once is harmless.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.release_stream().await;
        debug!("Close called. {}", self.stats);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    fn plan(&self, position: u64, target: u64) -> Reposition {
        if self.stream.is_none() {
            return Reposition::Reopen { sequential: false };
        }

        let window = self.config.window();
        let consumed = position - self.pos_at_open;
        if target == position {
            Reposition::Stay
        } else if target < position {
            // Back as far as pos_at_open while the mark still holds
            if target >= self.pos_at_open && consumed < window {
                Reposition::Rewind
            } else {
                Reposition::Reopen { sequential: false }
            }
        } else if target - position < window.saturating_sub(consumed) {
            Reposition::Skip(target - position)
        } else {
            Reposition::Reopen {
                sequential: self.sequential,
            }
        }
    }

    async fn rewind(&mut self, position: u64, target: u64) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::MarkInvalid)?;
        stream.reset()?;
        // The bytes are already buffered, so this should never need a refill
        if stream.skip_exactly(target - self.pos_at_open).await? {
            warn!("Skipped less than expected when seeking backward through the buffer");
        }
        self.position = Some(target);
        self.stats.bytes_rewound += position - target;
        debug!("Skipped back: {}", position - target);
        Ok(())
    }

    async fn skip_forward(&mut self, offset: u64) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::MarkInvalid)?;
        stream.skip_exactly(offset).await?;
        let position = self.position() + offset;
        self.position = Some(position);
        self.stats.bytes_skipped += offset;
        if offset > 100 {
            debug!("Now positioned at {}", position);
        }
        Ok(())
    }

    async fn read_stream(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stream.as_mut() {
            Some(stream) => stream.read(buf).await,
            None => Ok(0),
        }
    }

    /// Replace the open stream with one that starts serving at `target`.
    async fn open_stream_at(&mut self, target: u64, sequential: bool) -> Result<()> {
        self.release_stream().await;

        if target >= self.length {
            self.position = Some(self.length);
            return Ok(());
        }

        let window = self.config.window();
        let open_at = if sequential {
            target
        } else {
            // Keep the last window flush with the end of the object
            target
                .saturating_sub(self.config.lookback)
                .min(self.length.saturating_sub(window))
        };

        debug!(
            "{} at {} to get to new position {} for {}",
            if self.position.is_none() { "Opening" } else { "Reopening" },
            open_at,
            target,
            if sequential { "seq access" } else { "random access" }
        );

        let (stream, window_end) = if sequential {
            let tail = self
                .source
                .open_tail(open_at)
                .await
                .map_err(|source| Error::Open {
                    offset: open_at,
                    source,
                })?;
            if tail.declared_length != self.length {
                warn!(
                    "Source reports {} bytes, channel was created for {}",
                    tail.declared_length, self.length
                );
            }
            (tail.stream, self.length)
        } else {
            let end = (open_at + window).min(self.length);
            let stream = self
                .source
                .open_window(open_at, end)
                .await
                .map_err(|source| Error::Open {
                    offset: open_at,
                    source,
                })?;
            (stream, end)
        };

        self.stats.opens += 1;
        if sequential {
            self.stats.sequential_opens += 1;
        }

        let mut buffered = LookaheadBuffer::new(stream, self.config.buffer_size);
        buffered.mark(self.config.buffer_size);
        if target > open_at {
            buffered.skip_exactly(target - open_at).await?;
            self.stats.overhead_bytes += target - open_at;
        }

        self.stream = Some(buffered);
        self.pos_at_open = open_at;
        self.window_end = window_end;
        self.sequential = sequential;
        self.position = Some(target);
        Ok(())
    }

    /// Discard the open stream, draining it when that is cheap and aborting
    /// it otherwise.
    async fn release_stream(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        let remaining = self.window_end.saturating_sub(self.position());
        let drain = remaining == 0
            || stream.is_exhausted()
            || (self.sequential && remaining <= self.config.drain_threshold);

        if !drain {
            debug!(
                "Abort to avoid transfer of ({}) bytes of {}",
                remaining,
                self.describe_window()
            );
            stream.abort();
            self.stats.aborts += 1;
            return;
        }

        debug!("Draining {} bytes of {}", remaining, self.describe_window());
        match stream.drain().await {
            Ok(drained) => {
                self.stats.drains += 1;
                self.stats.drained_bytes += drained;
                self.stats.overhead_bytes += drained;
            }
            Err(e) => {
                warn!("Drain failed, aborting stream: {}", e);
                stream.abort();
                self.stats.aborts += 1;
            }
        }
    }

    fn describe_window(&self) -> String {
        let end = if self.sequential {
            None
        } else {
            Some(self.window_end)
        };
        describe_range(self.pos_at_open, end)
    }
}
