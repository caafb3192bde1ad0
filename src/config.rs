use crate::error::{Error, Result};

/// Size of the lookahead buffer and of a random-access window
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// Bytes requested before the target on a random-access open
pub const DEFAULT_LOOKBACK: u64 = 0;

/// Tunables for a [`SeekableRangeChannel`](crate::SeekableRangeChannel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Lookahead buffer capacity, which is also the length of every bounded
    /// random-access window and the mark limit for backward seeks.
    pub buffer_size: usize,
    /// How far before the requested offset a random-access window starts, so
    /// that small backward seeks right after an open stay in the buffer.
    pub lookback: u64,
    /// Largest unread remainder of a sequential stream that is drained rather
    /// than aborted when the stream is discarded.
    pub drain_threshold: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            lookback: DEFAULT_LOOKBACK,
            drain_threshold: DEFAULT_BUFFER_SIZE as u64,
        }
    }
}

impl ChannelConfig {
    /// Sets the buffer size; the drain threshold follows it if it was still
    /// tracking the old buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        if self.drain_threshold == self.buffer_size as u64 {
            self.drain_threshold = buffer_size as u64;
        }
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_lookback(mut self, lookback: u64) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_drain_threshold(mut self, drain_threshold: u64) -> Self {
        self.drain_threshold = drain_threshold;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig("buffer size must be positive".into()));
        }
        if self.lookback >= self.buffer_size as u64 {
            return Err(Error::InvalidConfig(format!(
                "lookback ({}) must be smaller than the buffer size ({})",
                self.lookback, self.buffer_size
            )));
        }
        Ok(())
    }

    pub(crate) fn window(&self) -> u64 {
        self.buffer_size as u64
    }
}
