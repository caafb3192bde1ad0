//! Fixed-size read buffer with mark/reset over a single range stream.
//!
//! Remote bodies arrive in network-sized pieces, so a read or a skip may make
//! less progress than asked for. [`LookaheadBuffer::skip_exactly`] loops until
//! the requested distance is covered and reports a stalled stream as an error
//! instead of silently under-skipping.

use crate::error::{Error, Result};
use crate::source::RangeStream;

pub struct LookaheadBuffer {
    inner: Box<dyn RangeStream>,
    buf: Vec<u8>,
    /// Next byte to hand out
    pos: usize,
    /// End of valid data in `buf`
    filled: usize,
    mark: Option<usize>,
    mark_limit: usize,
    /// Bytes taken from `inner` so far
    pulled: u64,
    eof: bool,
}

impl LookaheadBuffer {
    pub fn new(inner: Box<dyn RangeStream>, capacity: usize) -> Self {
        Self {
            inner,
            buf: vec![0u8; capacity.max(1)],
            pos: 0,
            filled: 0,
            mark: None,
            mark_limit: 0,
            pulled: 0,
            eof: false,
        }
    }

    /// Remember the current position. A later [`reset`](Self::reset) returns
    /// here as long as no more than `limit` bytes were consumed in between.
    pub fn mark(&mut self, limit: usize) {
        self.mark = Some(self.pos);
        self.mark_limit = limit;
    }

    pub fn reset(&mut self) -> Result<()> {
        match self.mark {
            Some(mark) => {
                self.pos = mark;
                Ok(())
            }
            None => Err(Error::MarkInvalid),
        }
    }

    #[cfg(test)]
    pub(crate) fn has_mark(&self) -> bool {
        self.mark.is_some()
    }

    /// Bytes pulled from the underlying stream, buffered or not
    pub fn pulled(&self) -> u64 {
        self.pulled
    }

    pub fn is_exhausted(&self) -> bool {
        self.eof && self.pos == self.filled
    }

    pub async fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }

        if self.pos == self.filled {
            // Nothing to keep for a reset, large reads go straight through
            if self.mark.is_none() && dst.len() >= self.buf.len() {
                return self.read_inner(dst).await;
            }
            if self.fill().await? == 0 {
                return Ok(0);
            }
        }

        let n = dst.len().min(self.filled - self.pos);
        dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    /// Skip up to `n` bytes with at most one read from the stream
    pub async fn skip(&mut self, n: u64) -> Result<u64> {
        if n == 0 {
            return Ok(0);
        }
        if self.pos == self.filled && self.fill().await? == 0 {
            return Ok(0);
        }

        let step = n.min((self.filled - self.pos) as u64);
        self.pos += step as usize;
        Ok(step)
    }

    /// Skip exactly `n` bytes.
    ///
    /// Returns `true` if more than one step was needed to get there.
    pub async fn skip_exactly(&mut self, n: u64) -> Result<bool> {
        let mut skipped = 0;
        let mut repeated = false;
        while skipped < n {
            let step = self.skip(n - skipped).await?;
            if step == 0 {
                return Err(Error::SkipStalled {
                    requested: n,
                    skipped,
                });
            }
            skipped += step;
            if skipped < n {
                repeated = true;
            }
        }
        Ok(repeated)
    }

    /// Read and discard everything left in the stream.
    ///
    /// Returns the number of bytes pulled from the stream while draining;
    /// bytes already sitting in the buffer are not counted.
    pub async fn drain(&mut self) -> Result<u64> {
        self.mark = None;
        self.pos = 0;
        self.filled = 0;

        let before = self.pulled;
        while !self.eof {
            let n = self.inner.read(&mut self.buf).await?;
            self.pulled += n as u64;
            if n == 0 {
                self.eof = true;
            }
        }
        Ok(self.pulled - before)
    }

    /// Give up on the stream without reading the rest of it
    pub fn abort(self) {
        self.inner.abort();
    }

    async fn read_inner(&mut self, dst: &mut [u8]) -> Result<usize> {
        if self.eof {
            return Ok(0);
        }
        let n = self.inner.read(dst).await?;
        self.pulled += n as u64;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Called only when every buffered byte has been handed out.
    async fn fill(&mut self) -> Result<usize> {
        match self.mark {
            None => {
                self.pos = 0;
                self.filled = 0;
            }
            Some(mark) => {
                if mark > 0 {
                    self.buf.copy_within(mark..self.filled, 0);
                    self.filled -= mark;
                    self.pos -= mark;
                    self.mark = Some(0);
                }
                if self.filled >= self.buf.len() {
                    if self.pos >= self.mark_limit {
                        self.mark = None;
                        self.pos = 0;
                        self.filled = 0;
                    } else {
                        let grown = (self.buf.len() * 2).min(self.mark_limit);
                        self.buf.resize(grown, 0);
                    }
                }
            }
        }

        if self.eof {
            return Ok(0);
        }
        let n = self.inner.read(&mut self.buf[self.filled..]).await?;
        self.pulled += n as u64;
        self.filled += n;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }
}
