//! Synchronous `Read + Seek` over a [`SeekableRangeChannel`].
//!
//! Archive readers and checksum code written against `std::io` can use a
//! remote object like a local file. Every call blocks the current thread on
//! the given Tokio runtime handle, so this must not be used from inside an
//! async task (use `spawn_blocking` for that).
//!
//! The handle should belong to a multi-thread runtime. `Handle::block_on` on a
//! current-thread runtime cannot drive the I/O and timer drivers, so network
//! sources only make progress there while another thread is inside
//! `Runtime::block_on`. Closing on drop is skipped for such handles.

use std::io::{self, Read, Seek, SeekFrom};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::channel::SeekableRangeChannel;
use crate::source::RangeSource;

pub struct BlockingChannel<S: RangeSource + ?Sized> {
    inner: SeekableRangeChannel<S>,
    handle: Handle,
}

impl<S: RangeSource + ?Sized> BlockingChannel<S> {
    pub fn new(inner: SeekableRangeChannel<S>, handle: Handle) -> Self {
        Self { inner, handle }
    }

    pub fn get_ref(&self) -> &SeekableRangeChannel<S> {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut SeekableRangeChannel<S> {
        &mut self.inner
    }

    /// Close the underlying channel now instead of on drop
    pub fn close(&mut self) {
        self.handle.block_on(self.inner.close());
    }
}

impl<S: RangeSource + ?Sized> Read for BlockingChannel<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.handle.block_on(self.inner.read(buf))?)
    }
}

impl<S: RangeSource + ?Sized> Seek for BlockingChannel<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = self.inner.size();
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => size.checked_add_signed(offset),
            SeekFrom::Current(offset) => self.inner.position().checked_add_signed(offset),
        };

        let target = match target {
            Some(target) if target <= size => target,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid seek to {:?} in object of {} bytes", pos, size),
                ));
            }
        };

        self.handle.block_on(self.inner.seek(target))?;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.inner.position())
    }
}

impl<S: RangeSource + ?Sized> Drop for BlockingChannel<S> {
    fn drop(&mut self) {
        // block_on panics inside a runtime and can hang on a current-thread
        // one; the stream is then simply dropped
        if self.inner.is_open()
            && self.handle.runtime_flavor() == RuntimeFlavor::MultiThread
            && Handle::try_current().is_err()
        {
            self.close();
        }
    }
}
