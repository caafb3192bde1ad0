use std::io;
use thiserror::Error;

use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unable to open object stream at position {offset}: {source}")]
    Open {
        offset: u64,
        #[source]
        source: SourceError,
    },

    #[error("can't skip far enough: wanted {requested} bytes, stream ended after {skipped}")]
    SkipStalled { requested: u64, skipped: u64 },

    #[error("buffer mark is no longer valid")]
    MarkInvalid,

    #[error("channel is read-only")]
    ReadOnly,

    #[error("position {target} is beyond object length {length}")]
    OutOfBounds { target: u64, length: u64 },

    #[error("channel is closed")]
    Closed,

    #[error("object ended at position {position}, expected {length} bytes")]
    Truncated { position: u64, length: u64 },

    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the source reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Open {
                source: SourceError::NotFound(_),
                ..
            }
        )
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::Io(io_err) => return io_err,
            ref e if e.is_not_found() => io::ErrorKind::NotFound,
            Error::ReadOnly => io::ErrorKind::Unsupported,
            Error::OutOfBounds { .. } | Error::InvalidConfig(_) => io::ErrorKind::InvalidInput,
            Error::SkipStalled { .. } | Error::Truncated { .. } => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
