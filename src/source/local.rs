use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use super::{OpenedTail, RangeSource, RangeStream, SourceError};

/// Local file source; every range opens its own file handle
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_at(&self, start: u64, end: Option<u64>) -> Result<File, SourceError> {
        let mut file = File::open(&self.path).await.map_err(|e| self.classify(start, end, e))?;
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| self.classify(start, end, e))?;
        Ok(file)
    }

    fn classify(&self, start: u64, end: Option<u64>, err: io::Error) -> SourceError {
        if err.kind() == io::ErrorKind::NotFound {
            SourceError::NotFound(self.path.display().to_string())
        } else {
            SourceError::range_open(start, end, err)
        }
    }
}

#[async_trait]
impl RangeSource for LocalFileSource {
    async fn length(&self) -> Result<u64, SourceError> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.classify(0, None, e))?;
        Ok(meta.len())
    }

    async fn open_tail(&self, start: u64) -> Result<OpenedTail, SourceError> {
        let file = self.open_at(start, None).await?;
        let declared_length = file
            .metadata()
            .await
            .map_err(|e| self.classify(start, None, e))?
            .len();
        Ok(OpenedTail {
            stream: Box::new(FileStream(file)),
            declared_length,
        })
    }

    async fn open_window(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn RangeStream>, SourceError> {
        let file = self.open_at(start, Some(end)).await?;
        Ok(Box::new(FileStream(file.take(end.saturating_sub(start)))))
    }
}

struct FileStream<R>(R);

#[async_trait]
impl<R: AsyncRead + Unpin + Send> RangeStream for FileStream<R> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).await
    }
}
