use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use object_store::path::Path;
use object_store::{GetOptions, GetRange, ObjectStore};
use std::io;
use std::sync::Arc;
use tracing::debug;

use super::{OpenedTail, RangeSource, RangeStream, SourceError, describe_range};

/// Source reading one object of an [`ObjectStore`].
///
/// The store signs its own requests, so private S3 buckets work with the
/// usual credentials.
#[derive(Debug, Clone)]
pub struct ObjectStoreSource {
    store: Arc<dyn ObjectStore>,
    path: Path,
}

impl ObjectStoreSource {
    pub fn new(store: Arc<dyn ObjectStore>, path: Path) -> Self {
        Self { store, path }
    }

    /// Build a source for a URL such as `s3://bucket/key`.
    ///
    /// `AWS_*` environment variables configure credentials and region;
    /// `endpoint` points the client at an S3-compatible server instead of AWS
    /// and switches to path-style requests.
    pub fn from_url(url: &str, endpoint: Option<&str>) -> anyhow::Result<Self> {
        let mut options: Vec<(String, String)> = std::env::vars()
            .filter(|(key, _)| key.starts_with("AWS_"))
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();
        if let Some(endpoint) = endpoint {
            options.push(("aws_endpoint".into(), endpoint.to_string()));
            options.push(("aws_virtual_hosted_style_request".into(), "false".into()));
            options.push(("aws_allow_http".into(), "true".into()));
        }

        let (store, path) = object_store::parse_url_opts(&url.parse()?, options)?;
        if path.as_ref().is_empty() {
            anyhow::bail!("Missing object key in {}", url);
        }
        debug!(url, path = %path, "object store ready");
        Ok(Self::new(Arc::from(store), path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn get(&self, start: u64, end: Option<u64>) -> Result<ObjectStoreStream, SourceError> {
        let range = match end {
            Some(end) => GetRange::Bounded(start as usize..end as usize),
            None => GetRange::Offset(start as usize),
        };
        let options = GetOptions {
            range: Some(range),
            ..Default::default()
        };

        debug!(path = %self.path, range = %describe_range(start, end), "GET");
        let result = self
            .store
            .get_opts(&self.path, options)
            .await
            .map_err(|e| classify(start, end, e))?;
        let declared_length = result.meta.size as u64;
        Ok(ObjectStoreStream {
            body: Some(result.into_stream()),
            pending: Bytes::new(),
            declared_length,
        })
    }
}

fn classify(start: u64, end: Option<u64>, err: object_store::Error) -> SourceError {
    match err {
        object_store::Error::NotFound { path, .. } => SourceError::NotFound(path),
        err => SourceError::range_open(start, end, io::Error::other(err)),
    }
}

#[async_trait]
impl RangeSource for ObjectStoreSource {
    async fn length(&self) -> Result<u64, SourceError> {
        let meta = self
            .store
            .head(&self.path)
            .await
            .map_err(|e| classify(0, None, e))?;
        Ok(meta.size as u64)
    }

    async fn open_tail(&self, start: u64) -> Result<OpenedTail, SourceError> {
        let stream = self.get(start, None).await?;
        let declared_length = stream.declared_length;
        Ok(OpenedTail {
            stream: Box::new(stream),
            declared_length,
        })
    }

    async fn open_window(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn RangeStream>, SourceError> {
        if end <= start {
            return Ok(Box::new(ObjectStoreStream {
                body: None,
                pending: Bytes::new(),
                declared_length: 0,
            }));
        }
        Ok(Box::new(self.get(start, Some(end)).await?))
    }
}

/// Body of one `get_opts` call, pulled chunk by chunk
pub struct ObjectStoreStream {
    body: Option<BoxStream<'static, object_store::Result<Bytes>>>,
    pending: Bytes,
    declared_length: u64,
}

#[async_trait]
impl RangeStream for ObjectStoreStream {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            let Some(body) = self.body.as_mut() else {
                return Ok(0);
            };
            match body.next().await {
                Some(chunk) => self.pending = chunk.map_err(io::Error::other)?,
                None => {
                    self.body = None;
                    return Ok(0);
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        let chunk = self.pending.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        Ok(n)
    }

    fn abort(self: Box<Self>) {
        if self.body.is_some() {
            debug!("dropping unfinished object body");
        }
    }
}
