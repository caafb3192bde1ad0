use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, HeaderName, RANGE};
use reqwest::{Client, Response, StatusCode};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::{OpenedTail, RangeSource, RangeStream, SourceError, describe_range};
use anyhow::{Result, anyhow, bail};

/// HTTP Range source for remote objects.
///
/// Works against any S3-compatible object store (public buckets or
/// pre-signed URLs) and plain HTTP servers that honour `Range: bytes=`.
pub struct HttpRangeSource {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: Arc<AtomicU64>,
    max_retry: u32,
}

impl HttpRangeSource {
    /// Send a HEAD request to `url` and keep the object size.
    ///
    /// Fails if the object is missing or the server cannot serve byte ranges.
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let size = head_size(&client, &url).await?;
        debug!(url = %url, size, "remote object ready");

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            max_retry: 10,
        })
    }

    /// Number of attempts for a request whose connection could not be made
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get total body bytes received from the network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    async fn send_range(&self, start: u64, end: Option<u64>) -> Result<Response, SourceError> {
        let range = match end {
            Some(end) => format!("bytes={}-{}", start, end - 1),
            None => format!("bytes={}-", start),
        };

        let mut retry_count = 0;
        let resp = loop {
            match self
                .client
                .get(&self.url)
                .header(RANGE, &range)
                .send()
                .await
            {
                Ok(resp) => break resp,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(SourceError::range_open(start, end, io::Error::other(e)));
                    }
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(SourceError::range_open(start, end, io::Error::other(e))),
            }
        };

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => Ok(resp),
            // Some servers answer a whole-object range with the whole object
            StatusCode::OK if start == 0 && end.is_none() => Ok(resp),
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(self.url.clone())),
            status => Err(SourceError::range_open(
                start,
                end,
                io::Error::other(format!("HTTP request failed with status: {}", status)),
            )),
        }
    }

    fn stream(&self, resp: Response) -> HttpRangeStream {
        HttpRangeStream {
            response: Some(resp),
            pending: Bytes::new(),
            transferred_bytes: self.transferred_bytes.clone(),
        }
    }
}

/// Size of the object behind `url`, checking that byte ranges are served
async fn head_size(client: &Client, url: &str) -> Result<u64> {
    let resp = client.head(url).send().await?;
    match resp.status() {
        StatusCode::NOT_FOUND => bail!("Object not found: {}", url),
        status if !status.is_success() => bail!("HEAD {} answered {}", url, status),
        _ => {}
    }

    let ranges = header(&resp, ACCEPT_RANGES).unwrap_or("none");
    if !ranges.split(',').any(|unit| unit.trim() == "bytes") {
        bail!("{} does not accept byte ranges (accept-ranges: {})", url, ranges);
    }
    header(&resp, CONTENT_LENGTH)
        .and_then(|len| len.parse().ok())
        .ok_or_else(|| anyhow!("No usable content-length for {}", url))
}

fn header(resp: &Response, name: HeaderName) -> Option<&str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Total object length from a `Content-Range: bytes a-b/total` header
fn content_range_total(resp: &Response) -> Option<u64> {
    header(resp, CONTENT_RANGE).and_then(parse_content_range_total)
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    async fn length(&self) -> Result<u64, SourceError> {
        Ok(self.size)
    }

    async fn open_tail(&self, start: u64) -> Result<OpenedTail, SourceError> {
        debug!(range = %describe_range(start, None), "GET");
        let resp = self.send_range(start, None).await?;
        let declared_length = content_range_total(&resp)
            .or_else(|| resp.content_length().map(|len| start + len))
            .unwrap_or(self.size);
        Ok(OpenedTail {
            stream: Box::new(self.stream(resp)),
            declared_length,
        })
    }

    async fn open_window(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn RangeStream>, SourceError> {
        if end <= start {
            return Ok(Box::new(HttpRangeStream::empty(
                self.transferred_bytes.clone(),
            )));
        }
        debug!(range = %describe_range(start, Some(end)), "GET");
        let resp = self.send_range(start, Some(end)).await?;
        Ok(Box::new(self.stream(resp)))
    }
}

/// Body of one range response, pulled chunk by chunk
pub struct HttpRangeStream {
    response: Option<Response>,
    pending: Bytes,
    transferred_bytes: Arc<AtomicU64>,
}

impl HttpRangeStream {
    fn empty(transferred_bytes: Arc<AtomicU64>) -> Self {
        Self {
            response: None,
            pending: Bytes::new(),
            transferred_bytes,
        }
    }
}

#[async_trait]
impl RangeStream for HttpRangeStream {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            let Some(resp) = self.response.as_mut() else {
                return Ok(0);
            };
            match resp.chunk().await.map_err(io::Error::other)? {
                Some(chunk) => {
                    self.transferred_bytes
                        .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    self.pending = chunk;
                }
                None => {
                    // Body complete, the connection can go back to the pool
                    self.response = None;
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
        if self.response.is_some() {
            debug!("dropping unfinished response body");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-511/10000"), Some(10000));
        assert_eq!(parse_content_range_total("bytes 9488-/10000"), Some(10000));
        // Unknown total length
        assert_eq!(parse_content_range_total("bytes 0-511/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }
}
