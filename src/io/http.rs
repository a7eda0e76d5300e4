use reqwest::Client;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

use super::{ByteSource, seek_out_of_range};
use anyhow::{Result, anyhow, bail};

/// Bytes fetched per Range request by [`HttpSource`].
const READ_AHEAD: usize = 1 << 20;

/// HTTP Range reader for remote compressed files
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        // Send HEAD request to check capabilities
        let resp = client.head(&url).send().await?;

        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }

        // Check if server supports Range requests
        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            bail!("Remote server does not support Range requests");
        }

        // Get file size from Content-Length
        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Remote server did not return Content-Length"))?;

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Get the total size of the remote file
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read data at the specified offset into the buffer
    ///
    /// Returns fewer bytes than `buf.len()` only when the range runs past the
    /// end of the remote file.
    pub async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let end = offset + buf.len() as u64 - 1;
        let end = end.min(self.size - 1);
        let expected_size = (end - offset + 1) as usize;

        let mut received = 0;
        let mut retry_count = 0;

        while received < expected_size {
            let current_start = offset + received as u64;
            let range = format!("bytes={}-{}", current_start, end);

            let result = self
                .client
                .get(&self.url)
                .header("Range", &range)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
                        bail!("HTTP request failed with status: {}", resp.status());
                    }

                    let bytes = resp.bytes().await?;
                    if bytes.is_empty() {
                        bail!("Server returned an empty range for {}", range);
                    }
                    let chunk_len = bytes.len().min(expected_size - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded");
                    }
                    warn!(retry = retry_count, max = self.max_retry, error = %e, "connection error");
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(received)
    }
}

/// Blocking [`ByteSource`] over an [`HttpRangeReader`].
///
/// Sequential reads are served from a read-ahead buffer so that inflating a
/// stream does not turn into one Range request per compressed chunk. Reads
/// block on the given runtime handle and must therefore happen on a thread
/// that is not driving async tasks, e.g. inside `tokio::task::spawn_blocking`.
pub struct HttpSource {
    reader: Arc<HttpRangeReader>,
    runtime: Handle,
    pos: u64,
    buf: Vec<u8>,
    buf_start: u64,
}

impl HttpSource {
    pub fn new(reader: Arc<HttpRangeReader>, runtime: Handle) -> Self {
        Self {
            reader,
            runtime,
            pos: 0,
            buf: Vec::new(),
            buf_start: 0,
        }
    }

    fn buffered(&self) -> &[u8] {
        let end = self.buf_start + self.buf.len() as u64;
        if self.pos >= self.buf_start && self.pos < end {
            &self.buf[(self.pos - self.buf_start) as usize..]
        } else {
            &[]
        }
    }

    fn refill(&mut self) -> std::io::Result<()> {
        let len = (self.reader.size() - self.pos).min(READ_AHEAD as u64) as usize;
        self.buf.resize(len, 0);
        let n = self
            .runtime
            .block_on(self.reader.read_at(self.pos, &mut self.buf))
            .map_err(std::io::Error::other)?;
        self.buf.truncate(n);
        self.buf_start = self.pos;
        Ok(())
    }
}

impl Read for HttpSource {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        if out.is_empty() || self.pos >= self.reader.size() {
            return Ok(0);
        }
        if self.buffered().is_empty() {
            self.refill()?;
        }

        let avail = self.buffered();
        let n = avail.len().min(out.len());
        out[..n].copy_from_slice(&avail[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl ByteSource for HttpSource {
    fn seek_to(&mut self, offset: u64) -> std::io::Result<()> {
        if offset > self.reader.size() {
            return Err(seek_out_of_range(offset, self.reader.size()));
        }
        self.pos = offset;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.reader.size()
    }
}
