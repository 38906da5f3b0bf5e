// Counter feed client
//
// Opens the streaming GET against the counter feed and hands the response
// body to a `FrameReader`. Reconnection is the caller's job: a reader is
// single-use and ends with the HTTP response.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::error::Error;
use crate::event_stream::FrameReader;
use crate::transport::TransportConfig;

/// Raw body chunks of an open feed response.
pub type ChunkStream = BoxStream<'static, Result<Bytes, Error>>;

/// Frame reader over a live feed response.
pub type FeedReader = FrameReader<ChunkStream>;

/// HTTP client for the server-sent counter feed.
pub struct FeedClient {
    http: reqwest::Client,
    url: Url,
    idle_timeout: Option<Duration>,
}

impl FeedClient {
    /// Create a feed client from a `TransportConfig`.
    ///
    /// Any request timeout in `transport` is ignored: it would cut the
    /// stream off mid-body. Use [`with_idle_timeout`](Self::with_idle_timeout)
    /// to detect stalled connections instead.
    pub fn new(url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = TransportConfig::streaming(transport.connect_timeout).build_client()?;
        Ok(Self::with_client(http, url))
    }

    /// Create a feed client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, url: Url) -> Self {
        Self {
            http,
            url,
            idle_timeout: None,
        }
    }

    /// Read-idle window applied to every reader this client opens.
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// The feed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open the feed and return a reader positioned at the first record.
    ///
    /// Fails with [`Error::StreamUnavailable`] when the request cannot be
    /// sent, no response arrives within the idle timeout, or the server
    /// answers with a non-success status.
    pub async fn open(&self, cancel: &CancellationToken) -> Result<FeedReader, Error> {
        debug!(url = %self.url, "GET (event stream)");

        let request = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send();

        // The idle window also bounds the wait for response headers.
        let sent = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| self.unavailable(format!("no response within {limit:?}")))?,
            None => request.await,
        };
        let resp = sent.map_err(|e| self.unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {status}")));
        }

        info!(url = %self.url, "event stream connected");

        let chunks: ChunkStream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::Transport))
            .boxed();

        let reader = FrameReader::new(chunks, cancel.clone());
        Ok(match self.idle_timeout {
            Some(timeout) => reader.with_idle_timeout(timeout),
            None => reader,
        })
    }

    fn unavailable(&self, reason: String) -> Error {
        Error::StreamUnavailable {
            url: self.url.to_string(),
            reason,
        }
    }
}
