//! HTTP/1.1 fragment client over Tokio TCP.
//!
//! One connection per fetch: the request is written with `Connection: close`
//! and the response is read until its `Content-Length` is satisfied or the
//! server closes the stream.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{Endpoints, FetchError, FetchFuture, FragmentSource};
use crate::config::LazyLoadConfig;
use crate::fragment::ItemId;
use crate::http::{Headers, Request, Response, ResponseError};

/// Maximum size of a complete HTTP response we will buffer (8 MiB).
const MAX_RESPONSE_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per fetch.
const INITIAL_BUF_SIZE: usize = 4096;

/// [`FragmentSource`] backed by plain HTTP/1.1.
///
/// # Examples
///
/// ```rust,no_run
/// use modal_prefetch::fetch::{FragmentSource, HttpFetcher};
/// use modal_prefetch::fragment::ItemId;
///
/// # async fn example() -> Result<(), modal_prefetch::fetch::FetchError> {
/// let fetcher = HttpFetcher::new("127.0.0.1:8000").basic_auth("admin", "secret");
/// let html = fetcher.fetch_fragment(ItemId::new(42)).await?;
/// println!("{html}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    addr: String,
    host: String,
    endpoints: Endpoints,
    timeout: Duration,
    headers: Headers,
}

impl HttpFetcher {
    /// Creates a fetcher for the server at `addr` (`host:port`), using the
    /// default endpoints and timeout.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::from_config(addr, &LazyLoadConfig::default())
    }

    /// Creates a fetcher whose endpoint prefix and timeout come from `config`.
    pub fn from_config(addr: impl Into<String>, config: &LazyLoadConfig) -> Self {
        let addr = addr.into();
        Self {
            host: addr.clone(),
            addr,
            endpoints: Endpoints::new(config.path_prefix.clone()),
            timeout: config.fetch_timeout(),
            headers: Headers::new(),
        }
    }

    /// Overrides the `Host` header (defaults to `addr`).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a header sent with every request, after the built-in ones.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sends HTTP Basic credentials with every request.
    #[must_use]
    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let token = BASE64.encode(format!("{username}:{password}"));
        self.header("Authorization", format!("Basic {token}"))
    }

    /// Issues `GET target` and returns the body of a 2xx response as text.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] if the whole exchange exceeds the timeout.
    /// - [`FetchError::Status`] for a non-2xx response.
    /// - [`FetchError::TooLarge`] once the response passes 8 MiB.
    /// - Any connection, I/O, or parse error encountered on the way.
    pub async fn get(&self, target: &str, accept: &str) -> Result<String, FetchError> {
        match tokio::time::timeout(self.timeout, self.round_trip(target, accept)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(path = target, timeout = ?self.timeout, "fragment fetch timed out");
                Err(FetchError::Timeout(self.timeout))
            }
        }
    }

    async fn round_trip(&self, target: &str, accept: &str) -> Result<String, FetchError> {
        let mut stream =
            TcpStream::connect(&self.addr)
                .await
                .map_err(|source| FetchError::Connect {
                    addr: self.addr.clone(),
                    source,
                })?;

        let mut request = Request::get(target)
            .header("Host", self.host.as_str())
            .header("Accept", accept)
            .header("HX-Request", "true");
        for (name, value) in self.headers.iter() {
            request = request.header(name, value);
        }
        stream.write_all(&request.into_bytes()).await?;
        stream.flush().await?;

        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

        // Headers are parsed once; after that only the buffered length is checked.
        let (response, body_offset, content_length, mut eof) = loop {
            let eof = read_more(&mut stream, &mut buf).await?;
            match Response::parse_head(&buf) {
                Ok((response, offset)) => {
                    let content_length = response.content_length()?;
                    break (response, offset, content_length, eof);
                }
                Err(ResponseError::Incomplete) if eof => return Err(FetchError::UnexpectedEof),
                Err(ResponseError::Incomplete) => continue,
                Err(e) => return Err(e.into()),
            }
        };

        if content_length.is_some_and(|len| body_offset + len > MAX_RESPONSE_SIZE) {
            return Err(FetchError::TooLarge {
                max_bytes: MAX_RESPONSE_SIZE,
            });
        }

        loop {
            let received = buf.len() - body_offset;
            match content_length {
                Some(len) if received >= len => break,
                // No length: the body runs until the server closes.
                None if eof => break,
                _ if eof => return Err(FetchError::UnexpectedEof),
                _ => eof = read_more(&mut stream, &mut buf).await?,
            }
        }

        let mut body = buf.split_off(body_offset).freeze();
        if let Some(len) = content_length {
            body.truncate(len);
        }
        let response = response.with_body(body);

        let status = response.status();
        debug!(
            path = target,
            status = %status,
            bytes = response.body().len(),
            "fragment response received"
        );

        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(String::from_utf8(response.into_body().to_vec())?)
    }
}

/// Reads once into `buf`, returning `true` at end of stream.
async fn read_more(stream: &mut TcpStream, buf: &mut BytesMut) -> Result<bool, FetchError> {
    let bytes_read = stream.read_buf(buf).await?;
    if buf.len() > MAX_RESPONSE_SIZE {
        return Err(FetchError::TooLarge {
            max_bytes: MAX_RESPONSE_SIZE,
        });
    }
    Ok(bytes_read == 0)
}

impl FragmentSource for HttpFetcher {
    fn fetch_fragment(&self, item: ItemId) -> FetchFuture<'_, String> {
        Box::pin(async move {
            let target = self.endpoints.history_view(item);
            self.get(&target, "text/html").await
        })
    }

    fn fetch_batch<'a>(&'a self, items: &'a [ItemId]) -> FetchFuture<'a, String> {
        Box::pin(async move {
            let target = self.endpoints.batch_history_views(items);
            self.get(&target, "application/json").await
        })
    }
}
