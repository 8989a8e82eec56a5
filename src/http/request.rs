//! HTTP/1.1 request builder for outgoing fragment fetches.

use bytes::{BufMut, BytesMut};

use super::Headers;

/// An outgoing `GET` request, ready to be serialized onto a TCP stream.
///
/// Fragment endpoints are read-only, so `GET` is the only method the client
/// issues. Every request carries `Connection: close`: the client opens one
/// connection per fetch and, when no `Content-Length` is sent, reads the body
/// until the server hangs up.
///
/// # Examples
///
/// ```
/// use modal_prefetch::http::Request;
///
/// let request = Request::get("/inventory/item/42/history-view")
///     .header("Host", "localhost:8000")
///     .header("Accept", "text/html");
///
/// let bytes = request.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("GET /inventory/item/42/history-view HTTP/1.1\r\n"));
/// assert!(text.contains("Accept: text/html\r\n"));
/// assert!(text.ends_with("Connection: close\r\n\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    target: String,
    headers: Headers,
}

impl Request {
    /// Creates a `GET` request for the given origin-form target (path plus optional query).
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            headers: Headers::new(),
        }
    }

    /// Appends a request header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Serializes the request using HTTP/1.1 wire format.
    ///
    /// `Connection` is always the last header before the blank line.
    pub fn into_bytes(self) -> BytesMut {
        let estimated_size = 64 + self.target.len() + self.headers.len() * 64;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("GET {} HTTP/1.1\r\n", self.target).as_bytes());

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        buf.put(&b"Connection: close\r\n"[..]);
        buf.put(&b"\r\n"[..]);

        buf
    }
}
