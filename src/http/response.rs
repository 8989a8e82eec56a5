//! HTTP/1.1 response parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, StatusCode};

/// Errors that can occur while parsing an HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header: {value}")]
    InvalidContentLength { value: String },

    #[error("unsupported transfer encoding: {encoding}")]
    UnsupportedTransferEncoding { encoding: String },
}

/// A parsed HTTP/1.1 response.
///
/// Created by [`Response::parse`] from the bytes read so far, or by
/// [`Response::parse_head`] when the body is buffered separately and attached
/// later with [`with_body`](Self::with_body).
///
/// # Examples
///
/// ```
/// use modal_prefetch::http::{Response, StatusCode};
///
/// let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
/// let (response, offset) = Response::parse(raw).unwrap();
///
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.content_length().unwrap(), Some(5));
/// assert_eq!(&raw[offset..], b"hello");
/// assert_eq!(response.body().as_ref(), b"hello");
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Maximum number of headers we accept per response.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 response from a byte slice.
    ///
    /// Returns the parsed `Response`, with everything after the header
    /// terminator as its body, and the byte offset at which the body begins.
    ///
    /// # Errors
    ///
    /// See [`parse_head`](Self::parse_head).
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ResponseError> {
        let (response, body_offset) = Self::parse_head(buf)?;
        Ok((
            response.with_body(Bytes::copy_from_slice(&buf[body_offset..])),
            body_offset,
        ))
    }

    /// Parse only the status line and headers, leaving the body empty.
    ///
    /// Returns the `Response` and the byte offset at which the body begins,
    /// so a reader can keep buffering body bytes without parsing again.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`]: more data is needed to complete the headers.
    /// - [`ResponseError::Parse`]: the data is malformed.
    /// - [`ResponseError::MissingField`]: the status code is absent.
    pub fn parse_head(buf: &[u8]) -> Result<(Self, usize), ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let code = raw.code.ok_or(ResponseError::MissingField { field: "status" })?;

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        Ok((
            Self {
                status: StatusCode::from_u16(code),
                headers: header_map,
                body: Bytes::new(),
            },
            body_offset,
        ))
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the declared body length, `Ok(None)` if no `Content-Length` was sent.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::InvalidContentLength`] if the header is not a number.
    /// - [`ResponseError::UnsupportedTransferEncoding`] for chunked or other
    ///   transfer codings, which this client does not decode.
    pub fn content_length(&self) -> Result<Option<usize>, ResponseError> {
        if let Some(encoding) = self.headers.get("transfer-encoding") {
            if !encoding.eq_ignore_ascii_case("identity") {
                return Err(ResponseError::UnsupportedTransferEncoding {
                    encoding: encoding.to_owned(),
                });
            }
        }

        match self.headers.get("content-length") {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ResponseError::InvalidContentLength {
                    value: value.to_owned(),
                }),
            None => Ok(None),
        }
    }

    /// Consumes the response and returns its body bytes.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}
