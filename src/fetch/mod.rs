//! Fragment sources: where history modal markup comes from.
//!
//! The cache layer consumes two server endpoints:
//!
//! | Endpoint                                                    | Body                      |
//! |-------------------------------------------------------------|---------------------------|
//! | `GET /inventory/item/{id}/history-view`                     | HTML fragment             |
//! | `GET /inventory/api/items/batch-history-views?item_ids=1,2` | JSON object `id → HTML`   |
//!
//! [`FragmentSource`] abstracts both so that the controller and preloader can
//! be driven by [`HttpFetcher`] in production and by an in-memory stub in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::fragment::ItemId;
use crate::http::{ResponseError, StatusCode};

mod client;

pub use client::HttpFetcher;

/// Errors produced while fetching a fragment.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Response(#[from] ResponseError),

    #[error("server returned {0}")]
    Status(StatusCode),

    #[error("connection closed before the response was complete")]
    UnexpectedEof,

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("response body is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Boxed future returned by [`FragmentSource`] methods.
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Supplier of server-rendered history fragments.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`: preload fetches run on
///   spawned Tokio tasks sharing one source.
/// - [`fetch_batch`](Self::fetch_batch) returns the raw response body; JSON
///   decoding is the caller's job so that a parse failure is reported apart
///   from a transport failure.
pub trait FragmentSource: Send + Sync {
    /// Fetches the history modal markup for one item.
    fn fetch_fragment(&self, item: ItemId) -> FetchFuture<'_, String>;

    /// Fetches the history modals of several items in one request.
    fn fetch_batch<'a>(&'a self, items: &'a [ItemId]) -> FetchFuture<'a, String>;
}

/// Paths of the fragment endpoints, optionally mounted under a prefix.
///
/// # Examples
///
/// ```
/// use modal_prefetch::fetch::Endpoints;
/// use modal_prefetch::fragment::ItemId;
///
/// let endpoints = Endpoints::new("");
/// assert_eq!(
///     endpoints.history_view(ItemId::new(42)),
///     "/inventory/item/42/history-view"
/// );
/// assert_eq!(
///     endpoints.batch_history_views(&[ItemId::new(1), ItemId::new(2)]),
///     "/inventory/api/items/batch-history-views?item_ids=1,2"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    prefix: String,
}

impl Endpoints {
    /// A trailing `/` on `prefix` is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.ends_with('/') {
            prefix.pop();
        }
        Self { prefix }
    }

    pub fn history_view(&self, item: ItemId) -> String {
        format!("{}/inventory/item/{item}/history-view", self.prefix)
    }

    pub fn batch_history_views(&self, items: &[ItemId]) -> String {
        let ids = items
            .iter()
            .map(ItemId::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/inventory/api/items/batch-history-views?item_ids={ids}",
            self.prefix
        )
    }
}
