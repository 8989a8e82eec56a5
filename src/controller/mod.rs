//! Modal controller: opens and closes the shared history modal.
//!
//! The page has exactly one modal container. Opening a modal consults the
//! cache first and falls back to the network; closing it decides whether the
//! displayed markup may be reused later.
//!
//! ## Caching policy
//!
//! A fragment may contain `hx-trigger="intersect once"` elements that load the
//! next page of history records the first time they scroll into view. If such
//! markup were cached while a trigger is still present, reinserting it would
//! fire that request a second time. [`ModalController::close`] therefore
//! declines to cache any fragment that still carries a one-shot trigger, and
//! never rewrites markup to strip them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::cache::SharedCache;
use crate::fetch::{FetchError, FragmentSource};
use crate::fragment::{Fragment, ItemId, history_key};

/// The single modal container of a page, plus the fragment-swap library's
/// hook initialisation.
///
/// # Contract
///
/// - Methods take `&self`; implementations use interior mutability so one
///   container can be shared by the controller and the host page.
/// - [`process`](Self::process) is called after every insertion so that
///   triggers inside the new markup are wired up.
pub trait ModalContainer: Send + Sync {
    /// Returns the markup currently displayed.
    fn markup(&self) -> String;

    /// Replaces the displayed markup.
    fn replace(&self, markup: &str);

    /// Re-initialises interactive hooks on the current markup.
    fn process(&self);

    /// Removes all displayed markup.
    fn clear(&self);
}

/// A [`ModalContainer`] that keeps its markup in memory.
///
/// Useful for headless rendering and for tests; it records how many times
/// hooks were (re)initialised.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    markup: Mutex<String>,
    processed: AtomicUsize,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`process`](ModalContainer::process) calls so far.
    pub fn process_count(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.markup.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModalContainer for MemoryContainer {
    fn markup(&self) -> String {
        self.lock().clone()
    }

    fn replace(&self, markup: &str) {
        let mut current = self.lock();
        current.clear();
        current.push_str(markup);
    }

    fn process(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Where an opened modal's markup came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalSource {
    Cache,
    Network,
}

/// What [`ModalController::close`] did with the displayed markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Markup was saved under `history-<id>`.
    Cached(ItemId),
    /// Markup still had one-shot triggers and was not cached.
    PendingTriggers(ItemId),
    /// No item id could be read from the markup; nothing was cached.
    NoItem,
}

/// Opens and closes the shared history modal.
pub struct ModalController {
    cache: SharedCache,
    source: Arc<dyn FragmentSource>,
    container: Arc<dyn ModalContainer>,
}

impl ModalController {
    pub fn new(
        cache: SharedCache,
        source: Arc<dyn FragmentSource>,
        container: Arc<dyn ModalContainer>,
    ) -> Self {
        Self {
            cache,
            source,
            container,
        }
    }

    /// Shows the history modal for `item`.
    ///
    /// On a cache hit the cached markup is inserted and hooks are
    /// re-initialised. On a miss the fragment is fetched and swapped in
    /// directly; it is not cached until [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of a failed fetch. The container is left
    /// untouched in that case, so the user can simply try again.
    pub async fn open(&self, item: ItemId) -> Result<ModalSource, FetchError> {
        let key = history_key(item);

        if let Some(markup) = self.cache.get(&key) {
            debug!(key = %key, "opening modal from cache");
            self.container.replace(&markup);
            self.container.process();
            return Ok(ModalSource::Cache);
        }

        debug!(key = %key, "modal not cached, fetching");
        let markup = self
            .source
            .fetch_fragment(item)
            .await
            .inspect_err(|e| warn!(item = %item, error = %e, "failed to fetch history modal"))?;

        self.container.replace(&markup);
        self.container.process();
        Ok(ModalSource::Network)
    }

    /// Closes the modal, caching its markup when that is safe.
    ///
    /// The container is always cleared, including when the markup is empty or
    /// carries no `data-item-id`.
    pub fn close(&self) -> CloseOutcome {
        let fragment = Fragment::new(self.container.markup());

        let outcome = match fragment.item_id() {
            None => {
                debug!("closing modal without an item id, nothing cached");
                CloseOutcome::NoItem
            }
            Some(item) if fragment.has_pending_once_triggers() => {
                debug!(
                    item = %item,
                    pending = fragment.pending_once_triggers(),
                    "not caching modal with pending one-shot triggers"
                );
                CloseOutcome::PendingTriggers(item)
            }
            Some(item) => {
                self.cache.save(history_key(item), fragment.into_markup());
                CloseOutcome::Cached(item)
            }
        };

        self.container.clear();
        outcome
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }
}
