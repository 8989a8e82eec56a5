//! Preloader: warms the modal cache for cards that are already on screen.
//!
//! [`Preloader::preload_visible`] scans the visible inventory cards, skips
//! every item that is already cached or already being fetched, and fetches
//! the rest in the background using the configured [`PreloadStrategy`]:
//!
//! - **Staggered**: one request per item; the i-th request is issued
//!   `i * stagger` after the scan, so issue order follows card order while
//!   completion order is whatever the network makes it.
//! - **Batched**: one request to the batch endpoint; its JSON object is
//!   written to the cache in a single step.
//!
//! Nothing is retried. Every claimed id leaves the in-flight set once its
//! request settles, whatever the outcome, so a later scan can try again.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::SharedCache;
use crate::config::{LazyLoadConfig, PreloadStrategy};
use crate::fetch::{FetchError, FragmentSource};
use crate::fragment::{ItemCard, ItemId, history_key};

mod inflight;

pub use inflight::{Claim, InFlight};

/// Lazy-loading markers a page may declare on its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LazyMarker {
    BackgroundPreload,
    InfiniteScroll,
}

impl LazyMarker {
    /// Value of the `data-lazy-type` attribute carrying this marker.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackgroundPreload => "background-preload",
            Self::InfiniteScroll => "infinite-scroll",
        }
    }
}

/// The inventory view as the preloader and event bridge see it.
pub trait InventoryView: Send + Sync {
    /// Cards currently rendered, in display order.
    fn item_cards(&self) -> Vec<ItemCard>;

    /// Whether the inventory tab is currently shown.
    fn is_visible(&self) -> bool;

    /// Number of elements declaring `marker`. Only used for diagnostics.
    fn lazy_marker_count(&self, marker: LazyMarker) -> usize {
        let _ = marker;
        0
    }
}

/// Errors of a batched preload round.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("batch response is not a JSON object of id to markup: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of one or more preload requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    /// Items whose markup was written to the cache.
    pub cached: Vec<ItemId>,
    /// Items the server had no markup for: absent from a batch response, or
    /// answered with blank markup.
    pub missing: Vec<ItemId>,
    /// Items whose request failed.
    pub failed: Vec<ItemId>,
}

impl PreloadSummary {
    fn merge(&mut self, other: PreloadSummary) {
        self.cached.extend(other.cached);
        self.missing.extend(other.missing);
        self.failed.extend(other.failed);
    }

    fn sort(&mut self) {
        self.cached.sort();
        self.missing.sort();
        self.failed.sort();
    }
}

/// The requests issued by one [`Preloader::preload_visible`] call.
///
/// Dropping the handle does not cancel anything; the requests keep running
/// in the background.
#[derive(Debug)]
#[must_use = "call `wait` to observe the outcome, or drop to let it run detached"]
pub struct PreloadHandle {
    items: Vec<ItemId>,
    tasks: Vec<JoinHandle<PreloadSummary>>,
}

impl PreloadHandle {
    /// Items claimed by this round, in scan order.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Number of requests issued (one per item, or one per batch).
    pub fn request_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Waits for every request of this round and returns the merged outcome
    /// with ids sorted.
    pub async fn wait(self) -> PreloadSummary {
        let mut summary = PreloadSummary::default();
        for task in self.tasks {
            match task.await {
                Ok(part) => summary.merge(part),
                // The claim guard released the ids when the task unwound.
                Err(e) => warn!(error = %e, "preload task did not complete"),
            }
        }
        summary.sort();
        summary
    }
}

/// Fetches history fragments for visible cards ahead of user interaction.
pub struct Preloader {
    cache: SharedCache,
    in_flight: InFlight,
    source: Arc<dyn FragmentSource>,
    view: Arc<dyn InventoryView>,
    strategy: PreloadStrategy,
    stagger: Duration,
}

impl Preloader {
    pub fn new(
        cache: SharedCache,
        in_flight: InFlight,
        source: Arc<dyn FragmentSource>,
        view: Arc<dyn InventoryView>,
        config: &LazyLoadConfig,
    ) -> Self {
        Self {
            cache,
            in_flight,
            source,
            view,
            strategy: config.strategy,
            stagger: config.stagger(),
        }
    }

    pub fn strategy(&self) -> PreloadStrategy {
        self.strategy
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Starts fetching every visible item that is neither cached nor in flight.
    ///
    /// Must be called from within a Tokio runtime: requests run on spawned
    /// tasks and this method returns as soon as they are scheduled.
    pub fn preload_visible(&self) -> PreloadHandle {
        let cards = self.view.item_cards();
        debug!(cards = cards.len(), "scanning item cards for preload");

        let claims: Vec<Claim> = cards
            .iter()
            .filter_map(ItemCard::item_id)
            .filter(|&item| !self.cache.contains(&history_key(item)))
            .filter_map(|item| self.in_flight.try_claim(item))
            .collect();

        let items: Vec<ItemId> = claims.iter().map(Claim::item).collect();
        if claims.is_empty() {
            return PreloadHandle {
                items,
                tasks: Vec::new(),
            };
        }

        let tasks = match self.strategy {
            PreloadStrategy::Staggered => claims
                .into_iter()
                .zip(0u32..)
                .map(|(claim, index)| {
                    tokio::spawn(fetch_one(
                        Arc::clone(&self.source),
                        self.cache.clone(),
                        claim,
                        self.stagger * index,
                    ))
                })
                .collect(),
            PreloadStrategy::Batched => vec![tokio::spawn(fetch_batch(
                Arc::clone(&self.source),
                self.cache.clone(),
                claims,
            ))],
        };

        info!(
            items = items.len(),
            strategy = ?self.strategy,
            "preloading history modals"
        );
        PreloadHandle { items, tasks }
    }
}

async fn fetch_one(
    source: Arc<dyn FragmentSource>,
    cache: SharedCache,
    claim: Claim,
    delay: Duration,
) -> PreloadSummary {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let item = claim.item();
    debug!(item = %item, "preloading history modal");

    let mut summary = PreloadSummary::default();
    match source.fetch_fragment(item).await {
        Ok(markup) => {
            if cache.save(history_key(item), markup) {
                debug!(item = %item, "history modal preloaded");
                summary.cached.push(item);
            } else {
                warn!(item = %item, "server returned an empty history modal");
                summary.missing.push(item);
            }
        }
        Err(e) => {
            warn!(item = %item, error = %e, "failed to preload history modal");
            summary.failed.push(item);
        }
    }

    drop(claim);
    summary
}

async fn fetch_batch(
    source: Arc<dyn FragmentSource>,
    cache: SharedCache,
    claims: Vec<Claim>,
) -> PreloadSummary {
    let items: Vec<ItemId> = claims.iter().map(Claim::item).collect();
    debug!(items = items.len(), "preloading history modals in one batch");

    let mut summary = PreloadSummary::default();
    match request_batch(source.as_ref(), &items).await {
        Ok(fragments) => {
            // Entries are written even for ids this round did not ask for;
            // the server is the source of truth.
            let mut entries = Vec::with_capacity(fragments.len());
            for (id, markup) in fragments {
                // `null` or blank markup means the server has nothing for that id.
                let Some(markup) = markup.filter(|m| !m.trim().is_empty()) else {
                    continue;
                };
                match parse_batch_key(&id) {
                    Some(item) => entries.push((item, markup)),
                    None => warn!(id = %id, "ignoring batch entry with a non-canonical id"),
                }
            }
            let returned: Vec<ItemId> = entries.iter().map(|(item, _)| *item).collect();
            let saved = cache.save_many(
                entries
                    .into_iter()
                    .map(|(item, markup)| (history_key(item), markup)),
            );

            for &item in &items {
                if returned.contains(&item) {
                    summary.cached.push(item);
                } else {
                    summary.missing.push(item);
                }
            }
            debug!(
                saved,
                missing = summary.missing.len(),
                "history modal batch preloaded"
            );
        }
        Err(e) => {
            warn!(items = items.len(), error = %e, "failed to preload history modal batch");
            summary.failed = items;
        }
    }

    drop(claims);
    summary
}

/// Accepts only the canonical decimal form of an id, so `"01"` or `" 1"`
/// cannot overwrite the entry of `"1"`.
fn parse_batch_key(key: &str) -> Option<ItemId> {
    key.parse::<ItemId>()
        .ok()
        .filter(|item| item.to_string() == key)
}

async fn request_batch(
    source: &dyn FragmentSource,
    items: &[ItemId],
) -> Result<BTreeMap<String, Option<String>>, BatchError> {
    let body = source.fetch_batch(items).await?;
    Ok(serde_json::from_str(&body)?)
}
