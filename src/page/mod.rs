//! Page scope: everything one page view owns.
//!
//! A [`LazyLoading`] is created when the inventory page loads and dropped
//! when it goes away. It owns the only modal cache and in-flight set of that
//! page, so two pages (or two tests) never share state.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::SharedCache;
use crate::config::LazyLoadConfig;
use crate::controller::{ModalContainer, ModalController};
use crate::events::{EventBridge, EventBus};
use crate::fetch::FragmentSource;
use crate::fragment::ItemId;
use crate::preload::{InFlight, InventoryView, LazyMarker, Preloader};

/// The lazy-loading layer of one page view.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use modal_prefetch::config::LazyLoadConfig;
/// use modal_prefetch::controller::MemoryContainer;
/// use modal_prefetch::fetch::HttpFetcher;
/// use modal_prefetch::fragment::{ItemCard, ItemId};
/// use modal_prefetch::page::LazyLoading;
/// use modal_prefetch::preload::InventoryView;
///
/// struct Cards;
///
/// impl InventoryView for Cards {
///     fn item_cards(&self) -> Vec<ItemCard> {
///         vec![ItemCard::new(ItemId::new(1)), ItemCard::new(ItemId::new(2))]
///     }
///     fn is_visible(&self) -> bool {
///         true
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = LazyLoadConfig::new();
///     let page = LazyLoading::new(
///         config.clone(),
///         Arc::new(HttpFetcher::from_config("127.0.0.1:8000", &config)),
///         Arc::new(MemoryContainer::new()),
///         Arc::new(Cards),
///     );
///     let _bridge = page.spawn_bridge();
///
///     page.preloader().preload_visible().wait().await;
///     page.controller().open(ItemId::new(1)).await?;
///     println!("{}", page.debug_snapshot());
///     Ok(())
/// }
/// ```
pub struct LazyLoading {
    config: LazyLoadConfig,
    cache: SharedCache,
    controller: ModalController,
    preloader: Arc<Preloader>,
    view: Arc<dyn InventoryView>,
    bus: EventBus,
}

impl LazyLoading {
    pub fn new(
        config: LazyLoadConfig,
        source: Arc<dyn FragmentSource>,
        container: Arc<dyn ModalContainer>,
        view: Arc<dyn InventoryView>,
    ) -> Self {
        let cache = SharedCache::new();
        let controller = ModalController::new(cache.clone(), Arc::clone(&source), container);
        let preloader = Arc::new(Preloader::new(
            cache.clone(),
            InFlight::new(),
            source,
            Arc::clone(&view),
            &config,
        ));
        let bus = EventBus::from_config(&config);

        debug!(strategy = ?config.strategy, "lazy loading initialised");
        Self {
            config,
            cache,
            controller,
            preloader,
            view,
            bus,
        }
    }

    pub fn config(&self) -> &LazyLoadConfig {
        &self.config
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn controller(&self) -> &ModalController {
        &self.controller
    }

    pub fn preloader(&self) -> &Arc<Preloader> {
        &self.preloader
    }

    /// The bus the host page publishes [`PageEvent`](crate::events::PageEvent)s on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// A bridge wired to this page's cache, preloader and view.
    pub fn bridge(&self) -> EventBridge {
        EventBridge::new(
            self.cache.clone(),
            Arc::clone(&self.preloader),
            Arc::clone(&self.view),
            &self.config,
        )
    }

    /// Subscribes a bridge to the bus and runs it on a Tokio task.
    ///
    /// The task ends once this page scope, and with it the bus, is dropped.
    pub fn spawn_bridge(&self) -> JoinHandle<()> {
        let events = self.bus.subscribe();
        tokio::spawn(self.bridge().run(events))
    }

    /// Current lazy-loading state, for diagnostics.
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        DebugSnapshot {
            background_preloaders: self.view.lazy_marker_count(LazyMarker::BackgroundPreload),
            infinite_scrolls: self.view.lazy_marker_count(LazyMarker::InfiniteScroll),
            cached_keys: self.cache.keys(),
            in_flight: self.preloader.in_flight().items(),
        }
    }
}

/// Point-in-time view of a page's lazy-loading state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugSnapshot {
    /// Elements declaring `data-lazy-type="background-preload"`.
    pub background_preloaders: usize,
    /// Elements declaring `data-lazy-type="infinite-scroll"`.
    pub infinite_scrolls: usize,
    /// Cache keys, sorted.
    pub cached_keys: Vec<String>,
    /// Items with a preload outstanding, sorted.
    pub in_flight: Vec<ItemId>,
}

impl fmt::Display for DebugSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== LAZY LOADING DEBUG ===")?;
        writeln!(f, "Background preloaders: {}", self.background_preloaders)?;
        writeln!(f, "Infinite scrolls: {}", self.infinite_scrolls)?;
        writeln!(f, "Cached modals: [{}]", self.cached_keys.join(", "))?;
        let in_flight: Vec<String> = self.in_flight.iter().map(ItemId::to_string).collect();
        write!(f, "In flight: [{}]", in_flight.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{CloseOutcome, MemoryContainer, ModalSource};
    use crate::events::PageEvent;
    use crate::testing::{FakeView, StubSource, init_tracing};

    fn page(
        source: &Arc<StubSource>,
        view: &Arc<FakeView>,
    ) -> (LazyLoading, Arc<MemoryContainer>) {
        init_tracing();
        let container = Arc::new(MemoryContainer::new());
        let page = LazyLoading::new(
            LazyLoadConfig::new(),
            Arc::clone(source) as Arc<dyn FragmentSource>,
            Arc::clone(&container) as Arc<dyn ModalContainer>,
            Arc::clone(view) as Arc<dyn InventoryView>,
        );
        (page, container)
    }

    #[tokio::test(start_paused = true)]
    async fn open_close_preload_and_flush() {
        let source = Arc::new(StubSource::new().with_fragments(&[7, 42]));
        let view = Arc::new(FakeView::with_items(&[42, 7]));
        let (page, container) = page(&source, &view);

        // Opening a cold item goes to the network; closing caches it.
        let opened = page.controller().open(ItemId::new(42)).await.unwrap();
        assert_eq!(opened, ModalSource::Network);
        assert_eq!(page.controller().close(), CloseOutcome::Cached(ItemId::new(42)));
        assert!(container.markup().is_empty());

        // The preloader only fetches what the modal did not already cache.
        page.preloader().preload_visible().wait().await;
        assert_eq!(source.fragment_calls(), vec![ItemId::new(42), ItemId::new(7)]);
        assert_eq!(page.cache().keys(), vec!["history-42", "history-7"]);

        let opened = page.controller().open(ItemId::new(7)).await.unwrap();
        assert_eq!(opened, ModalSource::Cache);

        let cache = page.cache().clone();
        let bridge = page.spawn_bridge();
        assert_eq!(page.bus().publish(PageEvent::InventoryChanged), 1);
        drop(page);
        bridge.await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn debug_snapshot_reports_state() {
        let source = Arc::new(StubSource::new());
        let view = Arc::new(
            FakeView::with_items(&[5])
                .with_marker(LazyMarker::BackgroundPreload, 3)
                .with_marker(LazyMarker::InfiniteScroll, 1),
        );
        let (page, _container) = page(&source, &view);
        page.cache().save("history-9", "<div/>");
        page.cache().save("history-10", "<div/>");
        let _claim = page.preloader().in_flight().try_claim(ItemId::new(5)).unwrap();

        let snapshot = page.debug_snapshot();
        assert_eq!(
            snapshot,
            DebugSnapshot {
                background_preloaders: 3,
                infinite_scrolls: 1,
                cached_keys: vec!["history-10".into(), "history-9".into()],
                in_flight: vec![ItemId::new(5)],
            }
        );
        assert_eq!(
            snapshot.to_string(),
            "=== LAZY LOADING DEBUG ===\n\
             Background preloaders: 3\n\
             Infinite scrolls: 1\n\
             Cached modals: [history-10, history-9]\n\
             In flight: [5]"
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["in_flight"], serde_json::json!([5]));
        assert_eq!(json["cached_keys"][0], "history-10");
    }

    #[tokio::test]
    async fn pages_do_not_share_state() {
        let source = Arc::new(StubSource::new());
        let view = Arc::new(FakeView::with_items(&[]));
        let (first, _) = page(&source, &view);
        let (second, _) = page(&source, &view);

        first.cache().save("history-1", "<div/>");
        assert!(second.cache().is_empty());
    }
}
