//! Page events and the bridge that reacts to them.
//!
//! The host page publishes [`PageEvent`]s on an [`EventBus`]; an
//! [`EventBridge`] subscribed to the bus turns them into cache and preload
//! work:
//!
//! - a swap into an infinite-scroll trigger while the inventory is visible
//!   schedules a preload once the new cards have settled;
//! - an inventory change flushes the whole modal cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::SharedCache;
use crate::config::LazyLoadConfig;
use crate::preload::{InventoryView, PreloadSummary, Preloader};

/// The element a fragment swap landed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapTarget {
    id: Option<String>,
    classes: Vec<String>,
}

impl SwapTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a target from a whitespace-separated `class` attribute.
    pub fn from_class_attr(classes: &str) -> Self {
        Self {
            id: None,
            classes: classes.split_whitespace().map(str::to_owned).collect(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Something that happened on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A fragment swap completed into `target`.
    SwapCompleted(SwapTarget),
    /// Inventory data changed server-side; cached history is stale.
    InventoryChanged,
}

/// Broadcast channel carrying [`PageEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PageEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn from_config(config: &LazyLoadConfig) -> Self {
        Self::new(config.event_capacity)
    }

    /// Publishes `event` and returns how many subscribers will see it.
    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: PageEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!(event = ?event, "no subscribers for page event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// What [`EventBridge::handle`] did for one event.
#[derive(Debug)]
pub enum Reaction {
    /// A preload round will start after the settle delay.
    PreloadScheduled(JoinHandle<PreloadSummary>),
    /// The modal cache was flushed.
    CacheCleared,
    /// The event required no action.
    Ignored,
}

/// Reacts to [`PageEvent`]s on behalf of one page.
#[derive(Clone)]
pub struct EventBridge {
    cache: SharedCache,
    preloader: Arc<Preloader>,
    view: Arc<dyn InventoryView>,
    scroll_class: String,
    settle_delay: Duration,
}

impl EventBridge {
    pub fn new(
        cache: SharedCache,
        preloader: Arc<Preloader>,
        view: Arc<dyn InventoryView>,
        config: &LazyLoadConfig,
    ) -> Self {
        Self {
            cache,
            preloader,
            view,
            scroll_class: config.infinite_scroll_class.clone(),
            settle_delay: config.settle_delay(),
        }
    }

    /// Applies the reaction for a single event.
    ///
    /// Visibility is checked when the event arrives, not when the delayed
    /// preload fires.
    pub fn handle(&self, event: &PageEvent) -> Reaction {
        match event {
            PageEvent::SwapCompleted(target) => {
                if !target.has_class(&self.scroll_class) {
                    return Reaction::Ignored;
                }
                if !self.view.is_visible() {
                    debug!("infinite scroll swap while inventory is hidden, not preloading");
                    return Reaction::Ignored;
                }

                info!(
                    settle_ms = self.settle_delay.as_millis() as u64,
                    "infinite scroll detected, preloading new items"
                );
                let preloader = Arc::clone(&self.preloader);
                let delay = self.settle_delay;
                Reaction::PreloadScheduled(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    preloader.preload_visible().wait().await
                }))
            }
            PageEvent::InventoryChanged => {
                info!("inventory changed, clearing modal cache");
                self.cache.clear();
                Reaction::CacheCleared
            }
        }
    }

    /// Handles events from `events` until every sender is gone.
    ///
    /// A lagging receiver has lost events it cannot recover; since one of
    /// them may have been an inventory change, the cache is cleared.
    pub async fn run(self, mut events: broadcast::Receiver<PageEvent>) {
        debug!("event bridge started");
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.handle(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event bridge lagged, clearing modal cache");
                    self.cache.clear();
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("event bus closed, event bridge stopped");
    }
}
