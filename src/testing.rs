//! In-memory collaborators shared by the unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::Instant;

use crate::fetch::{FetchError, FetchFuture, FragmentSource};
use crate::fragment::{ItemCard, ItemId};
use crate::http::StatusCode;
use crate::preload::{InventoryView, LazyMarker};

/// Installs a test-writer subscriber once; later calls are no-ops.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("modal_prefetch=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub(crate) fn ids(raw: &[u64]) -> Vec<ItemId> {
    raw.iter().copied().map(ItemId::new).collect()
}

/// [`FragmentSource`] answering from a map and recording every call.
///
/// Unknown or failing ids answer `404`/`503`. Batch requests answer with a
/// JSON object of the requested ids it knows, unless overridden.
#[derive(Default)]
pub(crate) struct StubSource {
    fragments: Mutex<HashMap<ItemId, String>>,
    failing: Mutex<HashSet<ItemId>>,
    batch_body: Mutex<Option<String>>,
    batch_fails: AtomicBool,
    fragment_calls: Mutex<Vec<(ItemId, Instant)>>,
    batch_calls: Mutex<Vec<Vec<ItemId>>>,
}

impl StubSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_fragment(self, id: u64, markup: &str) -> Self {
        self.fragments
            .lock()
            .unwrap()
            .insert(ItemId::new(id), markup.to_owned());
        self
    }

    pub(crate) fn with_fragments(mut self, raw: &[u64]) -> Self {
        for &id in raw {
            self = self.with_fragment(id, &format!("<div data-item-id=\"{id}\"></div>"));
        }
        self
    }

    pub(crate) fn with_failure(self, id: u64) -> Self {
        self.failing.lock().unwrap().insert(ItemId::new(id));
        self
    }

    pub(crate) fn with_batch_body(self, body: &str) -> Self {
        *self.batch_body.lock().unwrap() = Some(body.to_owned());
        self
    }

    pub(crate) fn with_failing_batch(self) -> Self {
        self.batch_fails.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn fragment_calls(&self) -> Vec<ItemId> {
        self.fragment_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn fragment_call_times(&self) -> Vec<Instant> {
        self.fragment_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    pub(crate) fn batch_calls(&self) -> Vec<Vec<ItemId>> {
        self.batch_calls.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.fragment_calls.lock().unwrap().len() + self.batch_calls.lock().unwrap().len()
    }
}

impl FragmentSource for StubSource {
    fn fetch_fragment(&self, item: ItemId) -> FetchFuture<'_, String> {
        self.fragment_calls
            .lock()
            .unwrap()
            .push((item, Instant::now()));

        let result = if self.failing.lock().unwrap().contains(&item) {
            Err(FetchError::Status(StatusCode::ServiceUnavailable))
        } else {
            self.fragments
                .lock()
                .unwrap()
                .get(&item)
                .cloned()
                .ok_or(FetchError::Status(StatusCode::NotFound))
        };
        Box::pin(async move { result })
    }

    fn fetch_batch<'a>(&'a self, items: &'a [ItemId]) -> FetchFuture<'a, String> {
        self.batch_calls.lock().unwrap().push(items.to_vec());

        let result = if self.batch_fails.load(Ordering::SeqCst) {
            Err(FetchError::Status(StatusCode::InternalServerError))
        } else if let Some(body) = self.batch_body.lock().unwrap().clone() {
            Ok(body)
        } else {
            let fragments = self.fragments.lock().unwrap();
            let body: BTreeMap<String, String> = items
                .iter()
                .filter_map(|id| fragments.get(id).map(|m| (id.to_string(), m.clone())))
                .collect();
            Ok(serde_json::to_string(&body).unwrap())
        };
        Box::pin(async move { result })
    }
}

/// [`InventoryView`] whose cards and visibility are set by the test.
pub(crate) struct FakeView {
    cards: Mutex<Vec<ItemCard>>,
    visible: AtomicBool,
    markers: Mutex<HashMap<LazyMarker, usize>>,
}

impl FakeView {
    pub(crate) fn with_items(raw: &[u64]) -> Self {
        Self {
            cards: Mutex::new(raw.iter().map(|&id| ItemCard::new(ItemId::new(id))).collect()),
            visible: AtomicBool::new(true),
            markers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn set_cards(&self, cards: Vec<ItemCard>) {
        *self.cards.lock().unwrap() = cards;
    }

    pub(crate) fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub(crate) fn with_marker(self, marker: LazyMarker, count: usize) -> Self {
        self.markers.lock().unwrap().insert(marker, count);
        self
    }
}

impl InventoryView for FakeView {
    fn item_cards(&self) -> Vec<ItemCard> {
        self.cards.lock().unwrap().clone()
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn lazy_marker_count(&self, marker: LazyMarker) -> usize {
        self.markers
            .lock()
            .unwrap()
            .get(&marker)
            .copied()
            .unwrap_or(0)
    }
}
