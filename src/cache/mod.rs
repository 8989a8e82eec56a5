//! Modal cache: in-memory store of previously rendered modal markup.
//!
//! [`ModalCache`] is a plain key/value map with no TTL, size bound, or
//! eviction. Entries live until [`invalidate`](ModalCache::invalidate) or
//! [`clear`](ModalCache::clear) removes them. Blank markup is never stored:
//! an empty modal is a miss, not something to show again. [`SharedCache`] is the
//! cloneable, page-scoped handle that the controller, preloader, and event
//! bridge share.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, trace};

/// In-memory map from modal identifier (e.g. `history-42`) to HTML markup.
///
/// Every operation is total. Writes are last-write-wins, and writing blank
/// (empty or whitespace-only) markup removes the key instead of storing it.
///
/// # Examples
///
/// ```
/// use modal_prefetch::cache::ModalCache;
///
/// let mut cache = ModalCache::new();
/// cache.save("history-42", "<div data-item-id=\"42\"></div>");
/// assert!(cache.get("history-42").is_some());
///
/// cache.invalidate("history-42");
/// assert!(cache.get("history-42").is_none());
/// ```
#[derive(Debug, Default, Clone)]
pub struct ModalCache {
    entries: HashMap<String, String>,
}

impl ModalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `markup` under `key`, replacing any previous value.
    ///
    /// Returns `false` if `markup` was blank; the key is then removed.
    pub fn save(&mut self, key: impl Into<String>, markup: impl Into<String>) -> bool {
        let key = key.into();
        let markup = markup.into();
        if is_blank(&markup) {
            debug!(key = %key, "not caching blank modal markup");
            self.entries.remove(&key);
            return false;
        }
        debug!(key = %key, "modal cache save");
        self.entries.insert(key, markup);
        true
    }

    /// Stores every entry of a batch and returns how many were stored. Blank
    /// entries are treated as in [`save`](Self::save). Callers holding a
    /// [`SharedCache`] get the whole batch applied under one lock acquisition.
    pub fn save_many<I, K, V>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut saved = 0;
        for (key, markup) in entries {
            let key = key.into();
            let markup = markup.into();
            if is_blank(&markup) {
                self.entries.remove(&key);
            } else {
                self.entries.insert(key, markup);
                saved += 1;
            }
        }
        debug!(entries = saved, "modal cache batch save");
        saved
    }

    /// Returns the markup stored under `key`, logging the hit or miss.
    pub fn get(&self, key: &str) -> Option<&str> {
        let cached = self.entries.get(key).map(String::as_str);
        if cached.is_some() {
            debug!(key, "modal cache hit");
        } else {
            debug!(key, "modal cache miss");
        }
        cached
    }

    /// Returns `true` if `key` is cached. Unlike [`get`](Self::get) this does
    /// not count as a hit or miss.
    pub fn contains(&self, key: &str) -> bool {
        trace!(key, "modal cache lookup");
        self.entries.contains_key(key)
    }

    /// Removes one entry. Removing an absent key is a no-op.
    pub fn invalidate(&mut self, key: &str) -> Option<String> {
        debug!(key, "modal cache invalidate");
        self.entries.remove(key)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        info!(entries = self.entries.len(), "modal cache cleared");
        self.entries.clear();
    }

    /// Returns all cached keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cloneable handle to one page's [`ModalCache`].
///
/// All clones see the same map. The lock is held only for the duration of a
/// single call and never across an `.await`.
#[derive(Debug, Default, Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<ModalCache>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-written, so a
    // poisoned mutex is still safe to use.
    fn lock(&self) -> MutexGuard<'_, ModalCache> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn save(&self, key: impl Into<String>, markup: impl Into<String>) -> bool {
        self.lock().save(key, markup)
    }

    pub fn save_many<I, K, V>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.lock().save_many(entries)
    }

    /// Returns an owned copy of the markup stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(str::to_owned)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn invalidate(&self, key: &str) -> Option<String> {
        self.lock().invalidate(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn is_blank(markup: &str) -> bool {
    markup.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_get_returns_value() {
        let mut cache = ModalCache::new();
        cache.save("history-1", "<div>1</div>");
        assert_eq!(cache.get("history-1"), Some("<div>1</div>"));
    }

    #[test]
    fn save_overwrites_previous_value() {
        let mut cache = ModalCache::new();
        cache.save("history-1", "old");
        cache.save("history-1", "new");
        assert_eq!(cache.get("history-1"), Some("new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn get_missing_is_none() {
        let cache = ModalCache::new();
        assert_eq!(cache.get("history-404"), None);
    }

    #[test]
    fn invalidate_removes_entry() {
        let mut cache = ModalCache::new();
        cache.save("history-1", "a");
        cache.save("history-2", "b");
        assert_eq!(cache.invalidate("history-1").as_deref(), Some("a"));
        assert_eq!(cache.get("history-1"), None);
        assert_eq!(cache.get("history-2"), Some("b"));
    }

    #[test]
    fn invalidate_never_saved_key() {
        let mut cache = ModalCache::new();
        assert_eq!(cache.invalidate("history-9"), None);
        assert_eq!(cache.get("history-9"), None);
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = ModalCache::new();
        for i in 0..5 {
            cache.save(format!("history-{i}"), "x");
        }
        cache.clear();
        assert!(cache.is_empty());
        for i in 0..5 {
            assert_eq!(cache.get(&format!("history-{i}")), None);
        }
    }

    #[test]
    fn clear_twice_same_as_once() {
        let mut once = ModalCache::new();
        once.save("history-1", "a");
        once.clear();

        let mut twice = ModalCache::new();
        twice.save("history-1", "a");
        twice.clear();
        twice.clear();

        assert_eq!(once.keys(), twice.keys());
        assert!(twice.is_empty());
    }

    #[test]
    fn save_many_counts_entries() {
        let mut cache = ModalCache::new();
        let saved = cache.save_many([("history-1", "a"), ("history-3", "c")]);
        assert_eq!(saved, 2);
        assert_eq!(cache.keys(), vec!["history-1", "history-3"]);
    }

    #[test]
    fn keys_are_sorted() {
        let mut cache = ModalCache::new();
        cache.save("history-b", "b");
        cache.save("history-a", "a");
        assert_eq!(cache.keys(), vec!["history-a", "history-b"]);
    }

    #[test]
    fn shared_cache_clones_share_state() {
        let cache = SharedCache::new();
        let other = cache.clone();
        cache.save("history-42", "<div/>");
        assert_eq!(other.get("history-42").as_deref(), Some("<div/>"));
        other.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn blank_markup_is_a_miss() {
        let cache = SharedCache::new();
        assert!(!cache.save("history-5", ""));
        assert!(!cache.save("history-6", " \n\t"));
        assert!(!cache.contains("history-5"));
        assert_eq!(cache.get("history-6"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn blank_markup_replaces_previous_entry() {
        let mut cache = ModalCache::new();
        assert!(cache.save("history-1", "<div/>"));
        cache.save("history-1", "");
        assert_eq!(cache.get("history-1"), None);
    }

    #[test]
    fn save_many_skips_blank_entries() {
        let mut cache = ModalCache::new();
        cache.save("history-2", "stale");
        let saved = cache.save_many([("history-1", "a"), ("history-2", ""), ("history-3", "  ")]);
        assert_eq!(saved, 1);
        assert_eq!(cache.keys(), vec!["history-1"]);
    }
}
