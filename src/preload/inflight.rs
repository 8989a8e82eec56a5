//! Set of item ids with a preload request outstanding.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::fragment::ItemId;

/// Page-scoped set of ids currently being preloaded.
///
/// Membership is only ever granted through [`try_claim`](Self::try_claim),
/// which hands back a [`Claim`] guard; dropping the guard releases the id.
/// An id therefore leaves the set on success, on failure, and also when the
/// task holding the claim panics or is aborted.
#[derive(Debug, Default, Clone)]
pub struct InFlight {
    inner: Arc<Mutex<HashSet<ItemId>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ItemId>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `item` as in flight. Returns `None` if it already was.
    pub fn try_claim(&self, item: ItemId) -> Option<Claim> {
        if self.lock().insert(item) {
            Some(Claim {
                set: self.clone(),
                item,
            })
        } else {
            None
        }
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.lock().contains(&item)
    }

    /// Returns the ids in flight, sorted.
    pub fn items(&self) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = self.lock().iter().copied().collect();
        items.sort();
        items
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn release(&self, item: ItemId) {
        self.lock().remove(&item);
    }
}

/// Exclusive right to fetch one item; releases the id when dropped.
#[derive(Debug)]
#[must_use = "dropping a claim immediately releases the item"]
pub struct Claim {
    set: InFlight,
    item: ItemId,
}

impl Claim {
    pub fn item(&self) -> ItemId {
        self.item
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.set.release(self.item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive() {
        let set = InFlight::new();
        let claim = set.try_claim(ItemId::new(1)).unwrap();
        assert!(set.try_claim(ItemId::new(1)).is_none());
        assert!(set.contains(ItemId::new(1)));
        assert_eq!(claim.item(), ItemId::new(1));
    }

    #[test]
    fn drop_releases() {
        let set = InFlight::new();
        let claim = set.try_claim(ItemId::new(1)).unwrap();
        drop(claim);
        assert!(!set.contains(ItemId::new(1)));
        assert!(set.try_claim(ItemId::new(1)).is_some());
    }

    #[test]
    fn clones_share_membership() {
        let set = InFlight::new();
        let other = set.clone();
        let _a = set.try_claim(ItemId::new(2)).unwrap();
        let _b = other.try_claim(ItemId::new(1)).unwrap();
        assert_eq!(set.items(), vec![ItemId::new(1), ItemId::new(2)]);
        assert_eq!(other.len(), 2);
    }

    #[test]
    fn released_on_panic() {
        let set = InFlight::new();
        let inner = set.clone();
        let result = std::panic::catch_unwind(move || {
            let _claim = inner.try_claim(ItemId::new(5)).unwrap();
            panic!("fetch blew up");
        });
        assert!(result.is_err());
        assert!(set.is_empty());
    }
}
