//! Inventory item cards as seen by the preloader.

use std::sync::LazyLock;

use regex::Regex;

use super::ItemId;

static OPEN_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t\r\n]*openHistoryModal\([ \t\r\n]*([0-9]+)[ \t\r\n]*\)")
        .expect("valid regex")
});

/// A rendered inventory card.
///
/// Cards whose history button is missing (or whose action does not name an
/// item) carry no id and are skipped by the preloader.
///
/// # Examples
///
/// ```
/// use modal_prefetch::fragment::{ItemCard, ItemId};
///
/// let card = ItemCard::from_open_action("openHistoryModal(42)");
/// assert_eq!(card.item_id(), Some(ItemId::new(42)));
/// assert_eq!(ItemCard::without_action().item_id(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemCard {
    item_id: Option<ItemId>,
}

impl ItemCard {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id: Some(item_id),
        }
    }

    /// A card with no history button.
    pub fn without_action() -> Self {
        Self::default()
    }

    /// Builds a card from the handler string bound to its history button,
    /// e.g. `openHistoryModal(42)`.
    pub fn from_open_action(action: &str) -> Self {
        let item_id = OPEN_ACTION
            .captures(action)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        Self { item_id }
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }
}

impl From<ItemId> for ItemCard {
    fn from(item_id: ItemId) -> Self {
        Self::new(item_id)
    }
}
