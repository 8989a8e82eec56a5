//! Typed views over server-rendered HTML fragments.
//!
//! The history modal is rendered server-side and arrives as an opaque HTML
//! string. This module recovers the two facts the cache layer needs from that
//! markup (which item it belongs to, and whether it still carries one-shot
//! `intersect once` triggers) and exposes them as structured accessors
//! instead of ad-hoc string matching at each call site.
//!
//! - [`ItemId`]: inventory item identifier.
//! - [`history_key`]: cache key for an item's history modal.
//! - [`Fragment`]: parsed markup with [`Fragment::item_id`] and
//!   [`Fragment::pending_once_triggers`].
//! - [`ItemCard`]: a visible inventory card and its open-history action.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod card;

pub use card::ItemCard;

/// Prefix shared by every history modal cache key.
pub const HISTORY_KEY_PREFIX: &str = "history-";

/// `hx-trigger` modifier marking an element whose request fires once on first visibility.
pub const ONCE_TRIGGER: &str = "intersect once";

static ITEM_ID_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-item-id[ \t\r\n]*=[ \t\r\n]*["']([0-9]+)["']"#).expect("valid regex")
});

static TRIGGER_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"hx-trigger[ \t\r\n]*=[ \t\r\n]*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

/// Identifier of an inventory item.
///
/// # Examples
///
/// ```
/// use modal_prefetch::fragment::ItemId;
///
/// let id: ItemId = "42".parse().unwrap();
/// assert_eq!(id, ItemId::new(42));
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for ItemId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Returns the cache key of the history modal for `item`, e.g. `history-42`.
pub fn history_key(item: ItemId) -> String {
    format!("{HISTORY_KEY_PREFIX}{item}")
}

/// Server-rendered modal markup, parsed once on construction.
///
/// Parsing never fails: markup without a recognizable item id simply yields
/// `None` from [`item_id`](Self::item_id).
///
/// # Examples
///
/// ```
/// use modal_prefetch::fragment::{Fragment, ItemId};
///
/// let fragment = Fragment::new(r#"<div data-item-id="7"><ul hx-trigger="intersect once"></ul></div>"#);
/// assert_eq!(fragment.item_id(), Some(ItemId::new(7)));
/// assert_eq!(fragment.pending_once_triggers(), 1);
///
/// assert_eq!(Fragment::new("<p>empty</p>").item_id(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    markup: String,
    item_id: Option<ItemId>,
    pending_once_triggers: usize,
}

impl Fragment {
    pub fn new(markup: impl Into<String>) -> Self {
        let markup = markup.into();

        // Ids too large for u64 are treated the same as a missing attribute.
        let item_id = ITEM_ID_ATTR
            .captures(&markup)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());

        let pending_once_triggers = TRIGGER_ATTR
            .captures_iter(&markup)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .filter(|value| value.as_str().contains(ONCE_TRIGGER))
            .count();

        Self {
            markup,
            item_id,
            pending_once_triggers,
        }
    }

    /// The item this fragment renders, taken from its first `data-item-id` attribute.
    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    /// Number of elements still carrying an `intersect once` trigger.
    pub fn pending_once_triggers(&self) -> usize {
        self.pending_once_triggers
    }

    pub fn has_pending_once_triggers(&self) -> bool {
        self.pending_once_triggers > 0
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn into_markup(self) -> String {
        self.markup
    }

    /// Returns `true` if the markup is empty or whitespace only.
    pub fn is_empty(&self) -> bool {
        self.markup.trim().is_empty()
    }
}

impl From<String> for Fragment {
    fn from(markup: String) -> Self {
        Self::new(markup)
    }
}
