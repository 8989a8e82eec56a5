//! # modal-prefetch
//!
//! Client-side cache and prefetcher for server-rendered history modals.
//!
//! An inventory page shows one card per item; each card opens a modal whose
//! body is an HTML fragment fetched from the server. This crate keeps those
//! fragments in an in-memory cache, warms it for the cards already on screen,
//! and flushes it when the inventory changes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modal_prefetch::{HttpFetcher, LazyLoadConfig, LazyLoading, MemoryContainer, PageEvent};
//! use modal_prefetch::fragment::{ItemCard, ItemId};
//! use modal_prefetch::preload::InventoryView;
//!
//! struct Inventory;
//!
//! impl InventoryView for Inventory {
//!     fn item_cards(&self) -> Vec<ItemCard> {
//!         vec![ItemCard::from_open_action("openHistoryModal(42)")]
//!     }
//!     fn is_visible(&self) -> bool {
//!         true
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LazyLoadConfig::from_json(r#"{ "strategy": "batched" }"#)?;
//!     let page = LazyLoading::new(
//!         config.clone(),
//!         Arc::new(HttpFetcher::from_config("127.0.0.1:8000", &config)),
//!         Arc::new(MemoryContainer::new()),
//!         Arc::new(Inventory),
//!     );
//!     let _bridge = page.spawn_bridge();
//!
//!     page.preloader().preload_visible().wait().await;
//!     page.controller().open(ItemId::new(42)).await?;
//!     page.controller().close();
//!
//!     page.bus().publish(PageEvent::InventoryChanged);
//!     Ok(())
//! }
//! ```

// ── Core ──────────────────────────────────────────────────────────────────────
pub mod cache;
pub mod config;
pub mod fragment;

// ── Network ───────────────────────────────────────────────────────────────────
pub mod fetch;
pub mod http;

// ── Page behaviour ────────────────────────────────────────────────────────────
pub mod controller;
pub mod events;
pub mod page;
pub mod preload;

// ── Styling ───────────────────────────────────────────────────────────────────
pub mod theme;

#[cfg(test)]
mod testing;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{ModalCache, SharedCache};
pub use config::{ConfigError, LazyLoadConfig, PreloadStrategy};
pub use controller::{CloseOutcome, MemoryContainer, ModalContainer, ModalController, ModalSource};
pub use events::{EventBridge, EventBus, PageEvent, Reaction, SwapTarget};
pub use fetch::{FetchError, FragmentSource, HttpFetcher};
pub use fragment::{Fragment, ItemCard, ItemId};
pub use page::{DebugSnapshot, LazyLoading};
pub use preload::{InventoryView, PreloadHandle, PreloadSummary, Preloader};
pub use theme::{Palette, PaletteError};
