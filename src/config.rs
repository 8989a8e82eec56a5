//! Lazy-loading configuration.
//!
//! [`LazyLoadConfig`] collects every tunable of the cache layer in one place.
//! It can be built in code through the builder methods or deserialized from
//! JSON; missing fields fall back to the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delay between consecutive staggered preload fetches.
pub const DEFAULT_STAGGER_MS: u64 = 100;

/// Delay between an infinite-scroll swap and the preload it triggers.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;

/// Upper bound for a single fragment fetch, connect to last body byte.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Class carried by the element that loads the next page of inventory cards.
pub const DEFAULT_INFINITE_SCROLL_CLASS: &str = "lazy-scroll-trigger";

/// Buffered page events per subscriber before a slow subscriber starts lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Errors produced while loading a [`LazyLoadConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event_capacity must be greater than zero")]
    ZeroEventCapacity,
}

/// How [`Preloader`](crate::preload::Preloader) fetches the fragments it decides to warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreloadStrategy {
    /// One request per item, the i-th delayed by `i * stagger`.
    #[default]
    Staggered,
    /// A single request to the batch endpoint listing every item.
    Batched,
}

/// Tunables for one page's cache, preloader, and event bridge.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use modal_prefetch::config::{LazyLoadConfig, PreloadStrategy};
///
/// let config = LazyLoadConfig::from_json(r#"{ "strategy": "batched", "stagger_ms": 50 }"#).unwrap();
/// assert_eq!(config.strategy, PreloadStrategy::Batched);
/// assert_eq!(config.stagger(), Duration::from_millis(50));
/// assert_eq!(config.infinite_scroll_class, "lazy-scroll-trigger");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyLoadConfig {
    pub strategy: PreloadStrategy,
    pub stagger_ms: u64,
    pub settle_delay_ms: u64,
    pub fetch_timeout_ms: u64,
    pub infinite_scroll_class: String,
    pub event_capacity: usize,
    /// Prepended to every endpoint path, e.g. `/app` when mounted under a sub-path.
    pub path_prefix: String,
}

impl Default for LazyLoadConfig {
    fn default() -> Self {
        Self {
            strategy: PreloadStrategy::default(),
            stagger_ms: DEFAULT_STAGGER_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            infinite_scroll_class: DEFAULT_INFINITE_SCROLL_CLASS.to_owned(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            path_prefix: String::new(),
        }
    }
}

impl LazyLoadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed JSON or mistyped fields and
    /// [`ConfigError::ZeroEventCapacity`] if `event_capacity` is `0`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        Ok(())
    }

    #[must_use]
    pub fn strategy(mut self, strategy: PreloadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn stagger_ms(mut self, ms: u64) -> Self {
        self.stagger_ms = ms;
        self
    }

    #[must_use]
    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.fetch_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn infinite_scroll_class(mut self, class: impl Into<String>) -> Self {
        self.infinite_scroll_class = class.into();
        self
    }

    /// Sets the broadcast buffer size. Values below 1 are raised to 1.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LazyLoadConfig::default();
        assert_eq!(config.strategy, PreloadStrategy::Staggered);
        assert_eq!(config.stagger(), Duration::from_millis(100));
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.infinite_scroll_class, "lazy-scroll-trigger");
        assert_eq!(config.event_capacity, 64);
        assert!(config.path_prefix.is_empty());
    }

    #[test]
    fn empty_json_is_default() {
        let config = LazyLoadConfig::from_json("{}").unwrap();
        assert_eq!(config, LazyLoadConfig::default());
    }

    #[test]
    fn json_overrides() {
        let config = LazyLoadConfig::from_json(
            r#"{"strategy":"batched","settle_delay_ms":250,"path_prefix":"/app"}"#,
        )
        .unwrap();
        assert_eq!(config.strategy, PreloadStrategy::Batched);
        assert_eq!(config.settle_delay(), Duration::from_millis(250));
        assert_eq!(config.path_prefix, "/app");
        assert_eq!(config.stagger_ms, DEFAULT_STAGGER_MS);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = LazyLoadConfig::from_json(r#"{"strategy":"eager"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = LazyLoadConfig::from_json(r#"{"event_capacity":0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroEventCapacity));
    }

    #[test]
    fn builder_clamps_capacity() {
        let config = LazyLoadConfig::new().event_capacity(0);
        assert_eq!(config.event_capacity, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_chain() {
        let config = LazyLoadConfig::new()
            .strategy(PreloadStrategy::Batched)
            .stagger_ms(10)
            .settle_delay_ms(20)
            .fetch_timeout_ms(30)
            .infinite_scroll_class("more")
            .path_prefix("/x");
        assert_eq!(config.stagger(), Duration::from_millis(10));
        assert_eq!(config.settle_delay(), Duration::from_millis(20));
        assert_eq!(config.fetch_timeout(), Duration::from_millis(30));
        assert_eq!(config.infinite_scroll_class, "more");
        assert_eq!(config.path_prefix, "/x");
    }
}
