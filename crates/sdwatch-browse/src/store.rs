//! Authoritative mapping from registration type key to its summary
//!
//! The store itself is a plain map; the aggregator owns it behind a single
//! mutex and its coordination task is the only event-path mutator.

use sdwatch_core::{SummaryKey, TypeSummary};
use std::collections::HashMap;

/// Store of per-registration-type summaries
#[derive(Debug, Default)]
pub struct SummaryStore {
    entries: HashMap<SummaryKey, TypeSummary>,
}

impl SummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `key`, creating it via `factory` on first
    /// sighting. Only registration type events create entries.
    pub fn upsert(
        &mut self,
        key: SummaryKey,
        factory: impl FnOnce() -> TypeSummary,
    ) -> &mut TypeSummary {
        self.entries.entry(key).or_insert_with(factory)
    }

    /// Applies `delta` to the count stored under `key` and returns the new
    /// count, or `None` when no entry exists. Never creates an entry; the
    /// caller reports the unknown key. Counts are not clamped and may go
    /// negative.
    pub fn adjust_count(&mut self, key: &SummaryKey, delta: i64) -> Option<i64> {
        let summary = self.entries.get_mut(key)?;
        summary.service_count += delta;
        Some(summary.service_count)
    }

    /// Entries with a positive count, in map iteration order (unspecified)
    pub fn visible(&self) -> Vec<TypeSummary> {
        self.entries
            .values()
            .filter(|summary| summary.is_visible())
            .cloned()
            .collect()
    }

    /// Empties the store; used only on full session stop
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &SummaryKey) -> Option<&TypeSummary> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdwatch_core::ServiceEvent;

    fn key(name: &str) -> SummaryKey {
        SummaryKey::new("", "_tcp.local.", name)
    }

    fn summary(name: &str) -> TypeSummary {
        TypeSummary::new(&ServiceEvent::found("", "_tcp.local.", name))
    }

    #[test]
    fn upsert_returns_existing_entry() {
        let mut store = SummaryStore::new();
        store
            .upsert(key("_http"), || summary("_http"))
            .service_count = 3;

        // Second sighting must not replace the entry
        let entry = store.upsert(key("_http"), || summary("_http"));
        assert_eq!(entry.service_count, 3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn adjust_count_tracks_found_minus_lost() {
        let mut store = SummaryStore::new();
        store.upsert(key("_http"), || summary("_http"));

        assert_eq!(store.adjust_count(&key("_http"), 1), Some(1));
        assert_eq!(store.adjust_count(&key("_http"), 1), Some(2));
        assert_eq!(store.adjust_count(&key("_http"), -1), Some(1));
    }

    #[test]
    fn adjust_count_may_go_negative() {
        let mut store = SummaryStore::new();
        store.upsert(key("_ipp"), || summary("_ipp"));

        assert_eq!(store.adjust_count(&key("_ipp"), -1), Some(-1));
        assert!(store.visible().is_empty());
        // The entry survives, it is just invisible
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn adjust_count_never_creates_entries() {
        let mut store = SummaryStore::new();
        assert_eq!(store.adjust_count(&key("_ssh"), 1), None);
        assert!(store.is_empty());
    }

    #[test]
    fn visible_excludes_non_positive_counts() {
        let mut store = SummaryStore::new();
        store.upsert(key("_a"), || summary("_a"));
        store.upsert(key("_b"), || summary("_b"));
        store.upsert(key("_c"), || summary("_c"));
        store.adjust_count(&key("_a"), 2);
        store.adjust_count(&key("_c"), -1);

        let visible = store.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].service_name, "_a");
        assert_eq!(visible[0].service_count, 2);
    }

    #[test]
    fn clear_empties_store() {
        let mut store = SummaryStore::new();
        store.upsert(key("_a"), || summary("_a"));
        store.adjust_count(&key("_a"), 5);

        store.clear();
        assert!(store.is_empty());
        assert!(store.visible().is_empty());
    }
}
