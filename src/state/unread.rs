use std::collections::HashMap;
use std::sync::Arc;

use super::Store;
use crate::domain::UnreadCount;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnreadState {
    pub data: HashMap<String, u64>,
}

/// Unread counters keyed by subscription id. Counters never go below zero.
pub struct UnreadStore {
    store: Store<UnreadState>,
}

impl UnreadStore {
    pub fn new() -> Self {
        Self {
            store: Store::new("unread", UnreadState::default()),
        }
    }

    pub fn store(&self) -> &Store<UnreadState> {
        &self.store
    }

    pub fn get_state(&self) -> Arc<UnreadState> {
        self.store.get_state()
    }

    /// Missing counters read as zero.
    pub fn get(&self, subscription_id: &str) -> u64 {
        self.store
            .get_state()
            .data
            .get(subscription_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn upsert_many(&self, counts: &[UnreadCount]) {
        if counts.is_empty() {
            return;
        }
        self.store.update(|state| {
            for unread in counts {
                state.data.insert(unread.subscription_id.clone(), unread.count);
            }
        });
    }

    /// Increment and return the new counter.
    pub fn add(&self, subscription_id: &str, by: u64) -> u64 {
        self.store.update(|state| {
            let count = state.data.entry(subscription_id.to_string()).or_insert(0);
            *count = count.saturating_add(by);
            *count
        })
    }

    /// Decrement, clamped at zero, and return the new counter.
    pub fn remove(&self, subscription_id: &str, by: u64) -> u64 {
        self.store.update(|state| {
            let count = state.data.entry(subscription_id.to_string()).or_insert(0);
            *count = count.saturating_sub(by);
            *count
        })
    }

    pub fn set_zero(&self, subscription_ids: &[String]) {
        if subscription_ids.is_empty() {
            return;
        }
        self.store.update(|state| {
            for id in subscription_ids {
                state.data.insert(id.clone(), 0);
            }
        });
    }

    pub fn delete(&self, subscription_id: &str) -> Option<u64> {
        self.store.update(|state| state.data.remove(subscription_id))
    }

    /// Replace every counter with `counts` (full reconciliation).
    pub fn replace_all(&self, counts: &[UnreadCount]) {
        let data = counts
            .iter()
            .map(|u| (u.subscription_id.clone(), u.count))
            .collect();
        self.store.set_state(UnreadState { data });
    }

    pub fn reset(&self) {
        self.store.reset();
    }
}

impl Default for UnreadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let store = UnreadStore::new();
        store.upsert_many(&[UnreadCount::new("f1", 5)]);

        assert_eq!(store.remove("f1", 1), 4);
        assert_eq!(store.add("f1", 2), 6);
        assert_eq!(store.get("f1"), 6);
    }

    #[test]
    fn test_counters_never_go_negative() {
        let store = UnreadStore::new();
        assert_eq!(store.remove("f1", 1), 0);

        store.upsert_many(&[UnreadCount::new("f2", 2)]);
        for _ in 0..5 {
            store.remove("f2", 1);
        }
        assert_eq!(store.get("f2"), 0);
        assert_eq!(store.remove("f2", u64::MAX), 0);
    }

    #[test]
    fn test_set_zero_and_replace_all() {
        let store = UnreadStore::new();
        store.upsert_many(&[UnreadCount::new("f1", 5), UnreadCount::new("f2", 3)]);
        store.set_zero(&["f1".to_string()]);
        assert_eq!(store.get("f1"), 0);
        assert_eq!(store.get("f2"), 3);

        store.replace_all(&[UnreadCount::new("f3", 9)]);
        assert_eq!(store.get("f2"), 0);
        assert_eq!(store.get("f3"), 9);
        assert_eq!(store.get_state().data.len(), 1);
    }

    #[test]
    fn test_delete_and_reset() {
        let store = UnreadStore::new();
        store.upsert_many(&[UnreadCount::new("f1", 5)]);
        assert_eq!(store.delete("f1"), Some(5));
        assert_eq!(store.delete("f1"), None);

        store.add("f2", 1);
        store.reset();
        assert!(store.get_state().data.is_empty());
    }
}
