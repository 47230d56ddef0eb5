use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::Store;
use crate::domain::{FeedViewType, Subscription, SubscriptionKind};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionState {
    pub data: HashMap<String, Subscription>,
    pub feed_ids_by_view: HashMap<FeedViewType, HashSet<String>>,
    pub list_ids_by_view: HashMap<FeedViewType, HashSet<String>>,
    pub inbox_ids_by_view: HashMap<FeedViewType, HashSet<String>>,
    pub categories_by_view: HashMap<FeedViewType, HashSet<String>>,
}

impl SubscriptionState {
    fn ids_by_kind(&mut self, kind: SubscriptionKind) -> &mut HashMap<FeedViewType, HashSet<String>> {
        match kind {
            SubscriptionKind::Feed => &mut self.feed_ids_by_view,
            SubscriptionKind::List => &mut self.list_ids_by_view,
            SubscriptionKind::Inbox => &mut self.inbox_ids_by_view,
        }
    }

    fn unindex(&mut self, sub: &Subscription) {
        if let Some(ids) = self.ids_by_kind(sub.kind).get_mut(&sub.view) {
            ids.remove(&sub.id);
        }
    }

    fn index(&mut self, sub: &Subscription) {
        self.ids_by_kind(sub.kind)
            .entry(sub.view)
            .or_default()
            .insert(sub.id.clone());
        if let Some(category) = &sub.category {
            self.categories_by_view
                .entry(sub.view)
                .or_default()
                .insert(category.clone());
        }
    }

    fn rebuild_categories(&mut self, view: FeedViewType) {
        let categories: HashSet<String> = self
            .data
            .values()
            .filter(|s| s.view == view)
            .filter_map(|s| s.category.clone())
            .collect();
        self.categories_by_view.insert(view, categories);
    }

    fn insert(&mut self, sub: Subscription) {
        if let Some(previous) = self.data.remove(&sub.id) {
            self.unindex(&previous);
            if previous.view != sub.view || previous.category != sub.category {
                self.rebuild_categories(previous.view);
            }
        }
        self.index(&sub);
        self.data.insert(sub.id.clone(), sub);
    }
}

/// Live view of the user's subscriptions, indexed by timeline.
pub struct SubscriptionStore {
    store: Store<SubscriptionState>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self {
            store: Store::new("subscriptions", SubscriptionState::default()),
        }
    }

    pub fn store(&self) -> &Store<SubscriptionState> {
        &self.store
    }

    pub fn get_state(&self) -> Arc<SubscriptionState> {
        self.store.get_state()
    }

    pub fn get(&self, id: &str) -> Option<Subscription> {
        self.store.get_state().data.get(id).cloned()
    }

    pub fn upsert_many(&self, subs: &[Subscription]) {
        if subs.is_empty() {
            return;
        }
        self.store.update(|state| {
            for sub in subs {
                state.insert(sub.clone());
            }
        });
    }

    /// Drop every subscription of `view` and insert `subs` in their place.
    pub fn replace_view(&self, view: FeedViewType, subs: &[Subscription]) {
        self.store.update(|state| {
            let stale: Vec<Subscription> = state
                .data
                .values()
                .filter(|s| s.view == view)
                .cloned()
                .collect();
            for sub in &stale {
                state.data.remove(&sub.id);
                state.unindex(sub);
            }
            state.categories_by_view.remove(&view);
            for sub in subs {
                state.insert(sub.clone());
            }
        });
    }

    pub fn remove(&self, id: &str) -> Option<Subscription> {
        self.store.update(|state| {
            let removed = state.data.remove(id)?;
            state.unindex(&removed);
            state.rebuild_categories(removed.view);
            Some(removed)
        })
    }

    /// Ids of every subscription (feeds, lists and inboxes) in `view`.
    pub fn ids_for_view(&self, view: FeedViewType) -> Vec<String> {
        let state = self.store.get_state();
        let mut ids: Vec<String> = [
            &state.feed_ids_by_view,
            &state.list_ids_by_view,
            &state.inbox_ids_by_view,
        ]
        .into_iter()
        .filter_map(|index| index.get(&view))
        .flat_map(|ids| ids.iter().cloned())
        .collect();
        ids.sort();
        ids
    }

    pub fn reset(&self) {
        self.store.reset();
    }
}

impl Default for SubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_indexes_by_kind_and_view() {
        let store = SubscriptionStore::new();
        store.upsert_many(&[
            Subscription::for_feed("f1", FeedViewType::Articles).with_category("Tech"),
            Subscription::for_list("l1", FeedViewType::Articles),
            Subscription::for_inbox("me@inbox"),
            Subscription::for_feed("f2", FeedViewType::Videos),
        ]);

        let state = store.get_state();
        assert!(state.feed_ids_by_view[&FeedViewType::Articles].contains("f1"));
        assert!(state.list_ids_by_view[&FeedViewType::Articles].contains("l1"));
        assert!(state.inbox_ids_by_view[&FeedViewType::Articles].contains("me@inbox"));
        assert!(state.categories_by_view[&FeedViewType::Articles].contains("Tech"));
        assert_eq!(
            store.ids_for_view(FeedViewType::Articles),
            vec!["f1", "l1", "me@inbox"]
        );
        assert_eq!(store.ids_for_view(FeedViewType::Videos), vec!["f2"]);
    }

    #[test]
    fn test_moving_view_reindexes() {
        let store = SubscriptionStore::new();
        store.upsert_many(&[Subscription::for_feed("f1", FeedViewType::Articles).with_category("Tech")]);
        store.upsert_many(&[Subscription::for_feed("f1", FeedViewType::Pictures)]);

        let state = store.get_state();
        assert!(!state.feed_ids_by_view[&FeedViewType::Articles].contains("f1"));
        assert!(state.feed_ids_by_view[&FeedViewType::Pictures].contains("f1"));
        assert!(state.categories_by_view[&FeedViewType::Articles].is_empty());
    }

    #[test]
    fn test_remove_returns_previous() {
        let store = SubscriptionStore::new();
        let sub = Subscription::for_feed("f1", FeedViewType::Articles);
        store.upsert_many(&[sub.clone()]);

        assert_eq!(store.remove("f1"), Some(sub));
        assert!(store.get("f1").is_none());
        assert!(store.ids_for_view(FeedViewType::Articles).is_empty());
        assert_eq!(store.remove("f1"), None);
    }

    #[test]
    fn test_replace_view_keeps_other_views() {
        let store = SubscriptionStore::new();
        store.upsert_many(&[
            Subscription::for_feed("f1", FeedViewType::Articles),
            Subscription::for_feed("f2", FeedViewType::Videos),
        ]);
        store.replace_view(
            FeedViewType::Articles,
            &[Subscription::for_feed("f3", FeedViewType::Articles)],
        );

        assert_eq!(store.ids_for_view(FeedViewType::Articles), vec!["f3"]);
        assert_eq!(store.ids_for_view(FeedViewType::Videos), vec!["f2"]);
    }
}
