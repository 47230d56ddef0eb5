use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{Store, SubscriptionStore};
use crate::domain::{Entry, FeedViewType, TimeRange};

/// Secondary index an entry id list can be read from or reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Feed(String),
    Inbox(String),
    View(FeedViewType),
    Category(String),
    List(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryState {
    pub data: HashMap<String, Entry>,
    pub by_feed: HashMap<String, HashSet<String>>,
    pub by_inbox: HashMap<String, HashSet<String>>,
    pub by_view: HashMap<FeedViewType, HashSet<String>>,
    pub by_category: HashMap<String, HashSet<String>>,
    pub by_list: HashMap<String, HashSet<String>>,
    /// Memberships a timeline fetch established. They survive re-upserts
    /// even when derivation from the owning subscription disagrees.
    pub pinned: HashMap<String, HashSet<IndexKey>>,
}

impl EntryState {
    fn index_mut(&mut self, key: &IndexKey) -> &mut HashSet<String> {
        match key {
            IndexKey::Feed(id) => self.by_feed.entry(id.clone()).or_default(),
            IndexKey::Inbox(id) => self.by_inbox.entry(id.clone()).or_default(),
            IndexKey::View(view) => self.by_view.entry(*view).or_default(),
            IndexKey::Category(name) => self.by_category.entry(name.clone()).or_default(),
            IndexKey::List(id) => self.by_list.entry(id.clone()).or_default(),
        }
    }

    fn index(&self, key: &IndexKey) -> Option<&HashSet<String>> {
        match key {
            IndexKey::Feed(id) => self.by_feed.get(id),
            IndexKey::Inbox(id) => self.by_inbox.get(id),
            IndexKey::View(view) => self.by_view.get(view),
            IndexKey::Category(name) => self.by_category.get(name),
            IndexKey::List(id) => self.by_list.get(id),
        }
    }

    fn unindex(&mut self, id: &str) {
        for ids in self
            .by_feed
            .values_mut()
            .chain(self.by_inbox.values_mut())
            .chain(self.by_category.values_mut())
            .chain(self.by_list.values_mut())
        {
            ids.remove(id);
        }
        for ids in self.by_view.values_mut() {
            ids.remove(id);
        }
    }

    fn drop_entry(&mut self, id: &str) -> Option<Entry> {
        let removed = self.data.remove(id)?;
        self.unindex(id);
        self.pinned.remove(id);
        Some(removed)
    }

    fn pin(&mut self, key: &IndexKey, ids: &[String]) {
        self.index_mut(key).extend(ids.iter().cloned());
        for id in ids {
            self.pinned.entry(id.clone()).or_default().insert(key.clone());
        }
    }

    fn unpin_all(&mut self, key: &IndexKey) {
        let previous: Vec<String> = self.index_mut(key).drain().collect();
        for id in previous {
            if let Some(keys) = self.pinned.get_mut(&id) {
                keys.remove(key);
                if keys.is_empty() {
                    self.pinned.remove(&id);
                }
            }
        }
    }
}

/// Live view of entries plus the secondary indexes timelines read from.
///
/// View and category membership comes from the subscription that owns the
/// entry's feed or inbox, so subscriptions should be loaded first.
pub struct EntryStore {
    store: Store<EntryState>,
    subscriptions: Arc<SubscriptionStore>,
}

impl EntryStore {
    pub fn new(subscriptions: Arc<SubscriptionStore>) -> Self {
        Self {
            store: Store::new("entries", EntryState::default()),
            subscriptions,
        }
    }

    pub fn store(&self) -> &Store<EntryState> {
        &self.store
    }

    pub fn get_state(&self) -> Arc<EntryState> {
        self.store.get_state()
    }

    pub fn get(&self, id: &str) -> Option<Entry> {
        self.store.get_state().data.get(id).cloned()
    }

    /// Every index key `entry` belongs to.
    fn keys_for(&self, entry: &Entry) -> Vec<IndexKey> {
        let mut keys = Vec::new();
        if let Some(feed_id) = &entry.feed_id {
            keys.push(IndexKey::Feed(feed_id.clone()));
        }
        if let Some(handle) = &entry.inbox_handle {
            keys.push(IndexKey::Inbox(handle.clone()));
        }
        for list_id in entry.list_sources() {
            keys.push(IndexKey::List(list_id.to_string()));
        }

        let owner = entry
            .subscription_id()
            .and_then(|id| self.subscriptions.get(id));
        match owner {
            Some(sub) => {
                keys.push(IndexKey::View(sub.view));
                if let Some(category) = sub.category {
                    keys.push(IndexKey::Category(category));
                }
            }
            None => {
                // Reached only through lists: borrow their views.
                for list_id in entry.list_sources() {
                    if let Some(list) = self.subscriptions.get(list_id) {
                        keys.push(IndexKey::View(list.view));
                    }
                }
            }
        }
        keys
    }

    /// Insert or replace entries, updating every index they participate in
    /// within the same snapshot. Pinned memberships are kept.
    pub fn upsert_many(&self, entries: &[Entry]) {
        if entries.is_empty() {
            return;
        }
        let keyed: Vec<(Entry, Vec<IndexKey>)> = entries
            .iter()
            .map(|entry| (entry.clone(), self.keys_for(entry)))
            .collect();

        self.store.update(|state| {
            for (entry, keys) in keyed {
                if state.data.contains_key(&entry.id) {
                    state.unindex(&entry.id);
                }
                let pinned: Vec<IndexKey> = state
                    .pinned
                    .get(&entry.id)
                    .map(|keys| keys.iter().cloned().collect())
                    .unwrap_or_default();
                for key in keys.iter().chain(&pinned) {
                    state.index_mut(key).insert(entry.id.clone());
                }
                state.data.insert(entry.id.clone(), entry);
            }
        });
    }

    /// Replace one secondary index with exactly `ids` and pin them there.
    pub fn reset_index(&self, key: &IndexKey, ids: &[String]) {
        self.store.update(|state| {
            state.unpin_all(key);
            state.pin(key, ids);
        });
    }

    /// Add `ids` to one secondary index and pin them there.
    pub fn add_to_index(&self, key: &IndexKey, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        self.store.update(|state| state.pin(key, ids));
    }

    /// Ids in `key`, newest first.
    pub fn ids_for(&self, key: &IndexKey) -> Vec<String> {
        let state = self.store.get_state();
        let Some(ids) = state.index(key) else {
            return Vec::new();
        };
        let mut entries: Vec<&Entry> = ids.iter().filter_map(|id| state.data.get(id)).collect();
        entries.sort_by(|a, b| b.published_at.cmp(&a.published_at).then_with(|| a.id.cmp(&b.id)));
        entries.into_iter().map(|e| e.id.clone()).collect()
    }

    /// Set `read` on the given entries; returns the ids that actually changed.
    pub fn mark_read(&self, ids: &[String], read: bool) -> Vec<String> {
        self.store.update(|state| {
            let mut changed = Vec::new();
            for id in ids {
                if let Some(entry) = state.data.get_mut(id) {
                    if entry.read != read {
                        entry.read = read;
                        changed.push(id.clone());
                    }
                }
            }
            changed
        })
    }

    /// Sweep entries of the given feeds (or inbox handles), optionally
    /// limited to a publication window.
    pub fn mark_read_by_feeds(
        &self,
        feed_ids: &[String],
        read: bool,
        time_range: Option<TimeRange>,
    ) -> Vec<String> {
        let sources: HashSet<&str> = feed_ids.iter().map(String::as_str).collect();
        self.store.update(|state| {
            let mut changed = Vec::new();
            for entry in state.data.values_mut() {
                let owned = entry
                    .subscription_id()
                    .is_some_and(|id| sources.contains(id));
                let in_range = time_range.map_or(true, |range| range.contains(entry.published_at));
                if owned && in_range && entry.read != read {
                    entry.read = read;
                    changed.push(entry.id.clone());
                }
            }
            changed.sort();
            changed
        })
    }

    /// Fill in content fetched after the entry itself; `None` leaves a field.
    pub fn patch_content(
        &self,
        id: &str,
        content: Option<String>,
        readability_content: Option<String>,
    ) -> bool {
        self.store.update(|state| {
            let Some(entry) = state.data.get_mut(id) else {
                return false;
            };
            if content.is_some() {
                entry.content = content;
            }
            if readability_content.is_some() {
                entry.readability_content = readability_content;
            }
            true
        })
    }

    pub fn remove(&self, id: &str) -> Option<Entry> {
        self.store.update(|state| state.drop_entry(id))
    }

    pub fn delete_by_feed(&self, feed_id: &str) -> Vec<Entry> {
        self.store.update(|state| {
            let ids: Vec<String> = state
                .by_feed
                .remove(feed_id)
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_default();
            ids.iter().filter_map(|id| state.drop_entry(id)).collect()
        })
    }

    pub fn reset(&self) {
        self.store.reset();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::domain::Subscription;

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).unwrap()
    }

    fn stores() -> (Arc<SubscriptionStore>, EntryStore) {
        let subs = Arc::new(SubscriptionStore::new());
        subs.upsert_many(&[
            Subscription::for_feed("f1", FeedViewType::Articles).with_category("Tech"),
            Subscription::for_feed("f2", FeedViewType::Pictures),
            Subscription::for_list("l1", FeedViewType::SocialMedia),
            Subscription::for_inbox("me@inbox"),
        ]);
        let entries = EntryStore::new(subs.clone());
        (subs, entries)
    }

    fn key_contains(state: &EntryState, key: &IndexKey, id: &str) -> bool {
        state.index(key).is_some_and(|ids| ids.contains(id))
    }

    #[test]
    fn test_upsert_updates_every_index() {
        let (_, store) = stores();
        let mut e1 = Entry::new("e1", "f1", at(1));
        e1.sources = vec!["feed".into(), "l1".into()];
        let mut inbox = Entry::new("e2", "unused", at(2));
        inbox.feed_id = None;
        inbox.inbox_handle = Some("me@inbox".into());

        store.upsert_many(&[e1, inbox]);
        let state = store.get_state();

        assert!(key_contains(&state, &IndexKey::Feed("f1".into()), "e1"));
        assert!(key_contains(&state, &IndexKey::View(FeedViewType::Articles), "e1"));
        assert!(key_contains(&state, &IndexKey::Category("Tech".into()), "e1"));
        assert!(key_contains(&state, &IndexKey::List("l1".into()), "e1"));
        assert!(!key_contains(&state, &IndexKey::List("feed".into()), "e1"));

        assert!(key_contains(&state, &IndexKey::Inbox("me@inbox".into()), "e2"));
        assert!(key_contains(&state, &IndexKey::View(FeedViewType::Articles), "e2"));
    }

    /// Every index holding `id`, found by scanning all of them.
    fn memberships(state: &EntryState, id: &str) -> HashSet<IndexKey> {
        let mut keys = HashSet::new();
        for (feed, ids) in &state.by_feed {
            if ids.contains(id) {
                keys.insert(IndexKey::Feed(feed.clone()));
            }
        }
        for (handle, ids) in &state.by_inbox {
            if ids.contains(id) {
                keys.insert(IndexKey::Inbox(handle.clone()));
            }
        }
        for (view, ids) in &state.by_view {
            if ids.contains(id) {
                keys.insert(IndexKey::View(*view));
            }
        }
        for (category, ids) in &state.by_category {
            if ids.contains(id) {
                keys.insert(IndexKey::Category(category.clone()));
            }
        }
        for (list, ids) in &state.by_list {
            if ids.contains(id) {
                keys.insert(IndexKey::List(list.clone()));
            }
        }
        keys
    }

    fn keys(keys: &[IndexKey]) -> HashSet<IndexKey> {
        keys.iter().cloned().collect()
    }

    #[test]
    fn test_entry_sits_in_exactly_its_indexes() {
        let (_, store) = stores();
        let mut listed = Entry::new("e1", "f1", at(1));
        listed.sources = vec!["l1".into()];
        store.upsert_many(&[listed, Entry::new("e2", "f2", at(2))]);

        let state = store.get_state();
        assert_eq!(
            memberships(&state, "e1"),
            keys(&[
                IndexKey::Feed("f1".into()),
                IndexKey::View(FeedViewType::Articles),
                IndexKey::Category("Tech".into()),
                IndexKey::List("l1".into()),
            ])
        );
        assert_eq!(
            memberships(&state, "e2"),
            keys(&[IndexKey::Feed("f2".into()), IndexKey::View(FeedViewType::Pictures)])
        );
    }

    #[test]
    fn test_list_only_entry_borrows_list_view() {
        let (_, store) = stores();
        let mut e = Entry::new("e1", "unsubscribed", at(1));
        e.sources = vec!["l1".into()];
        store.upsert_many(&[e]);

        assert_eq!(
            memberships(&store.get_state(), "e1"),
            keys(&[
                IndexKey::Feed("unsubscribed".into()),
                IndexKey::List("l1".into()),
                IndexKey::View(FeedViewType::SocialMedia),
            ])
        );
    }

    #[test]
    fn test_reupsert_after_subscription_moves_view() {
        let (subs, store) = stores();
        store.upsert_many(&[Entry::new("e1", "f1", at(1))]);

        subs.upsert_many(&[Subscription::for_feed("f1", FeedViewType::Videos)]);
        store.upsert_many(&[Entry::new("e1", "f1", at(1))]);

        let state = store.get_state();
        assert_eq!(
            memberships(&state, "e1"),
            keys(&[IndexKey::Feed("f1".into()), IndexKey::View(FeedViewType::Videos)])
        );
        assert!(store.ids_for(&IndexKey::Category("Tech".into())).is_empty());
    }

    #[test]
    fn test_pinned_membership_survives_reupsert() {
        let (_, store) = stores();
        store.upsert_many(&[Entry::new("e1", "f2", at(1)), Entry::new("e2", "f2", at(2))]);
        store.reset_index(&IndexKey::View(FeedViewType::Articles), &["e1".to_string()]);
        store.add_to_index(&IndexKey::View(FeedViewType::Articles), &["e2".to_string()]);

        store.upsert_many(&[Entry::new("e1", "f2", at(1)), Entry::new("e2", "f2", at(2))]);

        assert_eq!(
            store.ids_for(&IndexKey::View(FeedViewType::Articles)),
            vec!["e2", "e1"]
        );
        assert_eq!(
            memberships(&store.get_state(), "e1"),
            keys(&[
                IndexKey::Feed("f2".into()),
                IndexKey::View(FeedViewType::Pictures),
                IndexKey::View(FeedViewType::Articles),
            ])
        );
    }

    #[test]
    fn test_reset_index_releases_previous_pins() {
        let (_, store) = stores();
        store.upsert_many(&[Entry::new("e1", "f2", at(1)), Entry::new("e2", "f2", at(2))]);
        let articles = IndexKey::View(FeedViewType::Articles);
        store.reset_index(&articles, &["e1".to_string()]);
        store.reset_index(&articles, &["e2".to_string()]);

        store.upsert_many(&[Entry::new("e1", "f2", at(1))]);

        assert_eq!(store.ids_for(&articles), vec!["e2"]);
        assert!(!store.get_state().pinned.contains_key("e1"));
    }

    #[test]
    fn test_reupsert_moves_entry_between_feeds() {
        let (_, store) = stores();
        store.upsert_many(&[Entry::new("e1", "f1", at(1))]);
        store.upsert_many(&[Entry::new("e1", "f2", at(1))]);

        let state = store.get_state();
        assert!(!key_contains(&state, &IndexKey::Feed("f1".into()), "e1"));
        assert!(!key_contains(&state, &IndexKey::View(FeedViewType::Articles), "e1"));
        assert!(key_contains(&state, &IndexKey::Feed("f2".into()), "e1"));
        assert!(key_contains(&state, &IndexKey::View(FeedViewType::Pictures), "e1"));
    }

    #[test]
    fn test_ids_for_newest_first() {
        let (_, store) = stores();
        store.upsert_many(&[
            Entry::new("old", "f1", at(1)),
            Entry::new("new", "f1", at(5)),
            Entry::new("mid", "f1", at(3)),
        ]);
        assert_eq!(store.ids_for(&IndexKey::Feed("f1".into())), vec!["new", "mid", "old"]);
        assert!(store.ids_for(&IndexKey::Feed("nope".into())).is_empty());
    }

    #[test]
    fn test_reset_index_replaces_membership() {
        let (_, store) = stores();
        store.upsert_many(&[Entry::new("a", "f1", at(1)), Entry::new("b", "f1", at(2))]);
        store.reset_index(&IndexKey::Feed("f1".into()), &["b".to_string()]);
        assert_eq!(store.ids_for(&IndexKey::Feed("f1".into())), vec!["b"]);
        // Entity data is untouched.
        assert!(store.get("a").is_some());
    }

    #[test]
    fn test_mark_read_reports_changes() {
        let (_, store) = stores();
        let mut read = Entry::new("b", "f1", at(2));
        read.read = true;
        store.upsert_many(&[Entry::new("a", "f1", at(1)), read]);

        let changed = store.mark_read(&["a".into(), "b".into(), "missing".into()], true);
        assert_eq!(changed, vec!["a"]);
        assert!(store.get("a").unwrap().read);
    }

    #[test]
    fn test_mark_read_by_feeds_with_range() {
        let (_, store) = stores();
        store.upsert_many(&[
            Entry::new("early", "f1", at(1)),
            Entry::new("late", "f1", at(9)),
            Entry::new("other", "f2", at(1)),
        ]);

        let changed = store.mark_read_by_feeds(
            &["f1".into()],
            true,
            Some(TimeRange::new(at(0), at(2))),
        );
        assert_eq!(changed, vec!["early"]);
        assert!(!store.get("late").unwrap().read);

        let changed = store.mark_read_by_feeds(&["f1".into()], true, None);
        assert_eq!(changed, vec!["late"]);
        assert!(!store.get("other").unwrap().read);
    }

    #[test]
    fn test_patch_content_keeps_missing_fields() {
        let (_, store) = stores();
        let mut e = Entry::new("e1", "f1", at(1));
        e.content = Some("<p>body</p>".into());
        store.upsert_many(&[e]);

        assert!(store.patch_content("e1", None, Some("clean".into())));
        let e = store.get("e1").unwrap();
        assert_eq!(e.content.as_deref(), Some("<p>body</p>"));
        assert_eq!(e.readability_content.as_deref(), Some("clean"));
        assert!(!store.patch_content("missing", Some("x".into()), None));
    }

    #[test]
    fn test_delete_by_feed_clears_indexes() {
        let (_, store) = stores();
        store.upsert_many(&[Entry::new("a", "f1", at(1)), Entry::new("b", "f2", at(1))]);

        let removed = store.delete_by_feed("f1");
        assert_eq!(removed.len(), 1);
        assert!(store.get("a").is_none());
        assert!(store.ids_for(&IndexKey::View(FeedViewType::Articles)).is_empty());
        assert_eq!(store.ids_for(&IndexKey::View(FeedViewType::Pictures)), vec!["b"]);
    }
}
