use std::collections::BTreeSet;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info};

use crate::api::{MarkAllReadRequest, RemoteApi};
use crate::app::{Result, SyncError};
use crate::domain::{FeedViewType, TimeRange, UnreadCount};
use crate::persist::{EntryPatch, EntryPatchScope, Persistence, PersistenceService};
use crate::state::{IndexKey, Stores};
use crate::transaction::Transaction;

/// Read state of entries and the unread counters derived from it.
pub struct UnreadSyncService {
    api: Arc<dyn RemoteApi>,
    stores: Stores,
    db: Persistence,
}

impl UnreadSyncService {
    pub fn new(api: Arc<dyn RemoteApi>, stores: Stores, db: Persistence) -> Self {
        Self { api, stores, db }
    }

    pub async fn mark_entry_as_read(&self, entry_id: &str) -> Result<()> {
        self.set_entry_read(entry_id, true).await
    }

    pub async fn mark_entry_as_unread(&self, entry_id: &str) -> Result<()> {
        self.set_entry_read(entry_id, false).await
    }

    async fn set_entry_read(&self, entry_id: &str, read: bool) -> Result<()> {
        let Some(entry) = self.stores.entries.get(entry_id) else {
            debug!(entry_id, "Entry not loaded, nothing to mark");
            return Ok(());
        };
        if entry.read == read {
            return Ok(());
        }

        let id = entry.id.clone();
        let is_inbox = entry.is_inbox();
        let counter = entry.subscription_id().map(String::from);

        let (entries, unread) = (self.stores.entries.clone(), self.stores.unread.clone());
        let store = {
            let (id, counter) = (id.clone(), counter.clone());
            move |previous: &mut Option<u64>| {
                entries.mark_read(std::slice::from_ref(&id), read);
                if let Some(counter) = &counter {
                    *previous = Some(unread.get(counter));
                    if read {
                        unread.remove(counter, 1);
                    } else {
                        unread.add(counter, 1);
                    }
                }
            }
        };

        let (entries, unread) = (self.stores.entries.clone(), self.stores.unread.clone());
        let rollback = {
            let (id, counter) = (id.clone(), counter.clone());
            move |previous: &Option<u64>| {
                entries.mark_read(std::slice::from_ref(&id), !read);
                if let (Some(counter), Some(count)) = (counter, previous) {
                    unread.upsert_many(&[UnreadCount::new(counter, *count)]);
                }
            }
        };

        let api = self.api.clone();
        let request = {
            let id = id.clone();
            move |_: &Option<u64>| {
                async move {
                    if read {
                        api.mark_as_read(&[id], is_inbox).await
                    } else {
                        api.mark_as_unread(&id).await
                    }
                }
                .boxed()
            }
        };

        let (db, unread) = (self.db.clone(), self.stores.unread.clone());
        let persist = move |_: &Option<u64>| {
            let count = counter.map(|c| {
                let n = unread.get(&c);
                UnreadCount::new(c, n)
            });
            async move {
                db.entries.patch(&EntryPatchScope::Id(id), &EntryPatch::read(read))?;
                if let Some(count) = count {
                    db.unread.upsert_many(&[count])?;
                }
                Ok::<(), SyncError>(())
            }
            .boxed()
        };

        Transaction::new(None)
            .named(if read { "mark_entry_as_read" } else { "mark_entry_as_unread" })
            .store(store)
            .rollback(rollback)
            .request(request)
            .persist(persist)
            .run()
            .await?;
        Ok(())
    }

    /// Mark everything in the given feeds (or inbox handles) as read.
    pub async fn mark_feed_as_read(&self, feed_ids: &[String], time_range: Option<TimeRange>) -> Result<()> {
        let (start_time, end_time) = range_millis(time_range);
        self.api
            .mark_all_as_read(&MarkAllReadRequest {
                feed_id_list: Some(feed_ids.to_vec()),
                start_time,
                end_time,
                ..Default::default()
            })
            .await?;
        self.update_unread_status(feed_ids, time_range).await
    }

    pub async fn mark_list_as_read(&self, list_id: &str, time_range: Option<TimeRange>) -> Result<()> {
        let (start_time, end_time) = range_millis(time_range);
        self.api
            .mark_all_as_read(&MarkAllReadRequest {
                list_id: Some(list_id.to_string()),
                start_time,
                end_time,
                ..Default::default()
            })
            .await?;

        let mut affected = vec![list_id.to_string()];
        if let Some(list) = self.stores.lists.get(list_id) {
            affected.extend(list.feed_ids);
        }
        self.update_unread_status(&affected, time_range).await
    }

    pub async fn mark_view_as_read(
        &self,
        view: FeedViewType,
        time_range: Option<TimeRange>,
        exclude_private: bool,
    ) -> Result<()> {
        let (start_time, end_time) = range_millis(time_range);
        self.api
            .mark_all_as_read(&MarkAllReadRequest {
                view: Some(view),
                start_time,
                end_time,
                exclude_private: Some(exclude_private),
                ..Default::default()
            })
            .await?;

        let mut affected = BTreeSet::new();
        for id in self.stores.subscriptions.ids_for_view(view) {
            let Some(sub) = self.stores.subscriptions.get(&id) else {
                continue;
            };
            if exclude_private && sub.is_private {
                continue;
            }
            if let Some(list) = self.stores.lists.get(&id) {
                affected.extend(list.feed_ids);
            }
            affected.insert(id);
        }
        let affected: Vec<String> = affected.into_iter().collect();
        self.update_unread_status(&affected, time_range).await
    }

    /// Bring local read state in line after a bulk "mark as read".
    ///
    /// A time range only covers part of each subscription, so the counters
    /// are refetched. Otherwise every affected counter drops to zero and the
    /// loaded entries are swept locally.
    pub async fn update_unread_status(&self, subscription_ids: &[String], time_range: Option<TimeRange>) -> Result<()> {
        if time_range.is_some() {
            return self.reset_from_remote().await;
        }

        self.stores.unread.set_zero(subscription_ids);
        self.db.unread.set_zero(subscription_ids)?;

        let swept = self.stores.entries.mark_read_by_feeds(subscription_ids, true, None);
        self.db.entries.patch(
            &EntryPatchScope::Sources {
                ids: subscription_ids.to_vec(),
                time_range: None,
            },
            &EntryPatch::read(true),
        )?;

        let mut via_lists = Vec::new();
        for id in subscription_ids {
            via_lists.extend(self.stores.entries.ids_for(&IndexKey::List(id.clone())));
        }
        let via_lists = self.stores.entries.mark_read(&via_lists, true);
        self.db
            .entries
            .patch(&EntryPatchScope::Ids(via_lists.clone()), &EntryPatch::read(true))?;

        debug!(
            subscriptions = subscription_ids.len(),
            entries = swept.len() + via_lists.len(),
            "Marked subscriptions as read"
        );
        Ok(())
    }

    /// Replace every counter, in memory and on disk, with the server's.
    pub async fn reset_from_remote(&self) -> Result<()> {
        let counts = self.api.fetch_unread().await?;
        self.stores.unread.replace_all(&counts);
        self.db.unread.replace_all(&counts)?;
        info!(subscriptions = counts.len(), "Unread counters reset from server");
        Ok(())
    }

    /// Load counters from the database into memory.
    pub fn hydrate(&self) -> Result<usize> {
        let counts = self.db.unread.get_all()?;
        self.stores.unread.replace_all(&counts);
        Ok(counts.len())
    }

    pub fn unread_count(&self, subscription_id: &str) -> u64 {
        self.stores.unread.get(subscription_id)
    }
}

fn range_millis(time_range: Option<TimeRange>) -> (Option<i64>, Option<i64>) {
    match time_range {
        Some(range) => (
            Some(range.start.timestamp_millis()),
            Some(range.end.timestamp_millis()),
        ),
        None => (None, None),
    }
}
