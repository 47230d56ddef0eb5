use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info};

use crate::api::{RemoteApi, SubscriptionPayload, UnsubscribeRequest};
use crate::app::{Result, SyncError};
use crate::domain::{Entry, FeedViewType, Subscription, UnreadCount};
use crate::persist::{Persistence, PersistenceService};
use crate::state::Stores;
use crate::transaction::Transaction;

/// What `unsubscribe` took out of memory, kept for rollback.
#[derive(Debug, Default)]
struct Removed {
    subscription: Option<Subscription>,
    unread: Option<u64>,
    entries: Vec<Entry>,
}

pub struct SubscriptionSyncService {
    api: Arc<dyn RemoteApi>,
    stores: Stores,
    db: Persistence,
}

impl SubscriptionSyncService {
    pub fn new(api: Arc<dyn RemoteApi>, stores: Stores, db: Persistence) -> Self {
        Self { api, stores, db }
    }

    /// Replace the subscriptions of `view` (or of every view) with the
    /// server's, along with the feeds, lists and inboxes they embed.
    pub async fn fetch_subscriptions(&self, view: Option<FeedViewType>) -> Result<Vec<Subscription>> {
        let payloads = self.api.fetch_subscriptions(view).await?;
        let views: Vec<FeedViewType> = match view {
            Some(view) => vec![view],
            None => FeedViewType::ALL.to_vec(),
        };

        self.store_targets(&payloads)?;

        let subscriptions: Vec<Subscription> = payloads.into_iter().map(|p| p.subscription).collect();
        for view in views {
            let in_view: Vec<Subscription> = subscriptions
                .iter()
                .filter(|s| s.view == view)
                .cloned()
                .collect();
            self.stores.subscriptions.replace_view(view, &in_view);
            self.db.subscriptions.replace_view(view, &in_view)?;
            debug!(%view, subscriptions = in_view.len(), "Subscriptions replaced");
        }

        info!(subscriptions = subscriptions.len(), "Fetched subscriptions");
        Ok(subscriptions)
    }

    fn store_targets(&self, payloads: &[SubscriptionPayload]) -> Result<()> {
        let feeds: Vec<_> = payloads.iter().filter_map(|p| p.feeds.clone()).collect();
        let lists: Vec<_> = payloads.iter().filter_map(|p| p.lists.clone()).collect();
        let inboxes: Vec<_> = payloads.iter().filter_map(|p| p.inboxes.clone()).collect();

        self.stores.feeds.upsert_many(&feeds);
        self.db.feeds.upsert_many(&feeds)?;
        self.stores.lists.upsert_many(&lists);
        self.db.lists.upsert_many(&lists)?;
        self.stores.inboxes.upsert_many(&inboxes);
        self.db.inboxes.upsert_many(&inboxes)?;
        Ok(())
    }

    /// Remove a subscription, its unread counter and, for a feed, its
    /// entries. Unknown ids are ignored.
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        let Some(subscription) = self.stores.subscriptions.get(subscription_id) else {
            debug!(subscription_id, "Not subscribed, nothing to remove");
            return Ok(());
        };
        let id = subscription.id.clone();
        let feed_id = subscription.feed_id.clone();
        let request_body = UnsubscribeRequest::for_subscription(&subscription);

        let stores = self.stores.clone();
        let store = {
            let (id, feed_id) = (id.clone(), feed_id.clone());
            move |removed: &mut Removed| {
                removed.subscription = stores.subscriptions.remove(&id);
                removed.unread = stores.unread.delete(&id);
                if let Some(feed_id) = &feed_id {
                    removed.entries = stores.entries.delete_by_feed(feed_id);
                }
            }
        };

        let stores = self.stores.clone();
        let rollback = move |removed: &Removed| {
            if let Some(sub) = &removed.subscription {
                stores.subscriptions.upsert_many(std::slice::from_ref(sub));
                if let Some(count) = removed.unread {
                    stores.unread.upsert_many(&[UnreadCount::new(sub.id.clone(), count)]);
                }
            }
            stores.entries.upsert_many(&removed.entries);
        };

        let api = self.api.clone();
        let request = move |_: &Removed| async move { api.unsubscribe(&request_body).await }.boxed();

        let db = self.db.clone();
        let persist = move |_: &Removed| {
            async move {
                db.subscriptions.delete_by_id(&id)?;
                db.unread.delete_by_id(&id)?;
                if let Some(feed_id) = &feed_id {
                    db.entries.delete_by_feed(feed_id)?;
                }
                Ok::<(), SyncError>(())
            }
            .boxed()
        };

        Transaction::new(Removed::default())
            .named("unsubscribe")
            .store(store)
            .rollback(rollback)
            .request(request)
            .persist(persist)
            .run()
            .await?;
        info!(subscription_id, "Unsubscribed");
        Ok(())
    }

    /// Load subscriptions and their targets from the database into memory.
    pub fn hydrate(&self) -> Result<usize> {
        let subscriptions = self.db.subscriptions.get_all()?;
        self.stores.subscriptions.upsert_many(&subscriptions);
        self.stores.feeds.upsert_many(&self.db.feeds.get_all()?);
        self.stores.lists.upsert_many(&self.db.lists.get_all()?);
        self.stores.inboxes.upsert_many(&self.db.inboxes.get_all()?);
        Ok(subscriptions.len())
    }
}
