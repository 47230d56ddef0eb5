//! In-memory domain stores.
//!
//! Each store owns the live view of one entity family and exposes action
//! methods as the only way to change it. Everything is rebuilt from the
//! database at startup (`hydrate` on the sync services) and cleared with
//! `reset` on logout.

pub mod entity;
pub mod entry;
pub mod store;
pub mod subscription;
pub mod unread;

pub use entity::{EntityState, EntityStore};
pub use entry::{EntryState, EntryStore, IndexKey};
pub use store::{ListenerId, Store};
pub use subscription::{SubscriptionState, SubscriptionStore};
pub use unread::{UnreadState, UnreadStore};

use std::sync::Arc;

use crate::domain::{Feed, Inbox, List};

/// Every domain store, shared by the sync services.
#[derive(Clone)]
pub struct Stores {
    pub subscriptions: Arc<SubscriptionStore>,
    pub entries: Arc<EntryStore>,
    pub unread: Arc<UnreadStore>,
    pub feeds: Arc<EntityStore<Feed>>,
    pub lists: Arc<EntityStore<List>>,
    pub inboxes: Arc<EntityStore<Inbox>>,
}

impl Stores {
    pub fn new() -> Self {
        let subscriptions = Arc::new(SubscriptionStore::new());
        Self {
            entries: Arc::new(EntryStore::new(subscriptions.clone())),
            subscriptions,
            unread: Arc::new(UnreadStore::new()),
            feeds: Arc::new(EntityStore::new("feeds")),
            lists: Arc::new(EntityStore::new("lists")),
            inboxes: Arc::new(EntityStore::new("inboxes")),
        }
    }

    /// Clear every store (logout).
    pub fn reset(&self) {
        self.entries.reset();
        self.subscriptions.reset();
        self.unread.reset();
        self.feeds.reset();
        self.lists.reset();
        self.inboxes.reset();
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new()
    }
}
