//! Durable copies of domain entities in the local SQLite database.
//!
//! One service per table. Every service shares the process-wide
//! [`Database`] handle and can be reset independently (logout, full
//! resync).

pub mod collection;
pub mod entry;
pub mod sqlite;
pub mod subscription;
pub mod unread;

pub use collection::{FeedService, InboxService, ListService};
pub use entry::{EntryPatch, EntryPatchScope, EntryService};
pub use sqlite::Database;
pub use subscription::SubscriptionService;
pub use unread::UnreadService;

use crate::app::Result;

pub trait PersistenceService<T> {
    /// Insert or overwrite every column except the primary key.
    fn upsert_many(&self, records: &[T]) -> Result<()>;
    fn delete_by_id(&self, id: &str) -> Result<()>;
    /// Delete all rows.
    fn reset(&self) -> Result<()>;
    fn get_all(&self) -> Result<Vec<T>>;
    fn get_many(&self, ids: &[String]) -> Result<Vec<T>>;
}

use std::sync::Arc;

/// Every persistence service over one shared database handle.
#[derive(Clone)]
pub struct Persistence {
    pub db: Arc<Database>,
    pub entries: Arc<EntryService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub unread: Arc<UnreadService>,
    pub feeds: Arc<FeedService>,
    pub lists: Arc<ListService>,
    pub inboxes: Arc<InboxService>,
}

impl Persistence {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            entries: Arc::new(EntryService::new(db.clone())),
            subscriptions: Arc::new(SubscriptionService::new(db.clone())),
            unread: Arc::new(UnreadService::new(db.clone())),
            feeds: Arc::new(FeedService::new(db.clone())),
            lists: Arc::new(ListService::new(db.clone())),
            inboxes: Arc::new(InboxService::new(db.clone())),
            db,
        }
    }

    /// Delete every synced row; the migration ledger is kept.
    pub fn reset(&self) -> Result<()> {
        self.entries.reset()?;
        self.subscriptions.reset()?;
        self.unread.reset()?;
        self.feeds.reset()?;
        self.lists.reset()?;
        self.inboxes.reset()?;
        Ok(())
    }
}
