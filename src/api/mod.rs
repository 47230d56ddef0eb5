pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpApi;
pub use types::{
    EntryQuery, Envelope, MarkAllReadRequest, MarkReadRequest, MarkUnreadRequest, ReadabilityPayload,
    SubscriptionPayload, UnsubscribeRequest,
};

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{Entry, FeedViewType, UnreadCount};

/// The remote server: source of truth for every entity.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>>;

    async fn fetch_entry(&self, id: &str) -> Result<Option<Entry>>;

    async fn fetch_readability(&self, id: &str) -> Result<Option<String>>;

    async fn mark_as_read(&self, entry_ids: &[String], is_inbox: bool) -> Result<()>;

    async fn mark_as_unread(&self, entry_id: &str) -> Result<()>;

    async fn mark_all_as_read(&self, request: &MarkAllReadRequest) -> Result<()>;

    async fn fetch_unread(&self) -> Result<Vec<UnreadCount>>;

    async fn fetch_subscriptions(&self, view: Option<FeedViewType>) -> Result<Vec<SubscriptionPayload>>;

    async fn unsubscribe(&self, request: &UnsubscribeRequest) -> Result<()>;
}
