use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{EntryQuery, MarkAllReadRequest, RemoteApi, SubscriptionPayload, UnsubscribeRequest};
use crate::app::{Result, SyncError};
use crate::domain::{Entry, FeedViewType, UnreadCount};

/// In-process server double. Every call is recorded; `fail` makes every
/// call return an error.
#[derive(Default)]
pub(crate) struct MockApi {
    pub entries: Mutex<Vec<Entry>>,
    pub readability: Mutex<HashMap<String, String>>,
    pub unread: Mutex<Vec<UnreadCount>>,
    pub subscriptions: Mutex<Vec<SubscriptionPayload>>,
    pub calls: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::Other("network unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for MockApi {
    async fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>> {
        self.record(format!("fetch_entries cursor={:?}", query.published_after.map(|c| c.timestamp())))?;
        let mut entries: Vec<Entry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| query.feed_id.is_none() || e.feed_id == query.feed_id)
            .filter(|e| query.published_after.map_or(true, |cursor| e.published_at < cursor))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        entries.truncate(query.limit as usize);
        Ok(entries)
    }

    async fn fetch_entry(&self, id: &str) -> Result<Option<Entry>> {
        self.record(format!("fetch_entry {id}"))?;
        Ok(self.entries.lock().unwrap().iter().find(|e| e.id == id).cloned())
    }

    async fn fetch_readability(&self, id: &str) -> Result<Option<String>> {
        self.record(format!("fetch_readability {id}"))?;
        Ok(self.readability.lock().unwrap().get(id).cloned())
    }

    async fn mark_as_read(&self, entry_ids: &[String], is_inbox: bool) -> Result<()> {
        self.record(format!("mark_as_read {} inbox={is_inbox}", entry_ids.join(",")))
    }

    async fn mark_as_unread(&self, entry_id: &str) -> Result<()> {
        self.record(format!("mark_as_unread {entry_id}"))
    }

    async fn mark_all_as_read(&self, request: &MarkAllReadRequest) -> Result<()> {
        self.record(format!(
            "mark_all_as_read feeds={:?} list={:?} view={:?} range={}",
            request.feed_id_list,
            request.list_id,
            request.view.map(u8::from),
            request.start_time.is_some()
        ))
    }

    async fn fetch_unread(&self) -> Result<Vec<UnreadCount>> {
        self.record("fetch_unread".to_string())?;
        Ok(self.unread.lock().unwrap().clone())
    }

    async fn fetch_subscriptions(&self, view: Option<FeedViewType>) -> Result<Vec<SubscriptionPayload>> {
        self.record(format!("fetch_subscriptions {:?}", view.map(u8::from)))?;
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|p| view.map_or(true, |v| p.subscription.view == v))
            .cloned()
            .collect())
    }

    async fn unsubscribe(&self, request: &UnsubscribeRequest) -> Result<()> {
        self.record(format!("unsubscribe feed={:?} list={:?}", request.feed_id, request.list_id))
    }
}
