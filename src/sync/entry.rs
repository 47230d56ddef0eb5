use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::api::{EntryQuery, RemoteApi};
use crate::app::Result;
use crate::domain::Entry;
use crate::persist::{EntryPatch, EntryPatchScope, Persistence, PersistenceService};
use crate::state::{IndexKey, Stores};

/// One page of a timeline fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPage {
    pub entries: Vec<Entry>,
    /// Pass back as `published_after` to get the next page; `None` once the
    /// server returned a short page.
    pub next_cursor: Option<DateTime<Utc>>,
}

pub struct EntrySyncService {
    api: Arc<dyn RemoteApi>,
    stores: Stores,
    db: Persistence,
}

impl EntrySyncService {
    pub fn new(api: Arc<dyn RemoteApi>, stores: Stores, db: Persistence) -> Self {
        Self { api, stores, db }
    }

    /// Fetch one page of entries and store it.
    ///
    /// The first page (no cursor) replaces the timeline's index with exactly
    /// the fetched ids, dropping anything the server no longer returns.
    /// Later pages add theirs to the same index.
    pub async fn fetch_entries(&self, query: &EntryQuery) -> Result<EntryPage> {
        let mut fetched = self.api.fetch_entries(query).await?;
        self.keep_local_content(&mut fetched)?;

        self.stores.entries.upsert_many(&fetched);
        self.db.entries.upsert_many(&fetched)?;

        if let Some(key) = index_key(query) {
            let ids: Vec<String> = fetched.iter().map(|e| e.id.clone()).collect();
            if query.is_first_page() {
                self.stores.entries.reset_index(&key, &ids);
                debug!(index = ?key, entries = ids.len(), "Timeline index reset");
            } else {
                self.stores.entries.add_to_index(&key, &ids);
            }
        }

        let next_cursor = if query.limit > 0 && fetched.len() >= query.limit as usize {
            fetched.iter().map(|e| e.published_at).min()
        } else {
            None
        };
        info!(entries = fetched.len(), first_page = query.is_first_page(), "Fetched entries");

        Ok(EntryPage {
            entries: fetched,
            next_cursor,
        })
    }

    /// List responses omit bodies; keep whatever was hydrated earlier.
    fn keep_local_content(&self, fetched: &mut [Entry]) -> Result<()> {
        let ids: Vec<String> = fetched
            .iter()
            .filter(|e| e.content.is_none() || e.readability_content.is_none())
            .map(|e| e.id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let mut local: HashMap<String, Entry> = self
            .db
            .entries
            .get_many(&ids)?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        for id in &ids {
            if let Some(entry) = self.stores.entries.get(id) {
                local.insert(id.clone(), entry);
            }
        }

        for entry in fetched.iter_mut() {
            if let Some(previous) = local.get(&entry.id) {
                entry.merge_local_content(previous);
            }
        }
        Ok(())
    }

    /// Fetch a single entry with its full content.
    pub async fn fetch_entry_content(&self, entry_id: &str) -> Result<Option<Entry>> {
        let Some(mut entry) = self.api.fetch_entry(entry_id).await? else {
            debug!(entry_id, "Server has no such entry");
            return Ok(None);
        };
        self.keep_local_content(std::slice::from_mut(&mut entry))?;

        self.stores.entries.upsert_many(std::slice::from_ref(&entry));
        self.db.entries.upsert_many(std::slice::from_ref(&entry))?;
        Ok(Some(entry))
    }

    /// Fetch the readability rendition and attach it to the entry.
    pub async fn fetch_readability(&self, entry_id: &str) -> Result<Option<String>> {
        let Some(content) = self.api.fetch_readability(entry_id).await? else {
            return Ok(None);
        };

        self.stores
            .entries
            .patch_content(entry_id, None, Some(content.clone()));
        self.db.entries.patch(
            &EntryPatchScope::Id(entry_id.to_string()),
            &EntryPatch {
                readability_content: Some(content.clone()),
                ..Default::default()
            },
        )?;
        Ok(Some(content))
    }

    /// Load persisted entries into memory.
    pub fn hydrate(&self) -> Result<usize> {
        let entries = self.db.entries.get_all()?;
        self.stores.entries.upsert_many(&entries);
        Ok(entries.len())
    }
}

/// The timeline index a query populates.
fn index_key(query: &EntryQuery) -> Option<IndexKey> {
    if let Some(feed_id) = &query.feed_id {
        Some(IndexKey::Feed(feed_id.clone()))
    } else if let Some(inbox_id) = &query.inbox_id {
        Some(IndexKey::Inbox(inbox_id.clone()))
    } else if let Some(list_id) = &query.list_id {
        Some(IndexKey::List(list_id.clone()))
    } else {
        query.view.map(IndexKey::View)
    }
}
