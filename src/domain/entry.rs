use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identifiable;

/// Source marker used by the server for entries reached through the feed
/// itself rather than through a list.
pub const FEED_SOURCE: &str = "feed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub feed_id: Option<String>,
    #[serde(default)]
    pub inbox_handle: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub readability_content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub guid: String,
    pub published_at: DateTime<Utc>,
    pub inserted_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Entry {
    pub fn new(id: impl Into<String>, feed_id: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        let id = id.into();
        Self {
            guid: id.clone(),
            id,
            feed_id: Some(feed_id.into()),
            inbox_handle: None,
            title: None,
            url: None,
            description: None,
            content: None,
            readability_content: None,
            author: None,
            published_at,
            inserted_at: Utc::now(),
            read: false,
            sources: Vec::new(),
        }
    }

    /// Id of the subscription whose unread counter tracks this entry.
    pub fn subscription_id(&self) -> Option<&str> {
        self.feed_id.as_deref().or(self.inbox_handle.as_deref())
    }

    pub fn is_inbox(&self) -> bool {
        self.feed_id.is_none() && self.inbox_handle.is_some()
    }

    /// List ids this entry was delivered through.
    pub fn list_sources(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .map(String::as_str)
            .filter(|s| *s != FEED_SOURCE)
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }

    /// Keep locally hydrated content the server omits from list responses.
    pub fn merge_local_content(&mut self, local: &Entry) {
        if self.content.is_none() {
            self.content = local.content.clone();
        }
        if self.readability_content.is_none() {
            self.readability_content = local.readability_content.clone();
        }
    }
}

impl Identifiable for Entry {
    fn id(&self) -> &str {
        &self.id
    }
}
