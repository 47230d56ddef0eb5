use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FeedViewType, Identifiable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub error_at: Option<DateTime<Utc>>,
}

impl Feed {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: None,
            description: None,
            site_url: None,
            image: None,
            error_at: None,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

impl Identifiable for Feed {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A user-curated collection of feeds shown as one timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub feed_ids: Vec<String>,
    pub view: FeedViewType,
    #[serde(default)]
    pub owner_user_id: Option<String>,
}

impl Identifiable for List {
    fn id(&self) -> &str {
        &self.id
    }
}

/// An email-style inbox; entries reference it by handle instead of a feed id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbox {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

impl Identifiable for Inbox {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_falls_back_to_url() {
        let mut feed = Feed::new("f1", "https://example.com/feed.xml");
        assert_eq!(feed.display_title(), "https://example.com/feed.xml");
        feed.title = Some("Example".into());
        assert_eq!(feed.display_title(), "Example");
    }

    #[test]
    fn test_list_deserializes_camel_case() {
        let list: List =
            serde_json::from_str(r#"{"id":"l1","title":"Tech","feedIds":["f1","f2"],"view":0}"#)
                .unwrap();
        assert_eq!(list.feed_ids, vec!["f1", "f2"]);
        assert_eq!(list.view, FeedViewType::Articles);
        assert!(list.owner_user_id.is_none());
    }
}
