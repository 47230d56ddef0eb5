use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FeedViewType, Identifiable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Feed,
    List,
    Inbox,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Feed => "feed",
            SubscriptionKind::List => "list",
            SubscriptionKind::Inbox => "inbox",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feed" => Some(SubscriptionKind::Feed),
            "list" => Some(SubscriptionKind::List),
            "inbox" => Some(SubscriptionKind::Inbox),
            _ => None,
        }
    }
}

/// A user's subscription to a feed, list or inbox.
///
/// The subscription id is the id of its target, so unread counters keyed by
/// subscription id line up with the `feed_id` / `inbox_handle` carried by
/// entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SubscriptionKind,
    #[serde(default)]
    pub feed_id: Option<String>,
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default)]
    pub inbox_id: Option<String>,
    pub view: FeedViewType,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub hide_from_timeline: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn for_feed(feed_id: impl Into<String>, view: FeedViewType) -> Self {
        let feed_id = feed_id.into();
        Self {
            id: feed_id.clone(),
            kind: SubscriptionKind::Feed,
            feed_id: Some(feed_id),
            list_id: None,
            inbox_id: None,
            view,
            category: None,
            title: None,
            is_private: false,
            hide_from_timeline: false,
            created_at: None,
        }
    }

    pub fn for_list(list_id: impl Into<String>, view: FeedViewType) -> Self {
        let list_id = list_id.into();
        Self {
            id: list_id.clone(),
            kind: SubscriptionKind::List,
            list_id: Some(list_id),
            ..Self::for_feed("", view)
        }
        .without_feed()
    }

    pub fn for_inbox(inbox_id: impl Into<String>) -> Self {
        let inbox_id = inbox_id.into();
        Self {
            id: inbox_id.clone(),
            kind: SubscriptionKind::Inbox,
            inbox_id: Some(inbox_id),
            ..Self::for_feed("", FeedViewType::Articles)
        }
        .without_feed()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn without_feed(mut self) -> Self {
        self.feed_id = None;
        self
    }

    /// Id of the feed, list or inbox this subscription points at.
    pub fn target_id(&self) -> Option<&str> {
        match self.kind {
            SubscriptionKind::Feed => self.feed_id.as_deref(),
            SubscriptionKind::List => self.list_id.as_deref(),
            SubscriptionKind::Inbox => self.inbox_id.as_deref(),
        }
    }
}

impl Identifiable for Subscription {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_target() {
        let feed = Subscription::for_feed("f1", FeedViewType::Pictures);
        assert_eq!(feed.target_id(), Some("f1"));
        assert_eq!(feed.id, "f1");

        let list = Subscription::for_list("l1", FeedViewType::Articles);
        assert_eq!(list.kind, SubscriptionKind::List);
        assert_eq!(list.target_id(), Some("l1"));
        assert!(list.feed_id.is_none());

        let inbox = Subscription::for_inbox("me@inbox");
        assert_eq!(inbox.target_id(), Some("me@inbox"));
        assert!(inbox.feed_id.is_none());
    }

    #[test]
    fn test_deserialize_api_shape() {
        let json = r#"{"id":"f1","type":"feed","feedId":"f1","view":1,"category":"News","isPrivate":true}"#;
        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.kind, SubscriptionKind::Feed);
        assert_eq!(sub.view, FeedViewType::SocialMedia);
        assert_eq!(sub.category.as_deref(), Some("News"));
        assert!(sub.is_private);
        assert!(!sub.hide_from_timeline);
    }
}
