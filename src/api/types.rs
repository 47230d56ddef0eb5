use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{Result, SyncError};
use crate::domain::{Feed, FeedViewType, Inbox, List, Subscription};

/// `{ "code": 0, "data": ... }` wrapper around every response body.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<Option<T>> {
        if self.code != 0 {
            return Err(SyncError::Api {
                code: self.code,
                message: self.message.unwrap_or_else(|| "request rejected".to_string()),
            });
        }
        Ok(self.data)
    }
}

/// Body of `POST /entries`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<FeedViewType>,
    /// Pagination cursor: only entries published before this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_after: Option<DateTime<Utc>>,
    pub limit: u32,
}

impl EntryQuery {
    pub fn for_feed(feed_id: impl Into<String>, limit: u32) -> Self {
        Self {
            feed_id: Some(feed_id.into()),
            limit,
            ..Default::default()
        }
    }

    pub fn for_view(view: FeedViewType, limit: u32) -> Self {
        Self {
            view: Some(view),
            limit,
            ..Default::default()
        }
    }

    pub fn with_cursor(mut self, cursor: Option<DateTime<Utc>>) -> Self {
        self.published_after = cursor;
        self
    }

    pub fn is_first_page(&self) -> bool {
        self.published_after.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub entry_ids: Vec<String>,
    pub is_inbox: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkUnreadRequest {
    pub entry_id: String,
}

/// Body of `POST /reads/all`. Times are unix milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_id_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<FeedViewType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_private: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
}

impl UnsubscribeRequest {
    pub fn for_subscription(sub: &Subscription) -> Self {
        Self {
            feed_id: sub.feed_id.clone().or_else(|| sub.inbox_id.clone()),
            list_id: sub.list_id.clone(),
        }
    }
}

/// One row of `GET /subscriptions`: the subscription plus its target.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionPayload {
    #[serde(flatten)]
    pub subscription: Subscription,
    #[serde(default)]
    pub feeds: Option<Feed>,
    #[serde(default)]
    pub lists: Option<List>,
    #[serde(default)]
    pub inboxes: Option<Inbox>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReadabilityPayload {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::SubscriptionKind;

    #[test]
    fn test_envelope_error_code() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code": 1003, "message": "Unauthorized"}"#).unwrap();
        match env.into_data() {
            Err(SyncError::Api { code, message }) => {
                assert_eq!(code, 1003);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_without_data() {
        let env: Envelope<Vec<String>> = serde_json::from_str(r#"{"code": 0}"#).unwrap();
        assert_eq!(env.into_data().unwrap(), None);
    }

    #[test]
    fn test_entry_query_wire_format() {
        let cursor = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let query = EntryQuery::for_view(FeedViewType::Pictures, 20).with_cursor(Some(cursor));
        let json = serde_json::to_value(&query).unwrap();

        assert_eq!(json["view"], 2);
        assert_eq!(json["limit"], 20);
        assert_eq!(json["publishedAfter"], "2025-01-01T00:00:00Z");
        assert!(json.get("feedId").is_none());
        assert!(!query.is_first_page());
    }

    #[test]
    fn test_mark_all_read_wire_format() {
        let req = MarkAllReadRequest {
            feed_id_list: Some(vec!["f1".into()]),
            start_time: Some(1),
            end_time: Some(2),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["feedIdList"][0], "f1");
        assert_eq!(json["startTime"], 1);
        assert!(json.get("excludePrivate").is_none());
    }

    #[test]
    fn test_subscription_payload_embeds_target() {
        let body = r#"{
            "id": "f1", "type": "feed", "feedId": "f1", "view": 0,
            "category": "Tech", "isPrivate": false,
            "feeds": { "id": "f1", "url": "https://example.com/rss", "title": "Example" }
        }"#;
        let payload: SubscriptionPayload = serde_json::from_str(body).unwrap();

        assert_eq!(payload.subscription.kind, SubscriptionKind::Feed);
        assert_eq!(payload.subscription.category.as_deref(), Some("Tech"));
        assert_eq!(payload.feeds.unwrap().title.as_deref(), Some("Example"));
        assert!(payload.lists.is_none());
    }
}
