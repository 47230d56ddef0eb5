pub mod entry;
pub mod feed;
pub mod subscription;
pub mod unread;
pub mod view;

pub use entry::Entry;
pub use feed::{Feed, Inbox, List};
pub use subscription::{Subscription, SubscriptionKind};
pub use unread::UnreadCount;
pub use view::FeedViewType;

use chrono::{DateTime, Utc};

/// A record addressed by a stable string primary key.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Inclusive time window used by "mark all as read" style operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}
