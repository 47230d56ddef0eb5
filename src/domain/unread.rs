use serde::{Deserialize, Serialize};

use super::Identifiable;

/// Unread entries of one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub subscription_id: String,
    pub count: u64,
}

impl UnreadCount {
    pub fn new(subscription_id: impl Into<String>, count: u64) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            count,
        }
    }
}

impl Identifiable for UnreadCount {
    fn id(&self) -> &str {
        &self.subscription_id
    }
}
