use serde::{Deserialize, Serialize};

/// Timeline category a subscription (and therefore its entries) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FeedViewType {
    Articles,
    SocialMedia,
    Pictures,
    Videos,
    Audios,
    Notifications,
}

impl FeedViewType {
    pub const ALL: [FeedViewType; 6] = [
        FeedViewType::Articles,
        FeedViewType::SocialMedia,
        FeedViewType::Pictures,
        FeedViewType::Videos,
        FeedViewType::Audios,
        FeedViewType::Notifications,
    ];
}

impl From<FeedViewType> for u8 {
    fn from(view: FeedViewType) -> Self {
        match view {
            FeedViewType::Articles => 0,
            FeedViewType::SocialMedia => 1,
            FeedViewType::Pictures => 2,
            FeedViewType::Videos => 3,
            FeedViewType::Audios => 4,
            FeedViewType::Notifications => 5,
        }
    }
}

impl TryFrom<u8> for FeedViewType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FeedViewType::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("Unknown view type: {}", value))
    }
}

impl std::fmt::Display for FeedViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FeedViewType::Articles => "articles",
            FeedViewType::SocialMedia => "social-media",
            FeedViewType::Pictures => "pictures",
            FeedViewType::Videos => "videos",
            FeedViewType::Audios => "audios",
            FeedViewType::Notifications => "notifications",
        };
        f.write_str(name)
    }
}
