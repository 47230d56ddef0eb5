//! Per-domain orchestrators combining the stores, the database and the
//! remote API into business operations.

pub mod entry;
pub mod scheduler;
pub mod subscription;
pub mod unread;

pub use entry::{EntryPage, EntrySyncService};
pub use scheduler::{format_interval, parse_interval, spawn_periodic_resync, ResyncConfig};
pub use subscription::SubscriptionSyncService;
pub use unread::UnreadSyncService;
