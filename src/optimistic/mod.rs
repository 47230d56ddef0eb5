//! Generic optimistic mutations over list-shaped query caches.
//!
//! A mutation snapshots the cached list, writes an optimistic version of it,
//! calls the server and then either reconciles the server result into the
//! cache or restores the snapshot. Every mutation ends by invalidating its
//! query so any remaining divergence is bounded by the next refetch.
//!
//! Optimistic markers live on the [`Optimistic`] wrapper, never on the
//! domain type, so they cannot leak into persistence or requests.

pub mod cache;
pub mod config;
pub mod mutation;
pub mod retry;

pub use cache::{QueryCache, QueryFetcher, QueryKey};
pub use config::{OptimisticConfig, OptimisticUpdate};
pub use mutation::{MutationConfig, MutationContext, MutationFn, OptimisticMutation};
pub use retry::{retry_delay, with_retry};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimisticStatus {
    /// Created locally, not yet acknowledged.
    Pending,
    /// Local edit in flight.
    Updating,
    Error,
    /// Matches server state.
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Optimistic<T> {
    pub value: T,
    pub is_optimistic: bool,
    pub status: OptimisticStatus,
    pub updated_at: DateTime<Utc>,
}

impl<T> Optimistic<T> {
    pub fn confirmed(value: T) -> Self {
        Self {
            value,
            is_optimistic: false,
            status: OptimisticStatus::Connected,
            updated_at: Utc::now(),
        }
    }

    pub fn pending(value: T) -> Self {
        Self::marked(value, OptimisticStatus::Pending)
    }

    pub fn updating(value: T) -> Self {
        Self::marked(value, OptimisticStatus::Updating)
    }

    fn marked(value: T, status: OptimisticStatus) -> Self {
        Self {
            value,
            is_optimistic: true,
            status,
            updated_at: Utc::now(),
        }
    }

    /// Clear the optimistic marker.
    pub fn confirm(mut self) -> Self {
        self.is_optimistic = false;
        self.status = OptimisticStatus::Connected;
        self.updated_at = Utc::now();
        self
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Apply a partial or complete patch of type `P` over `self`.
pub trait Merge<P> {
    fn merge(&mut self, patch: &P);
}

/// User-facing failure surface (toast, status line, ...).
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Default notifier for headless use: failures go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        warn!(message, "Mutation failed");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorConfig {
    pub show_toast: bool,
    pub custom_message: Option<String>,
    pub retryable: bool,
    pub max_retries: u32,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            show_toast: true,
            custom_message: None,
            retryable: false,
            max_retries: 3,
        }
    }
}

const TEMP_ID_PREFIX: &str = "temp-";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `temp-<unix millis>-<9 random base36 chars>`.
pub fn temp_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{TEMP_ID_PREFIX}{}-{suffix}", Utc::now().timestamp_millis())
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_id_format() {
        let id = temp_id();
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "temp");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert!(is_temp_id(&id));
        assert_ne!(temp_id(), temp_id());
    }

    #[test]
    fn test_confirm_clears_marker() {
        let item = Optimistic::pending(1).confirm();
        assert!(!item.is_optimistic);
        assert_eq!(item.status, OptimisticStatus::Connected);
        assert_eq!(item.into_inner(), 1);
    }
}
