//! # folo-sync
//!
//! Local-first state synchronization for the Folo feed reader.
//!
//! ## Architecture
//!
//! Server state is mirrored twice: into in-memory reactive stores for
//! display and into a local SQLite database for durability. Changes flow
//! through one of two paths:
//!
//! ```text
//! Sync service → Transaction (store → request → persist | rollback)
//! Optimistic mutation → QueryCache (apply → call → reconcile | rollback → invalidate)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Bring the local database to the latest schema
//! folo-sync migrate
//!
//! # Pull subscriptions, unread counters and the newest entries
//! folo-sync sync
//!
//! # Mark an entry as read
//! folo-sync read <entry-id>
//!
//! # Keep counters fresh in the foreground
//! folo-sync watch --interval 30m
//! ```

/// HTTP client for the Folo API.
///
/// - [`RemoteApi`](api::RemoteApi): Async trait the sync services call
/// - [`HttpApi`](api::HttpApi): reqwest-based implementation
pub mod api;

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the database,
/// the stores, the API client and the sync services.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/folo-sync/config.toml`.
pub mod config;

/// Core domain models: feeds, subscriptions, entries, lists, inboxes and
/// unread counters.
pub mod domain;

/// Versioned SQL migrations with a column guard and explicit recovery.
pub mod migrate;

/// Generic optimistic mutations over a list-shaped query cache.
pub mod optimistic;

/// SQLite persistence, one service per table.
pub mod persist;

/// In-memory reactive domain stores.
pub mod state;

/// Business operations combining stores, database and API.
pub mod sync;

/// Store → request → persist unit of work with rollback.
pub mod transaction;
