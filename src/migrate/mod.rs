//! Versioned SQL migrations for the local database.
//!
//! Migrations are described by a drizzle-style journal (`idx`, `when`,
//! `tag`) plus one SQL body per entry. Applied migrations are recorded in a
//! ledger table; the newest `created_at` in the ledger is the watermark and
//! every journal entry newer than it is pending.
//!
//! Two runners share that logic:
//!
//! - [`migrate`]: all pending migrations in one SQLite transaction.
//! - [`migrate_guarded`]: one transaction per migration, with `ALTER TABLE`
//!   column adds/drops skipped when the live schema already matches.
//!
//! [`open_database`] wraps the guarded runner with an explicit
//! [`RecoveryPolicy`] for databases that cannot be migrated at all.

pub mod guard;
pub mod journal;
pub mod recovery;
pub mod runner;

pub use journal::{
    read_migration_files, MigrationConfig, MigrationEntry, MigrationJournal, MigrationMeta,
    DEFAULT_MIGRATIONS_TABLE, STATEMENT_BREAKPOINT,
};
pub use recovery::{open_database, OpenedDatabase, RecoveryPolicy};
pub use runner::{
    migrate, migrate_guarded, status, MigrationRecord, MigrationReport, MigrationStatus,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("No SQL body for migration {tag} (expected key {key})")]
    MissingMigration { tag: String, key: String },

    #[error("Invalid migration journal: {0}")]
    InvalidJournal(String),

    #[error("Invalid SQL in migration {tag}: {message}")]
    InvalidSql { tag: String, message: String },

    #[error("Migration {tag} failed: {source}")]
    Statement {
        tag: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
