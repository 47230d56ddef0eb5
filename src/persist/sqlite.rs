use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::app::Result;
use crate::migrate::{
    self, migrate_guarded, open_database, MigrationConfig, MigrationStatus, RecoveryPolicy,
};

/// The single shared SQLite handle of the process.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database file and migrate it to the bundled schema.
    pub fn open<P: AsRef<Path>>(path: P, policy: RecoveryPolicy) -> Result<Self> {
        let path = path.as_ref();
        let config = MigrationConfig::bundled()?;
        let opened = open_database(path, &config, policy)?;

        if let Some(backup) = &opened.backup {
            info!(backup = %backup.display(), "Started from an empty database");
        }

        Ok(Self {
            conn: Mutex::new(opened.conn),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate_guarded(&mut conn, &MigrationConfig::bundled()?)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A panic while holding the lock leaves no open transaction behind
    /// (rusqlite rolls back on drop), so a poisoned handle is still usable.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn migration_status(&self) -> Result<MigrationStatus> {
        let conn = self.lock();
        Ok(migrate::status(&conn, &MigrationConfig::bundled()?)?)
    }
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Lenient decode for JSON columns: a corrupt cell reads as empty.
pub(crate) fn from_json_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}
