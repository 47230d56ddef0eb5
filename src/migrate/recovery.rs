use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::journal::MigrationConfig;
use super::runner::{migrate_guarded, MigrationReport};
use super::MigrationError;

/// What to do when the on-device database cannot be migrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Surface the error; the database file is left untouched.
    #[default]
    Abort,
    /// Move the broken file aside and start from an empty database.
    ///
    /// Local state is lost until the next sync; the old file is kept as
    /// `<name>.corrupt-<unix millis>` next to the original.
    BackupAndRecreate,
}

/// An opened, fully migrated database.
pub struct OpenedDatabase {
    pub conn: Connection,
    pub report: MigrationReport,
    /// Set when the database was recreated; points at the preserved copy.
    pub backup: Option<PathBuf>,
}

/// Open `path` and bring it to the latest schema.
pub fn open_database(
    path: &Path,
    config: &MigrationConfig,
    policy: RecoveryPolicy,
) -> Result<OpenedDatabase, MigrationError> {
    match try_open(path, config) {
        Ok((conn, report)) => Ok(OpenedDatabase {
            conn,
            report,
            backup: None,
        }),
        Err(e) => {
            if policy == RecoveryPolicy::Abort {
                error!(path = %path.display(), error = %e, "Database migration failed");
                return Err(e);
            }

            let backup = backup_path(path);
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "Database migration failed; recreating an empty database, local data moved aside"
            );
            move_aside(path, &backup)?;

            let (conn, report) = try_open(path, config)?;
            Ok(OpenedDatabase {
                conn,
                report,
                backup: Some(backup),
            })
        }
    }
}

fn try_open(path: &Path, config: &MigrationConfig) -> Result<(Connection, MigrationReport), MigrationError> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON")?;
    let report = migrate_guarded(&mut conn, config)?;
    Ok((conn, report))
}

fn backup_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "database".into());
    path.with_file_name(format!("{}.corrupt-{}", name, Utc::now().timestamp_millis()))
}

/// Rename the database and its WAL/SHM side files.
fn move_aside(path: &Path, backup: &Path) -> std::io::Result<()> {
    std::fs::rename(path, backup)?;
    for suffix in ["-wal", "-shm"] {
        let side = PathBuf::from(format!("{}{}", path.display(), suffix));
        if side.exists() {
            let target = PathBuf::from(format!("{}{}", backup.display(), suffix));
            std::fs::rename(side, target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::migrate::guard::column_exists;
    use crate::migrate::journal::{MigrationEntry, MigrationJournal};

    fn broken_config() -> MigrationConfig {
        let mut migrations = BTreeMap::new();
        migrations.insert("m0000".to_string(), "CREATE TABLE a (id text);".to_string());
        MigrationConfig::new(
            MigrationJournal {
                entries: vec![MigrationEntry {
                    idx: 0,
                    version: "6".into(),
                    when: 100,
                    tag: "0000_a".into(),
                    breakpoints: true,
                }],
                ..MigrationJournal::empty()
            },
            migrations,
        )
    }

    /// A file whose unrecorded table collides with the first migration.
    fn drifted_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch("CREATE TABLE a (id text); INSERT INTO a VALUES ('keep-me');")
            .unwrap();
    }

    #[test]
    fn test_open_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");

        let opened = open_database(&path, &MigrationConfig::bundled().unwrap(), RecoveryPolicy::Abort).unwrap();
        assert_eq!(opened.report.applied.len(), 3);
        assert!(opened.backup.is_none());
        assert!(column_exists(&opened.conn, "entries", "readability_content").unwrap());
        assert!(!column_exists(&opened.conn, "feeds", "error_message").unwrap());
    }

    #[test]
    fn test_abort_policy_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        drifted_db(&path);

        assert!(open_database(&path, &broken_config(), RecoveryPolicy::Abort).is_err());

        let conn = Connection::open(&path).unwrap();
        let kept: String = conn.query_row("SELECT id FROM a", [], |r| r.get(0)).unwrap();
        assert_eq!(kept, "keep-me");
    }

    #[test]
    fn test_backup_policy_preserves_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        drifted_db(&path);

        let opened = open_database(&path, &broken_config(), RecoveryPolicy::BackupAndRecreate).unwrap();
        let backup = opened.backup.expect("backup path");
        assert!(backup.exists());
        assert_eq!(opened.report.applied, vec!["0000_a"]);

        let rows: i64 = opened
            .conn
            .query_row("SELECT COUNT(*) FROM a", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);

        let old = Connection::open(&backup).unwrap();
        let kept: String = old.query_row("SELECT id FROM a", [], |r| r.get(0)).unwrap();
        assert_eq!(kept, "keep-me");
    }
}
