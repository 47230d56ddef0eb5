use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::guard::{self, quote_ident};
use super::journal::{read_migration_files, MigrationConfig, MigrationMeta};
use super::MigrationError;

/// One row of the ledger table.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    pub id: i64,
    pub hash: String,
    pub created_at: i64,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Tags of the migrations applied by this run, in order.
    pub applied: Vec<String>,
    /// `ALTER TABLE` statements skipped by the column guard.
    pub skipped_statements: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Ledger and journal compared without executing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    pub watermark: Option<MigrationRecord>,
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<String>,
}

pub fn ensure_ledger(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hash text NOT NULL,
            created_at numeric
        )",
        quote_ident(table)
    ))
}

fn ledger_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// The most recently applied migration, by `created_at`.
pub fn last_applied(conn: &Connection, table: &str) -> rusqlite::Result<Option<MigrationRecord>> {
    conn.query_row(
        &format!(
            "SELECT id, hash, created_at FROM {} ORDER BY created_at DESC LIMIT 1",
            quote_ident(table)
        ),
        [],
        |row| {
            Ok(MigrationRecord {
                id: row.get(0)?,
                hash: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )
    .optional()
}

pub fn applied_records(conn: &Connection, table: &str) -> rusqlite::Result<Vec<MigrationRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, hash, created_at FROM {} ORDER BY created_at, id",
        quote_ident(table)
    ))?;
    let records = stmt
        .query_map([], |row| {
            Ok(MigrationRecord {
                id: row.get(0)?,
                hash: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

fn is_pending(watermark: Option<&MigrationRecord>, migration: &MigrationMeta) -> bool {
    watermark.map_or(true, |last| last.created_at < migration.folder_millis)
}

fn record_migration(conn: &Connection, table: &str, migration: &MigrationMeta) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (hash, created_at) VALUES (?1, ?2)",
            quote_ident(table)
        ),
        params![migration.hash, migration.folder_millis],
    )?;
    debug!(tag = %migration.tag, "Migration recorded");
    Ok(())
}

fn pending_migrations(
    conn: &Connection,
    config: &MigrationConfig,
) -> Result<Vec<MigrationMeta>, MigrationError> {
    // Resolve every body before touching the database.
    let migrations = read_migration_files(config)?;

    ensure_ledger(conn, &config.migrations_table)?;
    let watermark = last_applied(conn, &config.migrations_table)?;

    info!(
        watermark = watermark.as_ref().map(|w| w.created_at),
        total = migrations.len(),
        "Checking migrations"
    );

    Ok(migrations
        .into_iter()
        .filter(|m| is_pending(watermark.as_ref(), m))
        .collect())
}

/// Apply all pending migrations inside a single SQLite transaction.
pub fn migrate(conn: &mut Connection, config: &MigrationConfig) -> Result<MigrationReport, MigrationError> {
    let pending = pending_migrations(conn, config)?;
    let mut report = MigrationReport::default();

    if pending.is_empty() {
        debug!("No pending migrations");
        return Ok(report);
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        info!(tag = %migration.tag, statements = migration.sql.len(), "Applying migration");
        for statement in &migration.sql {
            tx.execute_batch(statement)
                .map_err(|source| MigrationError::Statement {
                    tag: migration.tag.clone(),
                    source,
                })?;
        }
        record_migration(&tx, &config.migrations_table, migration)?;
        report.applied.push(migration.tag.clone());
    }
    tx.commit()?;

    info!(applied = report.applied.len(), "Migrations complete");
    Ok(report)
}

/// Apply pending migrations one at a time, skipping column changes the live
/// schema already reflects.
///
/// Each migration commits together with its ledger row, so a failure leaves
/// earlier migrations applied and the failing one unrecorded.
pub fn migrate_guarded(
    conn: &mut Connection,
    config: &MigrationConfig,
) -> Result<MigrationReport, MigrationError> {
    let pending = pending_migrations(conn, config)?;
    let mut report = MigrationReport::default();

    // Parse every ALTER up front so bad SQL aborts before any DDL runs.
    let mut plans = Vec::with_capacity(pending.len());
    for migration in &pending {
        let actions = migration
            .sql
            .iter()
            .map(|statement| guard::classify(&migration.tag, statement))
            .collect::<Result<Vec<_>, _>>()?;
        plans.push(actions);
    }

    for (migration, actions) in pending.iter().zip(plans) {
        info!(tag = %migration.tag, statements = migration.sql.len(), "Applying migration");

        let tx = conn.transaction()?;
        for (statement, action) in migration.sql.iter().zip(&actions) {
            if !guard::should_execute(&tx, action)? {
                debug!(tag = %migration.tag, ?action, "Column already in place, skipping");
                report.skipped_statements += 1;
                continue;
            }
            tx.execute_batch(statement)
                .map_err(|source| MigrationError::Statement {
                    tag: migration.tag.clone(),
                    source,
                })?;
        }
        record_migration(&tx, &config.migrations_table, migration)?;
        tx.commit()?;

        report.applied.push(migration.tag.clone());
    }

    info!(
        applied = report.applied.len(),
        skipped = report.skipped_statements,
        "Migrations complete"
    );
    Ok(report)
}

pub fn status(conn: &Connection, config: &MigrationConfig) -> Result<MigrationStatus, MigrationError> {
    let migrations = read_migration_files(config)?;

    let (watermark, applied) = if ledger_exists(conn, &config.migrations_table)? {
        (
            last_applied(conn, &config.migrations_table)?,
            applied_records(conn, &config.migrations_table)?,
        )
    } else {
        (None, Vec::new())
    };

    let pending = migrations
        .iter()
        .filter(|m| is_pending(watermark.as_ref(), m))
        .map(|m| m.tag.clone())
        .collect();

    Ok(MigrationStatus {
        watermark,
        applied,
        pending,
    })
}
