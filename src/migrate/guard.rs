//! Column-existence guard for `ALTER TABLE` statements.
//!
//! Devices can be left with a schema that is ahead of the ledger (a crash
//! between the DDL and the ledger insert, or a restored backup). Adding a
//! column that already exists, or dropping one that is already gone, would
//! fail the whole migration forever, so those statements are skipped.

use std::sync::OnceLock;

use regex::Regex;
use rusqlite::Connection;

use super::MigrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterAction {
    AddColumn { table: String, column: String },
    DropColumn { table: String, column: String },
    /// Anything the guard does not need to inspect.
    Passthrough,
}

fn alter_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)^\s*ALTER\s+TABLE\s").expect("valid regex"))
}

fn add_column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)^\s*ALTER\s+TABLE\s+[`"\[]?(\w+)[`"\]]?\s+ADD\s+(?:COLUMN\s+)?[`"\[]?(\w+)[`"\]]?"#)
            .expect("valid regex")
    })
}

fn drop_column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)^\s*ALTER\s+TABLE\s+[`"\[]?(\w+)[`"\]]?\s+DROP\s+(?:COLUMN\s+)?[`"\[]?(\w+)[`"\]]?"#)
            .expect("valid regex")
    })
}

fn add_or_drop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\s(ADD|DROP)\b").expect("valid regex"))
}

/// Strip leading `--` comment lines so classification sees the statement.
fn strip_leading_comments(statement: &str) -> &str {
    let mut rest = statement.trim_start();
    while rest.starts_with("--") {
        rest = match rest.find('\n') {
            Some(pos) => rest[pos + 1..].trim_start(),
            None => "",
        };
    }
    rest
}

pub fn classify(tag: &str, statement: &str) -> Result<AlterAction, MigrationError> {
    let statement = strip_leading_comments(statement);
    if !alter_table_re().is_match(statement) {
        return Ok(AlterAction::Passthrough);
    }

    let invalid = || MigrationError::InvalidSql {
        tag: tag.to_string(),
        message: format!("cannot parse column change in `{}`", statement.trim()),
    };

    if let Some(caps) = add_column_re().captures(statement) {
        let column = caps[2].to_string();
        if column.eq_ignore_ascii_case("column") {
            return Err(invalid());
        }
        return Ok(AlterAction::AddColumn {
            table: caps[1].to_string(),
            column,
        });
    }

    if let Some(caps) = drop_column_re().captures(statement) {
        let column = caps[2].to_string();
        if column.eq_ignore_ascii_case("column") {
            return Err(invalid());
        }
        return Ok(AlterAction::DropColumn {
            table: caps[1].to_string(),
            column,
        });
    }

    if add_or_drop_re().is_match(statement) {
        return Err(invalid());
    }

    // RENAME TO / RENAME COLUMN
    Ok(AlterAction::Passthrough)
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    Ok(table_columns(conn, table)?
        .iter()
        .any(|c| c.eq_ignore_ascii_case(column)))
}

/// Whether the statement should run against the live schema.
pub fn should_execute(conn: &Connection, action: &AlterAction) -> rusqlite::Result<bool> {
    match action {
        AlterAction::AddColumn { table, column } => Ok(!column_exists(conn, table, column)?),
        AlterAction::DropColumn { table, column } => column_exists(conn, table, column),
        AlterAction::Passthrough => Ok(true),
    }
}
