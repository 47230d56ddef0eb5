use std::sync::Arc;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

use super::sqlite::{from_json_list, from_millis, placeholders, to_json, to_millis, Database};
use super::PersistenceService;
use crate::app::Result;
use crate::domain::{Entry, TimeRange};

const ENTRY_COLUMNS: &str = "id, feed_id, inbox_handle, title, url, description, content, \
     readability_content, author, guid, published_at, inserted_at, read, sources";

/// Column changes applied by [`EntryService::patch`]; `None` leaves a column alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub read: Option<bool>,
    pub content: Option<String>,
    pub readability_content: Option<String>,
}

impl EntryPatch {
    pub fn read(read: bool) -> Self {
        Self {
            read: Some(read),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.read.is_none() && self.content.is_none() && self.readability_content.is_none()
    }
}

/// Which rows a patch touches.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryPatchScope {
    Id(String),
    Ids(Vec<String>),
    /// Entries of the given feeds or inbox handles, optionally limited to a
    /// publication window.
    Sources {
        ids: Vec<String>,
        time_range: Option<TimeRange>,
    },
}

pub struct EntryService {
    db: Arc<Database>,
}

impl EntryService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
        Ok(Entry {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            inbox_handle: row.get(2)?,
            title: row.get(3)?,
            url: row.get(4)?,
            description: row.get(5)?,
            content: row.get(6)?,
            readability_content: row.get(7)?,
            author: row.get(8)?,
            guid: row.get(9)?,
            published_at: from_millis(row.get(10)?),
            inserted_at: from_millis(row.get(11)?),
            read: row.get::<_, i64>(12)? != 0,
            sources: from_json_list(row.get(13)?),
        })
    }

    pub fn patch(&self, scope: &EntryPatchScope, patch: &EntryPatch) -> Result<usize> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut sets = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(read) = patch.read {
            sets.push("read = ?");
            values.push(Value::Integer(read as i64));
        }
        if let Some(content) = &patch.content {
            sets.push("content = ?");
            values.push(Value::Text(content.clone()));
        }
        if let Some(readability) = &patch.readability_content {
            sets.push("readability_content = ?");
            values.push(Value::Text(readability.clone()));
            sets.push("readability_updated_at = ?");
            values.push(Value::Integer(to_millis(Utc::now())));
        }

        let filter = match scope {
            EntryPatchScope::Id(id) => {
                values.push(Value::Text(id.clone()));
                "id = ?".to_string()
            }
            EntryPatchScope::Ids(ids) => {
                if ids.is_empty() {
                    return Ok(0);
                }
                values.extend(ids.iter().cloned().map(Value::Text));
                format!("id IN ({})", placeholders(ids.len()))
            }
            EntryPatchScope::Sources { ids, time_range } => {
                if ids.is_empty() {
                    return Ok(0);
                }
                let marks = placeholders(ids.len());
                values.extend(ids.iter().cloned().map(Value::Text));
                values.extend(ids.iter().cloned().map(Value::Text));
                let mut filter = format!("(feed_id IN ({marks}) OR inbox_handle IN ({marks}))");
                if let Some(range) = time_range {
                    filter.push_str(" AND published_at BETWEEN ? AND ?");
                    values.push(Value::Integer(to_millis(range.start)));
                    values.push(Value::Integer(to_millis(range.end)));
                }
                filter
            }
        };

        let conn = self.db.lock();
        let changed = conn.execute(
            &format!("UPDATE entries SET {} WHERE {}", sets.join(", "), filter),
            params_from_iter(values),
        )?;
        Ok(changed)
    }

    pub fn get(&self, id: &str) -> Result<Option<Entry>> {
        Ok(self.get_many(&[id.to_string()])?.into_iter().next())
    }

    pub fn delete_by_feed(&self, feed_id: &str) -> Result<()> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM entries WHERE feed_id = ?1", params![feed_id])?;
        Ok(())
    }
}

impl PersistenceService<Entry> for EntryService {
    fn upsert_many(&self, records: &[Entry]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO entries ({ENTRY_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(id) DO UPDATE SET
                    feed_id = excluded.feed_id,
                    inbox_handle = excluded.inbox_handle,
                    title = excluded.title,
                    url = excluded.url,
                    description = excluded.description,
                    content = excluded.content,
                    readability_content = excluded.readability_content,
                    author = excluded.author,
                    guid = excluded.guid,
                    published_at = excluded.published_at,
                    inserted_at = excluded.inserted_at,
                    read = excluded.read,
                    sources = excluded.sources"
            ))?;

            for entry in records {
                stmt.execute(params![
                    entry.id,
                    entry.feed_id,
                    entry.inbox_handle,
                    entry.title,
                    entry.url,
                    entry.description,
                    entry.content,
                    entry.readability_content,
                    entry.author,
                    entry.guid,
                    to_millis(entry.published_at),
                    to_millis(entry.inserted_at),
                    entry.read as i64,
                    to_json(&entry.sources)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM entries", [])?;
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Entry>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY published_at DESC"
        ))?;
        let entries = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<Entry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id IN ({}) ORDER BY published_at DESC",
            placeholders(ids.len())
        ))?;
        let entries = stmt
            .query_map(params_from_iter(ids.iter()), Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
