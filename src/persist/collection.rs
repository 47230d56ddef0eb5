//! Feeds, lists and inboxes: the targets subscriptions point at.

use std::sync::Arc;

use rusqlite::{params, params_from_iter, Row};

use super::sqlite::{from_json_list, from_millis, placeholders, to_json, to_millis, Database};
use super::PersistenceService;
use crate::app::Result;
use crate::domain::{Feed, FeedViewType, Inbox, List};

/// Shared DELETE/SELECT plumbing for the simple id-keyed tables.
fn delete_by_id(db: &Database, table: &str, id: &str) -> Result<()> {
    let conn = db.lock();
    conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
    Ok(())
}

fn reset(db: &Database, table: &str) -> Result<()> {
    let conn = db.lock();
    conn.execute(&format!("DELETE FROM {table}"), [])?;
    Ok(())
}

fn select<T>(
    db: &Database,
    columns: &str,
    table: &str,
    ids: Option<&[String]>,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let conn = db.lock();
    let rows = match ids {
        Some([]) => Vec::new(),
        Some(ids) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {columns} FROM {table} WHERE id IN ({}) ORDER BY id",
                placeholders(ids.len())
            ))?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), map)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("SELECT {columns} FROM {table} ORDER BY id"))?;
            let rows = stmt
                .query_map([], map)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

const FEED_COLUMNS: &str = "id, url, title, description, site_url, image, error_at";

pub struct FeedService {
    db: Arc<Database>,
}

impl FeedService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn row_to_feed(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            site_url: row.get(4)?,
            image: row.get(5)?,
            error_at: row.get::<_, Option<i64>>(6)?.map(from_millis),
        })
    }
}

impl PersistenceService<Feed> for FeedService {
    fn upsert_many(&self, records: &[Feed]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO feeds ({FEED_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    title = excluded.title,
                    description = excluded.description,
                    site_url = excluded.site_url,
                    image = excluded.image,
                    error_at = excluded.error_at"
            ))?;
            for feed in records {
                stmt.execute(params![
                    feed.id,
                    feed.url,
                    feed.title,
                    feed.description,
                    feed.site_url,
                    feed.image,
                    feed.error_at.map(to_millis),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        delete_by_id(&self.db, "feeds", id)
    }

    fn reset(&self) -> Result<()> {
        reset(&self.db, "feeds")
    }

    fn get_all(&self) -> Result<Vec<Feed>> {
        select(&self.db, FEED_COLUMNS, "feeds", None, Self::row_to_feed)
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<Feed>> {
        select(&self.db, FEED_COLUMNS, "feeds", Some(ids), Self::row_to_feed)
    }
}

const LIST_COLUMNS: &str = "id, title, feed_ids, view, owner_user_id";

pub struct ListService {
    db: Arc<Database>,
}

impl ListService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn row_to_list(row: &Row<'_>) -> rusqlite::Result<List> {
        let view: u8 = row.get(3)?;
        Ok(List {
            id: row.get(0)?,
            title: row.get(1)?,
            feed_ids: from_json_list(row.get(2)?),
            view: FeedViewType::try_from(view).unwrap_or(FeedViewType::Articles),
            owner_user_id: row.get(4)?,
        })
    }
}

impl PersistenceService<List> for ListService {
    fn upsert_many(&self, records: &[List]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO lists ({LIST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    feed_ids = excluded.feed_ids,
                    view = excluded.view,
                    owner_user_id = excluded.owner_user_id"
            ))?;
            for list in records {
                stmt.execute(params![
                    list.id,
                    list.title,
                    to_json(&list.feed_ids)?,
                    u8::from(list.view),
                    list.owner_user_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        delete_by_id(&self.db, "lists", id)
    }

    fn reset(&self) -> Result<()> {
        reset(&self.db, "lists")
    }

    fn get_all(&self) -> Result<Vec<List>> {
        select(&self.db, LIST_COLUMNS, "lists", None, Self::row_to_list)
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<List>> {
        select(&self.db, LIST_COLUMNS, "lists", Some(ids), Self::row_to_list)
    }
}

pub struct InboxService {
    db: Arc<Database>,
}

impl InboxService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn row_to_inbox(row: &Row<'_>) -> rusqlite::Result<Inbox> {
        Ok(Inbox {
            id: row.get(0)?,
            title: row.get(1)?,
            secret: row.get(2)?,
        })
    }
}

impl PersistenceService<Inbox> for InboxService {
    fn upsert_many(&self, records: &[Inbox]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO inboxes (id, title, secret) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET title = excluded.title, secret = excluded.secret",
            )?;
            for inbox in records {
                stmt.execute(params![inbox.id, inbox.title, inbox.secret])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        delete_by_id(&self.db, "inboxes", id)
    }

    fn reset(&self) -> Result<()> {
        reset(&self.db, "inboxes")
    }

    fn get_all(&self) -> Result<Vec<Inbox>> {
        select(&self.db, "id, title, secret", "inboxes", None, Self::row_to_inbox)
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<Inbox>> {
        select(&self.db, "id, title, secret", "inboxes", Some(ids), Self::row_to_inbox)
    }
}
