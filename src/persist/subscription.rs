use std::sync::Arc;

use rusqlite::{params, params_from_iter, Row};

use super::sqlite::{from_millis, placeholders, to_millis, Database};
use super::PersistenceService;
use crate::app::Result;
use crate::domain::{FeedViewType, Subscription, SubscriptionKind};

const SUBSCRIPTION_COLUMNS: &str = "id, type, feed_id, list_id, inbox_id, view, category, title, \
     is_private, hide_from_timeline, created_at";

pub struct SubscriptionService {
    db: Arc<Database>,
}

impl SubscriptionService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
        let kind: String = row.get(1)?;
        let view: u8 = row.get(5)?;
        Ok(Subscription {
            id: row.get(0)?,
            kind: SubscriptionKind::parse(&kind).unwrap_or(SubscriptionKind::Feed),
            feed_id: row.get(2)?,
            list_id: row.get(3)?,
            inbox_id: row.get(4)?,
            view: FeedViewType::try_from(view).unwrap_or(FeedViewType::Articles),
            category: row.get(6)?,
            title: row.get(7)?,
            is_private: row.get::<_, i64>(8)? != 0,
            hide_from_timeline: row.get::<_, i64>(9)? != 0,
            created_at: row.get::<_, Option<i64>>(10)?.map(from_millis),
        })
    }

    pub fn get_by_view(&self, view: FeedViewType) -> Result<Vec<Subscription>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE view = ?1 ORDER BY title, id"
        ))?;
        let subs = stmt
            .query_map(params![u8::from(view)], Self::row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subs)
    }

    /// Replace every subscription of `view` with `records` in one transaction.
    pub fn replace_view(&self, view: FeedViewType, records: &[Subscription]) -> Result<()> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM subscriptions WHERE view = ?1", params![u8::from(view)])?;
        Self::insert_all(&tx, records)?;
        tx.commit()?;
        Ok(())
    }

    fn insert_all(conn: &rusqlite::Connection, records: &[Subscription]) -> Result<()> {
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                type = excluded.type,
                feed_id = excluded.feed_id,
                list_id = excluded.list_id,
                inbox_id = excluded.inbox_id,
                view = excluded.view,
                category = excluded.category,
                title = excluded.title,
                is_private = excluded.is_private,
                hide_from_timeline = excluded.hide_from_timeline,
                created_at = excluded.created_at"
        ))?;

        for sub in records {
            stmt.execute(params![
                sub.id,
                sub.kind.as_str(),
                sub.feed_id,
                sub.list_id,
                sub.inbox_id,
                u8::from(sub.view),
                sub.category,
                sub.title,
                sub.is_private as i64,
                sub.hide_from_timeline as i64,
                sub.created_at.map(to_millis),
            ])?;
        }
        Ok(())
    }
}

impl PersistenceService<Subscription> for SubscriptionService {
    fn upsert_many(&self, records: &[Subscription]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        Self::insert_all(&tx, records)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM subscriptions", [])?;
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Subscription>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY view, title, id"
        ))?;
        let subs = stmt
            .query_map([], Self::row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subs)
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<Subscription>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id IN ({})",
            placeholders(ids.len())
        ))?;
        let subs = stmt
            .query_map(params_from_iter(ids.iter()), Self::row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subs)
    }
}
