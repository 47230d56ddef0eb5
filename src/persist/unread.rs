use std::sync::Arc;

use rusqlite::{params, params_from_iter, Row};

use super::sqlite::{placeholders, Database};
use super::PersistenceService;
use crate::app::Result;
use crate::domain::UnreadCount;

pub struct UnreadService {
    db: Arc<Database>,
}

impl UnreadService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn row_to_unread(row: &Row<'_>) -> rusqlite::Result<UnreadCount> {
        Ok(UnreadCount {
            subscription_id: row.get(0)?,
            count: row.get::<_, i64>(1)?.max(0) as u64,
        })
    }

    /// Drop every counter and write `counts` in their place.
    pub fn replace_all(&self, counts: &[UnreadCount]) -> Result<()> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM unread", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO unread (subscription_id, count) VALUES (?1, ?2)")?;
            for unread in counts {
                stmt.execute(params![unread.subscription_id, unread.count as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn set_zero(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.db.lock();
        conn.execute(
            &format!(
                "UPDATE unread SET count = 0 WHERE subscription_id IN ({})",
                placeholders(ids.len())
            ),
            params_from_iter(ids.iter()),
        )?;
        Ok(())
    }
}

impl PersistenceService<UnreadCount> for UnreadService {
    fn upsert_many(&self, records: &[UnreadCount]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO unread (subscription_id, count) VALUES (?1, ?2)
                 ON CONFLICT(subscription_id) DO UPDATE SET count = excluded.count",
            )?;
            for unread in records {
                stmt.execute(params![unread.subscription_id, unread.count as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM unread WHERE subscription_id = ?1", params![id])?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM unread", [])?;
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<UnreadCount>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare("SELECT subscription_id, count FROM unread ORDER BY subscription_id")?;
        let counts = stmt
            .query_map([], Self::row_to_unread)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<UnreadCount>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT subscription_id, count FROM unread WHERE subscription_id IN ({})",
            placeholders(ids.len())
        ))?;
        let counts = stmt
            .query_map(params_from_iter(ids.iter()), Self::row_to_unread)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}
