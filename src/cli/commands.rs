use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, OpenFlags};

use crate::api::EntryQuery;
use crate::app::{AppContext, Result, SyncError};
use crate::domain::FeedViewType;
use crate::migrate::{self, MigrationConfig, MigrationReport, MigrationStatus};
use crate::sync::{format_interval, spawn_periodic_resync, ResyncConfig};

pub fn migrate(db_path: &Path, batch: bool) -> Result<MigrationReport> {
    let mut conn = Connection::open(db_path)?;
    let config = MigrationConfig::bundled()?;

    let report = if batch {
        migrate::migrate(&mut conn, &config)?
    } else {
        migrate::migrate_guarded(&mut conn, &config)?
    };

    if report.is_noop() {
        println!("Database is up to date");
    } else {
        for tag in &report.applied {
            println!("  applied {}", tag);
        }
        println!(
            "Migration complete: {} applied, {} statements skipped",
            report.applied.len(),
            report.skipped_statements
        );
    }
    Ok(report)
}

/// Inspect the ledger without creating or changing the database.
pub fn status(db_path: &Path) -> Result<Option<MigrationStatus>> {
    if !db_path.exists() {
        println!("No database at {}", db_path.display());
        return Ok(None);
    }

    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let status = migrate::status(&conn, &MigrationConfig::bundled()?)?;

    match &status.watermark {
        Some(record) => println!("Last applied: {} (at {})", record.hash, record.created_at),
        None => println!("No migrations applied"),
    }
    println!("{} applied, {} pending", status.applied.len(), status.pending.len());
    for tag in &status.pending {
        println!("  pending {}", tag);
    }
    Ok(Some(status))
}

pub async fn sync(ctx: &AppContext, view: Option<FeedViewType>) -> Result<()> {
    ctx.hydrate()?;

    let subscriptions = ctx.subscriptions.fetch_subscriptions(view).await?;
    println!("Synced {} subscriptions", subscriptions.len());

    ctx.unread.reset_from_remote().await?;

    let views: Vec<FeedViewType> = match view {
        Some(view) => vec![view],
        None => FeedViewType::ALL.to_vec(),
    };

    let mut errors = 0;
    for view in views {
        if ctx.stores.subscriptions.ids_for_view(view).is_empty() {
            continue;
        }
        let query = EntryQuery::for_view(view, ctx.config.sync.page_size);
        match ctx.entries.fetch_entries(&query).await {
            Ok(page) => println!("  {}: {} entries", view, page.entries.len()),
            Err(e) => {
                errors += 1;
                eprintln!("  Error syncing {}: {}", view, e);
            }
        }
    }

    println!("Sync complete: {} errors", errors);
    Ok(())
}

pub async fn read(ctx: &AppContext, entry_id: &str) -> Result<()> {
    ctx.hydrate()?;

    if ctx.stores.entries.get(entry_id).is_none()
        && ctx.entries.fetch_entry_content(entry_id).await?.is_none()
    {
        println!("Entry not found: {}", entry_id);
        return Ok(());
    }

    ctx.unread.mark_entry_as_read(entry_id).await?;
    if let Some(entry) = ctx.stores.entries.get(entry_id) {
        println!("Marked as read: {}", entry.display_title());
    }
    Ok(())
}

pub fn unread(ctx: &AppContext) -> Result<()> {
    ctx.hydrate()?;

    let state = ctx.stores.unread.get_state();
    let mut counts: Vec<(&String, &u64)> = state.data.iter().filter(|(_, n)| **n > 0).collect();
    if counts.is_empty() {
        println!("Nothing unread");
        return Ok(());
    }
    counts.sort();

    for (id, count) in counts {
        let title = ctx
            .stores
            .feeds
            .get(id)
            .map(|feed| feed.display_title().to_string())
            .or_else(|| ctx.stores.subscriptions.get(id).and_then(|sub| sub.title))
            .unwrap_or_else(|| id.clone());
        println!("{:>6}  {}", count, title);
    }
    Ok(())
}

/// Resync unread counters periodically until Ctrl-C.
pub async fn watch(ctx: &AppContext, interval_secs: Option<u64>) -> Result<()> {
    ctx.hydrate()?;

    let mut config: ResyncConfig = ctx.config.sync.resync()?;
    if let Some(secs) = interval_secs {
        config.interval_secs = secs;
    }
    println!(
        "Watching unread counters (interval: {}), press Ctrl-C to stop",
        format_interval(config.interval_secs)
    );

    let (shutdown, rx) = tokio::sync::watch::channel(false);
    let handle = spawn_periodic_resync(Arc::clone(&ctx.unread), config, rx);

    tokio::signal::ctrl_c().await?;
    let _ = shutdown.send(true);

    let cycles = handle
        .await
        .map_err(|e| SyncError::Other(format!("Resync task failed: {}", e)))?;
    println!("Stopped after {} resyncs", cycles);
    Ok(())
}
