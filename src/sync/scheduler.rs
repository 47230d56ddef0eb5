//! Periodic reconciliation of unread counters with the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::UnreadSyncService;

#[derive(Debug, Clone, PartialEq)]
pub struct ResyncConfig {
    /// Seconds between two resets (default: 3600 = 1 hour)
    pub interval_secs: u64,
    /// Whether to reset once immediately on start
    pub resync_on_start: bool,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            resync_on_start: true,
        }
    }
}

/// Parse interval string like "1h", "30m", "6h", "1d"
pub fn parse_interval(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();

    let secs = if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .map(|h| h * 3600)
            .map_err(|_| format!("Invalid hours: {}", hours))?
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map(|m| m * 60)
            .map_err(|_| format!("Invalid minutes: {}", minutes))?
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>()
            .map(|d| d * 86400)
            .map_err(|_| format!("Invalid days: {}", days))?
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))?
    } else {
        s.parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))?
    };

    if secs == 0 {
        return Err("Interval must be greater than zero".to_string());
    }
    Ok(secs)
}

pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Run `reset_from_remote` every `config.interval_secs` until `shutdown`
/// flips to `true` (or its sender is dropped). A failed cycle is logged and
/// the loop keeps going. The task yields the number of successful cycles.
pub fn spawn_periodic_resync(
    service: Arc<UnreadSyncService>,
    config: ResyncConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        info!(interval = %format_interval(config.interval_secs), "Periodic resync started");
        let mut completed = 0;

        if config.resync_on_start {
            completed += run_cycle(&service).await;
        }

        let mut timer = interval(Duration::from_secs(config.interval_secs.max(1)));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    completed += run_cycle(&service).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(cycles = completed, "Periodic resync stopped");
        completed
    })
}

async fn run_cycle(service: &UnreadSyncService) -> usize {
    match service.reset_from_remote().await {
        Ok(()) => 1,
        Err(e) => {
            warn!(error = %e, "Scheduled resync failed");
            0
        }
    }
}
