pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::FeedViewType;

#[derive(Parser)]
#[command(name = "folo-sync")]
#[command(about = "Local-first sync for the Folo feed reader", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/folo-sync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the config file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending database migrations
    Migrate {
        /// Run every pending migration in one transaction, without the column guard
        #[arg(long)]
        batch: bool,
    },
    /// Show applied and pending migrations
    Status,
    /// Pull subscriptions, unread counters and the latest entries
    Sync {
        /// Only this timeline (0-5 or a name like "articles")
        #[arg(long, value_parser = parse_view)]
        view: Option<FeedViewType>,
    },
    /// Mark an entry as read
    Read {
        /// Id of the entry
        entry_id: String,
    },
    /// List unread counters
    Unread,
    /// Keep unread counters in sync until interrupted
    Watch {
        /// Resync interval (e.g., "1h", "30m", "1d"); defaults to the config file
        #[arg(short, long, value_parser = crate::sync::parse_interval)]
        interval: Option<u64>,
    },
}

/// Accept a view by discriminant or by its display name.
pub fn parse_view(s: &str) -> Result<FeedViewType, String> {
    let s = s.trim().to_lowercase();
    if let Ok(n) = s.parse::<u8>() {
        return FeedViewType::try_from(n);
    }
    FeedViewType::ALL
        .into_iter()
        .find(|view| view.to_string() == s)
        .ok_or_else(|| format!("Unknown view: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view() {
        assert_eq!(parse_view("2").unwrap(), FeedViewType::Pictures);
        assert_eq!(parse_view("Social-Media").unwrap(), FeedViewType::SocialMedia);
        assert!(parse_view("9").is_err());
        assert!(parse_view("podcasts").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["folo-sync", "sync", "--view", "videos", "--db", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(
            cli.command,
            Commands::Sync {
                view: Some(FeedViewType::Videos)
            }
        ));
    }

    #[test]
    fn test_watch_interval_is_parsed() {
        let cli = Cli::try_parse_from(["folo-sync", "watch", "--interval", "30m"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch { interval: Some(1800) }));
        assert!(Cli::try_parse_from(["folo-sync", "watch", "--interval", "0s"]).is_err());
    }

    #[test]
    fn test_read_requires_entry_id() {
        assert!(Cli::try_parse_from(["folo-sync", "read"]).is_err());
    }
}
