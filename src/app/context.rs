use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::api::{HttpApi, RemoteApi};
use crate::app::error::{Result, SyncError};
use crate::config::Config;
use crate::optimistic::{MutationConfig, MutationFn, OptimisticConfig, QueryKey};
use crate::persist::{Database, Persistence};
use crate::state::Stores;
use crate::sync::{EntrySyncService, SubscriptionSyncService, UnreadSyncService};

/// Counts loaded by [`AppContext::hydrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hydrated {
    pub subscriptions: usize,
    pub entries: usize,
    pub unread: usize,
}

pub struct AppContext {
    pub config: Config,
    pub db: Persistence,
    pub stores: Stores,
    pub api: Arc<dyn RemoteApi>,
    pub unread: Arc<UnreadSyncService>,
    pub entries: EntrySyncService,
    pub subscriptions: SubscriptionSyncService,
}

impl AppContext {
    /// `db_path` overrides `config.database.path`.
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = Self::resolve_db_path(&config, db_path)?;
        let database = Database::open(&db_path, config.database.recovery)?;
        info!(path = %db_path.display(), "Database ready");
        let api = Self::http_api(&config)?;
        Ok(Self::assemble(config, database, api))
    }

    /// Throwaway database, real HTTP client.
    pub fn in_memory(config: Config) -> Result<Self> {
        let api = Self::http_api(&config)?;
        Ok(Self::assemble(config, Database::in_memory()?, api))
    }

    fn http_api(config: &Config) -> Result<Arc<dyn RemoteApi>> {
        let api = HttpApi::new(&config.api.base_url, config.api.token.clone(), config.api.timeout())?;
        Ok(Arc::new(api))
    }

    fn assemble(config: Config, database: Database, api: Arc<dyn RemoteApi>) -> Self {
        let db = Persistence::new(Arc::new(database));
        let stores = Stores::new();

        Self {
            unread: Arc::new(UnreadSyncService::new(api.clone(), stores.clone(), db.clone())),
            entries: EntrySyncService::new(api.clone(), stores.clone(), db.clone()),
            subscriptions: SubscriptionSyncService::new(api.clone(), stores.clone(), db.clone()),
            config,
            db,
            stores,
            api,
        }
    }

    /// Load everything persisted into the in-memory stores.
    ///
    /// Subscriptions go first: entry indexes by view and category are
    /// derived from them.
    pub fn hydrate(&self) -> Result<Hydrated> {
        let hydrated = Hydrated {
            subscriptions: self.subscriptions.hydrate()?,
            entries: self.entries.hydrate()?,
            unread: self.unread.hydrate()?,
        };
        info!(
            subscriptions = hydrated.subscriptions,
            entries = hydrated.entries,
            unread = hydrated.unread,
            "Hydrated stores"
        );
        Ok(hydrated)
    }

    /// A mutation carrying the `[mutation]` error defaults of the config file.
    pub fn mutation_config<T, V, R>(
        &self,
        mutation_fn: MutationFn<V, R>,
        query_key: QueryKey,
        strategy: OptimisticConfig<T, V, R>,
    ) -> MutationConfig<T, V, R> {
        MutationConfig::new(mutation_fn, query_key, strategy).error_config(self.config.mutation.error_config())
    }

    /// Forget the account: clear every store and every synced row.
    pub fn logout(&self) -> Result<()> {
        self.stores.reset();
        self.db.reset()?;
        info!("Local state cleared");
        Ok(())
    }

    /// `--db`, then the config file, then the platform data directory.
    pub fn resolve_db_path(config: &Config, db_path: Option<PathBuf>) -> Result<PathBuf> {
        match db_path.or_else(|| config.database.path.clone()) {
            Some(p) => Ok(p),
            None => Self::default_db_path(),
        }
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| SyncError::Config("Could not find data directory".into()))?;
        let app_dir = data_dir.join("folo-sync");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("folo.db"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::{Entry, FeedViewType, Subscription, UnreadCount};
    use crate::persist::PersistenceService;
    use crate::state::IndexKey;

    fn seed(ctx: &AppContext) {
        ctx.db
            .subscriptions
            .upsert_many(&[Subscription::for_feed("f1", FeedViewType::Pictures)])
            .unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        ctx.db.entries.upsert_many(&[Entry::new("e1", "f1", at)]).unwrap();
        ctx.db.unread.upsert_many(&[UnreadCount::new("f1", 9)]).unwrap();
    }

    #[test]
    fn test_hydrate_orders_subscriptions_before_entries() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        seed(&ctx);

        let hydrated = ctx.hydrate().unwrap();
        assert_eq!(
            hydrated,
            Hydrated {
                subscriptions: 1,
                entries: 1,
                unread: 1
            }
        );
        assert_eq!(ctx.stores.entries.ids_for(&IndexKey::View(FeedViewType::Pictures)), vec!["e1"]);
        assert_eq!(ctx.unread.unread_count("f1"), 9);
    }

    #[test]
    fn test_logout_clears_memory_and_disk() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        seed(&ctx);
        ctx.hydrate().unwrap();

        ctx.logout().unwrap();

        assert!(ctx.stores.entries.get("e1").is_none());
        assert!(ctx.db.entries.get_all().unwrap().is_empty());
        assert_eq!(ctx.hydrate().unwrap(), Hydrated::default());
    }

    #[tokio::test]
    async fn test_mutations_use_configured_error_defaults() {
        use futures::FutureExt;

        use crate::domain::Feed;
        use crate::optimistic::{ErrorConfig, OptimisticMutation, QueryCache};

        let mut config = Config::default();
        config.mutation.show_toast = false;
        config.mutation.max_retries = 0;
        let ctx = AppContext::in_memory(config).unwrap();

        let key = QueryKey::new(["feeds"]);
        let cache = Arc::new(QueryCache::new());
        cache.set_values(&key, vec![Feed::new("f1", "https://f1.example/rss")]);
        let delete: MutationFn<String, ()> =
            Arc::new(|_| async { Err(SyncError::Other("offline".into())) }.boxed());
        let strategy: OptimisticConfig<Feed, String, ()> =
            OptimisticConfig::for_delete(|id: &String| id.clone(), "Failed to remove feed");

        let mutation_config = ctx.mutation_config(delete, key.clone(), strategy);
        assert_eq!(
            mutation_config.error_config,
            ErrorConfig {
                show_toast: false,
                custom_message: None,
                retryable: false,
                max_retries: 0,
            }
        );

        let mutation = OptimisticMutation::new(cache.clone(), mutation_config);
        assert!(mutation.mutate("f1".to_string()).await.is_err());
        assert_eq!(cache.values(&key).len(), 1);
    }

    #[test]
    fn test_file_database_with_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folo.db");

        let ctx = AppContext::new(Config::default(), Some(path.clone())).unwrap();
        assert_eq!(ctx.db.db.path(), Some(path.as_path()));
        assert!(path.exists());
    }
}
