use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::retry::with_retry;
use super::{ErrorConfig, Notifier, Optimistic, OptimisticConfig, QueryCache, QueryKey, TracingNotifier};
use crate::app::{Result, SyncError};
use crate::domain::Identifiable;

pub type MutationFn<V, R> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<R>> + Send + Sync>;
pub type SuccessCallback<V, R> = Box<dyn Fn(&R, &V) + Send + Sync>;

/// State captured before the optimistic write, handed to the success and
/// error paths.
#[derive(Debug, Clone)]
pub struct MutationContext<T, V> {
    pub rollback_data: Vec<Optimistic<T>>,
    pub temp_id: Option<String>,
    pub target_id: Option<String>,
    pub previous_data: Vec<Optimistic<T>>,
    pub variables: V,
}

pub struct MutationConfig<T, V, R> {
    pub mutation_fn: MutationFn<V, R>,
    pub query_key: QueryKey,
    pub strategy: OptimisticConfig<T, V, R>,
    pub error_config: ErrorConfig,
    pub on_success: Option<SuccessCallback<V, R>>,
}

impl<T, V, R> MutationConfig<T, V, R> {
    pub fn new(
        mutation_fn: MutationFn<V, R>,
        query_key: QueryKey,
        strategy: OptimisticConfig<T, V, R>,
    ) -> Self {
        Self {
            mutation_fn,
            query_key,
            strategy,
            error_config: ErrorConfig::default(),
            on_success: None,
        }
    }

    pub fn error_config(mut self, error_config: ErrorConfig) -> Self {
        self.error_config = error_config;
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&R, &V) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }
}

pub struct OptimisticMutation<T, V, R> {
    cache: Arc<QueryCache<T>>,
    config: MutationConfig<T, V, R>,
    notifier: Arc<dyn Notifier>,
}

impl<T, V, R> OptimisticMutation<T, V, R>
where
    T: Identifiable + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    pub fn new(cache: Arc<QueryCache<T>>, config: MutationConfig<T, V, R>) -> Self {
        Self {
            cache,
            config,
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn query_key(&self) -> &QueryKey {
        &self.config.query_key
    }

    /// Apply optimistically, call the server, then reconcile or roll back.
    /// The query is invalidated whatever the outcome.
    pub async fn mutate(&self, variables: V) -> Result<R> {
        let key = &self.config.query_key;
        let ctx = self.on_mutate(variables);

        let mutation_fn = self.config.mutation_fn.clone();
        let result = with_retry(&self.config.error_config, || mutation_fn(ctx.variables.clone())).await;

        match &result {
            Ok(response) => self.on_success(response, &ctx),
            Err(e) => self.on_error(e, &ctx),
        }

        if let Err(e) = self.cache.invalidate(key).await {
            warn!(key = %key, error = %e, "Failed to refetch after mutation");
        }
        result
    }

    fn on_mutate(&self, variables: V) -> MutationContext<T, V> {
        let key = &self.config.query_key;
        self.cache.cancel_queries(key);

        let previous = self.cache.get(key);
        let update = (self.config.strategy.optimistic_updater)(&variables, &previous);
        self.cache.set(key, update.new_data);
        debug!(key = %key, temp_id = ?update.temp_id, target = ?update.target_id, "Applied optimistic update");

        MutationContext {
            rollback_data: update.rollback_data,
            temp_id: update.temp_id,
            target_id: update.target_id,
            previous_data: previous,
            variables,
        }
    }

    fn on_success(&self, response: &R, ctx: &MutationContext<T, V>) {
        let key = &self.config.query_key;
        if let Some(success_updater) = &self.config.strategy.success_updater {
            let current = self.cache.get(key);
            let reconciled = success_updater(response, &ctx.variables, &current, ctx);
            self.cache.set(key, reconciled);
        }
        if let Some(callback) = &self.config.on_success {
            callback(response, &ctx.variables);
        }
    }

    fn on_error(&self, e: &SyncError, ctx: &MutationContext<T, V>) {
        let key = &self.config.query_key;
        self.cache.set(key, ctx.rollback_data.clone());

        let error_config = &self.config.error_config;
        if error_config.show_toast {
            let message = error_config
                .custom_message
                .as_deref()
                .unwrap_or(&self.config.strategy.error_message);
            self.notifier.error(message);
        }
        error!(key = %key, error = %e, "Optimistic mutation failed, rolled back");
    }
}
