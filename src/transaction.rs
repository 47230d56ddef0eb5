//! Store → request → persist unit of work with in-memory rollback.
//!
//! `store` steps apply the optimistic in-memory change immediately. The
//! remote `request` is awaited next, and `persist` only runs once the server
//! has accepted the change, so the local database never records something
//! the server rejected. Any failure runs the `rollback` steps in reverse
//! registration order and returns the error.

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::app::{Result, SyncError};

type StoreStep<C> = Box<dyn FnOnce(&mut C) + Send>;
type RollbackStep<C> = Box<dyn FnOnce(&C) + Send>;
type AsyncStep<C> = Box<dyn FnOnce(&C) -> BoxFuture<'static, Result<()>> + Send>;

pub struct Transaction<C> {
    name: &'static str,
    ctx: C,
    store: Vec<StoreStep<C>>,
    rollback: Vec<RollbackStep<C>>,
    request: Option<AsyncStep<C>>,
    persist: Option<AsyncStep<C>>,
}

impl<C: Send> Transaction<C> {
    pub fn new(ctx: C) -> Self {
        Self {
            name: "transaction",
            ctx,
            store: Vec::new(),
            rollback: Vec::new(),
            request: None,
            persist: None,
        }
    }

    /// Label used in log lines.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn store(mut self, step: impl FnOnce(&mut C) + Send + 'static) -> Self {
        self.store.push(Box::new(step));
        self
    }

    pub fn rollback(mut self, step: impl FnOnce(&C) + Send + 'static) -> Self {
        self.rollback.push(Box::new(step));
        self
    }

    pub fn request<F>(mut self, step: F) -> Self
    where
        F: FnOnce(&C) -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        self.request = Some(Box::new(step));
        self
    }

    pub fn persist<F>(mut self, step: F) -> Self
    where
        F: FnOnce(&C) -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        self.persist = Some(Box::new(step));
        self
    }

    /// Execute the transaction, handing the context back on success.
    pub async fn run(self) -> Result<C> {
        let Transaction {
            name,
            mut ctx,
            store,
            rollback,
            request,
            persist,
        } = self;

        for step in store {
            step(&mut ctx);
        }

        let outcome = async {
            if let Some(request) = request {
                request(&ctx).await?;
            }
            if let Some(persist) = persist {
                persist(&ctx).await?;
            }
            Ok::<(), SyncError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                debug!(transaction = name, "Transaction committed");
                Ok(ctx)
            }
            Err(e) => {
                warn!(transaction = name, error = %e, "Transaction failed, rolling back");
                for step in rollback.into_iter().rev() {
                    step(&ctx);
                }
                Err(e)
            }
        }
    }
}
