use super::mutation::MutationContext;
use super::{temp_id, Merge, Optimistic};
use crate::domain::Identifiable;

/// Result of applying a mutation optimistically to a cached list.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticUpdate<T> {
    pub new_data: Vec<Optimistic<T>>,
    pub rollback_data: Vec<Optimistic<T>>,
    pub temp_id: Option<String>,
    /// Existing item the mutation targets (update, toggle, delete).
    pub target_id: Option<String>,
}

pub type OptimisticUpdater<T, V> =
    Box<dyn Fn(&V, &[Optimistic<T>]) -> OptimisticUpdate<T> + Send + Sync>;

pub type SuccessUpdater<T, V, R> =
    Box<dyn Fn(&R, &V, &[Optimistic<T>], &MutationContext<T, V>) -> Vec<Optimistic<T>> + Send + Sync>;

/// How a mutation shows up in the cache before and after the server answers.
pub struct OptimisticConfig<T, V, R> {
    pub(crate) optimistic_updater: OptimisticUpdater<T, V>,
    pub(crate) success_updater: Option<SuccessUpdater<T, V, R>>,
    pub(crate) error_message: String,
}

impl<T, V, R> OptimisticConfig<T, V, R>
where
    T: Identifiable + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Prepend `build(variables, temp_id)` as a pending item; on success the
    /// server result is merged over it and the marker cleared.
    pub fn for_create<B>(build: B, message: impl Into<String>) -> Self
    where
        B: Fn(&V, &str) -> T + Send + Sync + 'static,
        T: Merge<R>,
    {
        Self {
            optimistic_updater: Box::new(move |variables, previous| {
                let id = temp_id();
                let mut new_data = Vec::with_capacity(previous.len() + 1);
                new_data.push(Optimistic::pending(build(variables, &id)));
                new_data.extend_from_slice(previous);
                OptimisticUpdate {
                    new_data,
                    rollback_data: previous.to_vec(),
                    temp_id: Some(id),
                    target_id: None,
                }
            }),
            success_updater: Some(Box::new(|result, _, current, ctx| {
                let Some(temp) = ctx.temp_id.as_deref() else {
                    return current.to_vec();
                };
                current
                    .iter()
                    .map(|item| {
                        if item.value.id() == temp {
                            let mut value = item.value.clone();
                            <T as Merge<R>>::merge(&mut value, result);
                            Optimistic::confirmed(value)
                        } else {
                            item.clone()
                        }
                    })
                    .collect()
            })),
            error_message: message.into(),
        }
    }

    /// Merge the variables into the target item and mark it updating.
    pub fn for_update<G>(get_target_id: G, message: impl Into<String>) -> Self
    where
        G: Fn(&V) -> String + Send + Sync + 'static,
        T: Merge<V> + Merge<R>,
    {
        Self {
            optimistic_updater: Box::new(move |variables, previous| {
                let target = get_target_id(variables);
                patch_target(previous, target, |value| <T as Merge<V>>::merge(value, variables))
            }),
            success_updater: Some(Self::merge_result_into_target()),
            error_message: message.into(),
        }
    }

    /// Like [`OptimisticConfig::for_update`] but only the fields returned by
    /// `get_toggle_data` are applied optimistically.
    pub fn for_toggle<G, D, P>(get_target_id: G, get_toggle_data: D, message: impl Into<String>) -> Self
    where
        G: Fn(&V) -> String + Send + Sync + 'static,
        D: Fn(&V) -> P + Send + Sync + 'static,
        P: 'static,
        T: Merge<P> + Merge<R>,
    {
        Self {
            optimistic_updater: Box::new(move |variables, previous| {
                let target = get_target_id(variables);
                let patch = get_toggle_data(variables);
                patch_target(previous, target, |value| <T as Merge<P>>::merge(value, &patch))
            }),
            success_updater: Some(Self::merge_result_into_target()),
            error_message: message.into(),
        }
    }

    /// Remove the target item immediately. Nothing to reconcile on success.
    pub fn for_delete<G>(get_target_id: G, message: impl Into<String>) -> Self
    where
        G: Fn(&V) -> String + Send + Sync + 'static,
    {
        Self {
            optimistic_updater: Box::new(move |variables, previous| {
                let target = get_target_id(variables);
                OptimisticUpdate {
                    new_data: previous
                        .iter()
                        .filter(|item| item.value.id() != target)
                        .cloned()
                        .collect(),
                    rollback_data: previous.to_vec(),
                    temp_id: None,
                    target_id: Some(target),
                }
            }),
            success_updater: None,
            error_message: message.into(),
        }
    }

    pub fn custom(
        optimistic_updater: OptimisticUpdater<T, V>,
        success_updater: Option<SuccessUpdater<T, V, R>>,
    ) -> Self {
        Self {
            optimistic_updater,
            success_updater,
            error_message: "Operation failed".to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    fn merge_result_into_target() -> SuccessUpdater<T, V, R>
    where
        T: Merge<R>,
    {
        Box::new(|result, _, current, ctx| {
            let Some(target) = ctx.target_id.as_deref() else {
                return current.to_vec();
            };
            current
                .iter()
                .map(|item| {
                    if item.value.id() == target {
                        let mut value = item.value.clone();
                        <T as Merge<R>>::merge(&mut value, result);
                        Optimistic::confirmed(value)
                    } else {
                        item.clone()
                    }
                })
                .collect()
        })
    }
}

/// Apply `patch` to the item with id `target` and mark it updating. A target
/// missing from the list leaves it unchanged.
fn patch_target<T, F>(previous: &[Optimistic<T>], target: String, patch: F) -> OptimisticUpdate<T>
where
    T: Identifiable + Clone,
    F: Fn(&mut T),
{
    let new_data = previous
        .iter()
        .map(|item| {
            if item.value.id() == target {
                let mut value = item.value.clone();
                patch(&mut value);
                Optimistic::updating(value)
            } else {
                item.clone()
            }
        })
        .collect();
    OptimisticUpdate {
        new_data,
        rollback_data: previous.to_vec(),
        temp_id: None,
        target_id: Some(target),
    }
}
