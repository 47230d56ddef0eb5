use std::collections::HashMap;
use std::sync::Arc;

use super::Store;
use crate::domain::Identifiable;

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState<T> {
    pub data: HashMap<String, T>,
}

impl<T> Default for EntityState<T> {
    fn default() -> Self {
        Self {
            data: HashMap::new(),
        }
    }
}

/// Id-keyed store for entities without secondary indexes (feeds, lists,
/// inboxes).
pub struct EntityStore<T> {
    store: Store<EntityState<T>>,
}

impl<T> EntityStore<T>
where
    T: Identifiable + Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            store: Store::new(name, EntityState::default()),
        }
    }

    pub fn store(&self) -> &Store<EntityState<T>> {
        &self.store
    }

    pub fn get_state(&self) -> Arc<EntityState<T>> {
        self.store.get_state()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.store.get_state().data.get(id).cloned()
    }

    pub fn upsert_many(&self, records: &[T]) {
        if records.is_empty() {
            return;
        }
        self.store.update(|state| {
            for record in records {
                state.data.insert(record.id().to_string(), record.clone());
            }
        });
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        self.store.update(|state| state.data.remove(id))
    }

    pub fn len(&self) -> usize {
        self.store.get_state().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.store.reset();
    }
}
