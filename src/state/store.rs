use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::trace;

pub type ListenerId = u64;

type Notify<S> = Arc<Mutex<dyn FnMut(&S) + Send>>;

/// Reactive snapshot container.
///
/// Readers get an immutable `Arc<S>` snapshot. Writers either replace the
/// whole state or mutate a draft; the draft is a copy-on-write clone of the
/// current snapshot (`Arc::make_mut`), so outstanding snapshots never observe
/// a half-applied update.
///
/// Listeners run synchronously after each commit, outside the listener
/// registry lock. They may subscribe or unsubscribe but must not update the
/// store they listen to.
pub struct Store<S> {
    name: &'static str,
    state: RwLock<Arc<S>>,
    listeners: Mutex<Vec<(ListenerId, Notify<S>)>>,
    next_listener: AtomicU64,
}

impl<S> Store<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, initial: S) -> Self {
        Self {
            name,
            state: RwLock::new(Arc::new(initial)),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get_state(&self) -> Arc<S> {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the whole state.
    pub fn set_state(&self, next: S) {
        let snapshot = Arc::new(next);
        {
            let mut guard = match self.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = snapshot.clone();
        }
        self.notify(&snapshot);
    }

    /// Mutate a draft of the state; the result is committed as one snapshot.
    pub fn update<R>(&self, recipe: impl FnOnce(&mut S) -> R) -> R {
        let (result, snapshot) = {
            let mut guard = match self.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let result = recipe(Arc::make_mut(&mut guard));
            (result, guard.clone())
        };
        trace!(store = self.name, "State committed");
        self.notify(&snapshot);
        result
    }

    /// Call `listener(current, previous)` whenever `selector` yields a
    /// different value.
    pub fn subscribe<T, F, L>(&self, selector: F, listener: L) -> ListenerId
    where
        T: PartialEq + Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
        L: FnMut(&T, &T) + Send + 'static,
    {
        self.subscribe_with(selector, |a: &T, b: &T| a == b, listener)
    }

    /// Like [`Store::subscribe`] with a caller-supplied equality.
    pub fn subscribe_with<T, F, E, L>(&self, selector: F, equals: E, mut listener: L) -> ListenerId
    where
        T: Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
        E: Fn(&T, &T) -> bool + Send + 'static,
        L: FnMut(&T, &T) + Send + 'static,
    {
        let mut last = selector(&self.get_state());
        let notify: Notify<S> = Arc::new(Mutex::new(move |state: &S| {
            let next = selector(state);
            if !equals(&last, &next) {
                let previous = std::mem::replace(&mut last, next);
                listener(&last, &previous);
            }
        }));

        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push((id, notify));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Notify<S>)>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn notify(&self, state: &S) {
        let listeners: Vec<Notify<S>> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            let mut listener = match listener.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            (*listener)(state);
        }
    }
}

impl<S> Store<S>
where
    S: Clone + Default + Send + Sync + 'static,
{
    /// Back to the initial empty state (logout, account switch).
    pub fn reset(&self) {
        self.set_state(S::default());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counters {
        values: HashMap<String, u64>,
        label: String,
    }

    fn store() -> Store<Counters> {
        Store::new("counters", Counters::default())
    }

    #[test]
    fn test_update_commits_draft() {
        let store = store();
        let returned = store.update(|draft| {
            draft.values.insert("a".into(), 1);
            draft.label = "one".into();
            draft.values.len()
        });

        assert_eq!(returned, 1);
        let state = store.get_state();
        assert_eq!(state.values.get("a"), Some(&1));
        assert_eq!(state.label, "one");
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let store = store();
        store.update(|d| {
            d.values.insert("a".into(), 1);
        });
        let before = store.get_state();

        store.update(|d| {
            d.values.insert("a".into(), 2);
        });

        assert_eq!(before.values.get("a"), Some(&1));
        assert_eq!(store.get_state().values.get("a"), Some(&2));
    }

    #[test]
    fn test_selector_listener_fires_only_on_change() {
        let store = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        store.subscribe(
            |s: &Counters| s.values.get("a").copied(),
            move |current, previous| sink.lock().unwrap().push((*current, *previous)),
        );

        store.update(|d| {
            d.values.insert("a".into(), 1);
        });
        // Unrelated slice: no notification.
        store.update(|d| d.label = "x".into());
        store.update(|d| {
            d.values.insert("a".into(), 1);
        });
        store.update(|d| {
            d.values.insert("a".into(), 3);
        });

        assert_eq!(*seen.lock().unwrap(), vec![(Some(1), None), (Some(3), Some(1))]);
    }

    #[test]
    fn test_custom_equality() {
        let store = store();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();

        // Only care about the label's length.
        store.subscribe_with(
            |s: &Counters| s.label.clone(),
            |a: &String, b: &String| a.len() == b.len(),
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        store.update(|d| d.label = "ab".into());
        store.update(|d| d.label = "cd".into());
        store.update(|d| d.label = "abc".into());

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = store();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let id = store.subscribe(
            |s: &Counters| s.label.clone(),
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        store.update(|d| d.label = "a".into());
        assert!(store.unsubscribe(id));
        store.update(|d| d.label = "b".into());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let store = Arc::new(store());
        let hits = Arc::new(AtomicU64::new(0));
        let own_id = Arc::new(AtomicU64::new(0));

        let (handle, counter, id_slot) = (store.clone(), hits.clone(), own_id.clone());
        let id = store.subscribe(
            |s: &Counters| s.label.clone(),
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                handle.unsubscribe(id_slot.load(Ordering::SeqCst));
            },
        );
        own_id.store(id, Ordering::SeqCst);

        store.update(|d| d.label = "a".into());
        store.update(|d| d.label = "b".into());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_state_and_reset() {
        let store = store();
        let mut next = Counters::default();
        next.label = "replaced".into();
        store.set_state(next.clone());
        assert_eq!(*store.get_state(), next);

        store.reset();
        assert_eq!(*store.get_state(), Counters::default());
    }
}
