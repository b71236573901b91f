//! Callback registry shared by the event stream and the controllers.
//!
//! Callbacks run synchronously on the dispatching task, in registration
//! order. A callback that blocks stalls every later line on the same
//! connection, so long-running work should be handed off to another task
//! (for example through a `tokio::sync::mpsc` channel) before returning.
//! A panicking callback is logged and skipped; remaining callbacks still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::warn;

/// Type-erased subscriber callback.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<K, E> {
    id: u64,
    key: Option<K>,
    callback: Callback<E>,
}

struct Entries<K, E> {
    next_id: u64,
    entries: Vec<Entry<K, E>>,
}

/// Keyed list of callbacks. Cheaply cloneable; clones share one list.
pub struct Registry<K, E> {
    inner: Arc<RwLock<Entries<K, E>>>,
}

impl<K, E> Clone for Registry<K, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, E> Default for Registry<K, E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Entries {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<K, E> Registry<K, E>
where
    K: PartialEq + Send + Sync + 'static,
    E: 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events keyed `key`, or as a catch-all when
    /// `key` is `None`. Catch-alls only see events no keyed callback matched.
    pub fn subscribe<F>(&self, key: Option<K>, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = guard.next_id;
        guard.next_id += 1;
        guard.entries.push(Entry {
            id,
            key,
            callback: Arc::new(callback),
        });
        drop(guard);

        let weak: Weak<dyn Remove> = Arc::downgrade(&self.inner) as Weak<dyn Remove>;
        Subscription {
            handles: vec![(weak, id)],
        }
    }

    /// Run every callback registered for `key`, falling back to catch-alls.
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, key: &K, event: &E) -> usize {
        let callbacks = self.matching(key);
        for callback in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!("subscriber callback panicked; continuing with remaining subscribers");
            }
        }
        callbacks.len()
    }

    /// Returns `true` if at least one callback is keyed on `key`.
    pub fn has_key(&self, key: &K) -> bool {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.entries.iter().any(|e| e.key.as_ref() == Some(key))
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matching(&self, key: &K) -> Vec<Callback<E>> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let keyed: Vec<Callback<E>> = guard
            .entries
            .iter()
            .filter(|e| e.key.as_ref() == Some(key))
            .map(|e| Arc::clone(&e.callback))
            .collect();
        if !keyed.is_empty() {
            return keyed;
        }
        guard
            .entries
            .iter()
            .filter(|e| e.key.is_none())
            .map(|e| Arc::clone(&e.callback))
            .collect()
    }
}

trait Remove: Send + Sync {
    fn remove(&self, id: u64);
}

impl<K: Send + Sync, E> Remove for RwLock<Entries<K, E>> {
    fn remove(&self, id: u64) {
        let mut guard = self.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = guard.entries.iter().position(|e| e.id == id) {
            guard.entries.remove(pos);
        }
    }
}

/// Handle returned by [`Registry::subscribe`].
///
/// Dropping the handle does not unsubscribe. Call
/// [`unsubscribe`](Self::unsubscribe), which is idempotent and removes
/// exactly the entries this handle was created for.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    handles: Vec<(Weak<dyn Remove>, u64)>,
}

impl Subscription {
    /// Combine several handles into one.
    pub fn merge(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        Self {
            handles: subscriptions.into_iter().flat_map(|s| s.handles).collect(),
        }
    }

    pub fn unsubscribe(&self) {
        for (registry, id) in &self.handles {
            if let Some(registry) = registry.upgrade() {
                registry.remove(*id);
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<u64> = self.handles.iter().map(|(_, id)| *id).collect();
        f.debug_struct("Subscription").field("ids", &ids).finish()
    }
}
