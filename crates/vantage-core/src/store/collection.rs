// ── Reactive object collection ──
//
// Concurrent storage keyed by object id, with O(1) lookups and a
// `watch`-published snapshot for subscribers that want the whole set.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::model::Vid;

/// A concurrent, reactive collection for one controller's objects.
///
/// Objects are never replaced once stored: their caches are live state,
/// so a second insert for the same id keeps the first object. Every
/// insert republishes the snapshot.
pub(crate) struct ObjectCollection<T: Send + Sync + 'static> {
    by_vid: DashMap<Vid, Arc<T>>,

    /// Full snapshot, rebuilt on mutation. Order is unspecified.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> ObjectCollection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_vid: DashMap::new(),
            snapshot,
        }
    }

    /// Store `object` under `vid` unless the id is already taken.
    /// Returns `true` if the object was stored.
    pub(crate) fn insert(&self, vid: Vid, object: Arc<T>) -> bool {
        let inserted = match self.by_vid.entry(vid) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(object);
                true
            }
        };
        if inserted {
            self.rebuild_snapshot();
        }
        inserted
    }

    pub(crate) fn get(&self, vid: Vid) -> Option<Arc<T>> {
        self.by_vid.get(&vid).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, vid: Vid) -> bool {
        self.by_vid.contains_key(&vid)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_vid.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_vid.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let values: Vec<Arc<T>> = self.by_vid.iter().map(|r| Arc::clone(r.value())).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
