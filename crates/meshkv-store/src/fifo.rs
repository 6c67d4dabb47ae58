//! The FIFO flavour of the store: keys are [`Timestamp`]s generated at
//! push time (§3.1, §4.B Push). `Pop`/`Next` are the base store's
//! `remove_value(-1)`/`remove_value(0)`.

use crate::store::{Store, StoreConfig};
use meshkv_types::{StoreValue, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// A FIFO-ordered store: `Push` appends, `Pop` removes the most
/// recently pushed value, `Next` removes the oldest.
pub struct FifoStore<V: StoreValue> {
    inner: Arc<Store<Timestamp, V>>,
    /// The last timestamp handed out, so `push` can always produce a
    /// strictly greater one even under repeated clock reads that land
    /// on the same `(seconds, nanos)` pair (§3.1: "ties broken by
    /// insertion order").
    last_issued: Mutex<Option<Timestamp>>,
}

impl<V: StoreValue> FifoStore<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, StoreConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Store::with_config(name, config)),
            last_issued: Mutex::new(None),
        }
    }

    pub fn count(&self) -> usize {
        self.inner.count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn id(&self) -> u32 {
        self.inner.id()
    }

    /// The underlying ordered store, for `Save`/`Load`/`NetStart` and
    /// the other operations the FIFO flavour shares with the base
    /// store (§6.1 lists `Push` as the only FIFO-exclusive operation).
    pub fn as_store(&self) -> &Store<Timestamp, V> {
        self.inner.as_ref()
    }

    /// A clone of the underlying store's `Arc`, for facades that need
    /// to wire the FIFO store into something keyed on `Arc<Store<K,
    /// V>>` (replication, in particular) without exposing `inner`.
    pub fn store_handle(&self) -> Arc<Store<Timestamp, V>> {
        self.inner.clone()
    }

    /// §4.B Push: inserts `value` under a freshly generated, strictly
    /// increasing timestamp key. `false` only if the system clock
    /// cannot produce a later timestamp at all (the `Timestamp::next`
    /// overflow case).
    pub fn push(&self, value: V) -> bool {
        self.push_with_key(value).is_some()
    }

    /// Like [`push`](Self::push), but also hands back the timestamp
    /// key that was generated, so a caller replicating the store can
    /// gossip the exact `(key, value)` pair that was inserted.
    pub fn push_with_key(&self, value: V) -> Option<Timestamp> {
        let mut last = self.last_issued.lock();
        let candidate = Timestamp::now()?;
        let next = match *last {
            Some(prev) if candidate <= prev => prev.next()?,
            _ => candidate,
        };
        *last = Some(next);
        drop(last);
        trace!(store = %self.inner.name(), "fifo push");
        if self.inner.set(next, value) {
            Some(next)
        } else {
            None
        }
    }

    /// §4.B Pop: `RemoveValue(-1, &out)`, the most recently pushed
    /// value.
    pub fn pop(&self) -> Option<V> {
        self.inner.pop().map(|(_, v)| v)
    }

    /// §4.B Next: `RemoveValue(0, &out)`, the oldest value still
    /// present.
    pub fn next(&self) -> Option<V> {
        self.inner.next().map(|(_, v)| v)
    }
}
