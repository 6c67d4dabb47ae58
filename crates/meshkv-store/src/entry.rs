//! §3.1 Entry: one owned `(key, value)` pair inside a store.

use crate::lock::LockedValue;
use std::sync::Arc;

/// How an entry's value is stored: inline when the store's
/// fine-grained locking is off (the common case, zero overhead beyond
/// the key/value themselves), or behind an `Arc<LockedValue<V>>` when
/// it's on (see `lock` module docs for why that's necessary).
pub(crate) enum ValueSlot<V> {
    Plain(V),
    Locked(Arc<LockedValue<V>>),
}

impl<V: Clone> ValueSlot<V> {
    pub(crate) fn new(value: V, entry_locks: bool) -> Self {
        if entry_locks {
            ValueSlot::Locked(Arc::new(LockedValue::new(value)))
        } else {
            ValueSlot::Plain(value)
        }
    }

    /// Reads a clone of the current value. For a locked slot this
    /// briefly takes the per-entry mutex; it does not consult
    /// `enabled`, since an in-progress read of an entry the store
    /// lock still protects is not the hazard `enabled` guards
    /// against (that's racing a caller already holding a stale lock
    /// handle after deletion, see `with_entry_lock`).
    pub(crate) fn get(&self) -> V {
        match self {
            ValueSlot::Plain(v) => v.clone(),
            ValueSlot::Locked(lv) => lv.value.lock().clone(),
        }
    }

    pub(crate) fn with_ref<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        match self {
            ValueSlot::Plain(v) => f(v),
            ValueSlot::Locked(lv) => f(&lv.value.lock()),
        }
    }

    pub(crate) fn set(&mut self, value: V) {
        match self {
            ValueSlot::Plain(v) => *v = value,
            ValueSlot::Locked(lv) => *lv.value.lock() = value,
        }
    }

    pub(crate) fn into_inner(self) -> V {
        match self {
            ValueSlot::Plain(v) => v,
            ValueSlot::Locked(lv) => match Arc::try_unwrap(lv) {
                Ok(locked) => locked.value.into_inner(),
                Err(lv) => lv.value.lock().clone(),
            },
        }
    }

    pub(crate) fn locked_handle(&self) -> Option<Arc<LockedValue<V>>> {
        match self {
            ValueSlot::Plain(_) => None,
            ValueSlot::Locked(lv) => Some(lv.clone()),
        }
    }
}

pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) slot: ValueSlot<V>,
}

impl<K, V: Clone> Entry<K, V> {
    pub(crate) fn new(key: K, value: V, entry_locks: bool) -> Self {
        Self {
            key,
            slot: ValueSlot::new(value, entry_locks),
        }
    }
}
