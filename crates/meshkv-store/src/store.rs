//! §4.B: the storage engine, a sorted array with binary search,
//! amortised growth, and index wrapping.

use crate::entry::Entry;
use crate::lock::LockedValue;
use meshkv_types::{identity_tag, StoreKey, StoreValue};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// Tunables for a [`Store`]. Defaults reproduce the literal values in
/// §3.3 and §4.B exactly; this struct only makes them overridable.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// First allocation size, before any geometric growth (§3.3: 30).
    pub initial_capacity: usize,
    /// Whether entries get a fine-grained per-entry lock (§4.B).
    pub entry_locks: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 30,
            entry_locks: false,
        }
    }
}

/// The outcome of [`Store::item`] (§4.B: "`Item` signals 'in range' vs
/// 'wrapped' through its boolean return").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item<V> {
    /// `index` was already within `[0, len)`.
    InRange(V),
    /// `index` was negative or `>= len` and was wrapped modulo `len`.
    Wrapped(V),
    /// The store was empty; nothing was read.
    Empty,
}

impl<V> Item<V> {
    pub fn into_value(self) -> Option<V> {
        match self {
            Item::InRange(v) | Item::Wrapped(v) => Some(v),
            Item::Empty => None,
        }
    }

    pub fn is_in_range(&self) -> bool {
        matches!(self, Item::InRange(_))
    }
}

pub(crate) struct Inner<K, V> {
    pub(crate) entries: Vec<Entry<K, V>>,
}

/// Component B + part of E: an ordered `K -> V` map with a coarse lock,
/// optional per-entry fine locks, and the identity tag used by
/// persistence and replication to recognise compatible stores.
pub struct Store<K: StoreKey, V: StoreValue> {
    name: String,
    id: u32,
    config: StoreConfig,
    pub(crate) inner: Mutex<Inner<K, V>>,
}

/// Maps a possibly-negative or out-of-range index onto `[0, len)`,
/// reporting whether it was already in range (§4.B "Index wrapping"
/// and §9 Open Question (ii): wrap first, then bounds-check, not the
/// source's literal, transposed-argument behaviour).
pub fn wrap_index(index: i64, len: usize) -> Option<(usize, bool)> {
    if len == 0 {
        return None;
    }
    if index >= 0 && (index as usize) < len {
        return Some((index as usize, true));
    }
    let len_i = len as i64;
    let wrapped = ((index % len_i) + len_i) % len_i;
    Some((wrapped as usize, false))
}

fn grow_if_needed<K, V>(entries: &mut Vec<Entry<K, V>>, config: &StoreConfig) -> bool {
    if entries.len() < entries.capacity() {
        return true;
    }
    if entries.capacity() == 0 {
        return entries.try_reserve(config.initial_capacity.max(1)).is_ok();
    }
    let additional = std::cmp::max(1, entries.capacity() / 4);
    if entries.try_reserve(additional).is_ok() {
        return true;
    }
    // §4.B: "if the geometric attempt fails, retry with +1".
    entries.try_reserve(1).is_ok()
}

impl<K: StoreKey, V: StoreValue> Store<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, StoreConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: StoreConfig) -> Self {
        let id = identity_tag(K::type_name(), K::declared_size(), V::type_name());
        let name = name.into();
        debug!(store = %name, id = format!("{id:#010x}"), "store initialised");
        Self {
            name,
            id,
            config,
            inner: Mutex::new(Inner {
                entries: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store's identity tag (§6.3): a fingerprint of `(K, V)`'s
    /// type names, shared by every store of the same instantiation.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// §4.B Insert/Set: `true` on success (inserted or updated in
    /// place), `false` only if growing the array failed.
    pub fn set(&self, key: K, value: V) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.binary_search_by(|e| e.key.cmp(&key)) {
            Ok(idx) => {
                inner.entries[idx].slot.set(value);
                trace!(store = %self.name, "updated existing key");
                true
            }
            Err(pos) => {
                if !grow_if_needed(&mut inner.entries, &self.config) {
                    return false;
                }
                inner
                    .entries
                    .insert(pos, Entry::new(key, value, self.config.entry_locks));
                trace!(store = %self.name, count = inner.entries.len(), "inserted new key");
                true
            }
        }
    }

    /// §4.B Get: a clone of the value if present.
    pub fn get(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock();
        let idx = inner.entries.binary_search_by(|e| e.key.cmp(key)).ok()?;
        Some(inner.entries[idx].slot.get())
    }

    /// §4.B Ref, redesigned: instead of handing back a borrow that the
    /// next mutation could invalidate, the store lock is held for the
    /// duration of `f`. No caller can observe the hazard §5 warns
    /// about.
    pub fn with_ref<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        let inner = self.inner.lock();
        let idx = inner.entries.binary_search_by(|e| e.key.cmp(key)).ok()?;
        Some(inner.entries[idx].slot.with_ref(f))
    }

    pub fn has_key(&self, key: &K) -> bool {
        let inner = self.inner.lock();
        inner.entries.binary_search_by(|e| e.key.cmp(key)).is_ok()
    }

    /// §4.B Index: the entry's position, or `None` if absent (source
    /// contract used `-1`; `Option<usize>` is the idiomatic
    /// equivalent).
    pub fn index_of(&self, key: &K) -> Option<usize> {
        let inner = self.inner.lock();
        inner.entries.binary_search_by(|e| e.key.cmp(key)).ok()
    }

    /// §4.B KeyAt, redesigned: `None` replaces the "type-zero"
    /// sentinel for an empty store.
    pub fn key_at(&self, index: i64) -> Option<K> {
        let inner = self.inner.lock();
        let (idx, _) = wrap_index(index, inner.entries.len())?;
        Some(inner.entries[idx].key.clone())
    }

    /// §4.B Item.
    pub fn item(&self, index: i64) -> Item<V> {
        let inner = self.inner.lock();
        match wrap_index(index, inner.entries.len()) {
            None => Item::Empty,
            Some((idx, true)) => Item::InRange(inner.entries[idx].slot.get()),
            Some((idx, false)) => Item::Wrapped(inner.entries[idx].slot.get()),
        }
    }

    /// §4.B Del. Fine-grained-lock entries are fenced (phase 1) before
    /// the store lock is retaken to physically remove the entry (phase
    /// 2), per §4.B's "inverse order" deletion protocol; see the `lock`
    /// module for why that matters.
    pub fn del(&self, key: &K) -> bool {
        let locked: Option<Arc<LockedValue<V>>> = {
            let inner = self.inner.lock();
            match inner.entries.binary_search_by(|e| e.key.cmp(key)) {
                Ok(idx) => inner.entries[idx].slot.locked_handle(),
                Err(_) => return false,
            }
        };
        if let Some(lv) = locked {
            lv.fence();
        }
        let mut inner = self.inner.lock();
        match inner.entries.binary_search_by(|e| e.key.cmp(key)) {
            Ok(idx) => {
                inner.entries.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// §4.B RemoveValue: pops the entry at `index` (wrapped), `None`
    /// for an empty store. `Pop`/`Next` are `remove_value(-1)` /
    /// `remove_value(0)`.
    pub fn remove_value(&self, index: i64) -> Option<(K, V)> {
        let mut inner = self.inner.lock();
        let (idx, _) = wrap_index(index, inner.entries.len())?;
        let entry = inner.entries.remove(idx);
        Some((entry.key, entry.slot.into_inner()))
    }

    pub fn pop(&self) -> Option<(K, V)> {
        self.remove_value(-1)
    }

    pub fn next(&self) -> Option<(K, V)> {
        self.remove_value(0)
    }

    /// §4.B "Fine-grained entry locks": runs `f` with exclusive access
    /// to the entry's value, held under the entry's own mutex rather
    /// than the store lock, so other keys stay available. `None` if
    /// the key is absent, the store wasn't built with `entry_locks`, or
    /// the entry was deleted out from under the caller.
    pub fn with_entry_lock<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let locked = {
            let inner = self.inner.lock();
            let idx = inner.entries.binary_search_by(|e| e.key.cmp(key)).ok()?;
            inner.entries[idx].slot.locked_handle()?
        };
        if !locked.is_enabled() {
            return None;
        }
        let mut guard = locked.value.lock();
        if !locked.is_enabled() {
            return None;
        }
        Some(f(&mut guard))
    }

    /// Iterates the store tail-to-head, matching §4.B's "Iteration
    /// contract" pattern (`Item(count - cursor, ...)` with a
    /// decreasing cursor) so deleting the current entry from within
    /// `f` does not skip its successor. `f` returning `false` stops
    /// the walk early.
    pub fn for_each_deletable(&self, mut f: impl FnMut(&K, &V) -> bool) {
        loop {
            let count = self.count();
            if count == 0 {
                break;
            }
            let snapshot = {
                let inner = self.inner.lock();
                inner
                    .entries
                    .last()
                    .map(|e| (e.key.clone(), e.slot.get()))
            };
            let Some((key, value)) = snapshot else {
                break;
            };
            if !f(&key, &value) {
                break;
            }
            if self.count() == count {
                // `f` didn't delete the entry it was handed; stop to
                // avoid looping forever on the same tail element.
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Store<i32, i32> {
        Store::new("test")
    }

    #[test]
    fn ordered_insertion_last_write_wins() {
        let s = fresh();
        for (k, v) in [(1, 1), (2, 10), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)] {
            assert!(s.set(k, v));
        }
        assert_eq!(s.count(), 6);
        assert_eq!(s.get(&2), Some(2));
        assert_eq!(s.item(0), Item::InRange(1));
    }

    #[test]
    fn index_respects_key_order() {
        let s = fresh();
        for k in [5, 1, 3, 2, 4] {
            s.set(k, k);
        }
        for pair in (1..=5).collect::<Vec<_>>().windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(s.index_of(&a).unwrap() < s.index_of(&b).unwrap());
        }
    }

    #[test]
    fn del_removes_and_reports_presence() {
        let s = fresh();
        s.set(1, 1);
        assert!(s.del(&1));
        assert!(!s.has_key(&1));
        assert!(!s.del(&1));
    }

    #[test]
    fn empty_store_item_is_empty() {
        let s = fresh();
        assert_eq!(s.item(0), Item::<i32>::Empty);
        assert_eq!(s.key_at(0), None);
        assert_eq!(s.remove_value(0), None);
    }

    #[test]
    fn negative_and_oversized_indices_wrap() {
        let s = fresh();
        for k in 0..5 {
            s.set(k, k * 10);
        }
        assert_eq!(s.item(-1), Item::Wrapped(40));
        assert_eq!(s.item(5), Item::Wrapped(0));
        assert_eq!(s.item(4), Item::InRange(40));
    }

    #[test]
    fn delete_while_iterating_visits_every_entry_once() {
        let s = fresh();
        for k in 1..=6 {
            s.set(k, k);
        }
        let mut visited = Vec::new();
        s.for_each_deletable(|k, _v| {
            visited.push(*k);
            s.del(k)
        });
        assert_eq!(visited.len(), 6);
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn entry_locks_serialize_writers_but_not_other_keys() {
        use std::sync::Arc;
        use std::thread;
        let config = StoreConfig {
            initial_capacity: 4,
            entry_locks: true,
        };
        let store = Arc::new(Store::<i32, i32>::with_config("locked", config));
        store.set(1, 0);
        store.set(2, 0);

        let s1 = store.clone();
        let h1 = thread::spawn(move || {
            s1.with_entry_lock(&1, |v| {
                *v += 1;
            });
        });
        let s2 = store.clone();
        let h2 = thread::spawn(move || {
            s2.with_entry_lock(&2, |v| {
                *v += 1;
            });
        });
        h1.join().unwrap();
        h2.join().unwrap();
        assert_eq!(store.get(&1), Some(1));
        assert_eq!(store.get(&2), Some(1));
    }

    #[test]
    fn entry_lock_fenced_after_delete() {
        let config = StoreConfig {
            initial_capacity: 4,
            entry_locks: true,
        };
        let store = Store::<i32, i32>::with_config("locked", config);
        store.set(1, 1);
        assert!(store.del(&1));
        assert_eq!(store.with_entry_lock(&1, |v| *v), None);
    }
}
