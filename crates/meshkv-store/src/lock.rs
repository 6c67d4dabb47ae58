//! Optional per-entry fine-grained locking (§4.B "Fine-grained entry
//! locks").
//!
//! A sorted-array store physically moves entries on every insert or
//! delete of a *different* key, so a raw borrow into the array is
//! unsafe across any structural mutation, not just a delete of the
//! same key (the `Ref` hazard documented in §5). `LockedValue` sidesteps
//! that by boxing the value behind an `Arc`: the `Entry` slot that
//! holds it can move freely when the array shifts, but the `V` itself
//! stays at a fixed heap address for as long as some caller's
//! `Arc<LockedValue<V>>` clone is alive.
//!
//! `enabled` is the fence a racing deleter uses to tell a locker it
//! arrived too late.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct LockedValue<V> {
    enabled: AtomicBool,
    pub(crate) value: Mutex<V>,
}

impl<V> LockedValue<V> {
    pub fn new(value: V) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            value: Mutex::new(value),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Phase 1 of delete: take the value mutex, flip `enabled` false so
    /// any locker that raced us sees it once it gets the mutex, then
    /// release. Called with the store lock already dropped.
    pub fn fence(&self) {
        let _guard = self.value.lock();
        self.enabled.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn enabled_by_default() {
        let lv = LockedValue::new(7);
        assert!(lv.is_enabled());
    }

    #[test]
    fn fence_disables() {
        let lv = LockedValue::new(7);
        lv.fence();
        assert!(!lv.is_enabled());
    }

    #[test]
    fn concurrent_lockers_serialize_through_the_value_mutex() {
        let lv = Arc::new(LockedValue::new(0u32));
        let overlap = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lv = lv.clone();
            let overlap = overlap.clone();
            handles.push(thread::spawn(move || {
                let mut guard = lv.value.lock();
                let before = overlap.fetch_add(1, Ordering::SeqCst);
                assert_eq!(before, 0, "another locker ran concurrently");
                *guard += 1;
                overlap.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lv.value.lock(), 8);
    }
}
