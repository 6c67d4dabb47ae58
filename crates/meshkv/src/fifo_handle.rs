//! The FIFO flavour of [`MeshStore`](crate::MeshStore): same facade
//! contract, with `Push` in place of `Set` (§6.1: "`Push` (FIFO
//! only)").

use crate::adapter::{encode_key, encode_key_value, StoreAdapter};
use meshkv_net::{ReplicatedStore, ReplicationError, ReplicationResult, ReplicationSession};
use meshkv_store::{FifoStore, StoreConfig, StoreResult};
use meshkv_types::StoreValue;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct MeshFifoStore<V: StoreValue> {
    store: Arc<FifoStore<V>>,
    session: Mutex<Option<ReplicationSession>>,
}

impl<V: StoreValue> MeshFifoStore<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, StoreConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            store: Arc::new(FifoStore::with_config(name, config)),
            session: Mutex::new(None),
        }
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn id(&self) -> u32 {
        self.store.id()
    }

    /// §4.B Push, plus the §4.D.3 send path.
    pub fn push(&self, value: V) -> bool {
        match self.store.push_with_key(value.clone()) {
            Some(key) => {
                self.emit(|session| {
                    encode_key_value(&key, &value).map(|bytes| session.notify_set(bytes));
                });
                true
            }
            None => false,
        }
    }

    /// §4.B Pop: the most recently pushed value, plus a `DEL` emission.
    pub fn pop(&self) -> Option<V> {
        let (key, value) = self.store.as_store().pop()?;
        self.emit(|session| { encode_key(&key).map(|bytes| session.notify_del(bytes)); });
        Some(value)
    }

    /// §4.B Next: the oldest remaining value, plus a `DEL` emission.
    pub fn next(&self) -> Option<V> {
        let (key, value) = self.store.as_store().next()?;
        self.emit(|session| { encode_key(&key).map(|bytes| session.notify_del(bytes)); });
        Some(value)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        self.store.as_store().save(path)
    }

    pub fn load(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        self.store.as_store().load(path)
    }

    pub fn net_start(&self, port: u16) -> ReplicationResult<()> {
        let mut guard = self.session.lock();
        if guard.is_some() {
            return Err(ReplicationError::AlreadyRunning);
        }
        let adapter: Arc<dyn ReplicatedStore> = Arc::new(StoreAdapter {
            store: self.store.store_handle(),
        });
        let session = ReplicationSession::start(adapter, port)?;
        info!(port, "fifo replication started");
        *guard = Some(session);
        Ok(())
    }

    pub fn is_replicating(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn close(&self) {
        if let Some(mut session) = self.session.lock().take() {
            session.close();
        }
    }

    fn emit(&self, f: impl FnOnce(&ReplicationSession)) {
        let guard = self.session.lock();
        if let Some(session) = guard.as_ref() {
            f(session);
        }
    }
}

impl<V: StoreValue> Drop for MeshFifoStore<V> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_order() {
        let s: MeshFifoStore<i32> = MeshFifoStore::new("f");
        s.push(1);
        s.push(2);
        s.push(3);
        assert_eq!(s.pop(), Some(3));
        assert_eq!(s.pop(), Some(2));
        assert_eq!(s.pop(), Some(1));
    }
}
