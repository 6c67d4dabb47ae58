//! Component E: the facade that binds a `(K, V)` pair to a concrete
//! [`Store`](meshkv_store::Store) and layers `NetStart`/`Close` and
//! replication emission (§4.D.3) on top of its operations (§4.E).

use crate::adapter::{encode_key, encode_key_value, StoreAdapter};
use meshkv_net::{ReplicatedStore, ReplicationError, ReplicationResult, ReplicationSession};
use meshkv_store::{Item, Store, StoreConfig, StoreResult};
use meshkv_types::{StoreKey, StoreValue};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A store plus its optional replication session (§4.E). Every
/// named operation from §6.1 is exposed here; mutating ones also emit
/// the corresponding gossip packet when a session is running.
pub struct MeshStore<K: StoreKey, V: StoreValue> {
    store: Arc<Store<K, V>>,
    session: Mutex<Option<ReplicationSession>>,
}

impl<K: StoreKey, V: StoreValue> MeshStore<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, StoreConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            store: Arc::new(Store::with_config(name, config)),
            session: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn id(&self) -> u32 {
        self.store.id()
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.store.get(key)
    }

    pub fn with_ref<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.store.with_ref(key, f)
    }

    pub fn has_key(&self, key: &K) -> bool {
        self.store.has_key(key)
    }

    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.store.index_of(key)
    }

    pub fn key_at(&self, index: i64) -> Option<K> {
        self.store.key_at(index)
    }

    pub fn item(&self, index: i64) -> Item<V> {
        self.store.item(index)
    }

    pub fn with_entry_lock<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.store.with_entry_lock(key, f)
    }

    /// §4.B Set, plus the §4.D.3 send path: a successful insert/update
    /// emits one `SET` when replication is running.
    pub fn set(&self, key: K, value: V) -> bool {
        let ok = self.store.set(key.clone(), value.clone());
        if ok {
            self.emit(|session| {
                encode_key_value(&key, &value).map(|bytes| session.notify_set(bytes));
            });
        }
        ok
    }

    /// §4.B Del, plus the §4.D.3 send path.
    pub fn del(&self, key: &K) -> bool {
        let ok = self.store.del(key);
        if ok {
            self.emit(|session| { encode_key(key).map(|bytes| session.notify_del(bytes)); });
        }
        ok
    }

    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        self.store.save(path)
    }

    pub fn load(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        self.store.load(path)
    }

    /// §4.D.5 `NetStart`: opens the multicast socket and spawns the
    /// replication worker. `Err(AlreadyRunning)` if a session already
    /// exists; `Err(ZeroPort)` for `port == 0`.
    pub fn net_start(&self, port: u16) -> ReplicationResult<()> {
        let mut guard = self.session.lock();
        if guard.is_some() {
            return Err(ReplicationError::AlreadyRunning);
        }
        let adapter: Arc<dyn ReplicatedStore> = Arc::new(StoreAdapter {
            store: self.store.clone(),
        });
        let session = ReplicationSession::start(adapter, port)?;
        info!(store = self.store.name(), port, "replication started");
        *guard = Some(session);
        Ok(())
    }

    pub fn is_replicating(&self) -> bool {
        self.session.lock().is_some()
    }

    /// §4.D.5 `Close` / §5 `Free`: stops the worker and joins it.
    /// Idempotent; a no-op if no session is running.
    pub fn close(&self) {
        if let Some(mut session) = self.session.lock().take() {
            session.close();
            debug!(store = self.store.name(), "replication stopped");
        }
    }

    fn emit(&self, f: impl FnOnce(&ReplicationSession)) {
        let guard = self.session.lock();
        if let Some(session) = guard.as_ref() {
            f(session);
        }
    }
}

impl<K: StoreKey, V: StoreValue> Drop for MeshStore<K, V> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_del_round_trip() {
        let s: MeshStore<i32, i32> = MeshStore::new("h");
        assert!(s.set(1, 100));
        assert_eq!(s.get(&1), Some(100));
        assert!(s.del(&1));
        assert!(!s.has_key(&1));
    }

    #[test]
    fn net_start_twice_is_rejected() {
        let s: MeshStore<i32, i32> = MeshStore::new("h");
        let port = free_port();
        s.net_start(port).unwrap();
        assert!(matches!(s.net_start(port), Err(ReplicationError::AlreadyRunning)));
        s.close();
    }

    #[test]
    fn net_start_zero_port_fails() {
        let s: MeshStore<i32, i32> = MeshStore::new("h");
        assert!(matches!(s.net_start(0), Err(ReplicationError::ZeroPort)));
    }

    fn free_port() -> u16 {
        std::net::UdpSocket::bind("0.0.0.0:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }
}
