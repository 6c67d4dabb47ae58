//! Bridges a concrete `Store<K, V>` into the type-erased
//! `meshkv_net::ReplicatedStore` the worker thread drives.

use meshkv_net::ReplicatedStore;
use meshkv_store::Store;
use meshkv_types::{StoreKey, StoreValue, TypeCodec};
use std::sync::Arc;

pub(crate) struct StoreAdapter<K: StoreKey, V: StoreValue> {
    pub(crate) store: Arc<Store<K, V>>,
}

impl<K: StoreKey, V: StoreValue> ReplicatedStore for StoreAdapter<K, V> {
    fn hash_id(&self) -> u32 {
        self.store.id()
    }

    fn count(&self) -> usize {
        self.store.count()
    }

    fn apply_remote_set(&self, payload: &[u8]) -> Result<(), String> {
        let key_size = K::declared_size();
        let value_size = V::declared_size();
        if payload.len() != key_size + value_size {
            return Err(format!(
                "SET payload is {} bytes, expected {}",
                payload.len(),
                key_size + value_size
            ));
        }
        let key = K::decode_fixed(&payload[..key_size]).map_err(|e| e.to_string())?;
        let value = V::decode_fixed(&payload[key_size..]).map_err(|e| e.to_string())?;
        self.store.set(key, value);
        Ok(())
    }

    fn apply_remote_del(&self, payload: &[u8]) -> Result<(), String> {
        let key_size = K::declared_size();
        if payload.len() != key_size {
            return Err(format!(
                "DEL payload is {} bytes, expected {}",
                payload.len(),
                key_size
            ));
        }
        let key = K::decode_fixed(payload).map_err(|e| e.to_string())?;
        self.store.del(&key);
        Ok(())
    }

    fn encode_entry_at(&self, index: usize) -> Option<Vec<u8>> {
        // Best-effort, matching §4.D.6: a concurrent mutation between
        // this length check and the reads below can make the SYNC
        // stream skip or repeat an entry. Steady-state divergence from
        // such races is accepted gossip behaviour, not a bug.
        if index >= self.store.count() {
            return None;
        }
        let key = self.store.key_at(index as i64)?;
        let value = self.store.item(index as i64).into_value()?;

        let key_size = K::declared_size();
        let value_size = V::declared_size();
        let mut buf = vec![0u8; key_size + value_size];
        key.encode_fixed(&mut buf[..key_size]).ok()?;
        value.encode_fixed(&mut buf[key_size..]).ok()?;
        Some(buf)
    }
}

pub(crate) fn encode_key_value<K: StoreKey, V: StoreValue>(key: &K, value: &V) -> Option<Vec<u8>> {
    let key_size = K::declared_size();
    let value_size = V::declared_size();
    let mut buf = vec![0u8; key_size + value_size];
    key.encode_fixed(&mut buf[..key_size]).ok()?;
    value.encode_fixed(&mut buf[key_size..]).ok()?;
    Some(buf)
}

pub(crate) fn encode_key<K: StoreKey>(key: &K) -> Option<Vec<u8>> {
    let key_size = K::declared_size();
    let mut buf = vec![0u8; key_size];
    key.encode_fixed(&mut buf).ok()?;
    Some(buf)
}
