//! The unified facade (Component E): binds a `(K, V)` pair to a
//! concrete store and layers UDP multicast replication on top of its
//! operations. Use [`MeshStore`] for the ordered map, [`MeshFifoStore`]
//! for the push/pop/next flavour (§6.1).

mod adapter;
mod fifo_handle;
mod handle;

pub use fifo_handle::MeshFifoStore;
pub use handle::MeshStore;

pub use meshkv_net::{ReplicationError, ReplicationResult};
pub use meshkv_store::{Item, StoreConfig, StoreError, StoreResult};
pub use meshkv_types::{identity_tag, py_hash, ShortString, StoreKey, StoreValue, Timestamp, TypeCodec, SHORT_STRING_CAP};
