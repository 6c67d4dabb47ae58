//! UDP multicast gossip replication (Components C and D): a joined
//! multicast socket per store and the background worker that drives
//! the STAT/STAT_REQ/SYNC quiescence handshake and the SET/DEL gossip
//! stream.

mod error;
mod packet;
mod replication;
mod transport;

pub use error::{ReplicationError, ReplicationResult};
pub use packet::{decode_count, decode_node_id, encode_count, encode_node_id, Opcode, Packet, HEADER_LEN};
pub use replication::{ReplicatedStore, ReplicationSession};
pub use transport::{MulticastTransport, MULTICAST_GROUP};
