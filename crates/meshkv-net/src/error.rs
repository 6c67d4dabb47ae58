//! Errors surfaced by the transport and replication engine (§7:
//! `ProtocolError` and `ConfigError`).

use thiserror::Error;

/// Replication and transport errors.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// The requested port was `0`, which is reserved for "not running".
    #[error("cannot start replication on port 0")]
    ZeroPort,

    /// `NetStart` called on a session that is already running.
    #[error("replication session is already running")]
    AlreadyRunning,

    /// Binding the multicast socket, or joining the multicast group,
    /// failed.
    #[error("failed to bind multicast socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A datagram failed to parse as a well-formed packet.
    #[error("malformed packet from the wire: {0}")]
    MalformedPacket(String),

    /// The worker's start rendezvous timed out or the worker thread
    /// died before signalling readiness.
    #[error("replication worker failed to start")]
    WorkerStartFailed,
}

pub type ReplicationResult<T> = Result<T, ReplicationError>;
