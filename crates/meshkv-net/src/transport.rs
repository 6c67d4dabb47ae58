//! The multicast UDP socket (Component C). One per replicated store;
//! stores sharing a port share the socket traffic and rely on the
//! `hash id` in every packet to tell their streams apart (§6.2).

use crate::error::{ReplicationError, ReplicationResult};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;
use tracing::{debug, warn};

/// The fixed multicast group address for all meshkv traffic (§6.2).
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 0, 0, 1);

/// A joined multicast UDP socket, shared between the worker thread
/// (reader) and any caller thread (writer, §5 "shared-resource
/// policy"). `UdpSocket::send_to`/`recv_from` need only `&self`, so no
/// extra lock is needed here; the kernel serialises concurrent
/// `sendto`s.
pub struct MulticastTransport {
    socket: UdpSocket,
    port: u16,
}

impl MulticastTransport {
    /// Binds to `0.0.0.0:port` with address reuse (so multiple stores,
    /// or multiple processes on one host, can share the port) and
    /// joins [`MULTICAST_GROUP`].
    pub fn bind(port: u16) -> ReplicationResult<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|source| ReplicationError::Bind { port, source })?;
        socket
            .set_reuse_address(true)
            .map_err(|source| ReplicationError::Bind { port, source })?;
        let bind_addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into();
        socket
            .bind(&bind_addr.into())
            .map_err(|source| ReplicationError::Bind { port, source })?;
        socket
            .join_multicast_v4(&MULTICAST_GROUP, &Ipv4Addr::UNSPECIFIED)
            .map_err(|source| ReplicationError::Bind { port, source })?;

        let socket: UdpSocket = socket.into();
        debug!(port, group = %MULTICAST_GROUP, "multicast transport bound");
        Ok(Self { socket, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Single atomic send of an already-assembled packet (§4.D.3).
    /// Failures are the caller's to log; the store's local state
    /// remains authoritative regardless.
    pub fn send(&self, bytes: &[u8]) -> std::io::Result<usize> {
        self.socket
            .send_to(bytes, SocketAddrV4::new(MULTICAST_GROUP, self.port))
    }

    /// Blocks up to `timeout` waiting for a datagram. `Ok(None)` on a
    /// timeout; other I/O errors are the caller's to handle per §4.D.6
    /// ("brief sleep, retry").
    pub fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> std::io::Result<Option<usize>> {
        self.socket.set_read_timeout(Some(timeout))?;
        match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "multicast recv failed");
                Err(e)
            }
        }
    }

    /// Non-blocking poll for one already-queued datagram. `Ok(None)`
    /// means the socket has nothing buffered right now, used by the
    /// worker to drain everything queued on a tick without waiting
    /// (§4.D.4). Leaves the socket back in blocking mode before
    /// returning, since [`recv_timeout`](Self::recv_timeout) relies on
    /// `SO_RCVTIMEO` rather than `O_NONBLOCK` for its waits.
    pub fn try_recv(&self, buf: &mut [u8]) -> std::io::Result<Option<usize>> {
        self.socket.set_nonblocking(true)?;
        let result = match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                warn!(error = %e, "multicast recv failed");
                Err(e)
            }
        };
        self.socket.set_nonblocking(false)?;
        result
    }

    /// Unblocks a pending `recv` by closing the socket's read side;
    /// the simplest portable way with `std::net::UdpSocket` is to drop
    /// it, which `Close` (§4.D.5) does by dropping the whole
    /// transport.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
