//! Component D: the per-store background worker driving §4.D.1's state
//! machine, and the `NetStart`/`Close` rendezvous of §4.D.5.
//!
//! The worker owns the socket outright (§9 "worker thread and
//! condition-variable handshake"); callers reach it only through
//! [`ReplicationSession::notify_set`]/[`notify_del`], which perform a
//! single atomic send and never touch worker state.

use crate::error::{ReplicationError, ReplicationResult};
use crate::packet::{decode_count, decode_node_id, encode_count, encode_node_id, Opcode, Packet};
use crate::transport::MulticastTransport;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const START_QUIESCENCE: Duration = Duration::from_millis(200);
const START_POLL: Duration = Duration::from_millis(200);
const RUN_POLL: Duration = Duration::from_millis(500);
const MAX_DATAGRAM: usize = 65_536;
const START_RENDEZVOUS_TIMEOUT: Duration = Duration::from_secs(2);

/// The type-erased view of a store that the replication engine needs.
/// Kept free of `K`/`V` so one worker implementation serves every
/// instantiation of `meshkv_store::Store<K, V>`.
pub trait ReplicatedStore: Send + Sync {
    /// §6.3's identity tag; partitions traffic sharing a port.
    fn hash_id(&self) -> u32;

    /// Current entry count, for the STAT/STAT_REQ handshake.
    fn count(&self) -> usize;

    /// Applies a remote `SET`: `payload` is `key ‖ value`, both
    /// fixed-width per the store's codecs.
    fn apply_remote_set(&self, payload: &[u8]) -> Result<(), String>;

    /// Applies a remote `DEL`: `payload` is the fixed-width key.
    fn apply_remote_del(&self, payload: &[u8]) -> Result<(), String>;

    /// Encodes the entry at tail-anchored index `index` as `key ‖
    /// value` for the SYNC stream, or `None` once `index` reaches the
    /// entry count.
    fn encode_entry_at(&self, index: usize) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, Copy)]
enum WorkerState {
    Start {
        deadline: Instant,
        max_node: u32,
        max_count: u64,
    },
    Run,
    StartSync,
    Sync {
        cursor: usize,
    },
}

/// A running replication session for one store. Dropping it closes
/// the session the same way an explicit [`close`](Self::close) would.
pub struct ReplicationSession {
    transport: Arc<MulticastTransport>,
    hash_id: u32,
    node_id: u32,
    port: u16,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReplicationSession {
    /// §4.D.5 `NetStart`: opens the socket, spawns the worker, and
    /// blocks until the worker signals it has entered its main loop.
    pub fn start(store: Arc<dyn ReplicatedStore>, port: u16) -> ReplicationResult<Self> {
        if port == 0 {
            return Err(ReplicationError::ZeroPort);
        }
        let hash_id = store.hash_id();
        let transport = Arc::new(MulticastTransport::bind(port)?);
        let node_id = rand::random::<u32>();
        let stop = Arc::new(AtomicBool::new(false));
        let started = Arc::new((Mutex::new(false), Condvar::new()));

        let worker_store = store;
        let worker_transport = transport.clone();
        let worker_stop = stop.clone();
        let worker_started = started.clone();

        let handle = thread::Builder::new()
            .name(format!("meshkv-repl-{port}"))
            .spawn(move || run_worker(worker_store, worker_transport, node_id, worker_stop, worker_started))
            .map_err(|_| ReplicationError::WorkerStartFailed)?;

        let (lock, cvar) = &*started;
        let mut guard = lock.lock();
        if !*guard {
            let result = cvar.wait_for(&mut guard, START_RENDEZVOUS_TIMEOUT);
            if result.timed_out() && !*guard {
                return Err(ReplicationError::WorkerStartFailed);
            }
        }
        drop(guard);

        debug!(port, node_id = format!("{node_id:#010x}"), "replication session started");
        Ok(Self {
            transport,
            hash_id,
            node_id,
            port,
            stop,
            handle: Some(handle),
        })
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// §4.D.3: emits exactly one `SET` for a local insert/update.
    pub fn notify_set(&self, entry_bytes: Vec<u8>) {
        self.send(Opcode::Set, entry_bytes);
    }

    /// §4.D.3: emits exactly one `DEL` for a local delete.
    pub fn notify_del(&self, key_bytes: Vec<u8>) {
        self.send(Opcode::Del, key_bytes);
    }

    fn send(&self, opcode: Opcode, payload: Vec<u8>) {
        send_packet(&self.transport, self.hash_id, self.node_id, opcode, payload);
    }

    /// §4.D.5 `Close`: signals the worker and joins it. Idempotent.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReplicationSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(
    store: Arc<dyn ReplicatedStore>,
    transport: Arc<MulticastTransport>,
    node_id: u32,
    stop: Arc<AtomicBool>,
    started: Arc<(Mutex<bool>, Condvar)>,
) {
    let hash_id = store.hash_id();
    debug!(hash_id = format!("{hash_id:#010x}"), node_id = format!("{node_id:#010x}"), "replication worker starting");

    send_packet(&transport, hash_id, node_id, Opcode::StatReq, Vec::new());

    let mut state = WorkerState::Start {
        deadline: Instant::now() + START_QUIESCENCE,
        max_node: 0,
        max_count: 0,
    };

    {
        let (lock, cvar) = &*started;
        let mut guard = lock.lock();
        *guard = true;
        cvar.notify_all();
    }

    let mut buf = [0u8; MAX_DATAGRAM];
    while !stop.load(Ordering::SeqCst) {
        let delay = match state {
            WorkerState::Start { .. } => START_POLL,
            _ => RUN_POLL,
        };

        match transport.recv_timeout(&mut buf, delay) {
            Ok(Some(n)) => {
                handle_datagram(&buf[..n], &store, &transport, hash_id, node_id, &mut state);
                // §4.D.4: drain every datagram already queued, non-blockingly.
                while let Ok(Some(n)) = transport.try_recv(&mut buf) {
                    handle_datagram(&buf[..n], &store, &transport, hash_id, node_id, &mut state);
                }
            }
            Ok(None) => {}
            Err(_) => {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
        }

        if matches!(state, WorkerState::StartSync) {
            state = WorkerState::Sync { cursor: 0 };
        }

        match &mut state {
            WorkerState::Start {
                deadline,
                max_node,
                max_count,
            } => {
                if Instant::now() >= *deadline {
                    if *max_count > store.count() as u64 {
                        send_packet(&transport, hash_id, node_id, Opcode::Sync, encode_node_id(*max_node));
                    }
                    state = WorkerState::Run;
                }
            }
            WorkerState::Run => {}
            WorkerState::StartSync => unreachable!("folded into Sync above"),
            WorkerState::Sync { cursor } => match store.encode_entry_at(*cursor) {
                Some(entry_bytes) => {
                    send_packet(&transport, hash_id, node_id, Opcode::Set, entry_bytes);
                    *cursor += 1;
                }
                None => state = WorkerState::Run,
            },
        }
    }

    debug!(hash_id = format!("{hash_id:#010x}"), "replication worker exiting");
}

fn handle_datagram(
    bytes: &[u8],
    store: &Arc<dyn ReplicatedStore>,
    transport: &MulticastTransport,
    hash_id: u32,
    node_id: u32,
    state: &mut WorkerState,
) {
    let packet = match Packet::from_bytes(bytes) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "dropping malformed packet");
            return;
        }
    };
    if packet.hash_id != hash_id || packet.node_id == node_id {
        return;
    }

    match packet.opcode {
        Opcode::Nop => {}
        Opcode::Set => {
            if let Err(e) = store.apply_remote_set(&packet.payload) {
                warn!(error = %e, "rejecting remote SET");
            }
        }
        Opcode::Del => {
            if let Err(e) = store.apply_remote_del(&packet.payload) {
                warn!(error = %e, "rejecting remote DEL");
            }
        }
        Opcode::StatReq => {
            let count = store.count() as u64;
            if count > 0 {
                send_packet(transport, hash_id, node_id, Opcode::Stat, encode_count(count));
            }
        }
        Opcode::Stat => {
            if let WorkerState::Start {
                max_node,
                max_count,
                ..
            } = state
            {
                if let Ok(count) = decode_count(&packet.payload) {
                    if count > *max_count {
                        *max_count = count;
                        *max_node = packet.node_id;
                    }
                }
            }
        }
        Opcode::Sync => {
            if let Ok(target) = decode_node_id(&packet.payload) {
                if target == node_id {
                    *state = WorkerState::StartSync;
                }
            }
        }
    }
}

fn send_packet(transport: &MulticastTransport, hash_id: u32, node_id: u32, opcode: Opcode, payload: Vec<u8>) {
    let packet = Packet::new(hash_id, node_id, opcode, payload);
    if let Err(e) = transport.send(&packet.to_bytes()) {
        warn!(error = %e, "failed to send packet");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PMutex;

    struct FakeStore {
        hash_id: u32,
        entries: PMutex<Vec<(u8, u8)>>,
    }

    impl ReplicatedStore for FakeStore {
        fn hash_id(&self) -> u32 {
            self.hash_id
        }

        fn count(&self) -> usize {
            self.entries.lock().len()
        }

        fn apply_remote_set(&self, payload: &[u8]) -> Result<(), String> {
            if payload.len() != 2 {
                return Err("bad payload".into());
            }
            let mut entries = self.entries.lock();
            let (k, v) = (payload[0], payload[1]);
            match entries.iter_mut().find(|(ek, _)| *ek == k) {
                Some(slot) => slot.1 = v,
                None => entries.push((k, v)),
            }
            Ok(())
        }

        fn apply_remote_del(&self, payload: &[u8]) -> Result<(), String> {
            if payload.len() != 1 {
                return Err("bad payload".into());
            }
            self.entries.lock().retain(|(k, _)| *k != payload[0]);
            Ok(())
        }

        fn encode_entry_at(&self, index: usize) -> Option<Vec<u8>> {
            self.entries.lock().get(index).map(|(k, v)| vec![*k, *v])
        }
    }

    fn free_port() -> u16 {
        std::net::UdpSocket::bind("0.0.0.0:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn start_and_close_round_trip() {
        let store = Arc::new(FakeStore {
            hash_id: 42,
            entries: PMutex::new(Vec::new()),
        });
        let port = free_port();
        let mut session = ReplicationSession::start(store, port).unwrap();
        assert_eq!(session.port(), port);
        session.close();
    }

    #[test]
    fn zero_port_is_rejected() {
        let store = Arc::new(FakeStore {
            hash_id: 1,
            entries: PMutex::new(Vec::new()),
        });
        assert!(matches!(
            ReplicationSession::start(store, 0),
            Err(ReplicationError::ZeroPort)
        ));
    }

    #[test]
    fn two_peers_converge_after_sets() {
        let port = free_port();
        let store_a = Arc::new(FakeStore {
            hash_id: 7,
            entries: PMutex::new(Vec::new()),
        });
        let store_b = Arc::new(FakeStore {
            hash_id: 7,
            entries: PMutex::new(Vec::new()),
        });

        let mut session_a = ReplicationSession::start(store_a.clone(), port).unwrap();
        let mut session_b = ReplicationSession::start(store_b.clone(), port).unwrap();

        store_a.entries.lock().push((1, 100));
        session_a.notify_set(vec![1, 100]);
        store_a.entries.lock().push((2, 200));
        session_a.notify_set(vec![2, 200]);

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline && store_b.count() < 2 {
            thread::sleep(Duration::from_millis(50));
        }

        assert_eq!(store_b.entries.lock().len(), 2);

        session_a.close();
        session_b.close();
    }
}
