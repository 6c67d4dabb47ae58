//! End-to-end scenarios from §8's "seed tests".

use meshkv::{MeshFifoStore, MeshStore};
use std::time::{Duration, Instant};

#[test]
fn ordered_insertion() {
    let s: MeshStore<i32, i32> = MeshStore::new("ordered");
    for (k, v) in [(1, 1), (2, 10), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)] {
        s.set(k, v);
    }
    assert_eq!(s.count(), 6);
    assert_eq!(s.get(&2), Some(2));
    assert_eq!(s.key_at(-1).unwrap(), 6);
    assert_eq!(s.item(0).into_value(), Some(1));
}

#[test]
fn string_keyed_hash() {
    use meshkv::ShortString;
    let s: MeshStore<ShortString, i32> = MeshStore::new("strings");
    for i in 1..=5 {
        let key = ShortString::try_from(format!("k{i}").as_str()).unwrap();
        s.set(key, i);
    }
    let k3 = ShortString::try_from("k3").unwrap();
    assert!(s.has_key(&k3));
    assert_eq!(s.index_of(&k3), Some(2));
    let k5 = ShortString::try_from("k5").unwrap();
    assert!(s.del(&k5));
    assert_eq!(s.count(), 4);
}

#[test]
fn snapshot_round_trip_and_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.hash");

    let s: MeshStore<i32, i32> = MeshStore::new("snap");
    for k in 1..=6 {
        s.set(k, k * 10);
    }
    s.save(&path).unwrap();

    let loaded: MeshStore<i32, i32> = MeshStore::new("snap");
    loaded.load(&path).unwrap();
    assert_eq!(loaded.count(), 6);
    for k in 1..=6 {
        assert_eq!(loaded.get(&k), Some(k * 10));
    }

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    bytes[1] ^= 0xFF;
    bytes[2] ^= 0xFF;
    bytes[3] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let reloaded: MeshStore<i32, i32> = MeshStore::new("snap");
    assert!(reloaded.load(&path).is_err());
}

#[test]
fn fifo_order() {
    let s: MeshFifoStore<i32> = MeshFifoStore::new("fifo");
    s.push(1);
    s.push(2);
    s.push(3);
    assert_eq!(s.pop(), Some(3));
    assert_eq!(s.pop(), Some(2));
    assert_eq!(s.pop(), Some(1));

    s.push(1);
    s.push(2);
    s.push(3);
    assert_eq!(s.next(), Some(1));
    assert_eq!(s.next(), Some(2));
    assert_eq!(s.next(), Some(3));
}

#[test]
fn delete_while_iterating() {
    let s: MeshStore<i32, i32> = MeshStore::new("iter");
    for k in 1..=6 {
        s.set(k, k);
    }
    let mut visited = Vec::new();
    loop {
        let count = s.count();
        if count == 0 {
            break;
        }
        let key = s.key_at(-1).unwrap();
        visited.push(key);
        s.del(&key);
    }
    assert_eq!(visited.len(), 6);
    assert_eq!(s.count(), 0);
}

#[test]
fn replicated_convergence_two_peers_and_a_late_joiner() {
    let port = free_port();

    let a: MeshStore<i32, i32> = MeshStore::new("a");
    let b: MeshStore<i32, i32> = MeshStore::new("b");
    a.net_start(port).unwrap();
    b.net_start(port).unwrap();

    for k in 1..=6 {
        a.set(k, k * 100);
    }

    wait_until(Duration::from_secs(2), || b.count() == 6);
    assert_eq!(b.count(), 6);
    for k in 1..=6 {
        assert_eq!(b.get(&k), a.get(&k));
    }

    a.del(&1);
    wait_until(Duration::from_secs(2), || !b.has_key(&1));
    assert!(!b.has_key(&1));

    let c: MeshStore<i32, i32> = MeshStore::new("c");
    c.net_start(port).unwrap();
    wait_until(Duration::from_secs(2), || c.count() == a.count());
    assert_eq!(c.count(), a.count());
    for k in 2..=6 {
        assert_eq!(c.get(&k), a.get(&k));
    }

    a.close();
    b.close();
    c.close();
}

fn free_port() -> u16 {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}
