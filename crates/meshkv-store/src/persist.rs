//! §4.F / §6.4: the snapshot codec, a 4-byte identity header followed
//! by fixed-width `(key, value)` records.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use meshkv_types::{StoreKey, StoreValue};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

impl<K: StoreKey, V: StoreValue> Store<K, V> {
    /// §4.F Save: writes the identity tag, then every entry in order as
    /// `key` followed by `value`, each exactly their declared size. A
    /// short write rolls the file back (closes, removes it) rather
    /// than leaving a truncated snapshot on disk.
    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let result = self.save_inner(path);
        if result.is_err() {
            let _ = std::fs::remove_file(path);
        }
        result
    }

    fn save_inner(&self, path: &Path) -> StoreResult<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.id().to_le_bytes())?;

        let key_size = K::declared_size();
        let value_size = V::declared_size();
        let mut key_buf = vec![0u8; key_size];
        let mut value_buf = vec![0u8; value_size];

        let inner = self.inner.lock();
        for entry in &inner.entries {
            entry.key.encode_fixed(&mut key_buf)?;
            file.write_all(&key_buf)?;
            entry
                .slot
                .with_ref(|v| v.encode_fixed(&mut value_buf))?;
            file.write_all(&value_buf)?;
        }
        file.sync_all()?;
        info!(store = %self.name(), count = inner.entries.len(), path = %path.display(), "snapshot saved");
        Ok(())
    }

    /// §4.F Load: validates the identity tag, then repeatedly reads a
    /// fixed-width key and value and inserts them. EOF exactly at a key
    /// boundary ends the loop successfully; EOF partway through a value
    /// is corruption. The store is emptied first (§3.1 "destroyed on
    /// snapshot load").
    pub fn load(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let mut file = std::fs::File::open(path)?;

        let mut id_buf = [0u8; 4];
        file.read_exact(&mut id_buf)?;
        let found = u32::from_le_bytes(id_buf);
        if found != self.id() {
            warn!(store = %self.name(), expected = format!("{:#010x}", self.id()), found = format!("{found:#010x}"), "snapshot identity mismatch");
            return Err(StoreError::IdentityMismatch {
                expected: self.id(),
                found,
            });
        }

        let key_size = K::declared_size();
        let value_size = V::declared_size();
        let mut key_buf = vec![0u8; key_size];
        let mut value_buf = vec![0u8; value_size];
        let mut loaded = Vec::new();

        loop {
            match read_exact_or_eof(&mut file, &mut key_buf)? {
                ReadOutcome::Eof => break,
                ReadOutcome::Full => {}
            }
            match read_exact_or_eof(&mut file, &mut value_buf)? {
                ReadOutcome::Eof => return Err(StoreError::TruncatedValue),
                ReadOutcome::Full => {}
            }
            let key = K::decode_fixed(&key_buf)?;
            let value = V::decode_fixed(&value_buf)?;
            loaded.push((key, value));
        }

        {
            let mut inner = self.inner.lock();
            inner.entries.clear();
        }
        for (key, value) in loaded {
            self.set(key, value);
        }
        info!(store = %self.name(), count = self.count(), path = %path.display(), "snapshot loaded");
        Ok(())
    }
}

enum ReadOutcome {
    Full,
    Eof,
}

/// Reads exactly `buf.len()` bytes, distinguishing "hit EOF before any
/// byte was read" (a clean end of stream) from "hit EOF partway
/// through" (corruption, handled by the caller per field).
fn read_exact_or_eof(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<ReadOutcome> {
    let mut read_total = 0;
    while read_total < buf.len() {
        match file.read(&mut buf[read_total..]) {
            Ok(0) => {
                return if read_total == 0 {
                    Ok(ReadOutcome::Eof)
                } else {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "truncated record",
                    ))
                }
            }
            Ok(n) => read_total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(ReadOutcome::Full)
}

#[cfg(test)]
mod tests {
    use crate::store::Store;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.hash");

        let s1 = Store::<i32, i32>::new("a");
        for k in 1..=6 {
            s1.set(k, k * 100);
        }
        s1.save(&path).unwrap();

        let s2 = Store::<i32, i32>::new("b");
        s2.load(&path).unwrap();
        assert_eq!(s2.count(), 6);
        for k in 1..=6 {
            assert_eq!(s2.get(&k), Some(k * 100));
        }
    }

    #[test]
    fn corrupted_header_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.hash");

        let s1 = Store::<i32, i32>::new("a");
        s1.set(1, 1);
        s1.save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        bytes[1] ^= 0xFF;
        bytes[2] ^= 0xFF;
        bytes[3] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let s2 = Store::<i32, i32>::new("b");
        assert!(s2.load(&path).is_err());
    }

    #[test]
    fn truncated_value_is_a_hard_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.hash");

        let s1 = Store::<i32, i32>::new("a");
        s1.set(1, 1);
        s1.save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 2); // chop into the value field
        std::fs::write(&path, bytes).unwrap();

        let s2 = Store::<i32, i32>::new("b");
        assert!(s2.load(&path).is_err());
    }
}
