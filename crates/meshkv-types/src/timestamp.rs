//! `Timestamp`: the FIFO key type from §3.1/§4.A, "lexicographic on
//! `(seconds, nanoseconds)` for timestamps." Comparison only ever looks
//! at these two fields; strict monotonicity across ties is the
//! generator's job (see `meshkv_store::fifo`), not the type's.

use crate::codec::TypeCodec;
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    pub seconds: u64,
    pub nanos: u32,
}

impl Timestamp {
    pub const fn new(seconds: u64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// The current wall-clock time, per `std::time::SystemTime`.
    ///
    /// Returns `None` only if the system clock reports a time before
    /// `UNIX_EPOCH`, which `meshkv_store::fifo::FifoStore::push` treats
    /// as a clock-failure case and reports as `false`.
    pub fn now() -> Option<Self> {
        let duration = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?;
        Some(Self::new(duration.as_secs(), duration.subsec_nanos()))
    }

    /// The smallest timestamp strictly greater than `self`, carrying
    /// into `seconds` when `nanos` overflows. Returns `None` on
    /// `seconds` overflow, the clock-failure case for a FIFO push
    /// that must break a tie.
    pub fn next(self) -> Option<Self> {
        if self.nanos + 1 < 1_000_000_000 {
            Some(Self::new(self.seconds, self.nanos + 1))
        } else {
            self.seconds.checked_add(1).map(|s| Self::new(s, 0))
        }
    }
}

impl TypeCodec for Timestamp {
    fn type_name() -> &'static str {
        "timestamp"
    }

    fn declared_size() -> usize {
        12
    }

    fn encode_fixed(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.len() != 12 {
            return Err(CodecError::BufferTooShort {
                needed: 12,
                got: buf.len(),
            });
        }
        buf[0..8].copy_from_slice(&self.seconds.to_le_bytes());
        buf[8..12].copy_from_slice(&self.nanos.to_le_bytes());
        Ok(())
    }

    fn decode_fixed(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() != 12 {
            return Err(CodecError::BufferTooShort {
                needed: 12,
                got: buf.len(),
            });
        }
        let mut secs_bytes = [0u8; 8];
        secs_bytes.copy_from_slice(&buf[0..8]);
        let mut nanos_bytes = [0u8; 4];
        nanos_bytes.copy_from_slice(&buf[8..12]);
        Ok(Self::new(
            u64::from_le_bytes(secs_bytes),
            u32::from_le_bytes(nanos_bytes),
        ))
    }
}
