//! Component A: type descriptors.
//!
//! §9's design note on compile-time generics replaces a C-style
//! `TypeDescriptor` record of function pointers (compare/copy/size/
//! debug) with the target language's own polymorphism. In Rust that's
//! a trait, implemented once per concrete key/value type and
//! dispatched statically through `Store<K, V>`.
//!
//! A type's `declared_size()` is the number of bytes its fixed-width
//! encoding always occupies on the wire and in a snapshot: for scalars
//! that's `size_of::<T>()`; for `ShortString` it's the 80-byte cap from
//! §3.2.

use crate::error::CodecError;

/// The behaviours §4.A asks every concrete type to provide: a stable
/// name (used in the identity hash), a declared fixed size, and a
/// fixed-width encode/decode pair.
pub trait TypeCodec: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Name fed into the identity hash (§6.3). Must be stable across
    /// builds for two stores to interoperate.
    fn type_name() -> &'static str;

    /// Number of bytes `encode_fixed` always writes and `decode_fixed`
    /// always reads.
    fn declared_size() -> usize;

    /// Encodes `self` into `buf`, which is exactly `declared_size()`
    /// bytes long.
    fn encode_fixed(&self, buf: &mut [u8]) -> Result<(), CodecError>;

    /// Decodes a value from `buf`, which is exactly `declared_size()`
    /// bytes long.
    fn decode_fixed(buf: &[u8]) -> Result<Self, CodecError>
    where
        Self: Sized;
}

/// Marker trait for types usable as a store key: in addition to
/// [`TypeCodec`], a key must be totally ordered (the storage engine's
/// binary search relies on it, §4.A) and have a sensible empty-store
/// placeholder.
pub trait StoreKey: TypeCodec + Ord + Default {}
impl<T> StoreKey for T where T: TypeCodec + Ord + Default {}

/// Marker trait for types usable as a store value.
pub trait StoreValue: TypeCodec {}
impl<T> StoreValue for T where T: TypeCodec {}

macro_rules! impl_fixed_int_codec {
    ($t:ty, $name:literal) => {
        impl TypeCodec for $t {
            fn type_name() -> &'static str {
                $name
            }

            fn declared_size() -> usize {
                std::mem::size_of::<$t>()
            }

            fn encode_fixed(&self, buf: &mut [u8]) -> Result<(), CodecError> {
                let bytes = self.to_le_bytes();
                if buf.len() != bytes.len() {
                    return Err(CodecError::BufferTooShort {
                        needed: bytes.len(),
                        got: buf.len(),
                    });
                }
                buf.copy_from_slice(&bytes);
                Ok(())
            }

            fn decode_fixed(buf: &[u8]) -> Result<Self, CodecError> {
                let size = std::mem::size_of::<$t>();
                if buf.len() != size {
                    return Err(CodecError::BufferTooShort {
                        needed: size,
                        got: buf.len(),
                    });
                }
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(buf);
                Ok(<$t>::from_le_bytes(raw))
            }
        }
    };
}

impl_fixed_int_codec!(i32, "i32");
impl_fixed_int_codec!(i64, "i64");
impl_fixed_int_codec!(u32, "u32");
impl_fixed_int_codec!(u64, "u64");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_round_trips() {
        let mut buf = [0u8; 4];
        42i32.encode_fixed(&mut buf).unwrap();
        assert_eq!(i32::decode_fixed(&buf).unwrap(), 42);
    }

    #[test]
    fn i32_rejects_wrong_buffer_size() {
        let mut buf = [0u8; 3];
        assert!(42i32.encode_fixed(&mut buf).is_err());
        assert!(i32::decode_fixed(&[0u8; 5]).is_err());
    }

    #[test]
    fn negative_values_round_trip() {
        let mut buf = [0u8; 8];
        (-123456789i64).encode_fixed(&mut buf).unwrap();
        assert_eq!(i64::decode_fixed(&buf).unwrap(), -123456789i64);
    }
}
