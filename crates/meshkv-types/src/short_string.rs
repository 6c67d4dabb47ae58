//! `ShortString`: the capped, fixed-width string key/value from §3.2,
//! "for variable-sized string keys the size is `strlen + 1`, capped at
//! 80 bytes". The cap is not a tuning knob; it's part of the wire and
//! snapshot contract, so it's a `const`, not a field.

use crate::codec::TypeCodec;
use crate::error::CodecError;
use std::fmt;

/// The contractual cap from §3.2 (`strlen + 1`, capped at 80 bytes).
pub const SHORT_STRING_CAP: usize = 80;

/// A string key/value whose encoded form is always exactly
/// [`SHORT_STRING_CAP`] bytes: the UTF-8 bytes followed by a NUL
/// terminator and zero padding, mirroring the C string semantics the
/// cap was originally sized for.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShortString(String);

impl ShortString {
    /// Builds a `ShortString`, failing if the UTF-8 encoding plus its
    /// NUL terminator would not fit in the cap.
    pub fn new(s: impl Into<String>) -> Result<Self, CodecError> {
        let s = s.into();
        if s.len() + 1 > SHORT_STRING_CAP {
            return Err(CodecError::ValueTooLarge {
                len: s.len() + 1,
                cap: SHORT_STRING_CAP,
            });
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortString({:?})", self.0)
    }
}

impl fmt::Display for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for ShortString {
    type Error = CodecError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for ShortString {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TypeCodec for ShortString {
    fn type_name() -> &'static str {
        "short_string"
    }

    fn declared_size() -> usize {
        SHORT_STRING_CAP
    }

    fn encode_fixed(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.len() != SHORT_STRING_CAP {
            return Err(CodecError::BufferTooShort {
                needed: SHORT_STRING_CAP,
                got: buf.len(),
            });
        }
        let bytes = self.0.as_bytes();
        if bytes.len() + 1 > SHORT_STRING_CAP {
            return Err(CodecError::ValueTooLarge {
                len: bytes.len() + 1,
                cap: SHORT_STRING_CAP,
            });
        }
        buf.fill(0);
        buf[..bytes.len()].copy_from_slice(bytes);
        // buf[bytes.len()] is the NUL terminator, already zeroed.
        Ok(())
    }

    fn decode_fixed(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() != SHORT_STRING_CAP {
            return Err(CodecError::BufferTooShort {
                needed: SHORT_STRING_CAP,
                got: buf.len(),
            });
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let s = std::str::from_utf8(&buf[..end]).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_fixed_buffer() {
        let s = ShortString::new("k3").unwrap();
        let mut buf = [0xAAu8; SHORT_STRING_CAP];
        s.encode_fixed(&mut buf).unwrap();
        let decoded = ShortString::decode_fixed(&buf).unwrap();
        assert_eq!(decoded.as_str(), "k3");
    }

    #[test]
    fn rejects_strings_that_do_not_fit_the_cap() {
        let too_long = "x".repeat(SHORT_STRING_CAP);
        assert!(ShortString::new(too_long).is_err());
        let just_fits = "x".repeat(SHORT_STRING_CAP - 1);
        assert!(ShortString::new(just_fits).is_ok());
    }

    #[test]
    fn ordering_matches_string_ordering() {
        let a = ShortString::new("k1").unwrap();
        let b = ShortString::new("k3").unwrap();
        assert!(a < b);
    }
}
