//! Type descriptors and codecs shared across the `meshkv` crates.
//!
//! This crate is Component A: it carries no storage or networking
//! logic of its own, only the per-type behaviours (naming, sizing,
//! fixed-width encode/decode, ordering) that the storage engine and
//! replication engine both build on.

pub mod codec;
pub mod error;
pub mod hash;
pub mod short_string;
pub mod timestamp;

pub use codec::{StoreKey, StoreValue, TypeCodec};
pub use error::CodecError;
pub use hash::{identity_tag, py_hash};
pub use short_string::{ShortString, SHORT_STRING_CAP};
pub use timestamp::Timestamp;
