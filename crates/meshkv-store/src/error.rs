use meshkv_types::CodecError;
use thiserror::Error;

/// Errors from the storage engine's I/O-facing operations (§6.4, §7).
///
/// Core mutation operations (`set`, `del`, `item`, …) never return this
/// type: per §4.B's public contract they report success/absence as a
/// plain `bool`/`Option`. `StoreError` exists for `save`/`load`, where
/// the caller legitimately needs to distinguish "file absent" from
/// "header mismatch" from "corrupt record", even though §7 still asks
/// the top-level facade to collapse all three to `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("snapshot identity mismatch: file has {found:#010x}, store expects {expected:#010x}")]
    IdentityMismatch { expected: u32, found: u32 },

    #[error("snapshot truncated: expected a value record after the key but hit EOF")]
    TruncatedValue,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
