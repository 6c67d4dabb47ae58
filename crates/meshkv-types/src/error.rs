use thiserror::Error;

/// Errors raised while encoding or decoding a fixed-width key or value.
///
/// These never cross the public `meshkv` API as-is (§7's error
/// taxonomy): callers see a boolean or `Option`, while a `CodecError`
/// is logged at the point it is swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer too short: need {needed} bytes, got {got}")]
    BufferTooShort { needed: usize, got: usize },

    #[error("value too large for its declared size: {len} bytes exceed the {cap}-byte cap")]
    ValueTooLarge { len: usize, cap: usize },

    #[error("invalid utf-8 in a fixed-width string field")]
    InvalidUtf8,
}
