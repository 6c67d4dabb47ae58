//! The identity-tag hash (§6.3).
//!
//! This is the wire- and snapshot-compatibility anchor: any two stores
//! built from the same `(K::type_name(), V::type_name())` pair must
//! derive the same `id`, bit-for-bit, or they silently can't talk to
//! each other. The rolling-multiply step below is reproduced
//! bit-exactly, including the `-1 -> -2` wrap.

/// One pass of the rolling hash over `data`, seeded with `seed`.
///
/// `seed` is mixed with the first byte of `data` before the rolling
/// multiply begins, matching the `x = x | (first_byte << 7)` initial
/// step in §6.3.
pub fn py_hash(seed: u32, data: &[u8]) -> u32 {
    let mut x = seed;
    if let Some(&first) = data.first() {
        x |= (first as u32).wrapping_shl(7);
    }
    for &b in data {
        x = 1_000_003u32.wrapping_mul(x) ^ (b as u32);
    }
    x ^= data.len() as u32;
    if x == 0xFFFF_FFFF {
        x = 0xFFFF_FFFE;
    }
    x
}

/// Computes a store's identity tag from its key and value type names
/// and declared sizes, per §6.3: the key name is hashed first with a
/// seed of `2 * key_size`, then the value name is hashed using the
/// key hash as its seed.
pub fn identity_tag(key_name: &str, key_size: usize, value_name: &str) -> u32 {
    let seed = (2 * key_size) as u32;
    let after_key = py_hash(seed, key_name.as_bytes());
    py_hash(after_key, value_name.as_bytes())
}
