//! Deterministic chunk identity.
//!
//! Every chunk maps to a stable integer point key derived from
//! `(namespace, source id, chunk index, part)`. Re-indexing the same
//! logical chunk therefore produces the same key, and upserts merge
//! instead of duplicating — the idempotence guarantee the whole
//! incremental pipeline rests on.
//!
//! The scheme is the legacy 31-polynomial rolling hash over the key
//! string, truncated to a signed 32-bit integer at each step, absolute
//! value taken. It must be reproduced bit-for-bit to stay compatible
//! with already-indexed collections; see [`point_key`] for the pinned
//! reference value. The 32-bit width carries a real collision risk
//! between distinct logical chunks — widening it would redefine key
//! identity for existing data and needs a versioned namespace prefix
//! plus a migration, which this crate does not ship.

/// Compute the point key for a chunk.
///
/// The key string is `"{namespace}:{source_id}:{chunk_index}:{part}"`;
/// the hash is `h = h * 31 + code` per UTF-16 code unit with wrapping
/// i32 arithmetic, and the result is `|h|`.
///
/// Reference value, stable across implementations and restarts:
/// `point_key("protocol", "100", 0, 0) == 385_619_835`.
pub fn point_key(namespace: &str, source_id: &str, chunk_index: u32, part: u32) -> u64 {
    let key = format!("{}:{}:{}:{}", namespace, source_id, chunk_index, part);
    let mut hash: i32 = 0;
    for code in key.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(code as i32);
    }
    hash.unsigned_abs() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_reference_value() {
        // Documented literal; breaking this breaks compatibility with
        // every existing collection.
        assert_eq!(point_key("protocol", "100", 0, 0), 385_619_835);
    }

    #[test]
    fn stable_across_calls() {
        let a = point_key("drucksache", "12345", 7, 2);
        let b = point_key("drucksache", "12345", 7, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn varies_with_every_component() {
        let base = point_key("protocol", "100", 0, 0);
        assert_ne!(base, point_key("drucksache", "100", 0, 0));
        assert_ne!(base, point_key("protocol", "101", 0, 0));
        assert_ne!(base, point_key("protocol", "100", 1, 0));
        assert_ne!(base, point_key("protocol", "100", 0, 1));
    }

    #[test]
    fn adjacent_indices_differ_by_one_in_final_term() {
        // The polynomial form makes neighbouring chunk indices differ in
        // the last term only; keys must still be distinct.
        assert_eq!(
            point_key("protocol", "100", 1, 0),
            point_key("protocol", "100", 0, 0) + 961
        );
    }

    #[test]
    fn negative_intermediate_hash_is_folded_positive() {
        // Long keys overflow i32 and go negative before the final abs.
        let key = point_key("protocol", "999999999999", 4294967295, 4294967295);
        assert!(key <= i32::MAX as u64 + 1);
    }

    #[test]
    fn handles_non_ascii_ids() {
        // UTF-16 code units, not bytes: umlauts hash as single units.
        let a = point_key("drucksache", "Änderung", 0, 0);
        let b = point_key("drucksache", "Anderung", 0, 0);
        assert_ne!(a, b);
    }
}
