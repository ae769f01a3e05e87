//! Canonical encodings for feeding structured input into a hash or MAC.
//!
//! Works with anything implementing [`Update`], so the same framing is used
//! for plain digests and for keyed MACs.

use sha2::digest::Update;

/// Feeds a byte field with an explicit length prefix.
///
/// Length-prefixing avoids delimiter ambiguities that can otherwise make
/// distinct data serialize to identical byte streams before hashing.
pub(crate) fn hash_field<H: Update>(hasher: &mut H, bytes: &[u8]) {
    let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    hasher.update(&len.to_be_bytes());
    hasher.update(bytes);
}

/// Feeds a fixed-width integer field.
pub(crate) fn hash_u64_field<H: Update>(hasher: &mut H, value: u64) {
    hasher.update(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn digest_hex(hasher: Sha256) -> String {
        format!("{:x}", hasher.finalize())
    }

    #[test]
    fn hash_field_matches_explicit_length_prefix_encoding() {
        let payload = b"a|b\nc";

        let mut via_helper = Sha256::new();
        hash_field(&mut via_helper, payload);

        let mut manual = Sha256::new();
        Digest::update(&mut manual, (payload.len() as u64).to_be_bytes());
        Digest::update(&mut manual, payload);

        assert_eq!(digest_hex(via_helper), digest_hex(manual));
    }

    #[test]
    fn hash_field_prevents_boundary_collision() {
        let mut split_one = Sha256::new();
        hash_field(&mut split_one, b"a");
        hash_field(&mut split_one, b"bc");

        let mut split_two = Sha256::new();
        hash_field(&mut split_two, b"ab");
        hash_field(&mut split_two, b"c");

        assert_ne!(digest_hex(split_one), digest_hex(split_two));
    }

    #[test]
    fn hash_u64_field_matches_manual_big_endian_bytes() {
        let value = 0x0123_4567_89ab_cdef_u64;

        let mut via_helper = Sha256::new();
        hash_u64_field(&mut via_helper, value);

        let mut manual = Sha256::new();
        Digest::update(&mut manual, value.to_be_bytes());

        assert_eq!(digest_hex(via_helper), digest_hex(manual));
    }
}
