//! Digests used for content addressing and privacy-group ids.

use sha2::{Digest, Sha256, Sha512_256};

/// SHA-512/256 over a sealed bundle's ciphertext
pub fn payload_digest(cipher_text: &[u8]) -> [u8; 32] {
    Sha512_256::digest(cipher_text).into()
}

/// SHA-256 over the concatenation of `parts`
pub fn sha256_concat<'a, I>(parts: I) -> [u8; 32]
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_digest_is_deterministic() {
        assert_eq!(payload_digest(b"abc"), payload_digest(b"abc"));
        assert_ne!(payload_digest(b"abc"), payload_digest(b"abd"));
    }

    #[test]
    fn test_sha256_concat_matches_single_update() {
        let joined = sha256_concat([b"ab".as_slice(), b"cd".as_slice()]);
        let single: [u8; 32] = Sha256::digest(b"abcd").into();
        assert_eq!(joined, single);
    }
}
