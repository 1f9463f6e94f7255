//! # Key Derivation
//!
//! HKDF-SHA256 over X25519 output, with one domain string per purpose.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use super::encryption::{EncryptionKey, KEY_SIZE};
use super::keys::{PrivateKey, PublicKey};
use crate::error::{Error, Result};

/// Domain separation strings for HKDF
pub mod domain {
    /// Wrapping a payload key for one recipient
    pub const PAYLOAD_KEY_WRAP: &[u8] = b"cloak-payload-key-wrap-v1";
}

/// Derive the key that wraps a payload key between `ours` and `theirs`.
///
/// Symmetric: the sender computes it with (sender_private, recipient_public)
/// and the recipient with (recipient_private, sender_public). Low-order
/// public keys are rejected with `InvalidKey`.
pub fn derive_wrap_key(ours: &PrivateKey, theirs: &PublicKey) -> Result<EncryptionKey> {
    let mut shared = ours.diffie_hellman(theirs)?;
    let hkdf = Hkdf::<Sha256>::new(None, &shared);
    shared.zeroize();

    let mut key = [0u8; KEY_SIZE];
    hkdf.expand(domain::PAYLOAD_KEY_WRAP, &mut key)
        .map_err(|_| Error::Internal("HKDF expansion failed".into()))?;

    Ok(EncryptionKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_wrap_key_is_symmetric() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let from_alice = derive_wrap_key(&alice.private, &bob.public).unwrap();
        let from_bob = derive_wrap_key(&bob.private, &alice.public).unwrap();

        assert_eq!(from_alice.as_bytes(), from_bob.as_bytes());
    }

    #[test]
    fn test_wrap_key_differs_per_pair() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let carol = KeyPair::generate();

        let ab = derive_wrap_key(&alice.private, &bob.public).unwrap();
        let ac = derive_wrap_key(&alice.private, &carol.public).unwrap();

        assert_ne!(ab.as_bytes(), ac.as_bytes());
    }

    #[test]
    fn test_wrap_key_refuses_all_zero_key() {
        let alice = KeyPair::generate();
        let zero = PublicKey::from_bytes([0u8; 32]);

        assert!(matches!(derive_wrap_key(&alice.private, &zero), Err(Error::InvalidKey(_))));
    }
}
