//! Ed25519 key generation.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use seal_types::{KeyPair, PrivateKey, PublicKey};

/// Generate a new key pair from the OS random source.
pub fn generate_keypair() -> KeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    PublicKey(SigningKey::from_bytes(&private.0).verifying_key().to_bytes())
}

/// Rebuild a full key pair from a private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

/// Deterministic key pair from a 32-byte seed. Node identities are
/// configured this way.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_from_private(PrivateKey(*seed))
}
