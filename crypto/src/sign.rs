//! Ed25519 signing and verification.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use seal_types::{DigitalSignature, KeyPair, PrivateKey, PublicKey, Signature, TransactionId};

/// Sign a message with a private key.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Uses strict verification, which also rejects malleable signatures.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(message, &sig).is_ok()
}

/// Sign a transaction id. The signature is bound to exactly this id and is
/// worthless for any other transaction.
pub fn sign_transaction_id(tx_id: &TransactionId, key: &KeyPair) -> DigitalSignature {
    DigitalSignature {
        by: key.public,
        bytes: sign_message(tx_id.as_bytes(), &key.private),
    }
}

/// Check that `signature` is a valid signature over `tx_id` by `signature.by`.
pub fn verify_transaction_signature(tx_id: &TransactionId, signature: &DigitalSignature) -> bool {
    verify_signature(tx_id.as_bytes(), &signature.bytes, &signature.by)
}
