//! A transaction body together with the signatures collected over its id.

use crate::{TransactionError, WireTransaction};
use seal_types::{DigitalSignature, PublicKey, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An immutable transaction plus signature set.
///
/// Adding signatures produces a new value; an existing `SignedTransaction` is
/// never modified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    tx: WireTransaction,
    sigs: Vec<DigitalSignature>,
}

impl SignedTransaction {
    pub fn new(tx: WireTransaction, sigs: Vec<DigitalSignature>) -> Self {
        Self { tx, sigs }.deduplicated()
    }

    pub fn id(&self) -> TransactionId {
        self.tx.id()
    }

    pub fn tx(&self) -> &WireTransaction {
        &self.tx
    }

    pub fn sigs(&self) -> &[DigitalSignature] {
        &self.sigs
    }

    /// A copy of this transaction carrying the extra signatures as well.
    ///
    /// A signature that does not verify for this id is dropped when a new
    /// signature by the same key is added.
    pub fn with_additional_signatures(
        &self,
        extra: impl IntoIterator<Item = DigitalSignature>,
    ) -> Self {
        let tx_id = self.id();
        let extra: Vec<DigitalSignature> = extra.into_iter().collect();
        let mut sigs: Vec<DigitalSignature> = self
            .sigs
            .iter()
            .filter(|s| {
                !extra.iter().any(|e| e.by == s.by)
                    || seal_crypto::verify_transaction_signature(&tx_id, s)
            })
            .cloned()
            .collect();
        sigs.extend(extra);
        Self {
            tx: self.tx.clone(),
            sigs,
        }
        .deduplicated()
    }

    /// Keeps the first signature per key.
    fn deduplicated(mut self) -> Self {
        let mut seen = BTreeSet::new();
        self.sigs.retain(|s| seen.insert(s.by));
        self
    }

    /// Keys that have signed, whether or not their signatures are valid.
    pub fn signers(&self) -> BTreeSet<PublicKey> {
        self.sigs.iter().map(|s| s.by).collect()
    }

    /// Check every present signature and that every required key other than
    /// those in `allowed_missing` has signed.
    ///
    /// A signature by a key in `allowed_missing` that does not verify counts
    /// as absent rather than invalid.
    pub fn verify_signatures_except(
        &self,
        allowed_missing: &[PublicKey],
    ) -> Result<(), TransactionError> {
        let tx_id = self.id();
        for sig in &self.sigs {
            if !seal_crypto::verify_transaction_signature(&tx_id, sig) {
                if allowed_missing.contains(&sig.by) {
                    continue;
                }
                return Err(TransactionError::InvalidSignature {
                    tx_id,
                    signer: sig.by,
                });
            }
        }

        let signed = self.signers();
        let missing: Vec<PublicKey> = self
            .tx
            .required_signing_keys()
            .into_iter()
            .filter(|k| !signed.contains(k) && !allowed_missing.contains(k))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TransactionError::SignaturesMissing { tx_id, missing })
        }
    }

    /// Every required signature, the notary's included, is present and valid.
    pub fn verify_required_signatures(&self) -> Result<(), TransactionError> {
        self.verify_signatures_except(&[])
    }

    /// The notary's signature, if present and valid for this id.
    pub fn notary_signature(&self) -> Option<&DigitalSignature> {
        let notary = self.tx.notary.as_ref()?;
        let tx_id = self.id();
        self.sigs.iter().find(|s| {
            s.by == notary.owning_key && seal_crypto::verify_transaction_signature(&tx_id, s)
        })
    }

    /// Whether the transaction must still visit its notary.
    ///
    /// A notary signature that does not verify for this id does not count.
    pub fn needs_notarization(&self) -> bool {
        self.tx.requires_notarization() && self.notary_signature().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionBuilder;
    use seal_crypto::{keypair_from_seed, sign_transaction_id};
    use seal_types::{Party, StateRef, TransactionId};

    fn input() -> StateRef {
        StateRef::new(TransactionId::new([9u8; 32]), 0)
    }

    #[test]
    fn missing_non_notary_signature_is_reported() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let bob = keypair_from_seed(&[2u8; 32]);
        let notary = keypair_from_seed(&[3u8; 32]);
        let notary_party = Party::new(notary.public, "Notary");

        let stx = TransactionBuilder::new(notary_party)
            .add_input(input())
            .add_command("Move", vec![alice.public, bob.public])
            .sign_with(&[&alice]);

        let err = stx
            .verify_signatures_except(&[notary.public])
            .unwrap_err();
        match err {
            TransactionError::SignaturesMissing { missing, .. } => {
                assert_eq!(missing, vec![bob.public]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn notary_may_be_missing_when_excepted() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let notary = keypair_from_seed(&[3u8; 32]);
        let stx = TransactionBuilder::new(Party::new(notary.public, "Notary"))
            .add_input(input())
            .add_command("Move", vec![alice.public])
            .sign_with(&[&alice]);

        assert!(stx.verify_signatures_except(&[notary.public]).is_ok());
        assert!(stx.verify_required_signatures().is_err());
        assert!(stx.needs_notarization());
    }

    #[test]
    fn adding_signatures_returns_new_value() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let notary = keypair_from_seed(&[3u8; 32]);
        let stx = TransactionBuilder::new(Party::new(notary.public, "Notary"))
            .add_input(input())
            .add_command("Move", vec![alice.public])
            .sign_with(&[&alice]);

        let notarised = stx.with_additional_signatures([sign_transaction_id(&stx.id(), &notary)]);
        assert_eq!(stx.sigs().len(), 1);
        assert_eq!(notarised.sigs().len(), 2);
        assert_eq!(notarised.id(), stx.id());
        assert!(notarised.verify_required_signatures().is_ok());
        assert!(!notarised.needs_notarization());
    }

    #[test]
    fn duplicate_signatures_collapse() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let notary = keypair_from_seed(&[3u8; 32]);
        let stx = TransactionBuilder::new(Party::new(notary.public, "Notary"))
            .add_command("Issue", vec![alice.public])
            .sign_with(&[&alice]);
        let again = stx.with_additional_signatures([sign_transaction_id(&stx.id(), &alice)]);
        assert_eq!(again.sigs().len(), 1);
    }

    #[test]
    fn notary_signature_for_another_tx_is_ignored() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let notary = keypair_from_seed(&[3u8; 32]);
        let stx = TransactionBuilder::new(Party::new(notary.public, "Notary"))
            .add_input(input())
            .add_command("Move", vec![alice.public])
            .sign_with(&[&alice]);

        let foreign = sign_transaction_id(&TransactionId::new([0xEE; 32]), &notary);
        let replayed = stx.with_additional_signatures([foreign]);
        assert!(replayed.notary_signature().is_none());
        assert!(replayed.needs_notarization());
        // Absent while the notary is excepted, invalid once it is required.
        assert!(replayed.verify_signatures_except(&[notary.public]).is_ok());
        assert!(matches!(
            replayed.verify_required_signatures(),
            Err(TransactionError::InvalidSignature { .. })
        ));

        let notarised = replayed.with_additional_signatures([sign_transaction_id(&stx.id(), &notary)]);
        assert_eq!(notarised.sigs().len(), 2);
        assert!(notarised.notary_signature().is_some());
        assert!(notarised.verify_required_signatures().is_ok());
    }

    #[test]
    fn invalid_signature_by_required_party_is_rejected() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let notary = keypair_from_seed(&[3u8; 32]);
        let stx = TransactionBuilder::new(Party::new(notary.public, "Notary"))
            .add_input(input())
            .add_command("Move", vec![alice.public])
            .sign_with(&[]);
        let forged = stx.with_additional_signatures([sign_transaction_id(
            &TransactionId::new([0xEE; 32]),
            &alice,
        )]);
        assert!(matches!(
            forged.verify_signatures_except(&[notary.public]),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }
}
