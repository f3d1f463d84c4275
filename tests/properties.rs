//! Property tests for hashing, commitments and proof replay.

use std::collections::BTreeMap;

use cert_proof::core::{DocumentHasher, Hash};
use cert_proof::proof::{
    commit, CertificateVerificationService, CommitmentTree, FieldEvidence, MerkleProof,
    MerkleProofVerifier, PairOrdering, Position, ProofStep, Salt,
};
use proptest::prelude::*;

fn ordering() -> impl Strategy<Value = PairOrdering> {
    prop_oneof![Just(PairOrdering::Sorted), Just(PairOrdering::Positional)]
}

/// Distinct field names with arbitrary values.
fn certificate_fields() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z_]{1,16}", "[ -~]{0,40}", 1..12)
}

fn salt() -> impl Strategy<Value = Option<Salt>> {
    prop::option::of("[0-9a-f]{8,32}").prop_map(|s| s.as_deref().and_then(Salt::parse))
}

proptest! {
    /// Hashing is deterministic and chunking does not change the result.
    #[test]
    fn document_hash_deterministic(bytes in prop::collection::vec(any::<u8>(), 0..4096), buffer in 1usize..512) {
        let whole = DocumentHasher::default().hash(&bytes).unwrap();
        let again = DocumentHasher::default().hash(&bytes).unwrap();
        let streamed = DocumentHasher::new(buffer, Default::default())
            .hash_reader(bytes.as_slice())
            .unwrap();
        prop_assert_eq!(whole, again);
        prop_assert_eq!(whole, streamed);
    }

    /// A non-empty salt always changes the commitment.
    #[test]
    fn salted_differs_from_unsalted(name in "[a-z_]{1,16}", value in "[ -~]{0,40}", raw_salt in "[0-9a-f]{1,32}") {
        let salt = Salt::parse(&raw_salt).unwrap();
        prop_assert_ne!(commit(&name, &value, Some(&salt)), commit(&name, &value, None));
    }

    /// Every proof produced by the tree replays to its root.
    #[test]
    fn tree_proofs_replay(fields in certificate_fields(), salt in salt(), ordering in ordering()) {
        let leaves: Vec<Hash> = fields.iter().map(|(n, v)| commit(n, v, salt.as_ref())).collect();
        let tree = CommitmentTree::build(&leaves, ordering).unwrap();
        let verifier = MerkleProofVerifier::new(ordering);

        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            prop_assert!(verifier.verify(leaf, &proof, &tree.root()));
            let decoded = MerkleProof::decode(&proof.to_wire()).unwrap();
            prop_assert_eq!(decoded, proof);
        }
    }

    /// Flipping any bit of any sibling breaks the proof.
    #[test]
    fn sibling_bit_flip_breaks_proof(
        fields in prop::collection::btree_map("[a-z_]{1,16}", "[ -~]{0,40}", 2..12),
        ordering in ordering(),
        pick in any::<prop::sample::Index>(),
        step_pick in any::<prop::sample::Index>(),
        bit in 0usize..256,
    ) {
        let leaves: Vec<Hash> = fields.iter().map(|(n, v)| commit(n, v, None)).collect();
        let tree = CommitmentTree::build(&leaves, ordering).unwrap();
        let index = pick.index(leaves.len());
        let proof = tree.proof(index).unwrap();

        let mut steps = proof.steps().to_vec();
        let s = step_pick.index(steps.len());
        let mut bytes = *steps[s].sibling.as_bytes();
        bytes[bit / 8] ^= 1 << (bit % 8);
        steps[s] = ProofStep::new(Hash::from_bytes(bytes), steps[s].position);

        let verifier = MerkleProofVerifier::new(ordering);
        prop_assert!(!verifier.verify(&leaves[index], &MerkleProof::new(steps), &tree.root()));
    }

    /// Under positional ordering, flipping a position with distinct operands breaks the proof.
    #[test]
    fn positional_swap_breaks_proof(
        fields in prop::collection::btree_map("[a-z_]{1,16}", "[ -~]{0,40}", 2..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let leaves: Vec<Hash> = fields.iter().map(|(n, v)| commit(n, v, None)).collect();
        let tree = CommitmentTree::build(&leaves, PairOrdering::Positional).unwrap();
        let index = pick.index(leaves.len());
        let proof = tree.proof(index).unwrap();

        // The first step pairs the leaf with a different leaf or itself.
        let first = proof.steps()[0];
        prop_assume!(first.sibling != leaves[index]);

        let mut steps = proof.steps().to_vec();
        steps[0] = ProofStep::new(first.sibling, first.position.flipped());

        let verifier = MerkleProofVerifier::new(PairOrdering::Positional);
        prop_assert!(!verifier.verify(&leaves[index], &MerkleProof::new(steps), &tree.root()));
    }

    /// Under sorted ordering positions do not matter.
    #[test]
    fn sorted_ignores_positions(fields in certificate_fields(), pick in any::<prop::sample::Index>()) {
        let leaves: Vec<Hash> = fields.iter().map(|(n, v)| commit(n, v, None)).collect();
        let tree = CommitmentTree::build(&leaves, PairOrdering::Sorted).unwrap();
        let index = pick.index(leaves.len());
        let steps = tree
            .proof(index)
            .unwrap()
            .steps()
            .iter()
            .map(|s| ProofStep::new(s.sibling, Position::Left))
            .collect();

        let verifier = MerkleProofVerifier::new(PairOrdering::Sorted);
        prop_assert!(verifier.verify(&leaves[index], &MerkleProof::new(steps), &tree.root()));
    }

    /// verify_all is idempotent and agrees with per-field verification.
    #[test]
    fn verify_all_idempotent(fields in certificate_fields(), salt in salt()) {
        let leaves: Vec<Hash> = fields.iter().map(|(n, v)| commit(n, v, salt.as_ref())).collect();
        let tree = CommitmentTree::build(&leaves, PairOrdering::Sorted).unwrap();
        let evidence: BTreeMap<String, FieldEvidence> = fields
            .iter()
            .enumerate()
            .map(|(i, (n, v))| (n.clone(), FieldEvidence::new(v.clone(), tree.proof(i).unwrap().to_wire())))
            .collect();

        let service = CertificateVerificationService::default();
        let first = service.verify_all(&evidence, salt.as_ref(), &tree.root());
        let second = service.verify_all(&evidence, salt.as_ref(), &tree.root());
        prop_assert_eq!(&first, &second);
        prop_assert!(first.values().all(|o| o.matched));
    }
}

#[tokio::test]
async fn test_concurrent_verify_all_matches_sequential() {
    let fields: Vec<(String, String)> = (0..9)
        .map(|i| (format!("field_{i}"), format!("value {i}")))
        .collect();
    let salt = Salt::parse("dead-beef");
    let leaves: Vec<Hash> = fields
        .iter()
        .map(|(n, v)| commit(n, v, salt.as_ref()))
        .collect();
    let tree = CommitmentTree::build(&leaves, PairOrdering::Sorted).unwrap();

    let mut evidence: BTreeMap<String, FieldEvidence> = fields
        .iter()
        .enumerate()
        .map(|(i, (n, v))| (n.clone(), FieldEvidence::new(v.clone(), tree.proof(i).unwrap().to_wire())))
        .collect();
    // One tampered value, one malformed proof.
    evidence.get_mut("field_2").unwrap().value = "tampered".to_string();
    evidence.get_mut("field_5").unwrap().proof[0].position = "middle".to_string();

    let service = CertificateVerificationService::default();
    let sequential = service.verify_all(&evidence, salt.as_ref(), &tree.root());
    let concurrent = service
        .verify_all_concurrent(evidence, salt, tree.root())
        .await
        .unwrap();

    assert_eq!(sequential, concurrent);
    assert!(!concurrent["field_2"].matched && concurrent["field_2"].was_evaluated());
    assert!(!concurrent["field_5"].was_evaluated());
    assert_eq!(concurrent.values().filter(|o| o.matched).count(), 7);
}
