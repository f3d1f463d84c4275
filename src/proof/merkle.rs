//! Merkle Proof Replay
//!
//! Replays a leaf-to-root proof path against a field commitment and compares
//! the reconstructed root with the anchored one.
//!
//! Internal nodes hash the **hex text** of their children:
//!
//! ```text
//! node = SHA256( ascii(hex(a)) || ascii(hex(b)) )
//! ```
//!
//! Under [`PairOrdering::Sorted`] (the default, and what anchored certificates
//! use) `a` is the lexicographically smaller hex string, so the step position
//! does not change the result. Under [`PairOrdering::Positional`] the step
//! position alone decides the operand order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::config::ConfigError;
use crate::core::hash::Hash;
use crate::error::{VerifyError, VerifyResult};

/// Which side the sibling occupies relative to the running hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Sibling is the left operand: `(sibling, current)`.
    Left,
    /// Sibling is the right operand: `(current, sibling)`.
    Right,
}

impl Position {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// The opposite side.
    pub fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(format!("unknown position {:?}", other)),
        }
    }
}

/// How the two operands of a node are ordered before hashing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PairOrdering {
    /// Smaller hex string first, regardless of position.
    #[default]
    Sorted,
    /// Operand order taken from the step position.
    Positional,
}

impl FromStr for PairOrdering {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sorted" => Ok(Self::Sorted),
            "positional" => Ok(Self::Positional),
            other => Err(ConfigError::invalid("pair ordering", other)),
        }
    }
}

/// One decoded level of a proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofStep {
    /// Hash of the sibling node at this level.
    pub sibling: Hash,
    /// Side the sibling occupies.
    pub position: Position,
}

impl ProofStep {
    /// Create a step.
    pub fn new(sibling: Hash, position: Position) -> Self {
        Self { sibling, position }
    }
}

/// Proof step exactly as it appears on the wire.
///
/// Kept undecoded inside metadata so that one malformed proof only fails
/// its own field.
/// Missing or mistyped members decode to text and fail in
/// [`RawProofStep::decode`], never during deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProofStep {
    /// Sibling hash, nominally 64 lowercase hex characters.
    #[serde(default, deserialize_with = "lenient_text")]
    pub hash: String,
    /// `"left"` or `"right"`.
    #[serde(default, deserialize_with = "lenient_text")]
    pub position: String,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl RawProofStep {
    /// Decode this step; `index` is only used for the error.
    pub fn decode(&self, index: usize) -> VerifyResult<ProofStep> {
        if self.hash.is_empty() {
            return Err(VerifyError::invalid_step(index, "missing sibling hash"));
        }
        if self.position.is_empty() {
            return Err(VerifyError::invalid_step(index, "missing position"));
        }
        let sibling = Hash::from_hex(&self.hash)
            .map_err(|e| VerifyError::invalid_step(index, format!("sibling hash: {}", e)))?;
        let position = self
            .position
            .parse::<Position>()
            .map_err(|e| VerifyError::invalid_step(index, e))?;
        Ok(ProofStep::new(sibling, position))
    }

    /// Read a step from arbitrary JSON. Anything but an object yields an
    /// empty step that fails to decode.
    pub fn from_json(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

impl From<ProofStep> for RawProofStep {
    fn from(step: ProofStep) -> Self {
        Self {
            hash: step.sibling.to_hex(),
            position: step.position.as_str().to_string(),
        }
    }
}

/// Ordered leaf-to-root proof path. Index 0 is applied first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MerkleProof {
    steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Wrap decoded steps.
    pub fn new(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }

    /// Decode a wire proof. The first malformed step aborts decoding.
    pub fn decode(raw: &[RawProofStep]) -> VerifyResult<Self> {
        let steps = raw
            .iter()
            .enumerate()
            .map(|(i, step)| step.decode(i))
            .collect::<VerifyResult<Vec<_>>>()?;
        Ok(Self { steps })
    }

    /// Decoded steps.
    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True for a proof that claims the leaf is the root.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Wire representation.
    pub fn to_wire(&self) -> Vec<RawProofStep> {
        self.steps.iter().copied().map(RawProofStep::from).collect()
    }
}

/// Hash two nodes in the given order, over their hex text.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left.hex_bytes());
    hasher.update(right.hex_bytes());
    Hash::from_bytes(hasher.finalize().into())
}

/// Combine two nodes whose nominal order is `(left, right)`.
pub fn combine(left: &Hash, right: &Hash, ordering: PairOrdering) -> Hash {
    match ordering {
        PairOrdering::Sorted if right < left => hash_pair(right, left),
        _ => hash_pair(left, right),
    }
}

/// Replays proofs under a single pair-ordering rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MerkleProofVerifier {
    ordering: PairOrdering,
}

impl MerkleProofVerifier {
    /// Create a verifier.
    pub fn new(ordering: PairOrdering) -> Self {
        Self { ordering }
    }

    /// Active ordering rule.
    pub fn ordering(&self) -> PairOrdering {
        self.ordering
    }

    /// Fold the proof over the leaf and return the reconstructed root.
    pub fn compute_root(&self, leaf: &Hash, proof: &MerkleProof) -> Hash {
        let mut current = *leaf;

        for (_i, step) in proof.steps().iter().enumerate() {
            current = match step.position {
                Position::Right => combine(&current, &step.sibling, self.ordering),
                Position::Left => combine(&step.sibling, &current, self.ordering),
            };
            #[cfg(feature = "debug-tracing")]
            trace!(
                step = _i + 1,
                sibling = %step.sibling.short(),
                position = %step.position,
                result = %current.short(),
                "proof step"
            );
        }

        current
    }

    /// True iff the proof takes `leaf` to `expected_root`.
    ///
    /// An empty proof holds exactly when the leaf is the root.
    pub fn verify(&self, leaf: &Hash, proof: &MerkleProof, expected_root: &Hash) -> bool {
        self.compute_root(leaf, proof) == *expected_root
    }

    /// Verify a wire proof against a hex root.
    ///
    /// Malformed steps or a malformed root are errors, never `Ok(false)`.
    pub fn verify_raw(&self, leaf: &Hash, proof: &[RawProofStep], expected_root: &str) -> VerifyResult<bool> {
        let proof = MerkleProof::decode(proof)?;
        let root = Hash::from_hex(expected_root)?;
        Ok(self.verify(leaf, &proof, &root))
    }
}

// =============================================================================
// COMMITMENT TREE (issuer side)
// =============================================================================

/// Binary tree over certificate field commitments.
///
/// Produces the root and per-leaf proofs that [`MerkleProofVerifier`] replays.
/// An odd node at any level is paired with itself.
#[derive(Clone, Debug)]
pub struct CommitmentTree {
    ordering: PairOrdering,
    /// All tree levels (leaves at index 0, root at last index)
    levels: Vec<Vec<Hash>>,
}

impl CommitmentTree {
    /// Build a tree from leaf commitments. Returns `None` for no leaves.
    pub fn build(leaves: &[Hash], ordering: PairOrdering) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }

        let mut levels = vec![leaves.to_vec()];
        let mut current_level = leaves.to_vec();

        while current_level.len() > 1 {
            let next_level: Vec<Hash> = current_level
                .chunks(2)
                .map(|chunk| {
                    let left = &chunk[0];
                    let right = chunk.get(1).unwrap_or(left);
                    combine(left, right, ordering)
                })
                .collect();

            levels.push(next_level.clone());
            current_level = next_level;
        }

        Some(Self { ordering, levels })
    }

    /// Ordering rule the tree was built with.
    pub fn ordering(&self) -> PairOrdering {
        self.ordering
    }

    /// Root hash.
    pub fn root(&self) -> Hash {
        // `build` guarantees at least one level with at least one node.
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Inclusion proof for the leaf at `index`, or `None` if out of bounds.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut steps = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut current_index = index;

        // Walk up the tree, collecting sibling hashes
        for level in &self.levels[..self.levels.len() - 1] {
            let is_left_child = current_index % 2 == 0;
            let sibling_index = if is_left_child {
                current_index + 1
            } else {
                current_index - 1
            };
            let sibling = level.get(sibling_index).unwrap_or(&level[current_index]);
            let position = if is_left_child { Position::Right } else { Position::Left };

            steps.push(ProofStep::new(*sibling, position));
            current_index /= 2;
        }

        Some(MerkleProof::new(steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;

    fn leaves(n: usize) -> Vec<Hash> {
        (0..n).map(|i| sha256(format!("leaf_{}", i).as_bytes())).collect()
    }

    fn raw(hash: &str, position: &str) -> RawProofStep {
        RawProofStep {
            hash: hash.to_string(),
            position: position.to_string(),
        }
    }

    #[test]
    fn test_hash_pair_uses_hex_text() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        let text = format!("{}{}", a.to_hex(), b.to_hex());
        assert_eq!(hash_pair(&a, &b), sha256(text.as_bytes()));
    }

    #[test]
    fn test_sorted_combine_is_commutative() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        assert_eq!(
            combine(&a, &b, PairOrdering::Sorted),
            combine(&b, &a, PairOrdering::Sorted)
        );
        assert_ne!(
            combine(&a, &b, PairOrdering::Positional),
            combine(&b, &a, PairOrdering::Positional)
        );
    }

    #[test]
    fn test_empty_proof_leaf_is_root() {
        let verifier = MerkleProofVerifier::default();
        let leaf = sha256(b"only");
        assert!(verifier.verify(&leaf, &MerkleProof::default(), &leaf));
        assert!(!verifier.verify(&leaf, &MerkleProof::default(), &sha256(b"other")));
    }

    #[test]
    fn test_tree_proofs_verify_for_every_leaf() {
        for ordering in [PairOrdering::Sorted, PairOrdering::Positional] {
            for n in [1, 2, 3, 5, 8, 13] {
                let leaves = leaves(n);
                let tree = CommitmentTree::build(&leaves, ordering).unwrap();
                let verifier = MerkleProofVerifier::new(ordering);
                for (i, leaf) in leaves.iter().enumerate() {
                    let proof = tree.proof(i).unwrap();
                    assert!(
                        verifier.verify(leaf, &proof, &tree.root()),
                        "leaf {} of {} ({:?})", i, n, ordering
                    );
                }
            }
        }
    }

    #[test]
    fn test_single_leaf_tree() {
        let leaves = leaves(1);
        let tree = CommitmentTree::build(&leaves, PairOrdering::Sorted).unwrap();
        assert_eq!(tree.root(), leaves[0]);
        assert!(tree.proof(0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_tree_is_none() {
        assert!(CommitmentTree::build(&[], PairOrdering::Sorted).is_none());
    }

    #[test]
    fn test_proof_out_of_bounds() {
        let tree = CommitmentTree::build(&leaves(3), PairOrdering::Sorted).unwrap();
        assert!(tree.proof(3).is_none());
    }

    #[test]
    fn test_odd_leaf_pairs_with_itself() {
        let leaves = leaves(3);
        let tree = CommitmentTree::build(&leaves, PairOrdering::Sorted).unwrap();
        let proof = tree.proof(2).unwrap();
        assert_eq!(proof.steps()[0].sibling, leaves[2]);
    }

    #[test]
    fn test_wrong_leaf_fails() {
        let leaves = leaves(4);
        let tree = CommitmentTree::build(&leaves, PairOrdering::Sorted).unwrap();
        let proof = tree.proof(0).unwrap();
        let verifier = MerkleProofVerifier::default();
        assert!(!verifier.verify(&sha256(b"wrong"), &proof, &tree.root()));
    }

    #[test]
    fn test_position_swap_fails_under_positional() {
        let leaves = leaves(4);
        let tree = CommitmentTree::build(&leaves, PairOrdering::Positional).unwrap();
        let proof = tree.proof(1).unwrap();
        let verifier = MerkleProofVerifier::new(PairOrdering::Positional);

        let mut steps = proof.steps().to_vec();
        steps[0].position = steps[0].position.flipped();
        let swapped = MerkleProof::new(steps);

        assert!(verifier.verify(&leaves[1], &proof, &tree.root()));
        assert!(!verifier.verify(&leaves[1], &swapped, &tree.root()));
    }

    #[test]
    fn test_raw_decode_rejects_non_hex() {
        let bad = vec![raw(&"g".repeat(64), "left")];
        let err = MerkleProof::decode(&bad).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidProofFormat { step: 0, .. }));
    }

    #[test]
    fn test_raw_decode_rejects_short_hash_and_bad_position() {
        let good = sha256(b"x").to_hex();
        let short = vec![raw(&good, "right"), raw("abc", "right")];
        assert!(matches!(
            MerkleProof::decode(&short),
            Err(VerifyError::InvalidProofFormat { step: 1, .. })
        ));

        let sideways = vec![raw(&good, "up")];
        assert!(matches!(
            MerkleProof::decode(&sideways),
            Err(VerifyError::InvalidProofFormat { step: 0, .. })
        ));
    }

    #[test]
    fn test_raw_decode_normalizes_case() {
        let hash = sha256(b"x");
        let steps = vec![raw(&hash.to_hex().to_uppercase(), "RIGHT")];
        let proof = MerkleProof::decode(&steps).unwrap();
        assert_eq!(proof.steps()[0], ProofStep::new(hash, Position::Right));
        assert_eq!(proof.to_wire()[0], raw(&hash.to_hex(), "right"));
    }

    #[test]
    fn test_verify_raw_rejects_bad_root() {
        let verifier = MerkleProofVerifier::default();
        let leaf = sha256(b"leaf");
        assert!(matches!(
            verifier.verify_raw(&leaf, &[], "nope"),
            Err(VerifyError::InvalidHash(_))
        ));
        assert!(verifier.verify_raw(&leaf, &[], &leaf.to_hex().to_uppercase()).unwrap());
    }

    #[test]
    fn test_position_serde_wire_shape() {
        let json = serde_json::to_string(&Position::Left).unwrap();
        assert_eq!(json, "\"left\"");
        let step: RawProofStep =
            serde_json::from_str(r#"{"hash":"00","position":"right"}"#).unwrap();
        assert_eq!(step.position, "right");
    }
}
