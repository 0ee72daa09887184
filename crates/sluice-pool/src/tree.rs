//! local merkle ledger
//!
//! the remote ledger is append-only; this tree is rebuilt client-side
//! from indexed leaf-insertion events. every rebuild recomputes all
//! layers bottom-up. O(n) per rebuild, but batches are small and root
//! consistency matters more than asymptotics at this scale.

use crate::hash::poseidon2;
use crate::Commitment;

/// tree rebuild state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// new leaves are known but not yet folded in
    Stale,
    /// a rebuild is in progress
    Building,
    /// layers match the indexed leaf set
    Current,
}

/// merkle inclusion proof against the local root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// sibling at each level, leaf to root
    pub path_elements: Vec<[u8; 32]>,
    /// 0 = leaf is the left child at that level, 1 = right
    pub path_indices: Vec<u8>,
    pub root: [u8; 32],
}

impl MerkleProof {
    /// fold the path from `leaf` and check it reproduces the claimed root
    pub fn verify(&self, leaf: &Commitment) -> bool {
        let mut current = leaf.to_bytes();
        for (sibling, bit) in self.path_elements.iter().zip(&self.path_indices) {
            current = if *bit == 0 {
                poseidon2(&current, sibling)
            } else {
                poseidon2(sibling, &current)
            };
        }
        current == self.root
    }
}

/// append-only commitment tree, fixed height, padded with zero subtrees
pub struct MerkleLedger {
    /// layers[0] = leaves, layers[height] = root layer
    layers: Vec<Vec<[u8; 32]>>,
    /// zeros[i] = root of an empty subtree of height i
    zeros: Vec<[u8; 32]>,
    height: usize,
    freshness: Freshness,
}

impl MerkleLedger {
    /// empty ledger; zero subtrees are precomputed once
    pub fn new(height: usize) -> Self {
        let mut zeros = Vec::with_capacity(height + 1);
        zeros.push([0u8; 32]);
        for i in 1..=height {
            let below = zeros[i - 1];
            zeros.push(poseidon2(&below, &below));
        }
        Self {
            layers: vec![Vec::new(); height + 1],
            zeros,
            height,
            freshness: Freshness::Stale,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// flag that the indexed leaf set has moved past this tree
    pub fn mark_stale(&mut self) {
        self.freshness = Freshness::Stale;
    }

    /// zero-subtree root for a level
    pub fn zero_at(&self, level: usize) -> [u8; 32] {
        self.zeros[level]
    }

    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    /// rebuild every layer from the full ordered leaf set
    ///
    /// positions with no indexed commitment must be passed as the
    /// all-zero leaf so later leaves keep their remote indices.
    pub fn rebuild(&mut self, leaves: Vec<[u8; 32]>) {
        self.freshness = Freshness::Building;

        let mut layers = vec![Vec::new(); self.height + 1];
        layers[0] = leaves;

        for level in 1..=self.height {
            let prev = std::mem::take(&mut layers[level - 1]);
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            for pair in prev.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(self.zeros[level - 1]);
                next.push(poseidon2(&left, &right));
            }
            layers[level - 1] = prev;
            layers[level] = next;
        }

        self.layers = layers;
        self.freshness = Freshness::Current;
    }

    /// current root: top layer node, or the empty-tree root
    pub fn root(&self) -> [u8; 32] {
        self.layers[self.height]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.height])
    }

    /// inclusion proof for the leaf at `index`
    ///
    /// at each level the sibling is the node at `index ^ 1`, or the
    /// level's zero value when that sibling is beyond the populated
    /// range. returns None when the index is outside the leaf set.
    pub fn proof(&self, index: u64) -> Option<MerkleProof> {
        let mut idx = index as usize;
        if idx >= self.layers[0].len() {
            return None;
        }

        let mut path_elements = Vec::with_capacity(self.height);
        let mut path_indices = Vec::with_capacity(self.height);

        for level in 0..self.height {
            path_indices.push((idx & 1) as u8);
            let sibling_idx = idx ^ 1;
            let sibling = self.layers[level]
                .get(sibling_idx)
                .copied()
                .unwrap_or(self.zeros[level]);
            path_elements.push(sibling);
            idx >>= 1;
        }

        Some(MerkleProof {
            path_elements,
            path_indices,
            root: self.root(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::poseidon2;

    /// independent root computation over the same zero-subtree convention
    fn reference_root(leaves: &[[u8; 32]], height: usize) -> [u8; 32] {
        let mut zeros = vec![[0u8; 32]];
        for i in 1..=height {
            let below = zeros[i - 1];
            zeros.push(poseidon2(&below, &below));
        }
        if leaves.is_empty() {
            return zeros[height];
        }
        let mut level: Vec<[u8; 32]> = leaves.to_vec();
        for h in 1..=height {
            let mut next = Vec::new();
            for i in 0..level.len().div_ceil(2) {
                let left = level[i * 2];
                let right = if i * 2 + 1 < level.len() {
                    level[i * 2 + 1]
                } else {
                    zeros[h - 1]
                };
                next.push(poseidon2(&left, &right));
            }
            level = next;
        }
        level[0]
    }

    #[test]
    fn test_empty_root_is_zero_subtree() {
        let tree = MerkleLedger::new(8);
        assert_eq!(tree.root(), tree.zero_at(8));
        assert!(tree.proof(0).is_none());
    }

    #[test]
    fn test_root_matches_reference() {
        for n in [1usize, 2, 3, 5, 8, 13] {
            let leaves: Vec<[u8; 32]> = (0..n).map(|i| [i as u8 + 1; 32]).collect();
            let mut tree = MerkleLedger::new(8);
            tree.rebuild(leaves.clone());
            assert_eq!(tree.root(), reference_root(&leaves, 8), "n = {}", n);
        }
    }

    #[test]
    fn test_proofs_verify_for_every_leaf() {
        let leaves: Vec<[u8; 32]> = (0..5).map(|i| [i as u8 + 1; 32]).collect();
        let mut tree = MerkleLedger::new(8);
        tree.rebuild(leaves.clone());

        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.proof(i as u64).unwrap();
            assert_eq!(proof.path_elements.len(), 8);
            assert_eq!(proof.path_indices.len(), 8);
            assert!(proof.verify(&Commitment(*leaf)), "leaf {}", i);
        }

        // wrong leaf must not verify
        let proof = tree.proof(0).unwrap();
        assert!(!proof.verify(&Commitment(leaves[1])));
    }

    #[test]
    fn test_zero_sentinel_leaves() {
        // position 1 unindexed: padded with the zero leaf
        let leaves = vec![[1u8; 32], [0u8; 32], [3u8; 32]];
        let mut tree = MerkleLedger::new(8);
        tree.rebuild(leaves);

        let proof = tree.proof(2).unwrap();
        assert!(proof.verify(&Commitment([3u8; 32])));
    }

    #[test]
    fn test_freshness_transitions() {
        let mut tree = MerkleLedger::new(4);
        assert_eq!(tree.freshness(), Freshness::Stale);
        tree.rebuild(vec![[1u8; 32]]);
        assert_eq!(tree.freshness(), Freshness::Current);
        tree.mark_stale();
        assert_eq!(tree.freshness(), Freshness::Stale);
    }

    #[test]
    fn test_rebuild_replaces_previous_state() {
        let mut tree = MerkleLedger::new(8);
        tree.rebuild(vec![[1u8; 32]]);
        let root_one = tree.root();
        tree.rebuild(vec![[1u8; 32], [2u8; 32]]);
        assert_ne!(tree.root(), root_one);
        assert_eq!(tree.leaf_count(), 2);
    }
}
