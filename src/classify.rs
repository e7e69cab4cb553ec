// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - Generation & Level Classifiers
//
// Generation: number of Plata+ distributors strictly between the root and a
// node (neither the root nor the node itself counts), capped at G4.
// Level: raw sponsorship depth, capped at ML3.
//
// Both are pure functions of the tree; results are kept beside the tree
// (indexed by arena slot) so one tree can be classified under several
// hypothetical cut assignments.

use serde::{Deserialize, Serialize};

use crate::config::{MAX_GENERATION, MAX_LEVEL};
use crate::tree::{NetworkTree, NodeIdx, ROOT};
use crate::types::DistributorId;

/// Per-node classification for one tree. Slot `ROOT` holds zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Uncapped Plata+ ancestor count.
    cuts_above: Vec<u32>,
    generation: Vec<u8>,
    level: Vec<u8>,
}

impl Classification {
    pub fn generation(&self, idx: NodeIdx) -> u8 {
        self.generation[idx]
    }

    pub fn level(&self, idx: NodeIdx) -> u8 {
        self.level[idx]
    }

    pub fn cuts_above(&self, idx: NodeIdx) -> u32 {
        self.cuts_above[idx]
    }

    /// Generation the node would have if one of its cutting ancestors
    /// did not exist.
    pub fn generation_without_one_cut(&self, idx: NodeIdx) -> u8 {
        cap_generation(self.cuts_above[idx].saturating_sub(1))
    }

    pub fn generation_of(&self, tree: &NetworkTree, id: DistributorId) -> Option<u8> {
        tree.index_of(id).filter(|&i| i != ROOT).map(|i| self.generation[i])
    }

    pub fn level_of(&self, tree: &NetworkTree, id: DistributorId) -> Option<u8> {
        tree.index_of(id).filter(|&i| i != ROOT).map(|i| self.level[i])
    }

    pub fn len(&self) -> usize {
        self.generation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generation.len() <= 1
    }
}

fn cap_generation(cuts: u32) -> u8 {
    cuts.min(MAX_GENERATION as u32) as u8
}

fn cap_level(depth: u32) -> u8 {
    depth.min(MAX_LEVEL as u32) as u8
}

/// Classify every node by generation and level in one traversal.
pub fn classify(tree: &NetworkTree) -> Classification {
    classify_with_cuts(tree, |idx| tree.node(idx).rank.is_plata_plus())
}

/// Classify with an explicit cut predicate (which non-root nodes push
/// their descendants one generation further out).
pub fn classify_with_cuts(tree: &NetworkTree, creates_cut: impl Fn(NodeIdx) -> bool) -> Classification {
    let n = tree.len();
    let mut cuts_above = vec![0u32; n];
    let mut generation = vec![0u8; n];
    let mut level = vec![0u8; n];

    // Depth-first; the value carried on the stack is the cut count that
    // applies to the popped node's children.
    let mut stack: Vec<(NodeIdx, u32)> = vec![(ROOT, 0)];
    while let Some((idx, below)) = stack.pop() {
        for &child in tree.node(idx).children.iter().rev() {
            cuts_above[child] = below;
            generation[child] = cap_generation(below);
            level[child] = cap_level(tree.node(child).depth);
            let carry = if creates_cut(child) { below + 1 } else { below };
            stack.push((child, carry));
        }
    }

    Classification { cuts_above, generation, level }
}

/// Generation only, as `(id, generation)` pairs for every downline node.
pub fn classify_generations(tree: &NetworkTree) -> Vec<(DistributorId, u8)> {
    let c = classify(tree);
    tree.downline().map(|i| (tree.node(i).id, c.generation(i))).collect()
}

/// Level only, as `(id, level)` pairs for every downline node.
pub fn classify_levels(tree: &NetworkTree) -> Vec<(DistributorId, u8)> {
    tree.downline()
        .map(|i| (tree.node(i).id, cap_level(tree.node(i).depth)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
