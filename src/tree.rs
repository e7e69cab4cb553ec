// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - Network Tree
//
// Arena representation of a sponsorship downline for one period. Nodes live in
// a flat Vec in breadth-first order (a parent always precedes its children),
// referenced by index; cloning the tree copies the arena, never a pointer graph.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PointBasis;
use crate::error::{EngineError, Entity, Result};
use crate::source::NetworkSource;
use crate::types::{DistributorId, DistributorRecord, PeriodId, Points, Rank};

pub type NodeIdx = usize;

/// The root always sits at index 0.
pub const ROOT: NodeIdx = 0;

// ─── DistributorNode ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorNode {
    pub id: DistributorId,
    pub full_name: String,
    pub rank: Rank,
    pub personal_points: Points,
    pub group_points: Points,
    /// Arena index of the direct sponsor; `None` for the root.
    pub sponsor: Option<NodeIdx>,
    /// Directly sponsored nodes, in source order.
    pub children: Vec<NodeIdx>,
    /// Raw sponsorship hops from the root (root = 0).
    pub depth: u32,
    /// Injected by a simulation rather than read from the source.
    #[serde(default)]
    pub synthetic: bool,
}

impl DistributorNode {
    /// Points that earn commission under the configured basis.
    pub fn commission_points(&self, basis: PointBasis) -> Points {
        match basis {
            PointBasis::Business => self.group_points,
            PointBasis::Personal => self.personal_points,
        }
    }
}

// ─── Diagnostics ────────────────────────────────────────────────────────────

/// Degraded source data that was tolerated rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataDiagnostic {
    /// Row had no plan; defaulted to the lowest rank.
    MissingRank { id: DistributorId },
    /// Plan name outside the ladder; defaulted to the lowest rank.
    UnknownRank { id: DistributorId, name_plan: String },
    /// Second row for an id already seen; the first row wins.
    DuplicateRow { id: DistributorId },
    /// Sponsorship edge pointing back into the visited tree; edge dropped.
    CycleBroken { id: DistributorId },
}

// ─── NetworkTree ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NetworkTree {
    period_id: PeriodId,
    nodes: Vec<DistributorNode>,
    index: HashMap<DistributorId, NodeIdx>,
    diagnostics: Vec<DataDiagnostic>,
    /// Depth limit applied when building, `None` for the full downline.
    max_depth: Option<u32>,
}

impl NetworkTree {
    /// Assemble a tree from a bulk row fetch.
    ///
    /// Rows unrelated to `root_id` are ignored. `max_depth` limits the
    /// traversal (visualisation); pass `None` for the full downline.
    pub fn from_records(
        root_id: DistributorId,
        period_id: PeriodId,
        records: Vec<DistributorRecord>,
        max_depth: Option<u32>,
    ) -> Result<Self> {
        if max_depth == Some(0) {
            return Err(EngineError::invalid("max depth must be at least 1"));
        }

        let mut diagnostics = Vec::new();
        let mut by_id: HashMap<DistributorId, DistributorRecord> = HashMap::with_capacity(records.len());
        let mut sponsored: HashMap<DistributorId, Vec<DistributorId>> = HashMap::new();
        for rec in records {
            if by_id.contains_key(&rec.id_customers) {
                diagnostics.push(DataDiagnostic::DuplicateRow { id: rec.id_customers });
                continue;
            }
            if let Some(sponsor) = rec.id_sponsor {
                sponsored.entry(sponsor).or_default().push(rec.id_customers);
            }
            by_id.insert(rec.id_customers, rec);
        }

        let root_rec = by_id
            .remove(&root_id)
            .ok_or_else(|| EngineError::not_found(Entity::Distributor, root_id))?;

        let mut tree = NetworkTree {
            period_id,
            nodes: Vec::new(),
            index: HashMap::new(),
            diagnostics: Vec::new(),
            max_depth,
        };
        tree.push_record(root_rec, None, 0, &mut diagnostics);

        let mut queue = VecDeque::from([ROOT]);
        let mut visited: HashSet<DistributorId> = HashSet::from([root_id]);
        while let Some(parent) = queue.pop_front() {
            let depth = tree.nodes[parent].depth + 1;
            if max_depth.is_some_and(|limit| depth > limit) {
                continue;
            }
            let parent_id = tree.nodes[parent].id;
            let Some(child_ids) = sponsored.get(&parent_id) else { continue };
            for child_id in child_ids {
                if !visited.insert(*child_id) {
                    diagnostics.push(DataDiagnostic::CycleBroken { id: *child_id });
                    continue;
                }
                let Some(rec) = by_id.remove(child_id) else { continue };
                let idx = tree.push_record(rec, Some(parent), depth, &mut diagnostics);
                queue.push_back(idx);
            }
        }

        for diag in &diagnostics {
            warn!(root_id = %root_id, period_id = %period_id, ?diag, "tolerated degraded network row");
        }
        tree.diagnostics = diagnostics;
        debug!(
            root_id = %root_id,
            period_id = %period_id,
            nodes = tree.nodes.len(),
            ignored_rows = by_id.len(),
            "network tree assembled"
        );
        Ok(tree)
    }

    fn push_record(
        &mut self,
        rec: DistributorRecord,
        sponsor: Option<NodeIdx>,
        depth: u32,
        diagnostics: &mut Vec<DataDiagnostic>,
    ) -> NodeIdx {
        let rank = match rec.name_plan.as_deref() {
            None => {
                diagnostics.push(DataDiagnostic::MissingRank { id: rec.id_customers });
                Rank::default()
            }
            Some(name) => Rank::from_plan_name(name).unwrap_or_else(|| {
                diagnostics.push(DataDiagnostic::UnknownRank {
                    id: rec.id_customers,
                    name_plan: name.to_string(),
                });
                Rank::default()
            }),
        };
        self.push_node(DistributorNode {
            id: rec.id_customers,
            full_name: rec.full_name,
            rank,
            personal_points: rec.point_current_customers,
            group_points: rec.point_business_customers,
            sponsor,
            children: Vec::new(),
            depth,
            synthetic: false,
        })
    }

    fn push_node(&mut self, node: DistributorNode) -> NodeIdx {
        let idx = self.nodes.len();
        if let Some(parent) = node.sponsor {
            self.nodes[parent].children.push(idx);
        }
        self.index.insert(node.id, idx);
        self.nodes.push(node);
        idx
    }

    // ── Accessors ──

    pub fn period_id(&self) -> PeriodId {
        self.period_id
    }

    pub fn root(&self) -> &DistributorNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, idx: NodeIdx) -> &DistributorNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[DistributorNode] {
        &self.nodes
    }

    pub fn index_of(&self, id: DistributorId) -> Option<NodeIdx> {
        self.index.get(&id).copied()
    }

    /// Total nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of downline distributors (root excluded).
    pub fn downline_len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn has_downline(&self) -> bool {
        self.nodes.len() > 1
    }

    pub fn diagnostics(&self) -> &[DataDiagnostic] {
        &self.diagnostics
    }

    pub fn max_depth_limit(&self) -> Option<u32> {
        self.max_depth
    }

    /// Deepest raw depth present in the tree.
    pub fn network_depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Arena indices of every non-root node, parents before children.
    pub fn downline(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        1..self.nodes.len()
    }

    /// Direct children of the root (ML1 frontals).
    pub fn frontals(&self) -> &[NodeIdx] {
        &self.nodes[ROOT].children
    }

    /// Strict descendants of `idx` in depth-first pre-order.
    pub fn descendants(&self, idx: NodeIdx) -> Vec<NodeIdx> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIdx> = self.nodes[idx].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev().copied());
        }
        out
    }

    /// Sum of `group_points` over the strict descendants of `idx`.
    pub fn branch_points(&self, idx: NodeIdx) -> Points {
        self.descendants(idx).into_iter().map(|d| self.nodes[d].group_points).sum()
    }

    // ── Mutation (simulation copies only) ──

    /// Attach a synthetic leaf under `parent`.
    pub(crate) fn attach_synthetic(
        &mut self,
        parent: NodeIdx,
        id: DistributorId,
        full_name: String,
        points: Points,
    ) -> NodeIdx {
        let depth = self.nodes[parent].depth + 1;
        self.push_node(DistributorNode {
            id,
            full_name,
            rank: Rank::Distribuidor,
            personal_points: points,
            group_points: points,
            sponsor: Some(parent),
            children: Vec::new(),
            depth,
            synthetic: true,
        })
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIdx) -> &mut DistributorNode {
        &mut self.nodes[idx]
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut DistributorNode> {
        self.nodes.iter_mut()
    }

    /// First id above every id in the tree, for synthetic nodes.
    pub(crate) fn next_free_id(&self) -> DistributorId {
        let max = self.nodes.iter().map(|n| n.id.0).max().unwrap_or(0);
        DistributorId(max.saturating_add(1))
    }
}

// ─── Builder entry points ───────────────────────────────────────────────────

/// Full-downline tree for aggregation (classification must see every node).
pub fn build_full_tree<S: NetworkSource + ?Sized>(
    source: &S,
    root_id: DistributorId,
    period_id: PeriodId,
) -> Result<NetworkTree> {
    fetch_and_build(source, root_id, period_id, None)
}

/// Depth-limited tree for visualisation; `max_depth >= 1`.
pub fn build_tree<S: NetworkSource + ?Sized>(
    source: &S,
    root_id: DistributorId,
    period_id: PeriodId,
    max_depth: u32,
) -> Result<NetworkTree> {
    if max_depth == 0 {
        return Err(EngineError::invalid("max depth must be at least 1"));
    }
    fetch_and_build(source, root_id, period_id, Some(max_depth))
}

fn fetch_and_build<S: NetworkSource + ?Sized>(
    source: &S,
    root_id: DistributorId,
    period_id: PeriodId,
    max_depth: Option<u32>,
) -> Result<NetworkTree> {
    if source.period(period_id)?.is_none() {
        return Err(EngineError::not_found(Entity::Period, period_id));
    }
    let rows = source.network_rows(root_id, period_id)?;
    NetworkTree::from_records(root_id, period_id, rows, max_depth)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
