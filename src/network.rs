// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - Network Views
//
// Read-only projections of a tree for display: a nested depth-limited view,
// the first-level frontal list and per-depth statistics. `nivel` here is the
// raw sponsorship depth, not the ML1..ML3 commission level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::PointBasis;
use crate::tree::{NetworkTree, NodeIdx, ROOT};
use crate::types::{DistributorId, Points};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: DistributorId,
    pub name: String,
    pub plan: String,
    pub points: Points,
    pub nivel: u32,
    pub children: Vec<NetworkNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFrontal {
    pub id: DistributorId,
    pub name: String,
    pub plan: String,
    pub personal_points: Points,
    pub subnet_size: usize,
    pub subnet_points: Points,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLevelStats {
    pub nivel: u32,
    pub count: usize,
    pub total_points: Points,
}

/// Nested view of the whole tree rooted at the root distributor. Build the
/// tree depth-limited to bound the view.
pub fn network_view(tree: &NetworkTree, basis: PointBasis) -> NetworkNode {
    nest(tree, ROOT, basis)
}

fn nest(tree: &NetworkTree, idx: NodeIdx, basis: PointBasis) -> NetworkNode {
    let node = tree.node(idx);
    NetworkNode {
        id: node.id,
        name: node.full_name.clone(),
        plan: node.rank.plan_name().to_string(),
        points: node.commission_points(basis),
        nivel: node.depth,
        children: node.children.iter().map(|&c| nest(tree, c, basis)).collect(),
    }
}

/// Direct frontals with the size and volume of the subnet under each.
pub fn first_level(tree: &NetworkTree) -> Vec<NetworkFrontal> {
    tree.frontals()
        .iter()
        .map(|&idx| {
            let node = tree.node(idx);
            NetworkFrontal {
                id: node.id,
                name: node.full_name.clone(),
                plan: node.rank.plan_name().to_string(),
                personal_points: node.personal_points,
                subnet_size: tree.descendants(idx).len(),
                subnet_points: tree.branch_points(idx),
            }
        })
        .collect()
}

/// Head-count and volume per raw depth, shallowest first.
pub fn stats_by_level(tree: &NetworkTree, basis: PointBasis) -> Vec<NetworkLevelStats> {
    let mut by_depth: BTreeMap<u32, NetworkLevelStats> = BTreeMap::new();
    for idx in tree.downline() {
        let node = tree.node(idx);
        let entry = by_depth.entry(node.depth).or_insert_with(|| NetworkLevelStats {
            nivel: node.depth,
            count: 0,
            total_points: Points::zero(),
        });
        entry.count += 1;
        entry.total_points += node.commission_points(basis);
    }
    by_depth.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistributorRecord, PeriodId};

    fn rec(id: u64, sponsor: Option<u64>, personal: u64, group: u64) -> DistributorRecord {
        DistributorRecord {
            id_customers: DistributorId(id),
            full_name: format!("D{id}"),
            id_sponsor: sponsor.map(DistributorId),
            name_plan: Some("Bronce".into()),
            point_current_customers: Points::new(personal),
            point_business_customers: Points::new(group),
        }
    }

    fn rows() -> Vec<DistributorRecord> {
        vec![
            rec(1, None, 0, 0),
            rec(2, Some(1), 100, 300),
            rec(3, Some(2), 50, 200),
            rec(4, Some(3), 10, 40),
            rec(5, Some(1), 70, 70),
        ]
    }

    #[test]
    fn depth_limited_view() {
        let tree = NetworkTree::from_records(DistributorId(1), PeriodId(1), rows(), Some(2)).expect("test: tree");
        let view = network_view(&tree, PointBasis::Business);
        assert_eq!(view.children.len(), 2);
        assert_eq!(view.children[0].children[0].nivel, 2);
        assert!(view.children[0].children[0].children.is_empty(), "depth 3 cut off");
    }

    #[test]
    fn frontal_subnets() {
        let tree = NetworkTree::from_records(DistributorId(1), PeriodId(1), rows(), None).expect("test: tree");
        let frontals = first_level(&tree);
        assert_eq!(frontals[0].subnet_size, 2);
        assert_eq!(frontals[0].subnet_points, Points::new(240));
        assert_eq!(frontals[1].subnet_size, 0);
    }

    #[test]
    fn per_depth_stats() {
        let tree = NetworkTree::from_records(DistributorId(1), PeriodId(1), rows(), None).expect("test: tree");
        let stats = stats_by_level(&tree, PointBasis::Personal);
        assert_eq!(stats.len(), 3);
        assert_eq!((stats[0].nivel, stats[0].count, stats[0].total_points), (1, 2, Points::new(170)));
        assert_eq!(stats[2].total_points, Points::new(10));
    }
}
