// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Roll-over capping per frontal leg.
//!
//! Each ML1 frontal and its subtree form a leg. A leg may contribute at most
//! `rollover_percent × v_grupal_required` points (for the root's rank) toward
//! group-volume qualification; the excess is the leg's roll-over:
//!
//! ```text
//! gross     = frontal.personal_points + Σ descendant.group_points
//! roll_over = max(0, gross - max_per_leg)
//! effective = gross - roll_over
//! ```
//!
//! Ranks without a group volume requirement are uncapped.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{PlanConfig, RankRollOver};
use crate::tree::NetworkTree;
use crate::types::{percentage_of, DistributorId, Points, Rank};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOverConfig {
    pub v_grupal_required: Decimal,
    pub rollover_percent: Decimal,
    /// `None` when the rank is uncapped.
    pub max_per_leg: Option<Points>,
}

impl RollOverConfig {
    fn resolve(entry: Option<&RankRollOver>) -> Self {
        match entry {
            Some(e) => Self {
                v_grupal_required: e.v_grupal_required,
                rollover_percent: e.rollover_percent,
                max_per_leg: Some(e.max_per_leg()),
            },
            None => Self {
                v_grupal_required: Decimal::ZERO,
                rollover_percent: Decimal::ZERO,
                max_per_leg: None,
            },
        }
    }
}

/// One frontal leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOverLeg {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub name_plan: String,
    /// Gross leg volume.
    pub points: Points,
    pub personal_points: Points,
    pub branch_points: Points,
    pub nivel: u8,
    pub roll_over: Points,
    pub roll_over_applied: bool,
    pub percentage_of_total: Decimal,
    pub effective_points: Points,
    pub effective_percentage: Decimal,
    pub max_allowed: Option<Points>,
    pub exceeds_limit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOverSummary {
    pub distributor_rank: String,
    pub rollover_config: RollOverConfig,
    pub total_frontals: usize,
    pub total_group_points: Points,
    pub total_roll_over: Points,
    pub effective_group_points: Points,
    pub frontals_with_rollover: usize,
    pub roll_over_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOverAnalysis {
    pub summary: RollOverSummary,
    pub legs: Vec<RollOverLeg>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Cap every frontal leg of a full-downline tree.
///
/// Legs are reported largest first (ties by id).
pub fn analyze_rollover(tree: &NetworkTree, root_rank: Rank, config: &PlanConfig) -> RollOverAnalysis {
    let rollover_config = RollOverConfig::resolve(config.rollover_for(root_rank));
    let cap = rollover_config.max_per_leg;

    let mut legs: Vec<RollOverLeg> = tree
        .frontals()
        .iter()
        .map(|&idx| {
            let node = tree.node(idx);
            let branch_points = tree.branch_points(idx);
            let gross = node.personal_points + branch_points;
            let roll_over = match cap {
                Some(max) if gross > max => gross - max,
                _ => Points::zero(),
            };
            RollOverLeg {
                id_customers: node.id,
                full_name: node.full_name.clone(),
                name_plan: node.rank.plan_name().to_string(),
                points: gross,
                personal_points: node.personal_points,
                branch_points,
                nivel: 1,
                roll_over,
                roll_over_applied: !roll_over.is_zero(),
                percentage_of_total: Decimal::ZERO,
                effective_points: gross - roll_over,
                effective_percentage: Decimal::ZERO,
                max_allowed: cap,
                exceeds_limit: !roll_over.is_zero(),
            }
        })
        .collect();

    let total_group_points: Points = legs.iter().map(|l| l.points).sum();
    let total_roll_over: Points = legs.iter().map(|l| l.roll_over).sum();
    for leg in &mut legs {
        leg.percentage_of_total = percentage_of(leg.points.0, total_group_points.0);
        leg.effective_percentage = percentage_of(leg.effective_points.0, total_group_points.0);
    }
    legs.sort_by(|a, b| b.points.cmp(&a.points).then(a.id_customers.cmp(&b.id_customers)));

    let frontals_with_rollover = legs.iter().filter(|l| l.roll_over_applied).count();
    debug!(
        root_id = %tree.root().id,
        rank = %root_rank,
        legs = legs.len(),
        total_roll_over = %total_roll_over.0,
        "roll-over analysed"
    );

    RollOverAnalysis {
        summary: RollOverSummary {
            distributor_rank: root_rank.plan_name().to_string(),
            rollover_config,
            total_frontals: legs.len(),
            total_group_points,
            total_roll_over,
            effective_group_points: total_group_points - total_roll_over,
            frontals_with_rollover,
            roll_over_percentage: percentage_of(total_roll_over.0, total_group_points.0),
        },
        legs,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistributorRecord, PeriodId};
    use rust_decimal_macros::dec;

    fn rec(id: u64, sponsor: Option<u64>, plan: &str, personal: u64, group: u64) -> DistributorRecord {
        DistributorRecord {
            id_customers: DistributorId(id),
            full_name: format!("D{id}"),
            id_sponsor: sponsor.map(DistributorId),
            name_plan: Some(plan.to_string()),
            point_current_customers: Points::new(personal),
            point_business_customers: Points::new(group),
        }
    }

    fn tree(root_plan: &str) -> NetworkTree {
        let rows = vec![
            rec(1, None, root_plan, 0, 0),
            // Leg A: 2000 personal + 6000 below = 8000
            rec(2, Some(1), "Plata", 2000, 2000),
            rec(3, Some(2), "Distribuidor", 100, 4000),
            rec(4, Some(3), "Distribuidor", 100, 2000),
            // Leg B: 1500, no downline
            rec(5, Some(1), "Bronce", 1500, 1500),
        ];
        NetworkTree::from_records(DistributorId(1), PeriodId(1), rows, None).expect("test: tree")
    }

    #[test]
    fn caps_over_concentrated_leg() {
        let analysis = analyze_rollover(&tree("Oro"), Rank::Oro, &PlanConfig::default());
        let cfg = &analysis.summary.rollover_config;
        assert_eq!(cfg.max_per_leg, Some(Points(dec!(5000))));

        let leg_a = &analysis.legs[0];
        assert_eq!(leg_a.id_customers, DistributorId(2));
        assert_eq!(leg_a.points, Points::new(8000));
        assert_eq!(leg_a.branch_points, Points::new(6000));
        assert_eq!(leg_a.roll_over, Points::new(3000));
        assert_eq!(leg_a.effective_points, Points::new(5000));
        assert!(leg_a.exceeds_limit);

        let leg_b = &analysis.legs[1];
        assert_eq!(leg_b.roll_over, Points::zero());
        assert!(!leg_b.roll_over_applied);

        let s = &analysis.summary;
        assert_eq!(s.total_group_points, Points::new(9500));
        assert_eq!(s.total_roll_over, Points::new(3000));
        assert_eq!(s.effective_group_points, Points::new(6500));
        assert_eq!(s.frontals_with_rollover, 1);
        assert_eq!(s.roll_over_percentage, dec!(31.58));
    }

    #[test]
    fn leg_invariants_hold() {
        for rank in Rank::ALL {
            let analysis = analyze_rollover(&tree("Oro"), rank, &PlanConfig::default());
            for leg in &analysis.legs {
                assert_eq!(leg.effective_points + leg.roll_over, leg.points);
                assert!(leg.roll_over >= Points::zero());
                if let Some(max) = leg.max_allowed {
                    assert!(leg.effective_points <= max, "{rank}: effective exceeds cap");
                }
            }
        }
    }

    #[test]
    fn entry_rank_is_uncapped() {
        let analysis = analyze_rollover(&tree("Bronce"), Rank::Bronce, &PlanConfig::default());
        assert_eq!(analysis.summary.rollover_config.max_per_leg, None);
        assert!(analysis.legs.iter().all(|l| l.roll_over.is_zero()));
        assert_eq!(analysis.summary.effective_group_points, analysis.summary.total_group_points);
    }

    #[test]
    fn no_frontals() {
        let rows = vec![rec(1, None, "Oro", 10, 10)];
        let solo = NetworkTree::from_records(DistributorId(1), PeriodId(1), rows, None).expect("test: solo");
        let analysis = analyze_rollover(&solo, Rank::Oro, &PlanConfig::default());
        assert!(analysis.legs.is_empty());
        assert_eq!(analysis.summary.roll_over_percentage, Decimal::ZERO);
    }
}
