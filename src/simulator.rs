// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! What-if simulations over a private copy of the network.
//!
//! Each scenario clones the arena, applies one mutation, then re-runs the
//! classifier and the aggregator. The result is the diff against the
//! untouched baseline, itemised per generation bucket. The caller's tree is
//! never touched.
//!
//! | Scenario          | Mutation                                              |
//! |-------------------|-------------------------------------------------------|
//! | `NewFrontals`     | append `count` synthetic ML1 leaves with given points |
//! | `VolumeIncrease`  | scale every node's points by `1 + percentage / 100`   |
//! | `PromoteToPlata`  | set one non-root node below Plata to Plata            |

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::aggregate::{aggregate, CommissionAggregate};
use crate::classify::{classify, Classification};
use crate::config::PlanConfig;
use crate::error::{EngineError, Result};
use crate::rollover::analyze_rollover;
use crate::tree::{NetworkTree, ROOT};
use crate::types::{DistributorId, Money, Points, Rank};

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scenario_type", rename_all = "snake_case")]
pub enum Scenario {
    NewFrontals { count: u32, points_per_frontal: Points },
    VolumeIncrease { percentage: Decimal },
    #[serde(rename = "new_plata")]
    PromoteToPlata { target: DistributorId },
}

impl Scenario {
    /// Wire name of the scenario type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewFrontals { .. } => "new_frontals",
            Self::VolumeIncrease { .. } => "volume_increase",
            Self::PromoteToPlata { .. } => "new_plata",
        }
    }

    /// Reject out-of-range parameters before anything is computed.
    fn validate(&self, tree: &NetworkTree, config: &PlanConfig) -> Result<()> {
        let limits = &config.limits;
        match *self {
            Self::NewFrontals { count, points_per_frontal } => {
                if count == 0 || count > limits.max_new_frontals {
                    return Err(EngineError::invalid(format!(
                        "new frontal count must be between 1 and {}, got {count}",
                        limits.max_new_frontals
                    )));
                }
                if points_per_frontal.0.is_sign_negative() || points_per_frontal.0 > limits.max_points_per_frontal {
                    return Err(EngineError::invalid(format!(
                        "points per frontal must be between 0 and {}, got {points_per_frontal}",
                        limits.max_points_per_frontal
                    )));
                }
            }
            Self::VolumeIncrease { percentage } => {
                if percentage <= dec!(-100) || percentage > limits.max_volume_increase_pct {
                    return Err(EngineError::invalid(format!(
                        "volume change must be above -100% and at most {}%, got {percentage}%",
                        limits.max_volume_increase_pct
                    )));
                }
            }
            Self::PromoteToPlata { target } => {
                let idx = tree
                    .index_of(target)
                    .ok_or_else(|| EngineError::invalid(format!("distributor {target} is not in this network")))?;
                if idx == ROOT {
                    return Err(EngineError::invalid("the root distributor cannot be promoted in a simulation"));
                }
                let rank = tree.node(idx).rank;
                if rank.is_plata_plus() {
                    return Err(EngineError::invalid(format!(
                        "distributor {target} is already {}",
                        rank.plan_name()
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub description: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationBreakdown {
    pub positive_effects: Vec<Effect>,
    pub negative_effects: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub scenario: Scenario,
    pub baseline_total: Money,
    pub simulated_total: Money,
    pub commission_change: Money,
    pub is_positive: bool,
    pub breakdown: SimulationBreakdown,
    /// Roll-over-effective group points before and after.
    pub effective_group_points: (Points, Points),
    /// Promotion only: descendants whose generation moved.
    pub shifted_distributors: usize,
}

/// Run one scenario against a full-downline tree.
pub fn simulate(
    tree: &NetworkTree,
    root_rank: Rank,
    scenario: &Scenario,
    config: &PlanConfig,
) -> Result<SimulationResult> {
    scenario.validate(tree, config)?;

    let base_class = classify(tree);
    let baseline = aggregate(tree, &base_class, config)?;

    let mut copy = tree.clone();
    apply(&mut copy, scenario);
    let sim_class = classify(&copy);
    let simulated = aggregate(&copy, &sim_class, config)?;

    let commission_change = simulated.total - baseline.total;
    let shifted_distributors = match scenario {
        Scenario::PromoteToPlata { .. } => count_shifted(tree, &base_class, &sim_class),
        _ => 0,
    };
    let effective_group_points = (
        analyze_rollover(tree, root_rank, config).summary.effective_group_points,
        analyze_rollover(&copy, root_rank, config).summary.effective_group_points,
    );

    debug!(
        root_id = %tree.root().id,
        scenario = scenario.kind(),
        change = %commission_change,
        "simulation complete"
    );

    Ok(SimulationResult {
        scenario: scenario.clone(),
        baseline_total: baseline.total,
        simulated_total: simulated.total,
        commission_change,
        is_positive: commission_change.is_positive(),
        breakdown: diff_buckets(&baseline, &simulated),
        effective_group_points,
        shifted_distributors,
    })
}

fn apply(tree: &mut NetworkTree, scenario: &Scenario) {
    match *scenario {
        Scenario::NewFrontals { count, points_per_frontal } => {
            let mut next = tree.next_free_id();
            for n in 1..=count {
                tree.attach_synthetic(ROOT, next, format!("New frontal {n}"), points_per_frontal);
                next = DistributorId(next.0.saturating_add(1));
            }
        }
        Scenario::VolumeIncrease { percentage } => {
            let factor = Decimal::ONE + percentage / dec!(100);
            for node in tree.nodes_mut() {
                node.personal_points = Points(node.personal_points.0 * factor);
                node.group_points = Points(node.group_points.0 * factor);
            }
        }
        Scenario::PromoteToPlata { target } => {
            if let Some(idx) = tree.index_of(target) {
                tree.node_mut(idx).rank = Rank::Plata;
            }
        }
    }
}

fn count_shifted(tree: &NetworkTree, before: &Classification, after: &Classification) -> usize {
    tree.downline()
        .filter(|&i| before.generation(i) != after.generation(i))
        .count()
}

fn diff_buckets(baseline: &CommissionAggregate, simulated: &CommissionAggregate) -> SimulationBreakdown {
    let mut breakdown = SimulationBreakdown::default();
    for (before, after) in baseline.by_generation.iter().zip(&simulated.by_generation) {
        let delta = after.cell.total_commission - before.cell.total_commission;
        if delta.is_zero() {
            continue;
        }
        let effect = Effect {
            description: format!(
                "G{} ({}%): {} → {} distributors, {} → {} points",
                before.generation,
                before.rate,
                before.cell.count,
                after.cell.count,
                before.cell.total_points,
                after.cell.total_points
            ),
            amount: delta,
        };
        if delta.is_positive() {
            breakdown.positive_effects.push(effect);
        } else {
            breakdown.negative_effects.push(effect);
        }
    }
    breakdown
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationImpact {
    pub title: String,
    pub details: Vec<String>,
    pub commission_change: Money,
    pub is_positive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationScenario {
    pub scenario_type: String,
    pub description: String,
    pub input: Map<String, Value>,
    pub impact: SimulationImpact,
    pub breakdown: SimulationBreakdown,
}

impl SimulationResult {
    pub fn to_wire(&self, tree: &NetworkTree) -> SimulationScenario {
        let (description, input) = match self.scenario {
            Scenario::NewFrontals { count, points_per_frontal } => (
                format!("Add {count} new frontal(s) with {points_per_frontal} points each"),
                json!({ "count": count, "points_per_frontal": points_per_frontal }),
            ),
            Scenario::VolumeIncrease { percentage } => (
                format!("Change every distributor's volume by {percentage}%"),
                json!({ "percentage": percentage }),
            ),
            Scenario::PromoteToPlata { target } => {
                let name = tree
                    .index_of(target)
                    .map(|i| tree.node(i).full_name.clone())
                    .unwrap_or_default();
                (
                    format!("Promote {name} to Plata"),
                    json!({ "distributor_id": target, "full_name": name }),
                )
            }
        };

        let title = if self.is_positive {
            format!("Commission rises by {}", self.commission_change)
        } else if self.commission_change.is_zero() {
            "Commission unchanged".to_string()
        } else {
            format!("Commission falls by {}", Money(-self.commission_change.0))
        };
        let (eff_before, eff_after) = self.effective_group_points;
        let mut details = vec![
            format!("Current commission: {}", self.baseline_total),
            format!("Simulated commission: {}", self.simulated_total),
            format!("Effective group points: {eff_before} → {eff_after}"),
        ];
        if let Scenario::PromoteToPlata { .. } = self.scenario {
            details.push(format!("{} distributor(s) move one generation out", self.shifted_distributors));
        }

        SimulationScenario {
            scenario_type: self.scenario.kind().to_string(),
            description,
            input: match input {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            impact: SimulationImpact {
                title,
                details,
                commission_change: self.commission_change,
                is_positive: self.is_positive,
            },
            breakdown: self.breakdown.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Promotion candidates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlataCandidate {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub nivel: Option<u8>,
    pub generation: Option<u8>,
    pub name_plan: String,
    pub points: Points,
}

/// Downline distributors below Plata, largest volume first.
pub fn plata_candidates(tree: &NetworkTree, classification: &Classification, config: &PlanConfig) -> Vec<PlataCandidate> {
    let mut candidates: Vec<PlataCandidate> = tree
        .downline()
        .filter(|&i| !tree.node(i).rank.is_plata_plus())
        .map(|i| {
            let node = tree.node(i);
            PlataCandidate {
                id_customers: node.id,
                full_name: node.full_name.clone(),
                nivel: Some(classification.level(i)),
                generation: Some(classification.generation(i)),
                name_plan: node.rank.plan_name().to_string(),
                points: node.commission_points(config.point_basis),
            }
        })
        .collect();
    candidates.sort_by(|a, b| b.points.cmp(&a.points).then(a.id_customers.cmp(&b.id_customers)));
    candidates.truncate(config.candidate_limit);
    candidates
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistributorRecord, PeriodId};

    fn rec(id: u64, sponsor: Option<u64>, plan: &str, pts: u64) -> DistributorRecord {
        DistributorRecord {
            id_customers: DistributorId(id),
            full_name: format!("D{id}"),
            id_sponsor: sponsor.map(DistributorId),
            name_plan: Some(plan.to_string()),
            point_current_customers: Points::new(pts),
            point_business_customers: Points::new(pts),
        }
    }

    fn tree(rows: Vec<DistributorRecord>) -> NetworkTree {
        NetworkTree::from_records(DistributorId(1), PeriodId(1), rows, None).expect("test: tree")
    }

    fn sample() -> NetworkTree {
        tree(vec![
            rec(1, None, "Oro", 0),
            rec(2, Some(1), "Bronce", 1000),
            rec(3, Some(2), "Distribuidor", 500),
            rec(4, Some(3), "Distribuidor", 200),
            rec(5, Some(1), "Plata", 800),
        ])
    }

    #[test]
    fn new_frontals_on_empty_network() {
        let solo = tree(vec![rec(1, None, "Oro", 0)]);
        let cfg = PlanConfig::default();
        let scenario = Scenario::NewFrontals { count: 3, points_per_frontal: Points::new(1000) };
        let result = simulate(&solo, Rank::Oro, &scenario, &cfg).expect("test: simulate");
        assert_eq!(result.commission_change, Points::new(3000).at_rate(cfg.generation_rate(0)));
        assert!(result.is_positive);
        assert_eq!(result.breakdown.positive_effects.len(), 1);
        assert!(result.breakdown.negative_effects.is_empty());
        assert_eq!(solo.len(), 1, "source tree untouched");
    }

    #[test]
    fn volume_increase_scales_every_bucket() {
        let cfg = PlanConfig::default();
        let t = sample();
        let scenario = Scenario::VolumeIncrease { percentage: dec!(10) };
        let result = simulate(&t, Rank::Oro, &scenario, &cfg).expect("test: simulate");
        assert_eq!(result.simulated_total.0, result.baseline_total.0 * dec!(1.1));
        assert!(result.is_positive);
    }

    #[test]
    fn promotion_shifts_subtree() {
        let cfg = PlanConfig::default();
        let t = sample();
        let scenario = Scenario::PromoteToPlata { target: DistributorId(2) };
        let result = simulate(&t, Rank::Oro, &scenario, &cfg).expect("test: simulate");
        // 3 and 4 move G0 (4%) -> G1 (5%)
        assert_eq!(result.shifted_distributors, 2);
        assert_eq!(result.commission_change, Money(dec!(7)));
        let wire = result.to_wire(&t);
        assert_eq!(wire.scenario_type, "new_plata");
        assert_eq!(wire.input.get("distributor_id"), Some(&json!(2)));
    }

    #[test]
    fn simulation_is_side_effect_free() {
        let cfg = PlanConfig::default();
        let t = sample();
        let before = aggregate(&t, &classify(&t), &cfg).expect("test: aggregate");
        let scenario = Scenario::PromoteToPlata { target: DistributorId(3) };
        let first = simulate(&t, Rank::Oro, &scenario, &cfg).expect("test: first");
        let second = simulate(&t, Rank::Oro, &scenario, &cfg).expect("test: second");
        assert_eq!(first, second);
        let after = aggregate(&t, &classify(&t), &cfg).expect("test: aggregate");
        assert_eq!(before, after);
    }

    #[test]
    fn invalid_scenarios_are_rejected() {
        let cfg = PlanConfig::default();
        let t = sample();
        let bad = [
            Scenario::PromoteToPlata { target: DistributorId(99) },
            Scenario::PromoteToPlata { target: DistributorId(1) },
            Scenario::PromoteToPlata { target: DistributorId(5) },
            Scenario::NewFrontals { count: 0, points_per_frontal: Points::new(10) },
            Scenario::NewFrontals { count: 5000, points_per_frontal: Points::new(10) },
            Scenario::VolumeIncrease { percentage: dec!(-100) },
            Scenario::VolumeIncrease { percentage: dec!(5000) },
        ];
        for scenario in bad {
            let err = simulate(&t, Rank::Oro, &scenario, &cfg).expect_err("test: rejected");
            assert!(matches!(err, EngineError::InvalidInput(_)), "{scenario:?} gave {err}");
        }
    }

    #[test]
    fn candidates_exclude_plata_plus() {
        let cfg = PlanConfig::default();
        let t = sample();
        let list = plata_candidates(&t, &classify(&t), &cfg);
        let ids: Vec<u64> = list.iter().map(|c| c.id_customers.0).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(list[0].nivel, Some(1));
    }

    #[test]
    fn scenario_serde_tags() {
        let s: Scenario = serde_json::from_str(r#"{"scenario_type":"new_plata","target":7}"#).expect("test: parse");
        assert_eq!(s, Scenario::PromoteToPlata { target: DistributorId(7) });
    }
}
