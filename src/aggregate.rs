// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Commission aggregation.
//!
//! Every downline node earns the root exactly one commission:
//!
//! ```text
//! commission = commissionable_points × generation_rate(generation) / 100
//! ```
//!
//! That single amount is then bucketed three ways: by generation, by level and
//! by (level, generation). Because each bucket set partitions the same node
//! commissions, all three grand totals must agree; a disagreement is a data
//! integrity bug and is surfaced as [`EngineError::InvariantViolation`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::classify::Classification;
use crate::config::{PlanConfig, MAX_GENERATION, MAX_LEVEL};
use crate::error::{EngineError, Result};
use crate::tree::{NetworkTree, NodeIdx};
use crate::types::{percentage_of, Money, Points};

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Aggregate over one classification partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionCell {
    pub count: u64,
    pub total_points: Points,
    pub total_commission: Money,
    pub percentage_of_total: Decimal,
}

impl CommissionCell {
    fn add(&mut self, points: Points, commission: Money) {
        self.count += 1;
        self.total_points += points;
        self.total_commission += commission;
    }

    fn finish(&mut self, total: Money) {
        self.percentage_of_total = percentage_of(self.total_commission.0, total.0);
    }

    /// Effective rate paid on the cell's points, in percent.
    pub fn blended_rate(&self) -> Decimal {
        if self.total_points.is_zero() {
            return Decimal::ZERO;
        }
        crate::types::round_pct(self.total_commission.0 / self.total_points.0 * dec!(100))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationBucket {
    pub generation: u8,
    pub rate: Decimal,
    pub cell: CommissionCell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBucket {
    pub level: u8,
    pub rate: Decimal,
    pub cell: CommissionCell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelGenerationBucket {
    pub level: u8,
    pub generation: u8,
    pub level_rate: Decimal,
    pub generation_rate: Decimal,
    pub cell: CommissionCell,
}

/// Commission split between near (G0–G2) and far (G3–G4) generations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub g0_g2_percentage: Decimal,
    pub g3_g4_percentage: Decimal,
    pub g0_g2_commission: Money,
    pub g3_g4_commission: Money,
}

// ---------------------------------------------------------------------------
// CommissionAggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CommissionAggregate {
    /// Always G0..G4, empty generations included.
    pub by_generation: Vec<GenerationBucket>,
    /// Always ML1..ML3, empty levels included.
    pub by_level: Vec<LevelBucket>,
    /// Only non-empty (level, generation) cells, ordered by level then generation.
    pub by_level_generation: Vec<LevelGenerationBucket>,
    pub total: Money,
    pub total_points: Points,
    /// Commission each node earns the root, by arena slot (root slot is zero).
    pub node_commission: Vec<Money>,
}

impl CommissionAggregate {
    pub fn generation_summary(&self) -> GenerationSummary {
        let near: Money = self.by_generation[..3].iter().map(|b| b.cell.total_commission).sum();
        let far: Money = self.by_generation[3..].iter().map(|b| b.cell.total_commission).sum();
        GenerationSummary {
            g0_g2_percentage: percentage_of(near.0, self.total.0),
            g3_g4_percentage: percentage_of(far.0, self.total.0),
            g0_g2_commission: near,
            g3_g4_commission: far,
        }
    }

    pub fn generation(&self, generation: u8) -> &GenerationBucket {
        &self.by_generation[generation.min(MAX_GENERATION) as usize]
    }

    pub fn level(&self, level: u8) -> &LevelBucket {
        &self.by_level[level.clamp(1, MAX_LEVEL) as usize - 1]
    }

    pub fn commission_of(&self, idx: NodeIdx) -> Money {
        self.node_commission[idx]
    }
}

/// Sum commissions for a classified tree.
///
/// An empty downline yields a valid all-zero aggregate.
pub fn aggregate(
    tree: &NetworkTree,
    classification: &Classification,
    config: &PlanConfig,
) -> Result<CommissionAggregate> {
    let mut by_generation: Vec<GenerationBucket> = (0..=MAX_GENERATION)
        .map(|g| GenerationBucket {
            generation: g,
            rate: config.generation_rate(g),
            cell: CommissionCell::default(),
        })
        .collect();
    let mut by_level: Vec<LevelBucket> = (1..=MAX_LEVEL)
        .map(|l| LevelBucket {
            level: l,
            rate: config.level_rate(l),
            cell: CommissionCell::default(),
        })
        .collect();
    let mut cross = vec![CommissionCell::default(); (MAX_LEVEL as usize) * (MAX_GENERATION as usize + 1)];
    let mut node_commission = vec![Money::zero(); tree.len()];
    let mut total = Money::zero();
    let mut total_points = Points::zero();

    for idx in tree.downline() {
        let generation = classification.generation(idx);
        let level = classification.level(idx);
        let points = tree.node(idx).commission_points(config.point_basis);
        let commission = points.at_rate(config.generation_rate(generation));

        node_commission[idx] = commission;
        total += commission;
        total_points += points;
        by_generation[generation as usize].cell.add(points, commission);
        by_level[level as usize - 1].cell.add(points, commission);
        cross[cross_slot(level, generation)].add(points, commission);
    }

    let generation_total: Money = by_generation.iter().map(|b| b.cell.total_commission).sum();
    let level_total: Money = by_level.iter().map(|b| b.cell.total_commission).sum();
    check_totals_agree("generation_total_vs_total", total, generation_total)?;
    check_totals_agree("level_total_vs_generation_total", generation_total, level_total)?;

    for bucket in &mut by_generation {
        bucket.cell.finish(total);
    }
    for bucket in &mut by_level {
        bucket.cell.finish(total);
    }
    let mut by_level_generation = Vec::new();
    for level in 1..=MAX_LEVEL {
        for generation in 0..=MAX_GENERATION {
            let mut cell = cross[cross_slot(level, generation)].clone();
            if cell.count == 0 {
                continue;
            }
            cell.finish(total);
            by_level_generation.push(LevelGenerationBucket {
                level,
                generation,
                level_rate: config.level_rate(level),
                generation_rate: config.generation_rate(generation),
                cell,
            });
        }
    }

    debug!(
        root_id = %tree.root().id,
        nodes = tree.downline_len(),
        total = %total,
        "commission aggregate computed"
    );

    Ok(CommissionAggregate {
        by_generation,
        by_level,
        by_level_generation,
        total,
        total_points,
        node_commission,
    })
}

fn cross_slot(level: u8, generation: u8) -> usize {
    (level as usize - 1) * (MAX_GENERATION as usize + 1) + generation as usize
}

/// Cross-aggregation consistency check; exact decimal equality.
pub fn check_totals_agree(check: &'static str, expected: Money, actual: Money) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    error!(check, expected = %expected.0, actual = %actual.0, "commission totals disagree");
    Err(EngineError::InvariantViolation {
        check,
        expected: expected.0.to_string(),
        actual: actual.0.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Wire rows
// ---------------------------------------------------------------------------

/// `GenerationBreakdown` row; `porcentaje` is the generation's rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationBreakdown {
    pub generation: u8,
    pub personas: u64,
    pub pts_negocio: Points,
    pub comision: Money,
    pub porcentaje: Decimal,
    pub porcentaje_total: Decimal,
}

/// `LevelBreakdown` row; `porcentaje_nivel` is the level rate and
/// `porcentaje_generation` the blended generation rate of its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBreakdown {
    pub nivel: u8,
    pub personas: u64,
    pub pts_negocio: Points,
    pub comision: Money,
    pub porcentaje_nivel: Decimal,
    pub porcentaje_generation: Decimal,
    pub porcentaje_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelGenerationBreakdown {
    pub nivel: u8,
    pub generation: u8,
    pub personas: u64,
    pub pts_negocio: Points,
    pub comision: Money,
    pub porcentaje_nivel: Decimal,
    pub porcentaje_generation: Decimal,
    pub porcentaje_total: Decimal,
}

impl CommissionAggregate {
    pub fn generation_rows(&self) -> Vec<GenerationBreakdown> {
        self.by_generation
            .iter()
            .map(|b| GenerationBreakdown {
                generation: b.generation,
                personas: b.cell.count,
                pts_negocio: b.cell.total_points,
                comision: b.cell.total_commission,
                porcentaje: b.rate,
                porcentaje_total: b.cell.percentage_of_total,
            })
            .collect()
    }

    pub fn level_rows(&self) -> Vec<LevelBreakdown> {
        self.by_level
            .iter()
            .map(|b| LevelBreakdown {
                nivel: b.level,
                personas: b.cell.count,
                pts_negocio: b.cell.total_points,
                comision: b.cell.total_commission,
                porcentaje_nivel: b.rate,
                porcentaje_generation: b.cell.blended_rate(),
                porcentaje_total: b.cell.percentage_of_total,
            })
            .collect()
    }

    pub fn level_generation_rows(&self) -> Vec<LevelGenerationBreakdown> {
        self.by_level_generation
            .iter()
            .map(|b| LevelGenerationBreakdown {
                nivel: b.level,
                generation: b.generation,
                personas: b.cell.count,
                pts_negocio: b.cell.total_points,
                comision: b.cell.total_commission,
                porcentaje_nivel: b.level_rate,
                porcentaje_generation: b.generation_rate,
                porcentaje_total: b.cell.percentage_of_total,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::config::PointBasis;
    use crate::types::{DistributorId, DistributorRecord, PeriodId};

    fn rec(id: u64, sponsor: Option<u64>, plan: &str, personal: u64, business: u64) -> DistributorRecord {
        DistributorRecord {
            id_customers: DistributorId(id),
            full_name: format!("D{id}"),
            id_sponsor: sponsor.map(DistributorId),
            name_plan: Some(plan.to_string()),
            point_current_customers: Points::new(personal),
            point_business_customers: Points::new(business),
        }
    }

    fn network() -> NetworkTree {
        let rows = vec![
            rec(1, None, "Oro", 0, 0),
            rec(2, Some(1), "Plata", 100, 1000),
            rec(3, Some(1), "Distribuidor", 100, 500),
            rec(4, Some(2), "Plata", 100, 1000),
            rec(5, Some(4), "Distribuidor", 100, 2000),
            rec(6, Some(5), "Distribuidor", 100, 400),
        ];
        NetworkTree::from_records(DistributorId(1), PeriodId(1), rows, None).expect("test: network")
    }

    #[test]
    fn totals_agree_across_partitions() {
        let tree = network();
        let cfg = PlanConfig::default();
        let agg = aggregate(&tree, &classify(&tree), &cfg).expect("test: aggregate");

        // G0: 2,3 -> 1500 @4% = 60; G1: 4 -> 1000 @5% = 50; G2: 5,6 -> 2400 @5% = 120
        assert_eq!(agg.generation(0).cell.total_commission, Money(dec!(60)));
        assert_eq!(agg.generation(1).cell.total_commission, Money(dec!(50)));
        assert_eq!(agg.generation(2).cell.total_commission, Money(dec!(120)));
        assert_eq!(agg.total, Money(dec!(230)));

        let level_sum: Money = agg.by_level.iter().map(|b| b.cell.total_commission).sum();
        let cross_sum: Money = agg.by_level_generation.iter().map(|b| b.cell.total_commission).sum();
        assert_eq!(level_sum, agg.total);
        assert_eq!(cross_sum, agg.total);
        assert_eq!(agg.level(3).cell.count, 2, "depth 3 and 4 both land in ML3");
    }

    #[test]
    fn percentages_and_summary() {
        let tree = network();
        let agg = aggregate(&tree, &classify(&tree), &PlanConfig::default()).expect("test: aggregate");
        assert_eq!(agg.generation(2).cell.percentage_of_total, dec!(52.17));
        let summary = agg.generation_summary();
        assert_eq!(summary.g0_g2_commission, Money(dec!(230)));
        assert_eq!(summary.g3_g4_commission, Money::zero());
        assert_eq!(summary.g0_g2_percentage, dec!(100));
    }

    #[test]
    fn empty_downline_is_zero_result() {
        let rows = vec![rec(1, None, "Oro", 10, 10)];
        let tree = NetworkTree::from_records(DistributorId(1), PeriodId(1), rows, None).expect("test: solo");
        let agg = aggregate(&tree, &classify(&tree), &PlanConfig::default()).expect("test: aggregate");
        assert!(agg.total.is_zero());
        assert!(agg.by_level_generation.is_empty());
        assert_eq!(agg.by_generation.len(), 5);
        assert!(agg.by_generation.iter().all(|b| b.cell.percentage_of_total.is_zero()));
        assert_eq!(agg.generation_summary().g0_g2_percentage, Decimal::ZERO);
    }

    #[test]
    fn personal_point_basis() {
        let tree = network();
        let cfg = PlanConfig { point_basis: PointBasis::Personal, ..PlanConfig::default() };
        let agg = aggregate(&tree, &classify(&tree), &cfg).expect("test: aggregate");
        // 2x G0 @4 + 1x G1 @5 + 2x G2 @5 on 100 pts each
        assert_eq!(agg.total, Money(dec!(23)));
    }

    #[test]
    fn wire_rows() {
        let tree = network();
        let agg = aggregate(&tree, &classify(&tree), &PlanConfig::default()).expect("test: aggregate");
        let gens = agg.generation_rows();
        assert_eq!(gens[0].porcentaje, dec!(4));
        assert_eq!(gens[0].personas, 2);
        let levels = agg.level_rows();
        assert_eq!(levels[0].porcentaje_nivel, dec!(15));
        // ML1 holds node 2 (1000) and node 3 (500), both G0
        assert_eq!(levels[0].porcentaje_generation, dec!(4));
        let cells = agg.level_generation_rows();
        assert!(cells.iter().all(|c| c.personas > 0));
    }

    #[test]
    fn mismatched_totals_are_violations() {
        let err = check_totals_agree("test", Money(dec!(1)), Money(dec!(2)));
        assert!(matches!(err, Err(EngineError::InvariantViolation { check: "test", .. })));
    }
}
