// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Dilution and vertical-growth analysis.
//!
//! Every Plata+ distributor below the root is a generation cut: everyone in
//! its subtree sits one generation further out than they would without it.
//! For each cut the analyzer lists the descendants whose rate the cut raises:
//!
//! ```text
//! generation_before = generation without this cut   (one fewer Plata+ above)
//! generation_after  = actual generation             (after > before)
//! commission_lost   = points × (rate_after - rate_before) / 100
//! ```
//!
//! Only positive deltas are reported. With the published rates that is the
//! G0→G1 step (4% → 5%); G1→G2 and G3→G4 pay the same and G2→G3 lowers the
//! rate, so none of those appear. Chain totals, each Plata+'s
//! `estimated_dilution_caused` and the summary's `total_dilution_amount` all
//! sum the same non-negative entries.
//!
//! Rates on this wire shape (`rate`, `rate_before`, `rate_after`) are
//! fractions (`0.04`), unlike the percentage rates of the breakdown rows.
//!
//! Health score: `round(100 × g0_g2_commission / total_commission)`, half away
//! from zero, and 100 for a network that earns nothing. It is monotonic in the
//! near-generation share by construction.

use std::collections::BTreeMap;

use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{aggregate, CommissionAggregate};
use crate::classify::{classify_with_cuts, Classification};
use crate::config::{HealthBands, PlanConfig};
use crate::error::Result;
use crate::tree::{NetworkTree, NodeIdx};
use crate::types::{percentage_of, round_pct, DistributorId, Money, Points};

// ---------------------------------------------------------------------------
// Health score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Healthy,
    Moderate,
    Critical,
}

impl HealthBand {
    pub fn for_score(score: u8, bands: &HealthBands) -> Self {
        if score >= bands.healthy_min {
            Self::Healthy
        } else if score >= bands.moderate_min {
            Self::Moderate
        } else {
            Self::Critical
        }
    }
}

/// `round(100 × near / total)`; 100 when `total` is zero.
pub fn health_score(near_commission: Money, total_commission: Money) -> u8 {
    if total_commission.0 <= Decimal::ZERO {
        return 100;
    }
    let share = (near_commission.0 / total_commission.0).clamp(Decimal::ZERO, Decimal::ONE);
    (share * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Result types (wire shape of the vertical-growth analysis)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDistribution {
    pub generation: u8,
    pub rate: Decimal,
    pub count: u64,
    pub total_points: Points,
    pub total_commission: Money,
    pub percentage_of_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedDistributor {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub name_plan: String,
    pub nivel: u8,
    pub generation_before: u8,
    pub generation_after: u8,
    pub rate_before: Decimal,
    pub rate_after: Decimal,
    pub points: Points,
    pub commission_lost: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutPoint {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub name_plan: String,
    pub nivel: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DilutionChain {
    pub chain_id: u32,
    pub plata_distributor: CutPoint,
    pub affected_distributors: Vec<AffectedDistributor>,
    pub total_commission_lost: Money,
    pub affected_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlataDistributor {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub name_plan: String,
    pub nivel: u8,
    pub generation: u8,
    pub points: Points,
    pub commission: Money,
    pub downline_in_g3_g4: usize,
    pub estimated_dilution_caused: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationCutNode {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub name_plan: String,
    /// Raw sponsorship depth.
    pub nivel: u32,
    pub generation: u8,
    pub points: Points,
    pub commission_earned: Money,
    pub is_plata_plus: bool,
    pub creates_generation_cut: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypotheticalScenario {
    pub current_commission: Money,
    pub commission_if_no_platas: Money,
    /// Not clamped; negative when the blended current rate beats G0.
    pub potential_gain: Money,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalGrowthSummary {
    pub total_plata_plus_in_network: usize,
    /// Sum of every chain's `total_commission_lost`.
    pub total_dilution_amount: Money,
    pub most_impacted_generation_shift: String,
    pub network_depth: u32,
    /// Count-weighted mean generation of the downline.
    pub average_generation: Decimal,
    pub health_score: u8,
    pub health_band: HealthBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalGrowthAnalysis {
    pub summary: VerticalGrowthSummary,
    pub generation_distribution: Vec<GenerationDistribution>,
    pub dilution_chains: Vec<DilutionChain>,
    pub plata_plus_distributors: Vec<PlataDistributor>,
    pub hypothetical_scenario: HypotheticalScenario,
    pub visual_tree: Vec<GenerationCutNode>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Analyze dilution for a full-downline tree and its current classification.
pub fn analyze_dilution(
    tree: &NetworkTree,
    classification: &Classification,
    current: &CommissionAggregate,
    config: &PlanConfig,
) -> Result<VerticalGrowthAnalysis> {
    let cut_points: Vec<NodeIdx> = tree
        .downline()
        .filter(|&i| tree.node(i).rank.is_plata_plus())
        .collect();

    let mut chains = Vec::new();
    let mut plata_plus = Vec::with_capacity(cut_points.len());
    for &cut in &cut_points {
        let descendants = tree.descendants(cut);
        let affected = affected_by_cut(tree, classification, config, &descendants);
        let total_lost: Money = affected.iter().map(|a| a.commission_lost).sum();

        let node = tree.node(cut);
        plata_plus.push(PlataDistributor {
            id_customers: node.id,
            full_name: node.full_name.clone(),
            name_plan: node.rank.plan_name().to_string(),
            nivel: classification.level(cut),
            generation: classification.generation(cut),
            points: node.commission_points(config.point_basis),
            commission: current.commission_of(cut),
            downline_in_g3_g4: descendants.iter().filter(|&&d| classification.generation(d) >= 3).count(),
            estimated_dilution_caused: total_lost,
        });

        if affected.is_empty() {
            continue;
        }
        chains.push(DilutionChain {
            chain_id: chains.len() as u32 + 1,
            plata_distributor: CutPoint {
                id_customers: node.id,
                full_name: node.full_name.clone(),
                name_plan: node.rank.plan_name().to_string(),
                nivel: classification.level(cut),
            },
            affected_count: affected.len(),
            affected_distributors: affected,
            total_commission_lost: total_lost,
        });
    }

    let hypothetical = hypothetical_without_platas(tree, current, config)?;
    let near = current.generation_summary().g0_g2_commission;
    let score = health_score(near, current.total);

    let summary = VerticalGrowthSummary {
        total_plata_plus_in_network: cut_points.len(),
        total_dilution_amount: chains.iter().map(|c| c.total_commission_lost).sum(),
        most_impacted_generation_shift: most_impacted_shift(&chains),
        network_depth: tree.network_depth(),
        average_generation: average_generation(tree, classification),
        health_score: score,
        health_band: HealthBand::for_score(score, &config.health),
    };

    debug!(
        root_id = %tree.root().id,
        cuts = cut_points.len(),
        chains = chains.len(),
        health_score = score,
        "dilution analysed"
    );

    Ok(VerticalGrowthAnalysis {
        summary,
        generation_distribution: generation_distribution(current),
        dilution_chains: chains,
        plata_plus_distributors: plata_plus,
        hypothetical_scenario: hypothetical,
        visual_tree: visual_tree(tree, classification, current, config),
    })
}

fn affected_by_cut(
    tree: &NetworkTree,
    classification: &Classification,
    config: &PlanConfig,
    descendants: &[NodeIdx],
) -> Vec<AffectedDistributor> {
    descendants
        .iter()
        .filter_map(|&d| {
            let after = classification.generation(d);
            let before = classification.generation_without_one_cut(d);
            let rate_after = config.generation_rate(after);
            let rate_before = config.generation_rate(before);
            let delta = rate_after - rate_before;
            if after == before || delta <= Decimal::ZERO {
                return None;
            }
            let node = tree.node(d);
            let points = node.commission_points(config.point_basis);
            Some(AffectedDistributor {
                id_customers: node.id,
                full_name: node.full_name.clone(),
                name_plan: node.rank.plan_name().to_string(),
                nivel: classification.level(d),
                generation_before: before,
                generation_after: after,
                rate_before: rate_fraction(rate_before),
                rate_after: rate_fraction(rate_after),
                points,
                commission_lost: points.at_rate(delta),
            })
        })
        .collect()
}

fn rate_fraction(pct: Decimal) -> Decimal {
    (pct / dec!(100)).normalize()
}

/// Every node re-collapsed to G0.
fn hypothetical_without_platas(
    tree: &NetworkTree,
    current: &CommissionAggregate,
    config: &PlanConfig,
) -> Result<HypotheticalScenario> {
    let flat = classify_with_cuts(tree, |_| false);
    let without = aggregate(tree, &flat, config)?;
    let gain = without.total - current.total;
    let explanation = if !tree.has_downline() {
        "No downline in this period; there is nothing to dilute.".to_string()
    } else if gain.is_positive() {
        format!(
            "If no Plata+ existed in your network every distributor would be G0 at {}%, \
             earning {} more than today.",
            config.generation_rate(0),
            gain
        )
    } else {
        format!(
            "If no Plata+ existed in your network every distributor would be G0 at {}%; \
             your current mix of generations already pays {} more.",
            config.generation_rate(0),
            Money(-gain.0)
        )
    };
    Ok(HypotheticalScenario {
        current_commission: current.total,
        commission_if_no_platas: without.total,
        potential_gain: gain,
        explanation,
    })
}

fn generation_distribution(current: &CommissionAggregate) -> Vec<GenerationDistribution> {
    current
        .by_generation
        .iter()
        .map(|b| GenerationDistribution {
            generation: b.generation,
            rate: rate_fraction(b.rate),
            count: b.cell.count,
            total_points: b.cell.total_points,
            total_commission: b.cell.total_commission,
            percentage_of_total: b.cell.percentage_of_total,
        })
        .collect()
}

fn average_generation(tree: &NetworkTree, classification: &Classification) -> Decimal {
    let count = tree.downline_len();
    if count == 0 {
        return Decimal::ZERO;
    }
    let sum: u64 = tree.downline().map(|i| classification.generation(i) as u64).sum();
    round_pct(Decimal::from(sum) / Decimal::from(count as u64))
}

/// The generation step carrying the largest summed loss, e.g. `"G0→G1"`.
fn most_impacted_shift(chains: &[DilutionChain]) -> String {
    let mut by_shift: BTreeMap<(u8, u8), Money> = BTreeMap::new();
    for a in chains.iter().flat_map(|c| c.affected_distributors.iter()) {
        *by_shift.entry((a.generation_before, a.generation_after)).or_default() += a.commission_lost;
    }
    by_shift
        .into_iter()
        .fold(None::<((u8, u8), Money)>, |best, (shift, amount)| match best {
            Some((_, top)) if top >= amount => best,
            _ => Some((shift, amount)),
        })
        .map(|((from, to), _)| format!("G{from}→G{to}"))
        .unwrap_or_else(|| "none".to_string())
}

fn visual_tree(
    tree: &NetworkTree,
    classification: &Classification,
    current: &CommissionAggregate,
    config: &PlanConfig,
) -> Vec<GenerationCutNode> {
    tree.downline()
        .filter(|&i| tree.node(i).depth <= config.visual_tree_depth)
        .map(|i| {
            let node = tree.node(i);
            let is_plata_plus = node.rank.is_plata_plus();
            GenerationCutNode {
                id_customers: node.id,
                full_name: node.full_name.clone(),
                name_plan: node.rank.plan_name().to_string(),
                nivel: node.depth,
                generation: classification.generation(i),
                points: node.commission_points(config.point_basis),
                commission_earned: current.commission_of(i),
                is_plata_plus,
                creates_generation_cut: is_plata_plus && !node.children.is_empty(),
            }
        })
        .collect()
}

/// Share of commission earned in G3–G4, as a percentage.
pub fn far_generation_share(current: &CommissionAggregate) -> Decimal {
    let summary = current.generation_summary();
    percentage_of(summary.g3_g4_commission.0, current.total.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
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

    fn analyze(rows: Vec<DistributorRecord>) -> VerticalGrowthAnalysis {
        let cfg = PlanConfig::default();
        let tree = NetworkTree::from_records(DistributorId(1), PeriodId(1), rows, None).expect("test: tree");
        let c = classify(&tree);
        let agg = aggregate(&tree, &c, &cfg).expect("test: aggregate");
        analyze_dilution(&tree, &c, &agg, &cfg).expect("test: dilution")
    }

    #[test]
    fn health_score_formula() {
        assert_eq!(health_score(Money(dec!(70)), Money(dec!(100))), 70);
        assert_eq!(health_score(Money(dec!(1)), Money(dec!(200))), 1, "0.5 rounds away from zero");
        assert_eq!(health_score(Money(dec!(0)), Money(dec!(100))), 0);
        assert_eq!(health_score(Money::zero(), Money::zero()), 100);
    }

    #[test]
    fn health_score_is_monotonic() {
        let total = Money(dec!(1000));
        let mut last = 0;
        for near in (0..=1000).step_by(7) {
            let score = health_score(Money(Decimal::from(near)), total);
            assert!(score >= last, "score dropped at near={near}");
            last = score;
        }
    }

    #[test]
    fn health_bands() {
        let bands = HealthBands::default();
        assert_eq!(HealthBand::for_score(70, &bands), HealthBand::Healthy);
        assert_eq!(HealthBand::for_score(69, &bands), HealthBand::Moderate);
        assert_eq!(HealthBand::for_score(40, &bands), HealthBand::Moderate);
        assert_eq!(HealthBand::for_score(39, &bands), HealthBand::Critical);
    }

    #[test]
    fn single_deep_plata_chain() {
        let analysis = analyze(vec![
            rec(1, None, "Oro", 0),
            rec(2, Some(1), "Plata", 0),
            rec(3, Some(2), "Distribuidor", 1000),
        ]);
        assert_eq!(analysis.dilution_chains.len(), 1);
        let chain = &analysis.dilution_chains[0];
        assert_eq!(chain.plata_distributor.id_customers, DistributorId(2));
        assert_eq!(chain.affected_count, 1);
        let b = &chain.affected_distributors[0];
        assert_eq!((b.generation_before, b.generation_after), (0, 1));
        // 1000 × (5% − 4%)
        assert_eq!(b.commission_lost, Money(dec!(10)));
        assert_eq!(chain.total_commission_lost, Money(dec!(10)));
        assert_eq!(analysis.plata_plus_distributors[0].estimated_dilution_caused, Money(dec!(10)));
        assert_eq!(analysis.summary.total_dilution_amount, Money(dec!(10)));
        assert_eq!(analysis.summary.most_impacted_generation_shift, "G0→G1");
    }

    #[test]
    fn step_to_lower_rate_is_not_reported() {
        // Three stacked Platas: node 3 moves G0→G1, node 4 G1→G2 (same
        // rate), node 5 G2→G3 (rate drops). Only node 3 is reported.
        let analysis = analyze(vec![
            rec(1, None, "Oro", 0),
            rec(2, Some(1), "Plata", 0),
            rec(3, Some(2), "Plata", 500),
            rec(4, Some(3), "Plata", 0),
            rec(5, Some(4), "Distribuidor", 1000),
        ]);
        assert_eq!(analysis.summary.total_plata_plus_in_network, 3);
        assert_eq!(analysis.dilution_chains.len(), 1);
        let chain = &analysis.dilution_chains[0];
        assert_eq!(chain.plata_distributor.id_customers, DistributorId(2));
        let ids: Vec<DistributorId> = chain.affected_distributors.iter().map(|a| a.id_customers).collect();
        assert_eq!(ids, vec![DistributorId(3)]);
        assert_eq!(chain.total_commission_lost, Money(dec!(5)));

        let caused: Vec<Money> = analysis.plata_plus_distributors.iter().map(|p| p.estimated_dilution_caused).collect();
        assert_eq!(caused, vec![Money(dec!(5)), Money::zero(), Money::zero()]);
        assert_eq!(analysis.summary.total_dilution_amount, Money(dec!(5)));
    }

    #[test]
    fn every_reported_entry_is_a_positive_outward_shift() {
        let analysis = analyze(vec![
            rec(1, None, "Oro", 0),
            rec(2, Some(1), "Plata", 300),
            rec(3, Some(2), "Bronce", 400),
            rec(4, Some(3), "Plata", 200),
            rec(5, Some(4), "Distribuidor", 700),
            rec(6, Some(1), "Oro", 100),
            rec(7, Some(6), "Distribuidor", 900),
        ]);
        let mut summed = Money::zero();
        for chain in &analysis.dilution_chains {
            let chain_total: Money = chain.affected_distributors.iter().map(|a| a.commission_lost).sum();
            assert_eq!(chain.total_commission_lost, chain_total);
            for a in &chain.affected_distributors {
                assert!(a.generation_after > a.generation_before);
                assert!(a.rate_after > a.rate_before);
                assert!(a.commission_lost >= Money::zero());
            }
            summed += chain.total_commission_lost;
        }
        assert_eq!(analysis.summary.total_dilution_amount, summed);
        // G0→G1: 3 (400) and 4 (200) under 2, 7 (900) under 6
        assert_eq!(summed, Money(dec!(15)));
    }

    #[test]
    fn wire_rates_are_fractions() {
        let analysis = analyze(vec![
            rec(1, None, "Oro", 0),
            rec(2, Some(1), "Plata", 0),
            rec(3, Some(2), "Distribuidor", 1000),
        ]);
        let json = serde_json::to_value(&analysis).expect("test: serialize");
        assert_eq!(json["generation_distribution"][0]["rate"], serde_json::json!(0.04));
        assert_eq!(json["generation_distribution"][3]["rate"], serde_json::json!(0.02));
        let affected = &json["dilution_chains"][0]["affected_distributors"][0];
        assert_eq!(affected["rate_before"], serde_json::json!(0.04));
        assert_eq!(affected["rate_after"], serde_json::json!(0.05));
        assert_eq!(affected["commission_lost"], serde_json::json!(10.0));
    }

    #[test]
    fn flat_network_is_healthy() {
        let analysis = analyze(vec![
            rec(1, None, "Oro", 0),
            rec(2, Some(1), "Distribuidor", 500),
            rec(3, Some(1), "Bronce", 700),
            rec(4, Some(1), "Distribuidor", 300),
        ]);
        assert!(analysis.dilution_chains.is_empty());
        assert!(analysis.summary.health_score >= 70);
        assert_eq!(analysis.summary.average_generation, Decimal::ZERO);
        let h = &analysis.hypothetical_scenario;
        assert_eq!(h.commission_if_no_platas, h.current_commission);
        assert!(h.potential_gain.is_zero());
    }

    #[test]
    fn hypothetical_gain_is_not_clamped() {
        // G1 at 5% beats G0 at 4%: removing the cut would cost money.
        let analysis = analyze(vec![
            rec(1, None, "Oro", 0),
            rec(2, Some(1), "Plata", 0),
            rec(3, Some(2), "Distribuidor", 1000),
        ]);
        let h = &analysis.hypothetical_scenario;
        assert_eq!(h.current_commission, Money(dec!(50)));
        assert_eq!(h.commission_if_no_platas, Money(dec!(40)));
        assert_eq!(h.potential_gain, Money(dec!(-10)));
    }

    #[test]
    fn plata_list_and_visual_tree() {
        let analysis = analyze(vec![
            rec(1, None, "Oro", 0),
            rec(2, Some(1), "Plata", 100),
            rec(3, Some(2), "Plata", 100),
            rec(4, Some(3), "Plata", 100),
            rec(5, Some(4), "Distribuidor", 100),
            rec(6, Some(5), "Distribuidor", 100),
        ]);
        let first = &analysis.plata_plus_distributors[0];
        assert_eq!(first.id_customers, DistributorId(2));
        assert_eq!(first.downline_in_g3_g4, 2);
        assert_eq!(analysis.visual_tree.len(), 3, "visual tree stops at depth 3");
        assert!(analysis.visual_tree[0].creates_generation_cut);
        assert_eq!(analysis.summary.network_depth, 5);
    }
}
