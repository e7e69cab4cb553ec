// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - Diagnostics
//
// Turns a vertical-growth analysis into a plain verdict (healthy, moderate,
// severe dilution) and compares a period against the one before it.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::CommissionAggregate;
use crate::dilution::{far_generation_share, HealthBand, VerticalGrowthAnalysis};
use crate::tree::NetworkTree;
use crate::types::{percentage_of, round_pct, DistributorId, Money, Period, PeriodId};

// ---------------------------------------------------------------------------
// Dilution verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Healthy,
    ModerateDilution,
    SevereDilution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticImpact {
    /// Negative of the gross commission lost to generation cuts.
    pub monetary: Money,
    /// Negative of the G3–G4 share of commission.
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub has_problem: bool,
    pub problem_type: ProblemType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub impact: DiagnosticImpact,
    pub recommendations: Vec<String>,
}

pub fn diagnose(analysis: &VerticalGrowthAnalysis, current: &CommissionAggregate) -> DiagnosticResult {
    let summary = &analysis.summary;
    let far_share = far_generation_share(current);
    let impact = DiagnosticImpact {
        monetary: Money(-summary.total_dilution_amount.0),
        percentage: -far_share,
    };
    let score = summary.health_score;

    match summary.health_band {
        HealthBand::Healthy => DiagnosticResult {
            has_problem: false,
            problem_type: ProblemType::Healthy,
            severity: Severity::Low,
            title: "Healthy network".into(),
            description: format!(
                "Health score {score}/100: most of your commission comes from generations G0–G2."
            ),
            impact,
            recommendations: vec![
                "Keep sponsoring frontals directly to hold volume in near generations.".into(),
            ],
        },
        HealthBand::Moderate => DiagnosticResult {
            has_problem: true,
            problem_type: ProblemType::ModerateDilution,
            severity: Severity::Medium,
            title: "Moderate dilution".into(),
            description: format!(
                "Health score {score}/100: {far_share}% of your commission is paid at the G3–G4 rate."
            ),
            impact,
            recommendations: vec![
                "Grow new frontals at level 1 to add G0 volume.".into(),
                "Review where Plata+ promotions cut your deepest legs.".into(),
            ],
        },
        HealthBand::Critical => DiagnosticResult {
            has_problem: true,
            problem_type: ProblemType::SevereDilution,
            severity: Severity::High,
            title: "Severe dilution".into(),
            description: format!(
                "Health score {score}/100: {far_share}% of your commission is paid at the G3–G4 rate \
                 across {} generation cut(s).",
                summary.total_plata_plus_in_network
            ),
            impact,
            recommendations: vec![
                "Prioritise personal sponsoring; new frontals earn at the G0 rate immediately.".into(),
                "Support distributors close to Plata in your first levels instead of deep legs.".into(),
                "Compare periods to see whether the G0–G2 share keeps falling.".into(),
            ],
        },
    }
}

// ---------------------------------------------------------------------------
// Period comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodData {
    pub id_period: PeriodId,
    pub name_period: String,
    pub total_commission: Money,
    pub network_size: usize,
    pub g0_g2_percentage: Decimal,
    pub g3_g4_percentage: Decimal,
    pub g0_g2_commission: Money,
    pub g3_g4_commission: Money,
}

impl PeriodData {
    pub fn from_view(view: &PeriodView<'_>) -> Self {
        let summary = view.aggregate.generation_summary();
        Self {
            id_period: view.period.id_period,
            name_period: view.period.name_period.clone(),
            total_commission: view.aggregate.total,
            network_size: view.tree.downline_len(),
            g0_g2_percentage: summary.g0_g2_percentage,
            g3_g4_percentage: summary.g3_g4_percentage,
            g0_g2_commission: summary.g0_g2_commission,
            g3_g4_commission: summary.g3_g4_commission,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodChanges {
    pub commission_change: Money,
    pub commission_change_percentage: Decimal,
    pub network_change: i64,
    pub network_change_percentage: Decimal,
    /// Percentage-point move of the G0–G2 share.
    pub g0_g2_shift: Decimal,
    pub new_plata_plus_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub current_period: PeriodData,
    pub previous_period: PeriodData,
    pub changes: PeriodChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullDiagnostic {
    pub dilution: DiagnosticResult,
    pub comparison: PeriodComparison,
}

/// One analysed period: its tree and aggregated commissions.
pub struct PeriodView<'a> {
    pub period: &'a Period,
    pub tree: &'a NetworkTree,
    pub aggregate: &'a CommissionAggregate,
}

/// The period starting latest before `current` starts.
pub fn previous_period<'a>(periods: &'a [Period], current: &Period) -> Option<&'a Period> {
    periods
        .iter()
        .filter(|p| p.start_date < current.start_date)
        .max_by(|a, b| a.start_date.cmp(&b.start_date))
}

/// Compare `current` with `previous`; an absent previous period compares
/// against all zeros.
pub fn compare_periods(current: &PeriodView<'_>, previous: Option<&PeriodView<'_>>) -> PeriodComparison {
    let now = PeriodData::from_view(current);
    let before = previous.map(PeriodData::from_view).unwrap_or_default();

    let commission_change = now.total_commission - before.total_commission;
    let network_change = now.network_size as i64 - before.network_size as i64;
    let g0_g2_shift = if before.network_size == 0 {
        Decimal::ZERO
    } else {
        round_pct(now.g0_g2_percentage - before.g0_g2_percentage)
    };

    let previously_plata: HashSet<DistributorId> = previous
        .map(|p| {
            p.tree
                .downline()
                .map(|i| p.tree.node(i))
                .filter(|n| n.rank.is_plata_plus())
                .map(|n| n.id)
                .collect()
        })
        .unwrap_or_default();
    let new_plata_plus_count = current
        .tree
        .downline()
        .map(|i| current.tree.node(i))
        .filter(|n| n.rank.is_plata_plus() && !previously_plata.contains(&n.id))
        .count();

    let changes = PeriodChanges {
        commission_change,
        commission_change_percentage: percentage_of(commission_change.0, before.total_commission.0),
        network_change,
        network_change_percentage: percentage_of(
            Decimal::from(network_change),
            Decimal::from(before.network_size as u64),
        ),
        g0_g2_shift,
        new_plata_plus_count,
    };

    PeriodComparison { current_period: now, previous_period: before, changes }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
