// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Compensation plan configuration.
//!
//! Every business constant the engine uses lives here as data: generation
//! rates, level rates, per-rank roll-over requirements, health bands and
//! simulation limits. [`PlanConfig::default`] is the published plan; partial
//! JSON files override individual fields.

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::{Points, Rank};

/// Highest generation index; deeper cuts collapse into it.
pub const MAX_GENERATION: u8 = 4;

/// Highest multilevel depth; deeper nodes collapse into it.
pub const MAX_LEVEL: u8 = 3;

// ---------------------------------------------------------------------------
// PlanConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Percent paid per generation G0..G4.
    pub generation_rates: [Decimal; 5],
    /// Percent per multilevel depth ML1..ML3.
    pub level_rates: [Decimal; 3],
    /// Per-rank group volume requirement and leg cap. Absent ranks are uncapped.
    pub rollover: Vec<RankRollOver>,
    pub health: HealthBands,
    pub point_basis: PointBasis,
    pub qualified_frontal_min_points: Decimal,
    pub limits: SimulationLimits,
    pub visual_tree_depth: u32,
    pub candidate_limit: usize,
    pub default_page_limit: usize,
    /// Upper bound on cached query responses.
    pub cache_max_entries: u64,
    pub retry: RetryPolicy,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            generation_rates: [dec!(4), dec!(5), dec!(5), dec!(2), dec!(2)],
            level_rates: [dec!(15), dec!(5), dec!(5)],
            rollover: vec![
                RankRollOver::new(Rank::Plata, dec!(3000), dec!(50)),
                RankRollOver::new(Rank::Oro, dec!(10000), dec!(50)),
                RankRollOver::new(Rank::Platino, dec!(25000), dec!(40)),
                RankRollOver::new(Rank::Diamante, dec!(50000), dec!(40)),
                RankRollOver::new(Rank::DobleDiamante, dec!(100000), dec!(35)),
                RankRollOver::new(Rank::TripleDiamante, dec!(200000), dec!(35)),
                RankRollOver::new(Rank::Sirius, dec!(400000), dec!(30)),
            ],
            health: HealthBands::default(),
            point_basis: PointBasis::Business,
            qualified_frontal_min_points: dec!(100),
            limits: SimulationLimits::default(),
            visual_tree_depth: 3,
            candidate_limit: 50,
            default_page_limit: 100,
            cache_max_entries: 10_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl PlanConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let mut all_rates = self.generation_rates.iter().chain(self.level_rates.iter());
        if all_rates.any(|r| r.is_sign_negative()) {
            return Err(EngineError::Config("commission rates must be non-negative".into()));
        }
        for entry in &self.rollover {
            if entry.rollover_percent <= Decimal::ZERO || entry.rollover_percent > dec!(100) {
                return Err(EngineError::Config(format!(
                    "rollover percent for {} must be in (0, 100], got {}",
                    entry.rank, entry.rollover_percent
                )));
            }
            if entry.v_grupal_required.is_sign_negative() {
                return Err(EngineError::Config(format!(
                    "group volume requirement for {} must be non-negative",
                    entry.rank
                )));
            }
        }
        if self.health.moderate_min > self.health.healthy_min || self.health.healthy_min > 100 {
            return Err(EngineError::Config(format!(
                "health bands inverted: moderate {} / healthy {}",
                self.health.moderate_min, self.health.healthy_min
            )));
        }
        if self.default_page_limit == 0 {
            return Err(EngineError::Config("default page limit must be positive".into()));
        }
        Ok(())
    }

    /// Rate for a generation index; indices past G4 use the G4 rate.
    pub fn generation_rate(&self, generation: u8) -> Decimal {
        let idx = generation.min(MAX_GENERATION) as usize;
        self.generation_rates[idx]
    }

    /// Rate for a level (1-based); indices past ML3 use the ML3 rate.
    pub fn level_rate(&self, level: u8) -> Decimal {
        let idx = level.clamp(1, MAX_LEVEL) as usize - 1;
        self.level_rates[idx]
    }

    /// Roll-over requirement for a rank, `None` when the rank is uncapped.
    pub fn rollover_for(&self, rank: Rank) -> Option<&RankRollOver> {
        self.rollover.iter().find(|r| r.rank == rank)
    }
}

// ---------------------------------------------------------------------------
// RankRollOver
// ---------------------------------------------------------------------------

/// Group volume requirement and per-leg roll-over cap for one rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRollOver {
    pub rank: Rank,
    pub v_grupal_required: Decimal,
    pub rollover_percent: Decimal,
}

impl RankRollOver {
    pub fn new(rank: Rank, v_grupal_required: Decimal, rollover_percent: Decimal) -> Self {
        Self { rank, v_grupal_required, rollover_percent }
    }

    /// `rollover_percent × v_grupal_required`.
    pub fn max_per_leg(&self) -> Points {
        Points(self.v_grupal_required * self.rollover_percent / dec!(100))
    }
}

// ---------------------------------------------------------------------------
// HealthBands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBands {
    pub healthy_min: u8,
    pub moderate_min: u8,
}

impl Default for HealthBands {
    fn default() -> Self {
        Self { healthy_min: 70, moderate_min: 40 }
    }
}

// ---------------------------------------------------------------------------
// PointBasis
// ---------------------------------------------------------------------------

/// Which of a node's volumes is commissionable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointBasis {
    /// Business points (`pts_negocio`).
    #[default]
    Business,
    Personal,
}

// ---------------------------------------------------------------------------
// SimulationLimits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationLimits {
    pub max_new_frontals: u32,
    pub max_points_per_frontal: Decimal,
    pub max_volume_increase_pct: Decimal,
}

impl Default for SimulationLimits {
    fn default() -> Self {
        Self {
            max_new_frontals: 1000,
            max_points_per_frontal: dec!(1000000),
            max_volume_increase_pct: dec!(1000),
        }
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry schedule applied at the data-source boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Budget for the summed sleeps between attempts.
    pub deadline_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1000,
            deadline_ms: 5000,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
