// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine
//
// Multi-level compensation analytics for one distributor and period:
// generation/level classification, commission aggregation, roll-over
// capping, dilution analysis and what-if simulation over the sponsorship
// downline.

pub mod types;
pub mod error;
pub mod config;
pub mod source;
pub mod tree;
pub mod classify;
pub mod aggregate;
pub mod rollover;
pub mod dilution;
pub mod diagnostic;
pub mod simulator;
pub mod network;
pub mod cache;
pub mod service;
pub mod wasm;

pub use types::*;
pub use error::{EngineError, Entity, Result};
pub use config::PlanConfig;
pub use source::{MemorySource, NetworkSnapshot, NetworkSource};
#[cfg(not(target_arch = "wasm32"))]
pub use source::RetryingSource;
pub use tree::{build_full_tree, build_tree, NetworkTree};
pub use classify::{classify, classify_generations, classify_levels, Classification};
pub use aggregate::{aggregate, CommissionAggregate};
pub use rollover::{analyze_rollover, RollOverAnalysis};
pub use dilution::{analyze_dilution, health_score, VerticalGrowthAnalysis};
pub use simulator::{simulate, Scenario, SimulationResult};
pub use cache::{CacheKey, NoCache, QueryKind, ResponseCache};
#[cfg(not(target_arch = "wasm32"))]
pub use cache::MemoryCache;
pub use service::{CompensationService, DetailQuery};
pub use wasm::WasmEngine;
