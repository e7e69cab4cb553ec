// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Query facade.
//!
//! [`CompensationService`] owns a data source, a response cache and the plan
//! configuration, and exposes one method per dashboard query. Each method
//! builds the tree it needs, runs the pure analyses and returns a serde type
//! whose field names are the wire contract.
//!
//! Cacheable responses are looked up by [`CacheKey`] first. A cache that
//! fails is logged and treated as a miss; errors (invariant violations in
//! particular) are returned and never stored.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::{
    aggregate, CommissionAggregate, GenerationBreakdown, GenerationSummary, LevelBreakdown,
    LevelGenerationBreakdown,
};
use crate::cache::{CacheKey, QueryKind, ResponseCache};
use crate::classify::{classify, Classification};
use crate::config::PlanConfig;
use crate::diagnostic::{
    compare_periods, diagnose, previous_period, DiagnosticResult, FullDiagnostic, PeriodComparison, PeriodView,
};
use crate::dilution::{analyze_dilution, VerticalGrowthAnalysis};
use crate::error::{EngineError, Entity, Result};
use crate::network::{first_level, network_view, stats_by_level, NetworkFrontal, NetworkLevelStats, NetworkNode};
use crate::rollover::{analyze_rollover, RollOverAnalysis, RollOverSummary};
use crate::simulator::{plata_candidates, simulate, PlataCandidate, Scenario, SimulationScenario};
use crate::source::NetworkSource;
use crate::tree::{build_full_tree, build_tree, DataDiagnostic, NetworkTree};
use crate::types::{DistributorId, Money, Period, PeriodId, Points};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDistributor {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub name_plan: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPeriod {
    pub id_period: PeriodId,
    pub name_period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPersonal {
    pub point_current_customers: Points,
    pub subtotal_earnings: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryNetwork {
    pub total_distributors: usize,
    pub qualified_frontals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCommissions {
    pub total: Money,
    pub generation_summary: GenerationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorSummary {
    pub distributor: SummaryDistributor,
    pub period: SummaryPeriod,
    pub personal: SummaryPersonal,
    pub network: SummaryNetwork,
    pub commissions: SummaryCommissions,
}

/// Filters and paging for [`CompensationService::commission_details`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailQuery {
    /// 0 means the configured default page size.
    pub limit: usize,
    pub offset: usize,
    pub nivel: Option<u8>,
    pub generation: Option<u8>,
}

impl DetailQuery {
    fn cache_params(&self, limit: usize) -> String {
        let opt = |v: Option<u8>| v.map(|n| n.to_string()).unwrap_or_default();
        format!(
            "limit={limit}&offset={}&nivel={}&generation={}",
            self.offset,
            opt(self.nivel),
            opt(self.generation)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionDetail {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub nivel: u8,
    pub generation: u8,
    pub name_plan: String,
    pub point_current_customers: Points,
    pub point_business_customers: Points,
    pub percentage_nivel: Decimal,
    pub percentage_generation: Decimal,
    pub subtotal_earnings: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionDetailsPage {
    pub data: Vec<CommissionDetail>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionHistory {
    pub id_period: PeriodId,
    pub name_period: String,
    pub name_plan: String,
    pub subtotal_earnings: Money,
    /// Network commission is the only earning the engine computes, so this
    /// equals `subtotal_earnings`.
    pub total: Money,
}

// ---------------------------------------------------------------------------
// CompensationService
// ---------------------------------------------------------------------------

/// A classified full-downline tree and its commission aggregate.
struct Analysed {
    tree: NetworkTree,
    classification: Classification,
    aggregate: CommissionAggregate,
}

pub struct CompensationService<S, C> {
    source: S,
    cache: C,
    config: PlanConfig,
}

impl<S: NetworkSource, C: ResponseCache> CompensationService<S, C> {
    pub fn new(source: S, cache: C, config: PlanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { source, cache, config })
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Drop every cached response for `root_id`.
    pub fn refresh(&self, root_id: DistributorId) -> Result<()> {
        self.cache.invalidate_root(root_id)?;
        debug!(root_id = %root_id, "cached responses invalidated");
        Ok(())
    }

    // ── Commissions ──

    pub fn summary(&self, root_id: DistributorId, period_id: PeriodId) -> Result<DistributorSummary> {
        let key = CacheKey::new(QueryKind::Summary, root_id, period_id);
        self.cached(key, || {
            let period = self.require_period(period_id)?;
            let a = self.analyse(root_id, period_id)?;
            let root = a.tree.root();
            let min = self.config.qualified_frontal_min_points;
            let qualified_frontals = a
                .tree
                .frontals()
                .iter()
                .filter(|&&i| a.tree.node(i).personal_points.0 >= min)
                .count();
            Ok(DistributorSummary {
                distributor: SummaryDistributor {
                    id_customers: root.id,
                    full_name: root.full_name.clone(),
                    name_plan: root.rank.plan_name().to_string(),
                },
                period: SummaryPeriod { id_period: period.id_period, name_period: period.name_period },
                personal: SummaryPersonal {
                    point_current_customers: root.personal_points,
                    subtotal_earnings: a.aggregate.total,
                },
                network: SummaryNetwork { total_distributors: a.tree.downline_len(), qualified_frontals },
                commissions: SummaryCommissions {
                    total: a.aggregate.total,
                    generation_summary: a.aggregate.generation_summary(),
                },
            })
        })
    }

    pub fn by_generation(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Vec<GenerationBreakdown>> {
        let key = CacheKey::new(QueryKind::ByGeneration, root_id, period_id);
        self.cached(key, || Ok(self.analyse(root_id, period_id)?.aggregate.generation_rows()))
    }

    pub fn by_level(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Vec<LevelBreakdown>> {
        let key = CacheKey::new(QueryKind::ByLevel, root_id, period_id);
        self.cached(key, || Ok(self.analyse(root_id, period_id)?.aggregate.level_rows()))
    }

    pub fn by_level_generation(
        &self,
        root_id: DistributorId,
        period_id: PeriodId,
    ) -> Result<Vec<LevelGenerationBreakdown>> {
        let key = CacheKey::new(QueryKind::ByLevelGeneration, root_id, period_id);
        self.cached(key, || Ok(self.analyse(root_id, period_id)?.aggregate.level_generation_rows()))
    }

    pub fn commission_details(
        &self,
        root_id: DistributorId,
        period_id: PeriodId,
        query: DetailQuery,
    ) -> Result<CommissionDetailsPage> {
        let limit = if query.limit == 0 { self.config.default_page_limit } else { query.limit };
        let key = CacheKey::new(QueryKind::CommissionDetails, root_id, period_id).with_params(query.cache_params(limit));
        self.cached(key, || {
            let a = self.analyse(root_id, period_id)?;
            let mut rows: Vec<CommissionDetail> = a
                .tree
                .downline()
                .filter(|&i| query.nivel.map_or(true, |n| a.classification.level(i) == n))
                .filter(|&i| query.generation.map_or(true, |g| a.classification.generation(i) == g))
                .map(|i| {
                    let node = a.tree.node(i);
                    let level = a.classification.level(i);
                    let generation = a.classification.generation(i);
                    CommissionDetail {
                        id_customers: node.id,
                        full_name: node.full_name.clone(),
                        nivel: level,
                        generation,
                        name_plan: node.rank.plan_name().to_string(),
                        point_current_customers: node.personal_points,
                        point_business_customers: node.group_points,
                        percentage_nivel: self.config.level_rate(level),
                        percentage_generation: self.config.generation_rate(generation),
                        subtotal_earnings: a.aggregate.commission_of(i),
                    }
                })
                .collect();
            rows.sort_by(|x, y| {
                x.nivel
                    .cmp(&y.nivel)
                    .then(x.generation.cmp(&y.generation))
                    .then(y.subtotal_earnings.cmp(&x.subtotal_earnings))
                    .then(x.id_customers.cmp(&y.id_customers))
            });

            let total = rows.len();
            let data: Vec<CommissionDetail> = rows.into_iter().skip(query.offset).take(limit).collect();
            let has_more = query.offset.saturating_add(data.len()) < total;
            Ok(CommissionDetailsPage {
                data,
                pagination: Pagination { total, limit, offset: query.offset, has_more },
            })
        })
    }

    /// Earnings for the latest `months` periods the root appears in, most
    /// recent first.
    pub fn commission_history(&self, root_id: DistributorId, months: usize) -> Result<Vec<CommissionHistory>> {
        let mut periods = self.source.periods()?;
        periods.sort_by(|a, b| b.start_date.cmp(&a.start_date));

        let mut history = Vec::with_capacity(months.min(periods.len()));
        for period in periods {
            if history.len() >= months {
                break;
            }
            let a = match self.analyse(root_id, period.id_period) {
                Ok(a) => a,
                Err(EngineError::NotFound { entity: Entity::Distributor, .. }) => continue,
                Err(err) => return Err(err),
            };
            history.push(CommissionHistory {
                id_period: period.id_period,
                name_period: period.name_period,
                name_plan: a.tree.root().rank.plan_name().to_string(),
                subtotal_earnings: a.aggregate.total,
                total: a.aggregate.total,
            });
        }
        Ok(history)
    }

    // ── Roll-over ──

    pub fn rollover_summary(&self, root_id: DistributorId, period_id: PeriodId) -> Result<RollOverSummary> {
        let key = CacheKey::new(QueryKind::RolloverSummary, root_id, period_id);
        self.cached(key, || Ok(self.rollover(root_id, period_id)?.summary))
    }

    pub fn rollover_analysis(&self, root_id: DistributorId, period_id: PeriodId) -> Result<RollOverAnalysis> {
        let key = CacheKey::new(QueryKind::RolloverAnalysis, root_id, period_id);
        self.cached(key, || self.rollover(root_id, period_id))
    }

    fn rollover(&self, root_id: DistributorId, period_id: PeriodId) -> Result<RollOverAnalysis> {
        let tree = build_full_tree(&self.source, root_id, period_id)?;
        Ok(analyze_rollover(&tree, tree.root().rank, &self.config))
    }

    // ── Network ──

    pub fn network_tree(&self, root_id: DistributorId, period_id: PeriodId, depth: u32) -> Result<NetworkNode> {
        let key = CacheKey::new(QueryKind::NetworkTree, root_id, period_id).with_params(format!("depth={depth}"));
        self.cached(key, || {
            let tree = build_tree(&self.source, root_id, period_id, depth)?;
            Ok(network_view(&tree, self.config.point_basis))
        })
    }

    pub fn network_first_level(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Vec<NetworkFrontal>> {
        let key = CacheKey::new(QueryKind::NetworkFirstLevel, root_id, period_id);
        self.cached(key, || Ok(first_level(&build_full_tree(&self.source, root_id, period_id)?)))
    }

    pub fn network_stats_by_level(
        &self,
        root_id: DistributorId,
        period_id: PeriodId,
    ) -> Result<Vec<NetworkLevelStats>> {
        let key = CacheKey::new(QueryKind::NetworkStatsByLevel, root_id, period_id);
        self.cached(key, || {
            let tree = build_full_tree(&self.source, root_id, period_id)?;
            Ok(stats_by_level(&tree, self.config.point_basis))
        })
    }

    /// Rows the tree builder tolerated rather than rejected. Not cached.
    pub fn data_diagnostics(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Vec<DataDiagnostic>> {
        let tree = build_full_tree(&self.source, root_id, period_id)?;
        Ok(tree.diagnostics().to_vec())
    }

    // ── Diagnostics ──

    pub fn vertical_growth(&self, root_id: DistributorId, period_id: PeriodId) -> Result<VerticalGrowthAnalysis> {
        let key = CacheKey::new(QueryKind::VerticalGrowth, root_id, period_id);
        self.cached(key, || {
            let a = self.analyse(root_id, period_id)?;
            analyze_dilution(&a.tree, &a.classification, &a.aggregate, &self.config)
        })
    }

    pub fn dilution_analysis(&self, root_id: DistributorId, period_id: PeriodId) -> Result<DiagnosticResult> {
        let key = CacheKey::new(QueryKind::Dilution, root_id, period_id);
        self.cached(key, || {
            let a = self.analyse(root_id, period_id)?;
            let analysis = analyze_dilution(&a.tree, &a.classification, &a.aggregate, &self.config)?;
            Ok(diagnose(&analysis, &a.aggregate))
        })
    }

    pub fn period_comparison(&self, root_id: DistributorId, period_id: PeriodId) -> Result<PeriodComparison> {
        let key = CacheKey::new(QueryKind::Comparison, root_id, period_id);
        self.cached(key, || {
            let current_period = self.require_period(period_id)?;
            let current = self.analyse(root_id, period_id)?;
            self.compare_with_previous(root_id, &current_period, &current)
        })
    }

    pub fn full_diagnostic(&self, root_id: DistributorId, period_id: PeriodId) -> Result<FullDiagnostic> {
        let key = CacheKey::new(QueryKind::FullDiagnostic, root_id, period_id);
        self.cached(key, || {
            let current_period = self.require_period(period_id)?;
            let current = self.analyse(root_id, period_id)?;
            let analysis =
                analyze_dilution(&current.tree, &current.classification, &current.aggregate, &self.config)?;
            Ok(FullDiagnostic {
                dilution: diagnose(&analysis, &current.aggregate),
                comparison: self.compare_with_previous(root_id, &current_period, &current)?,
            })
        })
    }

    fn compare_with_previous(
        &self,
        root_id: DistributorId,
        current_period: &Period,
        current: &Analysed,
    ) -> Result<PeriodComparison> {
        let periods = self.source.periods()?;
        let previous = match previous_period(&periods, current_period) {
            Some(p) => match self.analyse(root_id, p.id_period) {
                Ok(a) => Some((p, a)),
                Err(EngineError::NotFound { entity: Entity::Distributor, .. }) => None,
                Err(err) => return Err(err),
            },
            None => None,
        };

        let current_view = PeriodView {
            period: current_period,
            tree: &current.tree,
            aggregate: &current.aggregate,
        };
        let previous_view = previous.as_ref().map(|(p, a)| PeriodView {
            period: p,
            tree: &a.tree,
            aggregate: &a.aggregate,
        });
        Ok(compare_periods(&current_view, previous_view.as_ref()))
    }

    // ── Simulator ──

    pub fn simulate_new_frontals(
        &self,
        root_id: DistributorId,
        period_id: PeriodId,
        count: u32,
        points_per_frontal: Points,
    ) -> Result<SimulationScenario> {
        self.run_scenario(root_id, period_id, Scenario::NewFrontals { count, points_per_frontal })
    }

    pub fn simulate_volume_increase(
        &self,
        root_id: DistributorId,
        period_id: PeriodId,
        percentage: Decimal,
    ) -> Result<SimulationScenario> {
        self.run_scenario(root_id, period_id, Scenario::VolumeIncrease { percentage })
    }

    pub fn simulate_new_plata(
        &self,
        root_id: DistributorId,
        period_id: PeriodId,
        target: DistributorId,
    ) -> Result<SimulationScenario> {
        self.run_scenario(root_id, period_id, Scenario::PromoteToPlata { target })
    }

    /// Simulations are computed on demand and never cached.
    pub fn run_scenario(
        &self,
        root_id: DistributorId,
        period_id: PeriodId,
        scenario: Scenario,
    ) -> Result<SimulationScenario> {
        let tree = build_full_tree(&self.source, root_id, period_id)?;
        let result = simulate(&tree, tree.root().rank, &scenario, &self.config)?;
        Ok(result.to_wire(&tree))
    }

    pub fn plata_candidates(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Vec<PlataCandidate>> {
        let key = CacheKey::new(QueryKind::PlataCandidates, root_id, period_id);
        self.cached(key, || {
            let a = self.analyse(root_id, period_id)?;
            Ok(plata_candidates(&a.tree, &a.classification, &self.config))
        })
    }

    // ── Internals ──

    fn require_period(&self, period_id: PeriodId) -> Result<Period> {
        self.source
            .period(period_id)?
            .ok_or_else(|| EngineError::not_found(Entity::Period, period_id))
    }

    fn analyse(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Analysed> {
        let tree = build_full_tree(&self.source, root_id, period_id)?;
        let classification = classify(&tree);
        let aggregate = aggregate(&tree, &classification, &self.config)?;
        Ok(Analysed { tree, classification, aggregate })
    }

    fn cached<T, F>(&self, key: CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        match self.cache.get(&key) {
            Ok(Some(value)) => match serde_json::from_value::<T>(value) {
                Ok(hit) => {
                    debug!(key = %key, "cache hit");
                    return Ok(hit);
                }
                Err(err) => warn!(key = %key, error = %err, "discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(err) => warn!(key = %key, error = %err, "cache lookup failed; computing"),
        }

        let fresh = compute()?;
        match serde_json::to_value(&fresh) {
            Ok(value) => {
                if let Err(err) = self.cache.put(key.clone(), value) {
                    warn!(key = %key, error = %err, "cache store failed");
                }
            }
            Err(err) => warn!(key = %key, error = %err, "response not cacheable"),
        }
        Ok(fresh)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NoCache};
    use crate::source::MemorySource;
    use crate::types::DistributorRecord;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

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

    fn period(id: u64) -> Period {
        Period {
            id_period: PeriodId(id),
            name_period: format!("P{id}"),
            start_date: format!("2026-{id:02}-01"),
            end_date: format!("2026-{id:02}-28"),
            status: "closed".into(),
        }
    }

    fn source() -> MemorySource {
        let mut s = MemorySource::new();
        s.insert_period(period(1));
        s.insert_period(period(2));
        s.insert_rows(
            PeriodId(1),
            vec![rec(1, None, "Oro", 50, 50), rec(2, Some(1), "Bronce", 200, 1000)],
        );
        s.insert_rows(
            PeriodId(2),
            vec![
                rec(1, None, "Oro", 60, 60),
                rec(2, Some(1), "Plata", 200, 1000),
                rec(3, Some(2), "Distribuidor", 50, 400),
                rec(4, Some(1), "Distribuidor", 20, 100),
            ],
        );
        s
    }

    fn service() -> CompensationService<MemorySource, MemoryCache> {
        let cfg = PlanConfig::default();
        CompensationService::new(source(), MemoryCache::from_config(&cfg), cfg).expect("test: service")
    }

    #[test]
    fn summary_counts_qualified_frontals() {
        let svc = service();
        let s = svc.summary(DistributorId(1), PeriodId(2)).expect("test: summary");
        assert_eq!(s.network.total_distributors, 3);
        assert_eq!(s.network.qualified_frontals, 1);
        // 1000×4% + 400×5% + 100×4%
        assert_eq!(s.commissions.total, Money(dec!(64)));
        assert_eq!(s.personal.subtotal_earnings, s.commissions.total);
        assert_eq!(s.period.name_period, "P2");
    }

    #[test]
    fn unknown_root_and_period_are_not_found() {
        let svc = service();
        let err = svc.summary(DistributorId(99), PeriodId(2)).expect_err("test: no root");
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Distributor, .. }));
        let err = svc.by_generation(DistributorId(1), PeriodId(9)).expect_err("test: no period");
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Period, .. }));
    }

    #[test]
    fn responses_are_cached_until_refresh() {
        let svc = service();
        svc.by_generation(DistributorId(1), PeriodId(2)).expect("test: first");
        assert_eq!(svc.cache().len(), 1);
        svc.by_generation(DistributorId(1), PeriodId(2)).expect("test: hit");
        assert_eq!(svc.cache().len(), 1);
        svc.refresh(DistributorId(1)).expect("test: refresh");
        assert!(svc.cache().is_empty());
    }

    #[test]
    fn unreadable_cache_entry_is_recomputed() {
        let svc = service();
        let key = CacheKey::new(QueryKind::ByLevel, DistributorId(1), PeriodId(2));
        svc.cache().put(key, json!("garbage")).expect("test: seed cache");
        let rows = svc.by_level(DistributorId(1), PeriodId(2)).expect("test: recompute");
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn errors_are_not_cached() {
        let svc = service();
        let _ = svc.summary(DistributorId(99), PeriodId(2));
        assert!(svc.cache().is_empty());
    }

    #[test]
    fn details_paginate_and_order() {
        let svc = service();
        let page = svc
            .commission_details(DistributorId(1), PeriodId(2), DetailQuery { limit: 2, ..Default::default() })
            .expect("test: details");
        let ids: Vec<u64> = page.data.iter().map(|d| d.id_customers.0).collect();
        // ML1 by commission desc, then ML2
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(page.pagination, Pagination { total: 3, limit: 2, offset: 0, has_more: true });

        let filtered = svc
            .commission_details(
                DistributorId(1),
                PeriodId(2),
                DetailQuery { generation: Some(1), ..Default::default() },
            )
            .expect("test: filtered");
        assert_eq!(filtered.data.len(), 1);
        assert_eq!(filtered.pagination.limit, 100);
        assert_eq!(filtered.data[0].percentage_generation, dec!(5));
    }

    #[test]
    fn history_is_most_recent_first() {
        let svc = service();
        let history = svc.commission_history(DistributorId(1), 12).expect("test: history");
        let ids: Vec<u64> = history.iter().map(|h| h.id_period.0).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(history.iter().all(|h| h.total == h.subtotal_earnings));
        let json = serde_json::to_value(&history[0]).expect("test: serialize");
        assert!(json.get("subtotal_earnings").is_some() && json.get("total").is_some());
        let only_latest = svc.commission_history(DistributorId(1), 1).expect("test: history");
        assert_eq!(only_latest.len(), 1);
        let missing = svc.commission_history(DistributorId(3), 12).expect("test: partial history");
        assert_eq!(missing.len(), 1, "root absent in period 1");
    }

    #[test]
    fn comparison_uses_previous_period() {
        let svc = service();
        let cmp = svc.period_comparison(DistributorId(1), PeriodId(2)).expect("test: comparison");
        assert_eq!(cmp.previous_period.id_period, PeriodId(1));
        assert_eq!(cmp.changes.new_plata_plus_count, 1);
        assert_eq!(cmp.changes.network_change, 2);

        let first = svc.period_comparison(DistributorId(1), PeriodId(1)).expect("test: no previous");
        assert_eq!(first.previous_period.network_size, 0);
    }

    #[test]
    fn full_diagnostic_and_simulations() {
        let svc = CompensationService::new(source(), NoCache, PlanConfig::default()).expect("test: service");
        let full = svc.full_diagnostic(DistributorId(1), PeriodId(2)).expect("test: full");
        assert!(!full.dilution.has_problem);

        let sim = svc
            .simulate_new_plata(DistributorId(1), PeriodId(2), DistributorId(4))
            .expect("test: promote leaf");
        assert!(sim.impact.commission_change.is_zero(), "leaf has no subtree to shift");
        let err = svc
            .simulate_new_plata(DistributorId(1), PeriodId(2), DistributorId(2))
            .expect_err("test: already plata");
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let sim = svc
            .simulate_new_frontals(DistributorId(1), PeriodId(2), 2, Points::new(500))
            .expect("test: frontals");
        assert_eq!(sim.impact.commission_change, Money(dec!(40)));
        let wire: Value = serde_json::to_value(&sim).expect("test: serialize");
        assert_eq!(wire["scenario_type"], json!("new_frontals"));
    }

    #[test]
    fn network_views() {
        let svc = service();
        let view = svc.network_tree(DistributorId(1), PeriodId(2), 1).expect("test: tree");
        assert_eq!(view.children.len(), 2);
        assert!(view.children.iter().all(|c| c.children.is_empty()));
        let frontals = svc.network_first_level(DistributorId(1), PeriodId(2)).expect("test: frontals");
        assert_eq!(frontals[0].subnet_size, 1);
        let err = svc.network_tree(DistributorId(1), PeriodId(2), 0).expect_err("test: depth 0");
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
