// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - Response Cache Port
//
// Optional cache of final query responses keyed by (query, root, period,
// params). There is no TTL: entries stay until invalidated or evicted for
// capacity. The analyses
// themselves never see the cache; only the service facade consults it.

use std::fmt;

#[cfg(not(target_arch = "wasm32"))]
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(not(target_arch = "wasm32"))]
use crate::config::PlanConfig;
use crate::error::Result;
use crate::types::{DistributorId, PeriodId};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    Summary,
    ByGeneration,
    ByLevel,
    ByLevelGeneration,
    CommissionDetails,
    CommissionHistory,
    RolloverSummary,
    RolloverAnalysis,
    NetworkTree,
    NetworkFirstLevel,
    NetworkStatsByLevel,
    Dilution,
    Comparison,
    FullDiagnostic,
    VerticalGrowth,
    PlataCandidates,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::ByGeneration => "by-generation",
            Self::ByLevel => "by-level",
            Self::ByLevelGeneration => "by-level-generation",
            Self::CommissionDetails => "commission-details",
            Self::CommissionHistory => "commission-history",
            Self::RolloverSummary => "rollover-summary",
            Self::RolloverAnalysis => "rollover-analysis",
            Self::NetworkTree => "network-tree",
            Self::NetworkFirstLevel => "network-first-level",
            Self::NetworkStatsByLevel => "network-stats-by-level",
            Self::Dilution => "dilution",
            Self::Comparison => "comparison",
            Self::FullDiagnostic => "full-diagnostic",
            Self::VerticalGrowth => "vertical-growth",
            Self::PlataCandidates => "plata-candidates",
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    pub query: QueryKind,
    pub root_id: DistributorId,
    pub period_id: PeriodId,
    /// Extra parameters, already normalised by the caller.
    pub params: String,
}

impl CacheKey {
    pub fn new(query: QueryKind, root_id: DistributorId, period_id: PeriodId) -> Self {
        Self { query, root_id, period_id, params: String::new() }
    }

    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.params = params.into();
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.query.as_str(), self.root_id, self.period_id, self.params)
    }
}

/// Storage for serialized responses.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Value>>;

    fn put(&self, key: CacheKey, value: Value) -> Result<()>;

    fn invalidate(&self, key: &CacheKey) -> Result<()>;

    /// Drop every entry for one root, across periods and queries.
    fn invalidate_root(&self, root_id: DistributorId) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

/// Bounded in-process cache. Once `max_entries` is reached moka evicts by
/// its TinyLFU policy, so a long-lived service does not grow without limit.
#[cfg(not(target_arch = "wasm32"))]
pub struct MemoryCache {
    entries: Cache<CacheKey, Value>,
}

#[cfg(not(target_arch = "wasm32"))]
impl MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        Self { entries: Cache::builder().max_capacity(max_entries).build() }
    }

    pub fn from_config(config: &PlanConfig) -> Self {
        Self::new(config.cache_max_entries)
    }

    /// Entry count after pending evictions are applied.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache").field("entries", &self.entries.entry_count()).finish()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ResponseCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        Ok(self.entries.get(key))
    }

    fn put(&self, key: CacheKey, value: Value) -> Result<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.entries.invalidate(key);
        Ok(())
    }

    fn invalidate_root(&self, root_id: DistributorId) -> Result<()> {
        let stale: Vec<_> = self
            .entries
            .iter()
            .filter(|(k, _)| k.root_id == root_id)
            .map(|(k, _)| k)
            .collect();
        for key in stale {
            self.entries.invalidate(key.as_ref());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NoCache
// ---------------------------------------------------------------------------

/// Caching disabled: every lookup misses, every write is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<Value>> {
        Ok(None)
    }

    fn put(&self, _key: CacheKey, _value: Value) -> Result<()> {
        Ok(())
    }

    fn invalidate(&self, _key: &CacheKey) -> Result<()> {
        Ok(())
    }

    fn invalidate_root(&self, _root_id: DistributorId) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}
