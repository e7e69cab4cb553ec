// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - WASM Interface
//
// Browser embedding of the query facade over an in-memory snapshot. Every
// query returns a plain JS object with the same field names as the JSON API.

use rust_decimal::Decimal;
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[cfg(not(target_arch = "wasm32"))]
use crate::cache::MemoryCache;
#[cfg(target_arch = "wasm32")]
use crate::cache::NoCache;
use crate::cache::ResponseCache;
use crate::config::PlanConfig;
use crate::service::{CompensationService, DetailQuery};
use crate::source::MemorySource;
use crate::types::{DistributorId, PeriodId, Points};

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

// moka needs a monotonic clock the browser does not provide; there every
// query recomputes from the in-memory snapshot.
#[cfg(not(target_arch = "wasm32"))]
type EngineCache = MemoryCache;
#[cfg(target_arch = "wasm32")]
type EngineCache = NoCache;

#[cfg(not(target_arch = "wasm32"))]
fn engine_cache(config: &PlanConfig) -> EngineCache {
    MemoryCache::from_config(config)
}

#[cfg(target_arch = "wasm32")]
fn engine_cache(_config: &PlanConfig) -> EngineCache {
    NoCache
}

#[wasm_bindgen]
pub struct WasmEngine {
    service: CompensationService<MemorySource, EngineCache>,
}

#[wasm_bindgen]
impl WasmEngine {
    /// `snapshot_json` is a serialized `NetworkSnapshot`; `config_json`
    /// optionally overrides the default plan.
    #[wasm_bindgen(constructor)]
    pub fn new(snapshot_json: &str, config_json: Option<String>) -> Result<WasmEngine, JsError> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let source = MemorySource::from_json_str(snapshot_json)?;
        let config = match config_json {
            Some(json) => PlanConfig::from_json_str(&json)?,
            None => PlanConfig::default(),
        };
        let cache = engine_cache(&config);
        let service = CompensationService::new(source, cache, config)?;
        Ok(WasmEngine { service })
    }

    pub fn summary(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.summary(id(root), pid(period))?)
    }

    pub fn by_generation(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.by_generation(id(root), pid(period))?)
    }

    pub fn by_level(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.by_level(id(root), pid(period))?)
    }

    pub fn by_level_generation(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.by_level_generation(id(root), pid(period))?)
    }

    /// `query` is `{ limit, offset, nivel, generation }`, every field optional.
    pub fn commission_details(&self, root: u32, period: u32, query: JsValue) -> Result<JsValue, JsError> {
        let query: DetailQuery = if query.is_undefined() || query.is_null() {
            DetailQuery::default()
        } else {
            serde_wasm_bindgen::from_value(query)?
        };
        to_js(&self.service.commission_details(id(root), pid(period), query)?)
    }

    pub fn commission_history(&self, root: u32, months: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.commission_history(id(root), months as usize)?)
    }

    pub fn rollover_summary(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.rollover_summary(id(root), pid(period))?)
    }

    pub fn rollover_analysis(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.rollover_analysis(id(root), pid(period))?)
    }

    pub fn network_tree(&self, root: u32, period: u32, depth: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.network_tree(id(root), pid(period), depth)?)
    }

    pub fn network_first_level(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.network_first_level(id(root), pid(period))?)
    }

    pub fn network_stats_by_level(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.network_stats_by_level(id(root), pid(period))?)
    }

    pub fn dilution_analysis(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.dilution_analysis(id(root), pid(period))?)
    }

    pub fn period_comparison(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.period_comparison(id(root), pid(period))?)
    }

    pub fn full_diagnostic(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.full_diagnostic(id(root), pid(period))?)
    }

    pub fn vertical_growth(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.vertical_growth(id(root), pid(period))?)
    }

    pub fn simulate_new_plata(&self, root: u32, period: u32, target: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.simulate_new_plata(id(root), pid(period), id(target))?)
    }

    pub fn simulate_new_frontals(
        &self,
        root: u32,
        period: u32,
        count: u32,
        points_per_frontal: u32,
    ) -> Result<JsValue, JsError> {
        let points = Points::new(points_per_frontal as u64);
        to_js(&self.service.simulate_new_frontals(id(root), pid(period), count, points)?)
    }

    pub fn simulate_volume_increase(&self, root: u32, period: u32, percentage: f64) -> Result<JsValue, JsError> {
        let percentage = Decimal::try_from(percentage).map_err(|e| JsError::new(&format!("percentage: {e}")))?;
        to_js(&self.service.simulate_volume_increase(id(root), pid(period), percentage)?)
    }

    pub fn plata_candidates(&self, root: u32, period: u32) -> Result<JsValue, JsError> {
        to_js(&self.service.plata_candidates(id(root), pid(period))?)
    }

    pub fn refresh(&self, root: u32) -> Result<(), JsError> {
        Ok(self.service.refresh(id(root))?)
    }

    pub fn clear_cache(&self) -> Result<(), JsError> {
        Ok(self.service.cache().clear()?)
    }
}

fn id(v: u32) -> DistributorId {
    DistributorId(v as u64)
}

fn pid(v: u32) -> PeriodId {
    PeriodId(v as u64)
}
