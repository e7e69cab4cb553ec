// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - Data Source Port
//
// The period-scoped distributor/sponsorship/points store is an external
// collaborator. The engine talks to it through `NetworkSource`; retries and
// deadlines are applied by the `RetryingSource` decorator at this boundary
// and never inside the analyses.

use std::collections::HashMap;
use std::path::Path;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use retry::{delay::Fibonacci, OperationResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[cfg(not(target_arch = "wasm32"))]
use crate::config::RetryPolicy;
use crate::error::{EngineError, Result};
use crate::types::{DistributorId, DistributorRecord, Period, PeriodId};

// ---------------------------------------------------------------------------
// NetworkSource
// ---------------------------------------------------------------------------

pub trait NetworkSource: Send + Sync {
    /// Short name used in logs and upstream errors.
    fn name(&self) -> &str;

    fn period(&self, period_id: PeriodId) -> Result<Option<Period>>;

    /// Every known period, in any order.
    fn periods(&self) -> Result<Vec<Period>>;

    fn distributor(&self, id: DistributorId, period_id: PeriodId) -> Result<Option<DistributorRecord>>;

    /// Single bulk fetch covering the root and its entire downline for the
    /// period. Implementations may return extra unrelated rows.
    fn network_rows(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Vec<DistributorRecord>>;
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Serialized form of a whole data set, one row set per period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub periods: Vec<Period>,
    pub rows: Vec<PeriodRows>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodRows {
    pub id_period: PeriodId,
    pub distributors: Vec<DistributorRecord>,
}

/// In-process source over a loaded snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    periods: HashMap<PeriodId, Period>,
    rows: HashMap<PeriodId, Vec<DistributorRecord>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: NetworkSnapshot) -> Self {
        let mut source = Self::new();
        for period in snapshot.periods {
            source.insert_period(period);
        }
        for set in snapshot.rows {
            source.rows.entry(set.id_period).or_default().extend(set.distributors);
        }
        source
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let snapshot: NetworkSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::upstream("snapshot", format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn insert_period(&mut self, period: Period) {
        self.periods.insert(period.id_period, period);
    }

    pub fn insert_rows(&mut self, period_id: PeriodId, rows: impl IntoIterator<Item = DistributorRecord>) {
        self.rows.entry(period_id).or_default().extend(rows);
    }
}

impl NetworkSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn period(&self, period_id: PeriodId) -> Result<Option<Period>> {
        Ok(self.periods.get(&period_id).cloned())
    }

    fn periods(&self) -> Result<Vec<Period>> {
        Ok(self.periods.values().cloned().collect())
    }

    fn distributor(&self, id: DistributorId, period_id: PeriodId) -> Result<Option<DistributorRecord>> {
        Ok(self
            .rows
            .get(&period_id)
            .and_then(|rows| rows.iter().find(|r| r.id_customers == id))
            .cloned())
    }

    fn network_rows(&self, _root_id: DistributorId, period_id: PeriodId) -> Result<Vec<DistributorRecord>> {
        Ok(self.rows.get(&period_id).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// RetryingSource
// ---------------------------------------------------------------------------

/// Decorator retrying transient upstream failures.
///
/// Delays follow a Fibonacci schedule from `initial_backoff_ms`, each capped at
/// `max_backoff_ms`, and the schedule stops once the summed delays would pass
/// `deadline_ms`. Only `is_retryable()` errors are retried.
#[cfg(not(target_arch = "wasm32"))]
pub struct RetryingSource<S> {
    inner: S,
    policy: RetryPolicy,
}

#[cfg(not(target_arch = "wasm32"))]
impl<S: NetworkSource> RetryingSource<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn with_retry<T>(&self, op: &'static str, mut call: impl FnMut(&S) -> Result<T>) -> Result<T> {
        let name = self.inner.name();
        let mut attempt = 0u32;
        let outcome = retry::retry(retry_delays(&self.policy), || {
            attempt += 1;
            match call(&self.inner) {
                Ok(value) => OperationResult::Ok(value),
                Err(err) if err.is_retryable() => {
                    warn!(source = name, op, attempt, error = %err, "upstream call failed");
                    OperationResult::Retry(err)
                }
                Err(err) => OperationResult::Err(err),
            }
        });

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(source = name, op, attempt, "upstream recovered");
                }
                Ok(value)
            }
            Err(failed) if failed.error.is_retryable() => {
                warn!(source = name, op, tries = failed.tries, "upstream retries exhausted");
                Err(EngineError::UpstreamUnavailable {
                    source_name: name.to_string(),
                    reason: format!("{op} failed after {} attempt(s): {}", failed.tries, failed.error),
                    retryable: true,
                })
            }
            Err(failed) => Err(failed.error),
        }
    }
}

/// Sleeps between attempts: at most `max_attempts - 1` of them, each capped,
/// and never more in total than the deadline budget.
#[cfg(not(target_arch = "wasm32"))]
pub fn retry_delays(policy: &RetryPolicy) -> impl Iterator<Item = Duration> {
    let cap = Duration::from_millis(policy.max_backoff_ms);
    let mut budget = Duration::from_millis(policy.deadline_ms);
    Fibonacci::from_millis(policy.initial_backoff_ms.max(1))
        .map(move |d| d.min(cap))
        .take(policy.max_attempts.saturating_sub(1) as usize)
        .take_while(move |d| match budget.checked_sub(*d) {
            Some(left) => {
                budget = left;
                true
            }
            None => false,
        })
}

#[cfg(not(target_arch = "wasm32"))]
impl<S: NetworkSource> NetworkSource for RetryingSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn period(&self, period_id: PeriodId) -> Result<Option<Period>> {
        self.with_retry("period", |s| s.period(period_id))
    }

    fn periods(&self) -> Result<Vec<Period>> {
        self.with_retry("periods", |s| s.periods())
    }

    fn distributor(&self, id: DistributorId, period_id: PeriodId) -> Result<Option<DistributorRecord>> {
        self.with_retry("distributor", |s| s.distributor(id, period_id))
    }

    fn network_rows(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Vec<DistributorRecord>> {
        self.with_retry("network_rows", |s| s.network_rows(root_id, period_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls with a retryable error.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        inner: MemorySource,
    }

    impl NetworkSource for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn period(&self, period_id: PeriodId) -> Result<Option<Period>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(EngineError::upstream("flaky", "connection reset"));
            }
            self.inner.period(period_id)
        }
        fn periods(&self) -> Result<Vec<Period>> {
            self.inner.periods()
        }
        fn distributor(&self, id: DistributorId, period_id: PeriodId) -> Result<Option<DistributorRecord>> {
            self.inner.distributor(id, period_id)
        }
        fn network_rows(&self, root_id: DistributorId, period_id: PeriodId) -> Result<Vec<DistributorRecord>> {
            self.inner.network_rows(root_id, period_id)
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

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, initial_backoff_ms: 1, max_backoff_ms: 2, deadline_ms: 1000 }
    }

    fn flaky(failures: u32) -> Flaky {
        let mut inner = MemorySource::new();
        inner.insert_period(period(1));
        Flaky { failures, calls: AtomicU32::new(0), inner }
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let json = r#"{
            "periods": [{"id_period": 1, "name_period": "Enero", "start_date": "2026-01-01",
                         "end_date": "2026-01-31", "status": "closed"}],
            "rows": [{"id_period": 1, "distributors": [
                {"id_customers": 10, "full_name": "Root", "id_sponsor": null, "name_plan": "Oro",
                 "point_current_customers": 100, "point_business_customers": 100}
            ]}]
        }"#;
        let source = MemorySource::from_json_str(json).expect("test: parse snapshot");
        assert!(source.period(PeriodId(1)).expect("test: period").is_some());
        let rec = source
            .distributor(DistributorId(10), PeriodId(1))
            .expect("test: lookup")
            .expect("test: row exists");
        assert_eq!(rec.full_name, "Root");
        assert!(source.network_rows(DistributorId(10), PeriodId(2)).expect("test: rows").is_empty());
    }

    #[test]
    fn retry_recovers_from_transient_failure() {
        let source = RetryingSource::new(flaky(2), fast_policy(3));
        let found = source.period(PeriodId(1)).expect("test: third attempt succeeds");
        assert!(found.is_some());
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retry_gives_up_after_max_attempts() {
        let source = RetryingSource::new(flaky(10), fast_policy(3));
        let err = source.period(PeriodId(1)).expect_err("test: exhausted");
        assert!(err.is_retryable(), "surfaced as retryable upstream failure: {err}");
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delays_follow_fibonacci_and_cap() {
        let policy = RetryPolicy { max_attempts: 6, initial_backoff_ms: 50, max_backoff_ms: 120, deadline_ms: 5000 };
        let delays: Vec<u64> = retry_delays(&policy).map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![50, 50, 100, 120, 120]);
    }

    #[test]
    fn delays_stop_at_deadline_budget() {
        let policy = RetryPolicy { max_attempts: 10, initial_backoff_ms: 100, max_backoff_ms: 1000, deadline_ms: 350 };
        let delays: Vec<u64> = retry_delays(&policy).map(|d| d.as_millis() as u64).collect();
        // 100 + 100 + 200 would pass 350
        assert_eq!(delays, vec![100, 100]);
    }

    #[test]
    fn single_attempt_policy_never_sleeps() {
        let source = RetryingSource::new(flaky(1), fast_policy(1));
        let err = source.period(PeriodId(1)).expect_err("test: no retry budget");
        assert!(err.is_retryable());
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_retryable_errors_pass_through() {
        struct Broken;
        impl NetworkSource for Broken {
            fn name(&self) -> &str { "broken" }
            fn period(&self, id: PeriodId) -> Result<Option<Period>> {
                Err(EngineError::not_found(crate::error::Entity::Period, id))
            }
            fn periods(&self) -> Result<Vec<Period>> { Ok(Vec::new()) }
            fn distributor(&self, _: DistributorId, _: PeriodId) -> Result<Option<DistributorRecord>> { Ok(None) }
            fn network_rows(&self, _: DistributorId, _: PeriodId) -> Result<Vec<DistributorRecord>> { Ok(Vec::new()) }
        }
        let source = RetryingSource::new(Broken, fast_policy(5));
        let err = source.period(PeriodId(9)).expect_err("test: not found");
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
