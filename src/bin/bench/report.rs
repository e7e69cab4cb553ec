// Benchmark Report Types
// Per-stage timing statistics and invariant outcomes across seeded runs

use serde::Serialize;

// ─── Statistics (per-stage aggregation over runs) ───────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Pipeline stages ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    Classify,
    Aggregate,
    RollOver,
    Dilution,
    Simulate,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Build,
        Stage::Classify,
        Stage::Aggregate,
        Stage::RollOver,
        Stage::Dilution,
        Stage::Simulate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Build => "tree build",
            Stage::Classify => "classify",
            Stage::Aggregate => "aggregate",
            Stage::RollOver => "roll-over",
            Stage::Dilution => "dilution",
            Stage::Simulate => "simulate (+10% volume)",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub elapsed_ms: Stats,
}

// ─── Single run ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub seed: u64,
    pub nodes: usize,
    pub network_depth: u32,
    pub plata_plus: usize,
    pub chains: usize,
    pub health_score: u8,
    /// Milliseconds per stage, in `Stage::ALL` order.
    pub elapsed_ms: Vec<f64>,
    pub violations: Vec<String>,
}

impl RunResult {
    pub fn pass(&self) -> bool {
        self.violations.is_empty()
    }
}

// ─── Full report ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub prng: &'static str,
    pub nodes: u32,
    pub runs: usize,
    pub base_seed: u64,
    pub passed: usize,
    pub failed: usize,
    pub stages: Vec<StageReport>,
    pub health_score: Stats,
    pub results: Vec<RunResult>,
}

impl BenchReport {
    pub fn stage_reports(results: &[RunResult]) -> Vec<StageReport> {
        Stage::ALL
            .iter()
            .enumerate()
            .map(|(i, &stage)| {
                let samples: Vec<f64> = results.iter().filter_map(|r| r.elapsed_ms.get(i).copied()).collect();
                StageReport { stage, elapsed_ms: Stats::from_samples(&samples) }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_constant_samples() {
        let s = Stats::from_samples(&[2.0, 2.0, 2.0]);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!((s.min, s.max, s.n), (2.0, 2.0, 3));
    }

    #[test]
    fn empty_samples() {
        assert_eq!(Stats::from_samples(&[]).n, 0);
    }
}
