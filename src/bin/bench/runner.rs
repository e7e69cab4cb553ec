// Seeded Runner: one synthetic network per seed, every analysis timed and
// checked against the engine's invariants

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal_macros::dec;

use compensation_engine::config::MAX_GENERATION;
use compensation_engine::*;

use crate::report::{RunResult, Stage};
use crate::synth::{NetworkGenerator, NetworkShape};

use std::time::Instant;

fn timed<T>(elapsed: &mut Vec<f64>, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    elapsed.push(start.elapsed().as_secs_f64() * 1000.0);
    out
}

/// Run the full pipeline on one seeded network.
pub fn run_single(shape: &NetworkShape, seed: u64, config: &PlanConfig) -> Result<RunResult> {
    let rows = NetworkGenerator::new(ChaCha8Rng::seed_from_u64(seed)).generate(shape);
    let mut elapsed = Vec::with_capacity(Stage::ALL.len());
    let mut violations = Vec::new();

    let tree = timed(&mut elapsed, || NetworkTree::from_records(DistributorId(1), PeriodId(1), rows, None))?;
    let classification = timed(&mut elapsed, || classify(&tree));
    let totals = timed(&mut elapsed, || aggregate(&tree, &classification, config))?;
    let rollover = timed(&mut elapsed, || analyze_rollover(&tree, tree.root().rank, config));
    let dilution = timed(&mut elapsed, || analyze_dilution(&tree, &classification, &totals, config))?;
    let scenario = Scenario::VolumeIncrease { percentage: dec!(10) };
    let sim = timed(&mut elapsed, || simulate(&tree, tree.root().rank, &scenario, config))?;

    // Classification ranges
    for idx in tree.downline() {
        let g = classification.generation(idx);
        let l = classification.level(idx);
        if g > MAX_GENERATION || !(1..=3).contains(&l) {
            violations.push(format!("node {}: generation {g}, level {l}", tree.node(idx).id));
        }
    }

    // Cross-aggregation consistency
    let by_generation: Money = totals.by_generation.iter().map(|b| b.cell.total_commission).sum();
    let by_level: Money = totals.by_level.iter().map(|b| b.cell.total_commission).sum();
    if by_generation != totals.total || by_level != totals.total {
        violations.push(format!(
            "totals disagree: generation {by_generation}, level {by_level}, total {}",
            totals.total
        ));
    }

    // Roll-over legs
    for leg in &rollover.legs {
        if leg.effective_points + leg.roll_over != leg.points {
            violations.push(format!("leg {}: effective + roll-over != gross", leg.id_customers));
        }
        if leg.max_allowed.is_some_and(|max| leg.effective_points > max) {
            violations.push(format!("leg {}: effective exceeds cap", leg.id_customers));
        }
    }

    // Dilution chains only push generations outward
    for chain in &dilution.dilution_chains {
        for a in &chain.affected_distributors {
            if a.generation_after <= a.generation_before {
                violations.push(format!(
                    "chain {}: {} moved G{} -> G{}",
                    chain.chain_id, a.id_customers, a.generation_before, a.generation_after
                ));
            }
            if a.commission_lost < Money::zero() {
                violations.push(format!("chain {}: {} reported a negative loss", chain.chain_id, a.id_customers));
            }
        }
    }
    let by_chain: Money = dilution.dilution_chains.iter().map(|c| c.total_commission_lost).sum();
    if by_chain != dilution.summary.total_dilution_amount {
        violations.push("dilution total != sum of chain totals".to_string());
    }

    // Simulation leaves the source untouched and is repeatable
    let again = simulate(&tree, tree.root().rank, &scenario, config)?;
    if again != sim {
        violations.push("simulation not repeatable".to_string());
    }
    if aggregate(&tree, &classify(&tree), config)? != totals {
        violations.push("simulation mutated the source tree".to_string());
    }

    Ok(RunResult {
        seed,
        nodes: tree.len(),
        network_depth: tree.network_depth(),
        plata_plus: dilution.summary.total_plata_plus_in_network,
        chains: dilution.dilution_chains.len(),
        health_score: dilution.summary.health_score,
        elapsed_ms: elapsed,
        violations,
    })
}
