// Compensation Engine Benchmark Runner
// Seeded synthetic networks, per-stage timing, invariant checks on every run
//
// Usage:
//   cargo run --release --bin bench                     # 10 runs of 10,000 nodes
//   cargo run --release --bin bench -- --nodes 50000    # Larger networks
//   cargo run --release --bin bench -- --runs 3         # Quick mode
//   cargo run --release --bin bench -- --seed 42        # Custom base seed
//   cargo run --release --bin bench -- --json           # Write JSON report
//
// Engine logs go through tracing; set RUST_LOG=compensation_engine=debug to see them.

mod report;
mod runner;
mod synth;

use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use compensation_engine::PlanConfig;
use report::*;
use synth::NetworkShape;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    nodes: u32,
    runs: usize,
    seed: u64,
    json: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs { nodes: 10_000, runs: 10, seed: 0, json: false };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--nodes" => {
                i += 1;
                if i < args.len() {
                    cli.nodes = args[i].parse().unwrap_or(10_000);
                }
            }
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(10);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--json" => {
                cli.json = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry().with(fmt::layer().with_target(true)).with(filter).init();
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    init_tracing();
    let cli = parse_args();
    let config = PlanConfig::default();
    let shape = NetworkShape::with_nodes(cli.nodes);

    println!("\n  Compensation Engine Benchmark");
    println!("  PRNG: ChaCha8Rng | Nodes: {} | Runs: {} | Base seed: {}\n", shape.nodes, cli.runs, cli.seed);
    println!("  {:>6} {:>8} {:>6} {:>7} {:>7} {:>7} {:>9}  Status", "Seed", "Nodes", "Depth", "Plata+", "Chains", "Health", "Total");
    println!("  {}", "-".repeat(72));

    let suite_start = Instant::now();
    let mut results = Vec::with_capacity(cli.runs);
    for run in 0..cli.runs as u64 {
        let seed = cli.seed.wrapping_add(run);
        let result = match runner::run_single(&shape, seed, &config) {
            Ok(r) => r,
            Err(err) => {
                error!(seed, error = %err, "run failed");
                return ExitCode::FAILURE;
            }
        };
        let total: f64 = result.elapsed_ms.iter().sum();
        println!(
            "  {:>6} {:>8} {:>6} {:>7} {:>7} {:>7} {:>7.1}ms  {}",
            result.seed,
            result.nodes,
            result.network_depth,
            result.plata_plus,
            result.chains,
            result.health_score,
            total,
            if result.pass() { "PASS" } else { "FAIL" },
        );
        for v in &result.violations {
            println!("         ! {v}");
        }
        results.push(result);
    }

    let stages = BenchReport::stage_reports(&results);
    println!("\n  {:<26} {:>10} {:>10} {:>10} {:>10}", "Stage", "Mean", "±95%", "Min", "Max");
    println!("  {}", "-".repeat(72));
    for s in &stages {
        let e = &s.elapsed_ms;
        println!(
            "  {:<26} {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>8.2}ms",
            s.stage.label(),
            e.mean,
            (e.ci_upper - e.ci_lower) / 2.0,
            e.min,
            e.max
        );
    }

    let passed = results.iter().filter(|r| r.pass()).count();
    let failed = results.len() - passed;
    println!("  {}", "-".repeat(72));
    println!(
        "  Runs: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        results.len(),
        passed,
        failed,
        suite_start.elapsed().as_secs_f64()
    );

    if cli.json {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
            .to_string();
        let health: Vec<f64> = results.iter().map(|r| r.health_score as f64).collect();
        let report = BenchReport {
            timestamp: timestamp.clone(),
            prng: "ChaCha8Rng",
            nodes: shape.nodes,
            runs: cli.runs,
            base_seed: cli.seed,
            passed,
            failed,
            stages,
            health_score: Stats::from_samples(&health),
            results,
        };
        if let Err(err) = write_report(&report, &timestamp) {
            error!(error = %err, "could not write benchmark report");
            return ExitCode::FAILURE;
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn write_report(report: &BenchReport, timestamp: &str) -> std::io::Result<()> {
    let dir = std::path::Path::new("benchmark-results");
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("bench-{timestamp}.json"));
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(&path, json)?;
    info!(path = %path.display(), "benchmark report written");
    println!("  Results saved to: {}\n", path.display());
    Ok(())
}
