//! Insert/search/delete latency driver for `AvlTree`.
//!
//! Run with:
//! ```bash
//! # Stats only
//! cargo run --release --bin avlt_bench
//!
//! # With tracing, validating after every phase
//! AVLT_BENCH_VALIDATE=1 RUST_LOG=avlt=debug cargo run --release --features tracing --bin avlt_bench
//! ```
//!
//! Environment:
//! - `AVLT_BENCH_KEYS`: keys per round (default 100000)
//! - `AVLT_BENCH_ROUNDS`: rounds (default 3)
//! - `AVLT_BENCH_VALIDATE`: `1`/`true` runs a full validation after each phase
//! - `RUST_LOG`: tracing filter (default `avlt=info,avlt_bench=info`)

#![allow(clippy::cast_possible_truncation)]

use std::io::{self, Write};
use std::process::ExitCode;

use avlt::{AvlTree, Deque, LatencyProbe};

// =============================================================================
// Configuration
// =============================================================================

const DEFAULT_KEYS: usize = 100_000;
const DEFAULT_ROUNDS: usize = 3;

#[derive(Debug, Clone, Copy)]
struct BenchConfig {
    keys: usize,
    rounds: usize,
    validate: bool,
}

impl BenchConfig {
    fn from_env() -> Self {
        Self {
            keys: env_usize("AVLT_BENCH_KEYS", DEFAULT_KEYS),
            rounds: env_usize("AVLT_BENCH_ROUNDS", DEFAULT_ROUNDS).max(1),
            validate: std::env::var("AVLT_BENCH_VALIDATE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            eprintln!("warning: {name}={raw:?} is not a number, using {default}");
            default
        }),
        Err(_) => default,
    }
}

// =============================================================================
// Tracing
// =============================================================================

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("avlt=info,avlt_bench=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
fn init_tracing() {}

// =============================================================================
// Key generation
// =============================================================================

/// Odd multiplier: `i * MIX` is a bijection on `u32`, so keys are unique.
const MIX: u32 = 0x9e37_79b9;

fn keys(n: usize, round: usize) -> Deque<u32> {
    let offset = (round as u32).wrapping_mul(0x85eb_ca6b);
    (0..n as u32)
        .map(|i| i.wrapping_add(offset).wrapping_mul(MIX))
        .collect()
}

// =============================================================================
// Phases
// =============================================================================

struct RoundProbes {
    insert: LatencyProbe,
    search: LatencyProbe,
    delete: LatencyProbe,
}

fn check(tree: &AvlTree<u32>, phase: &str, config: &BenchConfig) -> Result<(), String> {
    if !config.validate {
        return Ok(());
    }
    let report = tree.validate();
    if report.is_ok() {
        Ok(())
    } else {
        Err(format!("validation failed after {phase}:\n{report}"))
    }
}

fn run_round(round: usize, config: &BenchConfig) -> Result<RoundProbes, String> {
    let mut pending = keys(config.keys, round);
    let mut tree: AvlTree<u32> = AvlTree::new();
    let mut probes = RoundProbes {
        insert: LatencyProbe::new(),
        search: LatencyProbe::new(),
        delete: LatencyProbe::new(),
    };

    for (i, &key) in pending.iter().enumerate() {
        probes.insert.start();
        tree.insert(key, i as u32);
        probes.insert.stop().map_err(|e| e.to_string())?;
    }
    check(&tree, "insert", config)?;

    for (i, &key) in pending.iter().enumerate() {
        probes.search.start();
        let found = tree.search(key).copied();
        probes.search.stop().map_err(|e| e.to_string())?;
        if found != Some(i as u32) {
            return Err(format!("key {key} lost after insert (round {round})"));
        }
    }

    // Delete from both ends of the queue so removals interleave across the
    // key space.
    let mut from_front = true;
    while let Some(key) = if from_front {
        pending.pop_front()
    } else {
        pending.pop_back()
    } {
        from_front = !from_front;
        probes.delete.start();
        tree.delete(key);
        probes.delete.stop().map_err(|e| e.to_string())?;
    }
    check(&tree, "delete", config)?;
    if !tree.is_empty() {
        return Err(format!("{} keys left after delete phase", tree.len()));
    }

    Ok(probes)
}

fn merge(total: &mut Option<LatencyProbe>, mut probe: LatencyProbe) -> Result<(), String> {
    probe.gen_stats().map_err(|e| e.to_string())?;
    match total {
        Some(acc) => acc.combine_latency(&probe).map_err(|e| e.to_string()),
        None => {
            *total = Some(probe);
            Ok(())
        }
    }
}

fn run(config: &BenchConfig) -> Result<(), String> {
    let mut insert = None;
    let mut search = None;
    let mut delete = None;

    for round in 0..config.rounds {
        let probes = run_round(round, config)?;
        merge(&mut insert, probes.insert)?;
        merge(&mut search, probes.search)?;
        merge(&mut delete, probes.delete)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "avlt_bench: {} keys x {} rounds",
        config.keys, config.rounds
    )
    .map_err(|e| e.to_string())?;
    for (name, probe) in [("insert", insert), ("search", search), ("delete", delete)] {
        let Some(mut probe) = probe else { continue };
        writeln!(out, "\n[{name}]").map_err(|e| e.to_string())?;
        probe.print_stats(&mut out).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let config = BenchConfig::from_env();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("avlt_bench: {msg}");
            ExitCode::FAILURE
        }
    }
}
