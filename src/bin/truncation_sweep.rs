//! Runner for the truncation sweep.
//!
//! Solves a catalogue operator at every size of an explicit list and records, per size,
//! how far the spectrum moved since the previous size, how many QR steps the window
//! needed, the wall-clock time and the peak memory. The output shows where the spectrum
//! of the truncations stabilizes.

use anyhow::{Context, Result, anyhow, ensure};
use clap::Parser;
use infinite_arrays::{
    algorithms::IqrConfig,
    operators::OperatorKind,
    solvers::adaptive_spectrum,
    utils::perf::{get_peak_rss_kb, timed},
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "truncation-sweep",
    about = "Tracks the spectral change of an infinite operator across truncation sizes."
)]
struct SweepArgs {
    #[clap(long, value_enum, default_value_t = OperatorKind::RankOne)]
    operator: OperatorKind,
    /// First truncation size.
    #[clap(long, default_value_t = 10)]
    n_start: usize,
    /// Last truncation size (inclusive).
    #[clap(long, default_value_t = 100)]
    n_end: usize,
    /// Step between sizes.
    #[clap(long, default_value_t = 10)]
    n_step: usize,
    #[clap(long, default_value_t = 1e-8)]
    tol: f64,
    #[clap(long, default_value_t = 1000)]
    max_iter: usize,
    /// Stop at the first converged size instead of running the whole list.
    #[clap(long)]
    adaptive: bool,
    #[clap(long, default_value_t = 42)]
    seed: u64,
    /// Path to the output CSV file.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
}

/// A single row of the output CSV.
#[derive(Debug, Serialize)]
struct SweepRow {
    n: usize,
    converged: bool,
    /// Empty for the first size.
    spectral_change: Option<f64>,
    iterations: usize,
    residual: f64,
    largest_magnitude: Option<f64>,
    failed: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    let args = SweepArgs::parse();
    ensure!(args.n_step > 0, "--n-step must be positive");
    let sizes: Vec<usize> = (args.n_start..=args.n_end).step_by(args.n_step).collect();
    let operator = args.operator.build(args.seed)?;
    let config = IqrConfig::default()
        .with_tol(args.tol)
        .with_max_iter(args.max_iter);

    log::info!("Sweeping {:?} over sizes {:?}", args.operator, sizes);
    let (results, elapsed) = timed(|| adaptive_spectrum(&operator, &sizes, args.adaptive, &config));
    let results = results?;
    log::info!(
        "Sweep finished in {:.3}s over {} sizes, peak RSS {} KB.",
        elapsed.as_secs_f64(),
        results.len(),
        get_peak_rss_kb()
    );

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create CSV writer for {:?}", &args.output))?;
    for result in &results {
        writer.serialize(SweepRow {
            n: result.truncation_size_used,
            converged: result.converged,
            spectral_change: result.spectral_change,
            iterations: result.iterations_used,
            residual: result.residual,
            largest_magnitude: result.eigenvalues.first().map(|z| z.norm()),
            failed: result.failure.is_some(),
        })?;
    }
    writer.flush()?;
    log::info!("Results saved to {:?}", args.output);
    Ok(())
}
