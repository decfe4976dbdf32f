//! Runner that solves one catalogue operator and writes its spectrum.
//!
//! The operator is truncated adaptively from `--n0` up to `--n-max` with the chosen
//! QR policies. The resulting eigenvalues are written one per row to a CSV file,
//! together with the solve summary, so runs with different settings can be compared.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use infinite_arrays::{
    algorithms::{EigenOrdering, IqrConfig, Matching, ShiftStrategy, ThresholdPolicy},
    operators::OperatorKind,
    solvers::{Growth, SolverConfig, solve_with},
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "spectrum",
    about = "Computes the spectrum of an infinite operator by adaptive truncation."
)]
struct SpectrumArgs {
    /// The catalogue operator to solve.
    #[clap(long, value_enum, default_value_t = OperatorKind::Laplacian)]
    operator: OperatorKind,
    /// Initial truncation size.
    #[clap(long, default_value_t = 20)]
    n0: usize,
    /// Largest truncation size; ignored with `--unbounded`.
    #[clap(long, default_value_t = 200)]
    n_max: usize,
    /// Ignore `--n-max` and grow until convergence.
    #[clap(long)]
    unbounded: bool,
    /// Additive growth step; the size doubles when omitted.
    #[clap(long)]
    linear_step: Option<usize>,
    /// Convergence tolerance for deflation and spectral change.
    #[clap(long, default_value_t = 1e-10)]
    tol: f64,
    /// QR step budget per truncation size.
    #[clap(long, default_value_t = 1000)]
    max_iter: usize,
    /// Use this fixed shift instead of the Wilkinson shift.
    #[clap(long)]
    fixed_shift: Option<f64>,
    #[clap(long, value_enum, default_value_t = ThresholdPolicy::Absolute)]
    threshold: ThresholdPolicy,
    #[clap(long, value_enum, default_value_t = EigenOrdering::DescendingMagnitude)]
    ordering: EigenOrdering,
    #[clap(long, value_enum, default_value_t = Matching::Greedy)]
    matching: Matching,
    /// Seed for the random operator.
    #[clap(long, default_value_t = 42)]
    seed: u64,
    /// Path to the output CSV file.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
}

/// One eigenvalue per row, with the solve summary repeated for convenience.
#[derive(Debug, Serialize)]
struct EigenvalueRow {
    index: usize,
    re: f64,
    im: f64,
    n: usize,
    converged: bool,
    residual: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    let args = SpectrumArgs::parse();
    let operator = args.operator.build(args.seed)?;

    let iqr = IqrConfig::default()
        .with_tol(args.tol)
        .with_max_iter(args.max_iter)
        .with_shift(args.fixed_shift.map_or(ShiftStrategy::Wilkinson, ShiftStrategy::Fixed))
        .with_threshold(args.threshold)
        .with_ordering(args.ordering)
        .with_matching(args.matching);
    let config = SolverConfig::new(args.n0, (!args.unbounded).then_some(args.n_max))
        .with_growth(args.linear_step.map_or(Growth::Double, Growth::Linear))
        .with_iqr(iqr);

    log::info!("Solving {:?} with {:?}", args.operator, config);
    let result = solve_with(&operator, &config)?;
    log::info!(
        "Finished at n = {} (sizes {:?}): converged = {}, {} QR steps in total.",
        result.truncation_size_used,
        result.sizes_tried,
        result.converged,
        result.total_iterations
    );
    if let Some(failure) = &result.failure {
        log::warn!("Last size failed: {}", failure.reason);
    }

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create CSV writer for {:?}", &args.output))?;
    for (index, lambda) in result.eigenvalues.iter().enumerate() {
        writer.serialize(EigenvalueRow {
            index,
            re: lambda.re,
            im: lambda.im,
            n: result.truncation_size_used,
            converged: result.converged,
            residual: result.residual,
        })?;
    }
    writer.flush()?;
    log::info!("Wrote {} eigenvalues to {:?}", result.eigenvalues.len(), args.output);
    Ok(())
}
