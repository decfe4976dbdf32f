//! This module provides the high-level API of the IQR algorithm: approximate spectra of
//! infinite operators through adaptive truncation.
//!
//! The solver windows the operator at a growing sequence of sizes `n₀ < n₁ < …`, runs the
//! shifted QR iteration of [`crate::algorithms::qr`] on each window, and compares the
//! spectra of consecutive sizes. It stops as soon as they agree within `tol`, or when the
//! size budget `n_max` is exhausted.
//!
//! Non-convergence is never an error. It is reported through
//! [`SpectralResult::converged`] (and [`SpectralResult::failure`] when the last size broke
//! down numerically), so a caller always gets the best spectrum that was computed.

use crate::{
    algorithms::{
        IqrConfig,
        qr::{QrOutput, diagonalize},
        spectrum::{max_matched_difference, ordering_permutation},
    },
    error::{ErrorKind, InfiniteArrayError, Result},
    matrix::Truncation,
    shape::Size,
};
use faer::Mat;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// How the truncation size grows between attempts. Every step strictly increases `n`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Growth {
    /// `n ← 2n`
    #[default]
    Double,
    /// `n ← n + k`
    Linear(usize),
    /// `n ← ⌈f·n⌉`
    Factor(f64),
}

impl Growth {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Growth::Linear(0) => {
                Err(ErrorKind::invalid_size("linear growth needs a positive step").into())
            }
            Growth::Factor(f) if f.is_nan() || f <= 1.0 => Err(ErrorKind::invalid_size(
                format!("growth factor must be greater than 1, got {f}"),
            )
            .into()),
            _ => Ok(()),
        }
    }

    /// The size after `n`, capped at `cap`.
    pub fn next(&self, n: usize, cap: usize) -> usize {
        let grown = match *self {
            Growth::Double => n.saturating_mul(2),
            Growth::Linear(step) => n.saturating_add(step),
            Growth::Factor(f) => {
                let scaled = (n as f64 * f).ceil();
                if scaled >= usize::MAX as f64 {
                    usize::MAX
                } else {
                    scaled as usize
                }
            }
        };
        grown.max(n.saturating_add(1)).min(cap)
    }
}

/// Full configuration of an adaptive solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Initial truncation size.
    pub n0: usize,
    /// Largest truncation size; `None` grows without bound.
    pub n_max: Option<usize>,
    pub growth: Growth,
    pub iqr: IqrConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            n0: 20,
            n_max: Some(200),
            growth: Growth::default(),
            iqr: IqrConfig::default(),
        }
    }
}

impl SolverConfig {
    pub fn new(n0: usize, n_max: Option<usize>) -> Self {
        SolverConfig {
            n0,
            n_max,
            ..Default::default()
        }
    }

    pub fn with_growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_iqr(mut self, iqr: IqrConfig) -> Self {
        self.iqr = iqr;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.iqr.tol = tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.iqr.max_iter = max_iter;
        self
    }

    pub fn with_eigenvectors(mut self, want_eigenvectors: bool) -> Self {
        self.iqr.want_eigenvectors = want_eigenvectors;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n0 == 0 {
            return Err(ErrorKind::invalid_size("n0 must be at least 1").into());
        }
        if let Some(n_max) = self.n_max {
            if self.n0 > n_max {
                return Err(ErrorKind::invalid_size(format!(
                    "n0 = {} exceeds n_max = {n_max}",
                    self.n0
                ))
                .into());
            }
        }
        self.growth.validate()?;
        self.iqr.validate()
    }
}

/// Why the last truncation size produced no spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveFailure {
    pub size: usize,
    pub iteration: usize,
    pub reason: String,
}

/// The outcome of a solve.
#[derive(Debug, Clone)]
pub struct SpectralResult {
    /// Eigenvalues of the final window, in the configured order.
    pub eigenvalues: Vec<Complex64>,
    /// Schur vectors of the final window, one column per eigenvalue, in the same order.
    pub eigenvectors: Option<Mat<f64>>,
    pub converged: bool,
    /// QR steps at the final size.
    pub iterations_used: usize,
    /// QR steps over every size tried.
    pub total_iterations: usize,
    pub truncation_size_used: usize,
    /// Largest strictly-lower entry discarded or left over by the QR iteration.
    pub residual: f64,
    /// Largest matched eigenvalue difference against the previous size.
    pub spectral_change: Option<f64>,
    pub sizes_tried: Vec<usize>,
    pub failure: Option<SolveFailure>,
}

impl SpectralResult {
    /// Real parts of the eigenvalues, in order.
    pub fn real_parts(&self) -> Vec<f64> {
        self.eigenvalues.iter().map(|z| z.re).collect()
    }

    /// Whether every eigenvalue has an imaginary part of at most `tol` in magnitude.
    pub fn is_real(&self, tol: f64) -> bool {
        self.eigenvalues.iter().all(|z| z.im.abs() <= tol)
    }

    fn empty(size: usize) -> Self {
        SpectralResult {
            eigenvalues: Vec::new(),
            eigenvectors: None,
            converged: false,
            iterations_used: 0,
            total_iterations: 0,
            truncation_size_used: size,
            residual: f64::INFINITY,
            spectral_change: None,
            sizes_tried: Vec::new(),
            failure: None,
        }
    }
}

/// Computes an approximate spectrum of `operator` by adaptive truncation.
///
/// # Arguments
/// * `operator`: anything implementing [`Truncation`], typically an
///   [`InfiniteOperator`](crate::operator::InfiniteOperator).
/// * `n0`: the first truncation size. Must be at least 1.
/// * `n_max`: the largest truncation size, or `None` for no limit.
/// * `tol`: tolerance for both QR deflation and the spectral change between sizes.
/// * `max_iter`: QR step budget per truncation size.
/// * `want_eigenvectors`: whether to accumulate the Schur vectors.
///
/// # Returns
/// A [`SpectralResult`], converged or not. Errors are only returned for invalid
/// parameters and for windows the operator cannot provide.
pub fn solve<O: Truncation + ?Sized>(
    operator: &O,
    n0: usize,
    n_max: Option<usize>,
    tol: f64,
    max_iter: usize,
    want_eigenvectors: bool,
) -> Result<SpectralResult> {
    let config = SolverConfig::new(n0, n_max)
        .with_tol(tol)
        .with_max_iter(max_iter)
        .with_eigenvectors(want_eigenvectors);
    solve_with(operator, &config)
}

/// Like [`solve`], with the growth schedule and QR policies taken from `config`.
pub fn solve_with<O: Truncation + ?Sized>(
    operator: &O,
    config: &SolverConfig,
) -> Result<SpectralResult> {
    config.validate()?;
    let n_max = effective_n_max(config.n0, config.n_max, operator.extent())?;

    let mut n = config.n0;
    let mut previous: Option<SpectralResult> = None;
    let mut sizes_tried = Vec::new();
    let mut total_iterations = 0;

    loop {
        sizes_tried.push(n);
        let at_max = n_max.is_some_and(|m| n >= m);

        match diagonalize(operator.window(n)?, &config.iqr) {
            Ok(output) => {
                total_iterations += output.iterations;
                let mut result = assemble(output, n, previous.as_ref(), at_max, &config.iqr);
                result.total_iterations = total_iterations;
                result.sizes_tried = sizes_tried.clone();
                log::debug!(
                    "n = {n}: {} QR steps, spectral change = {:?}",
                    result.iterations_used,
                    result.spectral_change
                );

                if result.converged {
                    log::info!(
                        "Converged at truncation size {n} after {} sizes and {total_iterations} QR steps.",
                        sizes_tried.len()
                    );
                    return Ok(result);
                }
                if at_max {
                    log::warn!("Size budget exhausted at n = {n} without convergence.");
                    return Ok(result);
                }
                previous = Some(result);
            }
            Err(error) => {
                let iteration = breakdown_iteration(&error)?;
                total_iterations += iteration;
                if at_max {
                    log::warn!("Numerical breakdown at the largest size n = {n}: {error}");
                    let mut result = previous.unwrap_or_else(|| SpectralResult::empty(n));
                    result.converged = false;
                    result.total_iterations = total_iterations;
                    result.sizes_tried = sizes_tried;
                    result.failure = Some(SolveFailure {
                        size: n,
                        iteration,
                        reason: error.to_string(),
                    });
                    return Ok(result);
                }
                log::warn!("Numerical breakdown at n = {n}, growing the truncation: {error}");
            }
        }

        n = config.growth.next(n, n_max.unwrap_or(usize::MAX));
    }
}

/// Runs the solver over an explicit list of sizes, returning one result per size attempted.
///
/// Sizes must be non-empty, non-zero and strictly increasing; the last one plays the role
/// of `n_max` in the convergence verdict. With `adaptive`, the sweep stops at the first
/// converged size. A size that breaks down yields a result with `failure` set, and the
/// sweep moves on.
pub fn adaptive_spectrum<O: Truncation + ?Sized>(
    operator: &O,
    sizes: &[usize],
    adaptive: bool,
    config: &IqrConfig,
) -> Result<Vec<SpectralResult>> {
    config.validate()?;
    let Some(&last) = sizes.last() else {
        return Err(ErrorKind::invalid_size("at least one truncation size is required").into());
    };
    if sizes[0] == 0 {
        return Err(ErrorKind::invalid_size("truncation sizes must be positive").into());
    }
    if sizes.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(ErrorKind::invalid_size(format!(
            "truncation sizes must be strictly increasing, got {sizes:?}"
        ))
        .into());
    }
    if let Size::Finite(extent) = operator.extent() {
        if last > extent {
            return Err(ErrorKind::invalid_size(format!(
                "size {last} exceeds the operator extent {extent}"
            ))
            .into());
        }
    }

    let mut results: Vec<SpectralResult> = Vec::with_capacity(sizes.len());
    let mut previous: Option<usize> = None;
    let mut total_iterations = 0;

    for (k, &n) in sizes.iter().enumerate() {
        let at_max = n >= last;
        let mut result = match diagonalize(operator.window(n)?, config) {
            Ok(output) => {
                total_iterations += output.iterations;
                let prev = previous.map(|p| &results[p]);
                let result = assemble(output, n, prev, at_max, config);
                previous = Some(k);
                result
            }
            Err(error) => {
                let iteration = breakdown_iteration(&error)?;
                total_iterations += iteration;
                log::warn!("Numerical breakdown at n = {n}: {error}");
                let mut failed = SpectralResult::empty(n);
                failed.failure = Some(SolveFailure {
                    size: n,
                    iteration,
                    reason: error.to_string(),
                });
                failed
            }
        };
        result.total_iterations = total_iterations;
        result.sizes_tried = sizes[..=k].to_vec();
        log::debug!(
            "n = {n}: converged = {}, spectral change = {:?}",
            result.converged,
            result.spectral_change
        );

        let converged = result.converged;
        results.push(result);
        if adaptive && converged {
            log::info!("Spectrum converged at truncation size {n}.");
            break;
        }
    }
    Ok(results)
}

/// Caps the growth budget at the operator's extent.
fn effective_n_max(n0: usize, n_max: Option<usize>, extent: Size) -> Result<Option<usize>> {
    match extent {
        Size::Unbounded => Ok(n_max),
        Size::Finite(extent) => {
            if n0 > extent {
                return Err(ErrorKind::invalid_size(format!(
                    "n0 = {n0} exceeds the operator extent {extent}"
                ))
                .into());
            }
            Ok(Some(n_max.map_or(extent, |m| m.min(extent))))
        }
    }
}

/// The QR step at which a breakdown happened; any other error is passed through.
fn breakdown_iteration(error: &InfiniteArrayError) -> Result<usize> {
    match error.kind() {
        ErrorKind::NumericalBreakdown { iteration, .. } => Ok(*iteration),
        _ => Err(error.clone()),
    }
}

/// Orders the QR output and decides convergence against the previous size.
fn assemble(
    output: QrOutput,
    n: usize,
    previous: Option<&SpectralResult>,
    at_max: bool,
    config: &IqrConfig,
) -> SpectralResult {
    let perm = ordering_permutation(&output.eigenvalues, config.ordering);
    let eigenvalues: Vec<Complex64> = perm.iter().map(|&k| output.eigenvalues[k]).collect();
    let eigenvectors = output
        .q
        .map(|q| Mat::from_fn(n, n, |i, j| q.as_ref()[(i, perm[j])]));

    let spectral_change = previous
        .filter(|prev| prev.failure.is_none())
        .map(|prev| max_matched_difference(&prev.eigenvalues, &eigenvalues, config.matching));
    let agrees = match spectral_change {
        Some(change) => change <= config.tol,
        None => at_max,
    };

    SpectralResult {
        eigenvalues,
        eigenvectors,
        converged: output.converged && agrees,
        iterations_used: output.iterations,
        total_iterations: output.iterations,
        truncation_size_used: n,
        residual: output.residual,
        spectral_change,
        sizes_tried: vec![n],
        failure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::InfiniteOperator;

    #[test]
    fn test_growth_is_strict_and_capped() {
        assert_eq!(Growth::Double.next(20, 200), 40);
        assert_eq!(Growth::Double.next(150, 200), 200);
        assert_eq!(Growth::Linear(5).next(20, 200), 25);
        assert_eq!(Growth::Factor(1.01).next(20, 200), 21);
        assert_eq!(Growth::Factor(1.5).next(20, usize::MAX), 30);
        assert!(Growth::Linear(0).validate().is_err());
        assert!(Growth::Factor(1.0).validate().is_err());
        assert!(Growth::Factor(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::new(0, Some(10)).validate().is_err());
        assert!(SolverConfig::new(11, Some(10)).validate().is_err());
        assert!(SolverConfig::new(10, Some(10)).validate().is_ok());
        assert!(SolverConfig::new(10, None).validate().is_ok());
        assert!(SolverConfig::default().with_tol(-1.0).validate().is_err());
        assert!(SolverConfig::default().with_max_iter(0).validate().is_err());
    }

    #[test]
    fn test_diagonal_converges_on_the_first_size_at_max() {
        let op = InfiniteOperator::diagonal(|k| (k + 1) as f64);
        let result = solve(&op, 50, Some(50), 1e-10, 1000, false).unwrap();
        assert!(result.converged);
        assert_eq!(result.truncation_size_used, 50);
        assert_eq!(result.sizes_tried, vec![50]);
        let expected: Vec<f64> = (1..=50).rev().map(|k| k as f64).collect();
        assert_eq!(result.real_parts(), expected);
        assert!(result.is_real(0.0));
    }

    #[test]
    fn test_stable_spectrum_converges_on_the_second_size() {
        // New eigenvalues appear at every size, but the ones already found never move.
        let op = InfiniteOperator::diagonal(|k| 1.0 / (k + 1) as f64);
        let result = solve(&op, 5, Some(20), 1e-10, 100, false).unwrap();
        assert!(result.converged);
        assert_eq!(result.sizes_tried, vec![5, 10]);
        assert_eq!(result.spectral_change, Some(0.0));
    }

    #[test]
    fn test_finite_extent_caps_the_budget() {
        let matrix = Mat::from_fn(6, 6, |i, j| if i == j { i as f64 } else { 0.0 });
        let result = solve(&matrix, 4, None, 1e-10, 100, false).unwrap();
        assert_eq!(result.sizes_tried, vec![4, 6]);
        assert!(solve(&matrix, 7, None, 1e-10, 100, false).is_err());
    }

    #[test]
    fn test_breakdown_at_the_last_size_is_reported() {
        let op = InfiniteOperator::general(|i, j| {
            if i == 30 && j == 30 {
                f64::NAN
            } else if i == j {
                1.0 + i as f64
            } else {
                1.0
            }
        });
        let result = solve(&op, 10, Some(40), 1e-10, 100, false).unwrap();
        assert!(!result.converged);
        assert_eq!(result.sizes_tried, vec![10, 20, 40]);
        let failure = result.failure.unwrap();
        assert_eq!(failure.size, 40);
        // The spectrum of the last healthy size is kept.
        assert_eq!(result.truncation_size_used, 20);
        assert_eq!(result.eigenvalues.len(), 20);
    }

    #[test]
    fn test_adaptive_spectrum_validates_sizes() {
        let op = InfiniteOperator::diagonal(|k| k as f64);
        let config = IqrConfig::default();
        assert!(adaptive_spectrum(&op, &[], true, &config).is_err());
        assert!(adaptive_spectrum(&op, &[0, 5], true, &config).is_err());
        assert!(adaptive_spectrum(&op, &[5, 5], true, &config).is_err());
        assert!(adaptive_spectrum(&op, &[10, 5], true, &config).is_err());
    }

    #[test]
    fn test_adaptive_spectrum_non_adaptive_runs_every_size() {
        let op = InfiniteOperator::diagonal(|k| 1.0 / (k + 1) as f64);
        let results = adaptive_spectrum(&op, &[4, 8, 16], false, &IqrConfig::default()).unwrap();
        assert_eq!(results.len(), 3);
        assert!(!results[0].converged);
        assert!(results[1].converged);
        assert_eq!(results[2].sizes_tried, vec![4, 8, 16]);

        let results = adaptive_spectrum(&op, &[4, 8, 16], true, &IqrConfig::default()).unwrap();
        assert_eq!(results.len(), 2);
    }
}
