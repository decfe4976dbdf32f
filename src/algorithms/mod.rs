//! Finite-dimensional building blocks of the IQR solver.
//!
//! ** NOTE: most callers want [`crate::solvers::solve`] or [`crate::solvers::solve_with`].
//! This module is for callers that need control over a single window: running the
//! shifted QR iteration on one dense matrix ([`qr::diagonalize`]) or comparing two
//! spectra directly ([`spectrum`]).
//!
//! The policy enums below are shared by both submodules and by the solver
//! configuration. All of them derive `serde` traits so a configuration can be stored
//! alongside experiment output; the unit-only ones also derive `clap::ValueEnum` for
//! the command-line runners.

pub mod qr;
pub mod spectrum;

use crate::error::{ErrorKind, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default convergence tolerance.
pub const DEFAULT_TOL: f64 = 1e-10;

/// Default QR step budget per truncation size.
pub const DEFAULT_MAX_ITER: usize = 1000;

/// Steps without a deflation before an exceptional shift is applied.
pub(crate) const EXCEPTIONAL_SHIFT_PERIOD: usize = 10;

/// How the shift `σ` of each QR step is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ShiftStrategy {
    /// Unshifted QR. Converges linearly at best.
    None,
    /// The eigenvalue of the trailing 2×2 block closest to its last diagonal entry.
    #[default]
    Wilkinson,
    /// The same shift at every step.
    Fixed(f64),
}

/// When a subdiagonal entry is treated as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum ThresholdPolicy {
    /// `|a_ij| ≤ tol`.
    #[default]
    Absolute,
    /// `|a_ij| ≤ tol · (|a_ii| + |a_jj|)`.
    Relative,
}

/// Order in which eigenvalues are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum EigenOrdering {
    /// Largest `|λ|` first; ties keep their diagonal position.
    #[default]
    DescendingMagnitude,
    /// Smallest real part first, then smallest imaginary part.
    AscendingReal,
}

/// How the spectra of two consecutive truncation sizes are paired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Matching {
    /// Closest pairs first, each eigenvalue used at most once.
    #[default]
    Greedy,
    /// Index by index over the ordered lists.
    Positional,
}

/// Parameters of the QR iteration on a single window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqrConfig {
    pub tol: f64,
    pub max_iter: usize,
    pub want_eigenvectors: bool,
    pub shift: ShiftStrategy,
    pub threshold: ThresholdPolicy,
    pub ordering: EigenOrdering,
    pub matching: Matching,
}

impl Default for IqrConfig {
    fn default() -> Self {
        IqrConfig {
            tol: DEFAULT_TOL,
            max_iter: DEFAULT_MAX_ITER,
            want_eigenvectors: false,
            shift: ShiftStrategy::default(),
            threshold: ThresholdPolicy::default(),
            ordering: EigenOrdering::default(),
            matching: Matching::default(),
        }
    }
}

impl IqrConfig {
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_eigenvectors(mut self, want_eigenvectors: bool) -> Self {
        self.want_eigenvectors = want_eigenvectors;
        self
    }

    pub fn with_shift(mut self, shift: ShiftStrategy) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_threshold(mut self, threshold: ThresholdPolicy) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_ordering(mut self, ordering: EigenOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_matching(mut self, matching: Matching) -> Self {
        self.matching = matching;
        self
    }

    /// Rejects a negative or NaN tolerance, a zero step budget and a non-finite
    /// fixed shift.
    pub fn validate(&self) -> Result<()> {
        if self.tol.is_nan() || self.tol < 0.0 {
            return Err(ErrorKind::invalid_size(format!(
                "tolerance must be non-negative, got {}",
                self.tol
            ))
            .into());
        }
        if self.max_iter == 0 {
            return Err(ErrorKind::invalid_size("max_iter must be at least 1").into());
        }
        if let ShiftStrategy::Fixed(sigma) = self.shift {
            if !sigma.is_finite() {
                return Err(
                    ErrorKind::invalid_size(format!("fixed shift must be finite, got {sigma}"))
                        .into(),
                );
            }
        }
        Ok(())
    }
}
