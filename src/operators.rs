//! A catalogue of infinite operators with known or easily checked spectra.
//!
//! These are the operators the command-line runners and the integration tests solve.
//! Each one is a pure rule; nothing is stored.

use crate::{
    arrays::Sequence,
    error::{ErrorKind, Result},
    operator::InfiniteOperator,
};
use clap::ValueEnum;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// `T = diag(1, 2, 3, …)`. Every truncation of size `n` has spectrum `{1, …, n}`.
pub fn shifted_diagonal() -> InfiniteOperator {
    InfiniteOperator::diagonal(|k| (k + 1) as f64)
}

/// The discrete Dirichlet Laplacian: `2` on the diagonal, `−1` on both off-diagonals.
///
/// The `n × n` truncation has eigenvalues `2 − 2cos(kπ/(n + 1))`, `k = 1, …, n`.
pub fn laplacian() -> InfiniteOperator {
    InfiniteOperator::tridiagonal(
        Sequence::from_fn(|_| 2.0),
        Some(Sequence::from_fn(|_| -1.0)),
        Some(Sequence::from_fn(|_| -1.0)),
    )
}

/// The symmetric Toeplitz operator `T[i, j] = 1 / (1 + |i − j|)`.
pub fn toeplitz_decay() -> InfiniteOperator {
    InfiniteOperator::general(|i, j| 1.0 / (1.0 + i.abs_diff(j) as f64))
}

/// `T[i, j] = 2^{−(i+j)} + δ_ij·2^{−i}`: a diagonal plus a rank-one perturbation, both
/// decaying geometrically. Its spectrum stabilizes quickly as the truncation grows.
pub fn rank_one_decay() -> InfiniteOperator {
    InfiniteOperator::general(|i, j| {
        let coupling = 0.5_f64.powi((i + j) as i32);
        if i == j {
            coupling + 0.5_f64.powi(i as i32)
        } else {
            coupling
        }
    })
}

/// Block-diagonal rotations: `T[2k, 2k+1] = −(k+1)` and `T[2k+1, 2k] = k+1`.
///
/// Each 2×2 block contributes the complex pair `±(k+1)i`.
pub fn rotation_pairs() -> InfiniteOperator {
    InfiniteOperator::tridiagonal(
        Sequence::from_fn(|_| 0.0),
        Some(Sequence::from_fn(|i| {
            if i % 2 == 0 { -((i / 2 + 1) as f64) } else { 0.0 }
        })),
        Some(Sequence::from_fn(|i| {
            if i % 2 == 0 { (i / 2 + 1) as f64 } else { 0.0 }
        })),
    )
}

/// A random symmetric operator with entries `U(−1, 1)·decay^{|i−j|}` and `i + 1` on
/// the diagonal.
///
/// Entries are drawn from a generator seeded by `seed` and the unordered pair `{i, j}`,
/// so the rule is pure: the same entry is returned on every call and `T[i, j] = T[j, i]`.
///
/// # Errors
/// `decay` must lie in `(0, 1)`.
pub fn random_symmetric(seed: u64, decay: f64) -> Result<InfiniteOperator> {
    if !(decay > 0.0 && decay < 1.0) {
        return Err(
            ErrorKind::invalid_size(format!("decay must lie in (0, 1), got {decay}")).into(),
        );
    }
    Ok(InfiniteOperator::general(move |i, j| {
        let (lo, hi) = (i.min(j) as u64, i.max(j) as u64);
        let key = seed
            ^ lo.wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ hi.wrapping_mul(0xC2B2_AE3D_27D4_EB4F).rotate_left(31);
        let mut rng = StdRng::seed_from_u64(key);
        let noise = rng.random_range(-1.0..1.0) * decay.powi((hi - lo) as i32);
        if i == j { noise + (i + 1) as f64 } else { noise }
    }))
}

/// Named catalogue entries, selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum OperatorKind {
    Diagonal,
    Laplacian,
    Toeplitz,
    RankOne,
    Rotation,
    Random,
}

impl OperatorKind {
    /// Builds the operator. `seed` is only used by [`OperatorKind::Random`].
    pub fn build(self, seed: u64) -> Result<InfiniteOperator> {
        Ok(match self {
            OperatorKind::Diagonal => shifted_diagonal(),
            OperatorKind::Laplacian => laplacian(),
            OperatorKind::Toeplitz => toeplitz_decay(),
            OperatorKind::RankOne => rank_one_decay(),
            OperatorKind::Rotation => rotation_pairs(),
            OperatorKind::Random => random_symmetric(seed, 0.5)?,
        })
    }
}
