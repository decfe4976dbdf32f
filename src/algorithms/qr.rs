//! Shifted QR iteration with deflation on a single dense window.
//!
//! This module owns the inner loop of the IQR solver. Given a window `W`, it repeats
//!
//! ```text
//! W_active − σI = QR,    W_active ← RQ + σI
//! ```
//!
//! on the active leading block, deflating converged rows off its bottom edge until the
//! whole window is quasi-upper-triangular (real Schur form) or the step budget runs
//! out. The update is applied as the similarity `QᵀWQ` restricted to the active rows,
//! so the coupling block to the right of the active block stays consistent and the
//! accumulated `Q` is a true Schur basis of the input.
//!
//! Complex-conjugate eigenvalues of a real window never separate into 1×1 blocks. They
//! are deflated as 2×2 blocks once both of their rows are decoupled from the rows above.
//! While the trailing 2×2 block of the active window has complex eigenvalues, the
//! Wilkinson strategy takes a Francis double-shift step instead: it factors
//! `A² − sA + tI`, where `s` and `t` are the trace and determinant of that block, so both
//! conjugate shifts are applied at once in real arithmetic.

use super::{EXCEPTIONAL_SHIFT_PERIOD, IqrConfig, ShiftStrategy, ThresholdPolicy};
use crate::error::{ErrorKind, Result};
use faer::{Mat, MatRef};
use num_complex::Complex64;

/// Result of [`diagonalize`] on one window.
#[derive(Debug, Clone)]
pub struct QrOutput {
    /// The final iterate: quasi-upper-triangular when `converged` is true.
    pub schur: Mat<f64>,
    /// Eigenvalues in diagonal order. Complex pairs appear as `(re + i·im, re − i·im)`.
    pub eigenvalues: Vec<Complex64>,
    /// Product of all orthogonal factors, present when eigenvectors were requested.
    pub q: Option<Mat<f64>>,
    /// Number of QR steps taken.
    pub iterations: usize,
    /// Whether every row was deflated within the step budget.
    pub converged: bool,
    /// Largest strictly-lower entry discarded by deflation, or still present in the
    /// active block when the budget ran out.
    pub residual: f64,
}

/// Runs the shifted QR iteration on `window` until every row deflates or
/// `config.max_iter` steps have run.
///
/// # Errors
/// [`ErrorKind::NumericalBreakdown`] when the window holds a non-finite entry, or when
/// a step produces one.
pub fn diagonalize(window: Mat<f64>, config: &IqrConfig) -> Result<QrOutput> {
    let n = window.nrows();
    if window.ncols() != n {
        return Err(ErrorKind::ShapeMismatch {
            lhs: format!("({n}, {})", window.ncols()),
            rhs: "a square window".to_string(),
        }
        .into());
    }
    if !all_finite(window.as_ref(), n) {
        return Err(ErrorKind::NumericalBreakdown {
            size: n,
            iteration: 0,
        }
        .into());
    }

    let mut a = window;
    let mut q_total = config.want_eigenvectors.then(|| Mat::<f64>::identity(n, n));
    let mut pair_start = vec![false; n];
    let mut hi = n;
    let mut iterations = 0;
    let mut since_deflation = 0;
    let mut residual = 0.0_f64;

    loop {
        // Peel converged rows off the bottom of the active block.
        while hi > 0 {
            if hi == 1 || row_negligible(a.as_ref(), hi - 1, hi - 1, config) {
                residual = residual.max(zero_row(&mut a, hi - 1, hi - 1));
                hi -= 1;
                since_deflation = 0;
                continue;
            }
            let k = hi - 2;
            if complex_block(a.as_ref(), k)
                && row_negligible(a.as_ref(), k, k, config)
                && row_negligible(a.as_ref(), k + 1, k, config)
            {
                residual = residual
                    .max(zero_row(&mut a, k, k))
                    .max(zero_row(&mut a, k + 1, k));
                pair_start[k] = true;
                hi = k;
                since_deflation = 0;
                continue;
            }
            break;
        }

        if hi == 0 || iterations == config.max_iter {
            break;
        }

        let shift = if since_deflation > 0 && since_deflation % EXCEPTIONAL_SHIFT_PERIOD == 0 {
            Shift::Single(exceptional_shift(a.as_ref(), hi))
        } else {
            match config.shift {
                ShiftStrategy::None => Shift::Single(0.0),
                ShiftStrategy::Wilkinson if complex_block(a.as_ref(), hi - 2) => Shift::Double,
                ShiftStrategy::Wilkinson => Shift::Single(wilkinson_shift(a.as_ref(), hi)),
                ShiftStrategy::Fixed(sigma) => Shift::Single(sigma),
            }
        };

        qr_step(&mut a, q_total.as_mut(), hi, shift);
        iterations += 1;
        since_deflation += 1;

        if !all_finite(a.as_ref().get(0..hi, 0..hi), hi) {
            return Err(ErrorKind::NumericalBreakdown {
                size: n,
                iteration: iterations,
            }
            .into());
        }
    }

    let converged = hi == 0;
    for i in 1..hi {
        for j in 0..i {
            residual = residual.max(a.as_ref()[(i, j)].abs());
        }
    }
    let eigenvalues = extract_eigenvalues(a.as_ref(), &pair_start, hi, config);

    log::debug!(
        "QR on a {n}×{n} window: {iterations} steps, converged = {converged}, residual = {residual:.3e}"
    );

    Ok(QrOutput {
        schur: a,
        eigenvalues,
        q: q_total,
        iterations,
        converged,
        residual,
    })
}

/// The shift of one QR step.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shift {
    /// Factor `A − σI`.
    Single(f64),
    /// Factor `A² − sA + tI` with the trace and determinant of the trailing 2×2 block.
    Double,
}

/// The matrix whose QR factorization drives one step on the leading `hi × hi` block.
fn shifted_block(a: MatRef<'_, f64>, hi: usize, shift: Shift) -> Mat<f64> {
    let active = a.get(0..hi, 0..hi);
    match shift {
        Shift::Single(sigma) => Mat::from_fn(hi, hi, |i, j| {
            let value = active[(i, j)];
            if i == j { value - sigma } else { value }
        }),
        Shift::Double => {
            let k = hi - 2;
            let (p, q) = (active[(k, k)], active[(k, k + 1)]);
            let (r, u) = (active[(k + 1, k)], active[(k + 1, k + 1)]);
            let (trace, det) = (p + u, p * u - q * r);
            let square = active * active;
            Mat::from_fn(hi, hi, |i, j| {
                let value = square.as_ref()[(i, j)] - trace * active[(i, j)];
                if i == j { value + det } else { value }
            })
        }
    }
}

/// One QR step on the leading `hi × hi` block of `a`, applied as the similarity `QᵀAQ`.
fn qr_step(a: &mut Mat<f64>, q_total: Option<&mut Mat<f64>>, hi: usize, shift: Shift) {
    let n = a.nrows();
    let q = shifted_block(a.as_ref(), hi, shift).as_ref().qr().compute_Q();

    let next = q.as_ref().transpose() * a.as_ref().get(0..hi, 0..hi) * q.as_ref();
    for i in 0..hi {
        for j in 0..hi {
            a.as_mut()[(i, j)] = next.as_ref()[(i, j)];
        }
    }

    if hi < n {
        let coupling = q.as_ref().transpose() * a.as_ref().get(0..hi, hi..n);
        for i in 0..hi {
            for j in hi..n {
                a.as_mut()[(i, j)] = coupling.as_ref()[(i, j - hi)];
            }
        }
    }

    if let Some(q_total) = q_total {
        let updated = q_total.as_ref().get(.., 0..hi) * q.as_ref();
        for i in 0..n {
            for j in 0..hi {
                q_total.as_mut()[(i, j)] = updated.as_ref()[(i, j)];
            }
        }
    }
}

/// Whether `|a[i, j]|` is below the working threshold.
fn negligible(a: MatRef<'_, f64>, i: usize, j: usize, config: &IqrConfig) -> bool {
    let x = a[(i, j)].abs();
    match config.threshold {
        ThresholdPolicy::Absolute => x <= config.tol,
        ThresholdPolicy::Relative => {
            let scale = a[(i, i)].abs() + a[(j, j)].abs();
            x <= if scale == 0.0 { config.tol } else { config.tol * scale }
        }
    }
}

/// Whether row `i` is negligible in columns `0..end`.
fn row_negligible(a: MatRef<'_, f64>, i: usize, end: usize, config: &IqrConfig) -> bool {
    (0..end).all(|j| negligible(a, i, j, config))
}

/// Zeroes row `i` in columns `0..end` and returns the largest magnitude removed.
fn zero_row(a: &mut Mat<f64>, i: usize, end: usize) -> f64 {
    let mut removed = 0.0_f64;
    for j in 0..end {
        removed = removed.max(a.as_ref()[(i, j)].abs());
        a.as_mut()[(i, j)] = 0.0;
    }
    removed
}

/// Mean and discriminant of the 2×2 block at `(k, k)`; eigenvalues are `mean ± √disc`.
fn block_2x2(a: MatRef<'_, f64>, k: usize) -> (f64, f64) {
    let (p, q) = (a[(k, k)], a[(k, k + 1)]);
    let (r, s) = (a[(k + 1, k)], a[(k + 1, k + 1)]);
    let half = 0.5 * (p - s);
    (0.5 * (p + s), half * half + q * r)
}

fn complex_block(a: MatRef<'_, f64>, k: usize) -> bool {
    block_2x2(a, k).1 < 0.0
}

/// The eigenvalue of the trailing 2×2 active block closest to its last diagonal entry.
/// Falls back to the real part when the block is complex; the solver takes a double
/// step there instead.
fn wilkinson_shift(a: MatRef<'_, f64>, hi: usize) -> f64 {
    let (mean, disc) = block_2x2(a, hi - 2);
    if disc < 0.0 {
        return mean;
    }
    let root = disc.sqrt();
    let last = a[(hi - 1, hi - 1)];
    let (plus, minus) = (mean + root, mean - root);
    if (plus - last).abs() <= (minus - last).abs() {
        plus
    } else {
        minus
    }
}

fn exceptional_shift(a: MatRef<'_, f64>, hi: usize) -> f64 {
    let row = hi - 1;
    let spread = (0..row).fold(0.0_f64, |acc, j| acc.max(a[(row, j)].abs()));
    a[(row, row)] + 0.75 * spread
}

fn all_finite(a: MatRef<'_, f64>, n: usize) -> bool {
    (0..n).all(|i| (0..a.ncols()).all(|j| a[(i, j)].is_finite()))
}

/// Reads eigenvalues off the diagonal: recorded 2×2 pairs first, then any complex
/// 2×2 bulge still coupled inside an unconverged active block.
fn extract_eigenvalues(
    a: MatRef<'_, f64>,
    pair_start: &[bool],
    hi: usize,
    config: &IqrConfig,
) -> Vec<Complex64> {
    let n = a.nrows();
    let mut eigenvalues = Vec::with_capacity(n);
    let mut k = 0;
    while k < n {
        let active_pair = k + 1 < hi && !negligible(a, k + 1, k, config) && complex_block(a, k);
        if pair_start[k] || active_pair {
            let (mean, disc) = block_2x2(a, k);
            let im = (-disc).max(0.0).sqrt();
            eigenvalues.push(Complex64::new(mean, im));
            eigenvalues.push(Complex64::new(mean, -im));
            k += 2;
        } else {
            eigenvalues.push(Complex64::new(a[(k, k)], 0.0));
            k += 1;
        }
    }
    eigenvalues
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::{Side, mat};

    fn sorted_real(eigenvalues: &[Complex64]) -> Vec<f64> {
        let mut re: Vec<f64> = eigenvalues.iter().map(|z| z.re).collect();
        re.sort_by(f64::total_cmp);
        re
    }

    #[test]
    fn test_diagonal_window_needs_no_steps() {
        let w = Mat::from_fn(6, 6, |i, j| if i == j { (i + 1) as f64 } else { 0.0 });
        let out = diagonalize(w, &IqrConfig::default()).unwrap();
        assert!(out.converged);
        assert_eq!(out.iterations, 0);
        assert_eq!(sorted_real(&out.eigenvalues), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(out.residual, 0.0);
    }

    #[test]
    fn test_symmetric_window_matches_faer() {
        let w = mat![
            [4.0, 1.0, 0.5, 0.0],
            [1.0, 3.0, 0.25, 0.1],
            [0.5, 0.25, 2.0, 0.3],
            [0.0, 0.1, 0.3, 1.0],
        ];
        let reference = w.as_ref().self_adjoint_eigen(Side::Lower).unwrap();
        let mut expected: Vec<f64> = (0..4).map(|i| reference.S()[i]).collect();
        expected.sort_by(f64::total_cmp);

        let out = diagonalize(w, &IqrConfig::default()).unwrap();
        assert!(out.converged);
        for (got, want) in sorted_real(&out.eigenvalues).iter().zip(&expected) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn test_rotation_block_deflates_as_a_pair() {
        let w = mat![[1.0, -2.0], [2.0, 1.0]];
        let out = diagonalize(w, &IqrConfig::default()).unwrap();
        assert!(out.converged);
        assert_eq!(
            out.eigenvalues,
            vec![Complex64::new(1.0, 2.0), Complex64::new(1.0, -2.0)]
        );
    }

    #[test]
    fn test_companion_matrix_with_complex_roots() {
        // Roots of (x² − 2x + 5)(x − 3)(x + 2) = x⁴ − 3x³ + x² + 7x − 30.
        let w = mat![
            [0.0, 0.0, 0.0, 30.0],
            [1.0, 0.0, 0.0, -7.0],
            [0.0, 1.0, 0.0, -1.0],
            [0.0, 0.0, 1.0, 3.0],
        ];
        let config = IqrConfig::default().with_tol(1e-12).with_eigenvectors(true);
        let out = diagonalize(w.clone(), &config).unwrap();
        assert!(out.converged);
        assert!(out.iterations > 0);

        let expected = [
            Complex64::new(3.0, 0.0),
            Complex64::new(-2.0, 0.0),
            Complex64::new(1.0, 2.0),
            Complex64::new(1.0, -2.0),
        ];
        for want in expected {
            let err = out
                .eigenvalues
                .iter()
                .map(|got| (got - want).norm())
                .fold(f64::INFINITY, f64::min);
            assert!(err < 1e-9, "{want} missing from {:?}", out.eigenvalues);
        }

        let q = out.q.unwrap();
        let rebuilt = &q * &out.schur * q.as_ref().transpose();
        assert!((&rebuilt - &w).norm_l2() < 1e-9);
    }

    #[test]
    fn test_double_shift_keeps_the_spectrum_of_the_block() {
        let w = mat![
            [2.0, 1.0, 0.5],
            [0.3, 1.0, -2.0],
            [0.0, 2.0, 1.0],
        ];
        let stepped = {
            let mut a = w.clone();
            qr_step(&mut a, None, 3, Shift::Double);
            a
        };
        let trace = |m: &Mat<f64>| (0..3).map(|i| m.as_ref()[(i, i)]).sum::<f64>();
        assert!((trace(&stepped) - trace(&w)).abs() < 1e-12);
        assert!(((&stepped * &stepped).norm_l2() - (&w * &w).norm_l2()).abs() < 1e-9);
    }

    #[test]
    fn test_schur_vectors_reproduce_the_window() {
        let w = Mat::from_fn(8, 8, |i, j| 1.0 / (1.0 + i.abs_diff(j) as f64));
        let config = IqrConfig::default().with_eigenvectors(true);
        let out = diagonalize(w.clone(), &config).unwrap();
        let q = out.q.unwrap();
        let rebuilt = &q * &out.schur * q.as_ref().transpose();
        assert!((&rebuilt - &w).norm_l2() < 1e-8);
        let identity = Mat::<f64>::identity(8, 8);
        assert!((&identity - q.as_ref().transpose() * q.as_ref()).norm_l2() < 1e-12);
    }

    #[test]
    fn test_budget_exhaustion_is_reported() {
        let w = Mat::from_fn(10, 10, |i, j| 1.0 / (1.0 + (i + j) as f64));
        let config = IqrConfig::default()
            .with_max_iter(1)
            .with_shift(ShiftStrategy::None);
        let out = diagonalize(w, &config).unwrap();
        assert!(!out.converged);
        assert_eq!(out.iterations, 1);
        assert!(out.residual > config.tol);
        assert_eq!(out.eigenvalues.len(), 10);
    }

    #[test]
    fn test_relative_threshold_and_fixed_shift() {
        let w = mat![[1e6, 1e-6], [1e-6, 1.0]];
        let config = IqrConfig::default()
            .with_tol(1e-10)
            .with_threshold(ThresholdPolicy::Relative)
            .with_shift(ShiftStrategy::Fixed(0.5));
        let out = diagonalize(w, &config).unwrap();
        assert!(out.converged);
        assert_eq!(out.iterations, 0);
    }

    #[test]
    fn test_non_finite_window_breaks_down() {
        let w = mat![[1.0, f64::NAN], [0.0, 1.0]];
        let err = diagonalize(w, &IqrConfig::default()).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::NumericalBreakdown {
                size: 2,
                iteration: 0
            }
        );
    }

    #[test]
    fn test_empty_window() {
        let out = diagonalize(Mat::<f64>::zeros(0, 0), &IqrConfig::default()).unwrap();
        assert!(out.converged);
        assert!(out.eigenvalues.is_empty());
    }
}
