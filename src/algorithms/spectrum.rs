//! Ordering and comparison of spectra between truncation sizes.

use super::{EigenOrdering, Matching};
use num_complex::Complex64;

/// The permutation that puts `eigenvalues` into `ordering`.
///
/// The sort is stable, so ties keep their diagonal position.
pub fn ordering_permutation(eigenvalues: &[Complex64], ordering: EigenOrdering) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..eigenvalues.len()).collect();
    match ordering {
        EigenOrdering::DescendingMagnitude => {
            perm.sort_by(|&a, &b| eigenvalues[b].norm().total_cmp(&eigenvalues[a].norm()));
        }
        EigenOrdering::AscendingReal => {
            perm.sort_by(|&a, &b| {
                let (x, y) = (eigenvalues[a], eigenvalues[b]);
                x.re.total_cmp(&y.re).then(x.im.total_cmp(&y.im))
            });
        }
    }
    perm
}

/// Returns `eigenvalues` sorted by `ordering`.
pub fn ordered(eigenvalues: &[Complex64], ordering: EigenOrdering) -> Vec<Complex64> {
    ordering_permutation(eigenvalues, ordering)
        .into_iter()
        .map(|k| eigenvalues[k])
        .collect()
}

/// Pairs eigenvalues of two spectra, closest pairs first.
///
/// Every eigenvalue is used at most once, and `min(prev.len(), cur.len())` pairs are
/// returned as `(index into prev, index into cur)`.
pub fn greedy_matching(prev: &[Complex64], cur: &[Complex64]) -> Vec<(usize, usize)> {
    let mut candidates = Vec::with_capacity(prev.len() * cur.len());
    for (i, p) in prev.iter().enumerate() {
        for (j, c) in cur.iter().enumerate() {
            candidates.push(((p - c).norm(), i, j));
        }
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    let wanted = prev.len().min(cur.len());
    let mut used_prev = vec![false; prev.len()];
    let mut used_cur = vec![false; cur.len()];
    let mut pairs = Vec::with_capacity(wanted);
    for (_, i, j) in candidates {
        if pairs.len() == wanted {
            break;
        }
        if !used_prev[i] && !used_cur[j] {
            used_prev[i] = true;
            used_cur[j] = true;
            pairs.push((i, j));
        }
    }
    pairs
}

/// The largest `|λ − μ|` over matched pairs: the spectral change between two sizes.
///
/// Two empty spectra agree exactly; an empty spectrum never agrees with a non-empty one.
pub fn max_matched_difference(prev: &[Complex64], cur: &[Complex64], matching: Matching) -> f64 {
    match (prev.is_empty(), cur.is_empty()) {
        (true, true) => return 0.0,
        (true, false) | (false, true) => return f64::INFINITY,
        _ => {}
    }
    match matching {
        Matching::Greedy => greedy_matching(prev, cur)
            .into_iter()
            .map(|(i, j)| (prev[i] - cur[j]).norm())
            .fold(0.0, f64::max),
        Matching::Positional => prev
            .iter()
            .zip(cur)
            .map(|(p, c)| (p - c).norm())
            .fold(0.0, f64::max),
    }
}
