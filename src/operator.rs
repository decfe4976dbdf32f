//! Rule-based infinite operators on `ℓ²(ℕ)`.
//!
//! An [`InfiniteOperator`] stores no matrix entries. It holds a structure tag and the
//! rule(s) producing its entries, and its primary contract is windowing: the leading
//! `n × n` block is produced on request, at a cost that depends on the structure:
//!
//! | structure | rule invocations per window |
//! |---|---|
//! | diagonal | `n` |
//! | tridiagonal | `3n − 2` |
//! | general | `n²` |
//!
//! Rules must be deterministic and free of side effects. This is a documented
//! precondition rather than something checked at runtime; the solver relies on it
//! when it windows the same operator several times.
//!
//! General operators keep their largest window so far. A later window reuses that block
//! and only calls the rule for the new entries, so growing from `m` to `n` costs
//! `n² − m²` calls. Clones share the stored block.

use crate::{
    arrays::{LazyArray, Sequence},
    error::{ErrorKind, Result},
    matrix::Truncation,
    shape::Size,
};
use faer::Mat;
use std::{
    fmt,
    sync::{Arc, Mutex},
};

/// A rule `(i, j) ↦ T[i, j]` (0-based).
pub type EntryRule = Arc<dyn Fn(usize, usize) -> f64 + Send + Sync>;

/// The structure tag of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureTag {
    Diagonal,
    Tridiagonal,
    General,
}

#[derive(Clone)]
enum Structure {
    Diagonal(Sequence<f64>),
    Tridiagonal {
        lower: Sequence<f64>,
        main: Sequence<f64>,
        upper: Sequence<f64>,
    },
    General(EntryRule),
    Array(LazyArray<f64>),
}

/// A conceptually infinite linear operator accessed only through windows.
#[derive(Clone)]
pub struct InfiniteOperator {
    structure: Structure,
    /// Largest window of a general rule evaluated so far.
    memo: Arc<Mutex<Option<Mat<f64>>>>,
}

impl InfiniteOperator {
    fn with_structure(structure: Structure) -> Self {
        InfiniteOperator {
            structure,
            memo: Arc::new(Mutex::new(None)),
        }
    }

    /// An operator with an arbitrary entry rule. Windowing costs `n²` rule calls.
    pub fn general(rule: impl Fn(usize, usize) -> f64 + Send + Sync + 'static) -> Self {
        Self::with_structure(Structure::General(Arc::new(rule)))
    }

    /// A diagonal operator with `rule(k)` at `(k, k)`.
    pub fn diagonal(rule: impl Fn(usize) -> f64 + Send + Sync + 'static) -> Self {
        Self::with_structure(Structure::Diagonal(Sequence::from_fn(rule)))
    }

    /// A diagonal operator from a finite list, zero past its end.
    pub fn diagonal_from_values(values: impl Into<Vec<f64>>) -> Self {
        Self::with_structure(Structure::Diagonal(Sequence::from_values(values)))
    }

    /// A tridiagonal operator with `T[i, i] = main(i)`, `T[i, i + 1] = upper(i)` and
    /// `T[i + 1, i] = lower(i)`. Missing bands are zero; finite bands are zero-padded.
    pub fn tridiagonal(
        main: Sequence<f64>,
        upper: Option<Sequence<f64>>,
        lower: Option<Sequence<f64>>,
    ) -> Self {
        let zeros = || Sequence::from_fn(|_| 0.0);
        Self::with_structure(Structure::Tridiagonal {
            lower: lower.unwrap_or_else(zeros),
            main,
            upper: upper.unwrap_or_else(zeros),
        })
    }

    /// Wraps a 2-D lazy array. A Diagonal lazy array keeps the `O(n)` diagonal path.
    pub fn from_lazy_array(array: LazyArray<f64>) -> Result<Self> {
        if array.ndim() != 2 {
            return Err(ErrorKind::ArityMismatch {
                expected: 2,
                actual: array.ndim(),
            }
            .into());
        }
        let structure = match array {
            LazyArray::Diagonal { diagonal } if diagonal.extent().is_unbounded() => {
                Structure::Diagonal(diagonal)
            }
            other => Structure::Array(other),
        };
        Ok(Self::with_structure(structure))
    }

    pub fn structure(&self) -> StructureTag {
        match &self.structure {
            Structure::Diagonal(_) => StructureTag::Diagonal,
            Structure::Tridiagonal { .. } => StructureTag::Tridiagonal,
            Structure::General(_) => StructureTag::General,
            Structure::Array(LazyArray::Diagonal { .. }) => StructureTag::Diagonal,
            Structure::Array(_) => StructureTag::General,
        }
    }

    /// The entry `T[i, j]`.
    pub fn entry(&self, i: usize, j: usize) -> Result<f64> {
        Ok(match &self.structure {
            Structure::Diagonal(main) => {
                if i == j {
                    main.get_or_zero(i)
                } else {
                    0.0
                }
            }
            Structure::Tridiagonal { lower, main, upper } => {
                if i == j {
                    main.get_or_zero(i)
                } else if j == i + 1 {
                    upper.get_or_zero(i)
                } else if i == j + 1 {
                    lower.get_or_zero(j)
                } else {
                    0.0
                }
            }
            Structure::General(rule) => rule(i, j),
            Structure::Array(array) => return array.evaluate(&[i, j]),
        })
    }

    /// The leading `n × n` block, `W[i][j] = T[i, j]` for `0 ≤ i, j < n`.
    pub fn window(&self, n: usize) -> Result<Mat<f64>> {
        match &self.structure {
            Structure::Diagonal(main) => {
                let mut w = Mat::<f64>::zeros(n, n);
                for k in 0..n {
                    w.as_mut()[(k, k)] = main.get_or_zero(k);
                }
                Ok(w)
            }
            Structure::Tridiagonal { lower, main, upper } => {
                let mut w = Mat::<f64>::zeros(n, n);
                for k in 0..n {
                    w.as_mut()[(k, k)] = main.get_or_zero(k);
                    if k + 1 < n {
                        w.as_mut()[(k, k + 1)] = upper.get_or_zero(k);
                        w.as_mut()[(k + 1, k)] = lower.get_or_zero(k);
                    }
                }
                Ok(w)
            }
            Structure::General(rule) => Ok(self.general_window(rule, n)),
            Structure::Array(array) => array.to_mat(n, n),
        }
    }
}

impl InfiniteOperator {
    fn general_window(&self, rule: &EntryRule, n: usize) -> Mat<f64> {
        let mut memo = self
            .memo
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let known = memo.as_ref().map_or(0, |block| block.nrows());
        let w = match memo.as_ref() {
            Some(block) if known > 0 => Mat::from_fn(n, n, |i, j| {
                if i < known && j < known {
                    block.as_ref()[(i, j)]
                } else {
                    rule(i, j)
                }
            }),
            _ => Mat::from_fn(n, n, |i, j| rule(i, j)),
        };
        if n > known {
            *memo = Some(w.clone());
        }
        w
    }

    /// Drops the stored window of a general operator.
    pub fn clear_cache(&self) {
        *self
            .memo
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

impl Truncation for InfiniteOperator {
    fn window(&self, n: usize) -> Result<Mat<f64>> {
        InfiniteOperator::window(self, n)
    }

    fn extent(&self) -> Size {
        match &self.structure {
            Structure::Array(array) => array.extent(),
            _ => Size::Unbounded,
        }
    }
}

impl fmt::Debug for InfiniteOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteOperator")
            .field("structure", &self.structure())
            .field("extent", &self.extent().to_string())
            .finish()
    }
}

/// Builds a diagonal operator with `rule(k)` at `(k, k)`.
pub fn create_diagonal_operator(
    rule: impl Fn(usize) -> f64 + Send + Sync + 'static,
) -> InfiniteOperator {
    InfiniteOperator::diagonal(rule)
}

/// Builds a tridiagonal operator from its three bands; see [`InfiniteOperator::tridiagonal`].
pub fn create_tridiagonal_operator(
    main: Sequence<f64>,
    upper: Option<Sequence<f64>>,
    lower: Option<Sequence<f64>>,
) -> InfiniteOperator {
    InfiniteOperator::tridiagonal(main, upper, lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_diagonal_window_is_exact() {
        let op = create_diagonal_operator(|k| (k + 1) as f64);
        let w = op.window(5).unwrap();
        let expected = Mat::from_fn(5, 5, |i, j| if i == j { (i + 1) as f64 } else { 0.0 });
        assert_eq!(w, expected);
        assert_eq!(op.structure(), StructureTag::Diagonal);
    }

    #[test]
    fn test_diagonal_window_calls_rule_linearly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let op = InfiniteOperator::diagonal(move |k| {
            counter.fetch_add(1, Ordering::Relaxed);
            k as f64
        });
        op.window(40).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 40);
    }

    #[test]
    fn test_finite_diagonal_pads_with_zero() {
        let op = InfiniteOperator::diagonal_from_values(vec![3.0, 1.0]);
        let w = op.window(3).unwrap();
        assert_eq!(w.as_ref()[(0, 0)], 3.0);
        assert_eq!(w.as_ref()[(1, 1)], 1.0);
        assert_eq!(w.as_ref()[(2, 2)], 0.0);
    }

    #[test]
    fn test_tridiagonal_band_placement() {
        let op = create_tridiagonal_operator(
            Sequence::from_fn(|_| 2.0),
            Some(Sequence::from_fn(|k| -(k as f64) - 1.0)),
            Some(Sequence::from_fn(|k| (k as f64) + 1.0)),
        );
        let w = op.window(4).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(w.as_ref()[(i, j)], op.entry(i, j).unwrap());
            }
        }
        assert_eq!(w.as_ref()[(1, 2)], -2.0);
        assert_eq!(w.as_ref()[(2, 1)], 2.0);
        assert_eq!(w.as_ref()[(0, 2)], 0.0);
        assert_eq!(op.structure(), StructureTag::Tridiagonal);
    }

    #[test]
    fn test_general_window_is_idempotent() {
        let op = InfiniteOperator::general(|i, j| 1.0 / (1.0 + i.abs_diff(j) as f64));
        assert_eq!(op.window(12).unwrap(), op.window(12).unwrap());
        assert_eq!(op.entry(3, 5).unwrap(), 1.0 / 3.0);
    }

    #[test]
    fn test_general_window_reuses_the_previous_block() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let op = InfiniteOperator::general(move |i, j| {
            counter.fetch_add(1, Ordering::Relaxed);
            (i * 7 + j) as f64
        });

        let small = op.window(10).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 100);
        let large = op.window(20).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 400);
        assert_eq!(large.as_ref().get(0..10, 0..10), small.as_ref());
        assert_eq!(large.as_ref()[(19, 3)], (19 * 7 + 3) as f64);

        let middle = op.clone().window(15).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 400);
        assert_eq!(middle.as_ref(), large.as_ref().get(0..15, 0..15));

        op.clear_cache();
        op.window(5).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 425);
    }

    #[test]
    fn test_from_lazy_array() {
        let diag = LazyArray::diagonal_fn(|k| (k * 2) as f64);
        let op = InfiniteOperator::from_lazy_array(diag).unwrap();
        assert_eq!(op.structure(), StructureTag::Diagonal);
        assert_eq!(op.window(3).unwrap().as_ref()[(2, 2)], 4.0);

        let finite = LazyArray::fill(1.0, Shape::finite(&[3, 3]));
        let op = InfiniteOperator::from_lazy_array(finite).unwrap();
        assert_eq!(op.extent(), Size::Finite(3));
        assert!(matches!(
            op.window(4).unwrap_err().kind(),
            ErrorKind::IndexOutOfRange { .. }
        ));

        let vector = LazyArray::<f64>::ones(Shape::unbounded(1));
        assert!(InfiniteOperator::from_lazy_array(vector).is_err());
    }
}
