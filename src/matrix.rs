//! This module defines the core abstraction consumed by the IQR solver: truncation.
//!
//! The solver never needs an infinite operator as a whole. Its only request is
//! "give me the leading `n × n` block as a dense matrix", repeated at growing `n`.
//! The [`Truncation`] trait formalizes that contract, so the same solver runs on
//! rule-based [`InfiniteOperator`](crate::operator::InfiniteOperator)s, on 2-D
//! [`LazyArray`]s, and on ordinary finite `faer` matrices (handy for testing the
//! algorithm on problems whose spectrum is known).
//!
//! Implementations must be deterministic: two calls with the same `n` return
//! bit-identical matrices, and every call returns a fresh, exclusively owned `Mat`.

use crate::{
    arrays::LazyArray,
    error::{ErrorKind, Result},
    shape::Size,
};
use faer::{Mat, MatMut, MatRef, prelude::Reborrow};

/// Anything that can be truncated to a dense, square, leading window.
///
/// # Example
///
/// ```
/// use faer::mat;
/// use infinite_arrays::matrix::Truncation;
///
/// let a = mat![[2.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 2.0]];
/// let w = a.window(2).unwrap();
/// assert_eq!(w, mat![[2.0, -1.0], [-1.0, 2.0]]);
/// assert!(a.window(4).is_err());
/// ```
pub trait Truncation {
    /// Returns the leading `n × n` block.
    fn window(&self, n: usize) -> Result<Mat<f64>>;

    /// The largest window this object can provide.
    fn extent(&self) -> Size {
        Size::Unbounded
    }
}

impl<T: Truncation + ?Sized> Truncation for &T {
    fn window(&self, n: usize) -> Result<Mat<f64>> {
        (**self).window(n)
    }

    fn extent(&self) -> Size {
        (**self).extent()
    }
}

/// A finite matrix truncates to its leading block.
impl<'a> Truncation for MatRef<'a, f64> {
    fn window(&self, n: usize) -> Result<Mat<f64>> {
        let bound = self.nrows().min(self.ncols());
        if n > bound {
            return Err(ErrorKind::IndexOutOfRange {
                index: n - 1,
                bound,
                axis: if self.nrows() <= self.ncols() { 0 } else { 1 },
            }
            .into());
        }
        Ok(self.get(0..n, 0..n).to_owned())
    }

    fn extent(&self) -> Size {
        Size::Finite(self.nrows().min(self.ncols()))
    }
}

impl<'a> Truncation for MatMut<'a, f64> {
    fn window(&self, n: usize) -> Result<Mat<f64>> {
        self.rb().window(n)
    }

    fn extent(&self) -> Size {
        self.rb().extent()
    }
}

impl Truncation for Mat<f64> {
    fn window(&self, n: usize) -> Result<Mat<f64>> {
        self.as_ref().window(n)
    }

    fn extent(&self) -> Size {
        self.as_ref().extent()
    }
}

/// A 2-D lazy array truncates through [`LazyArray::to_mat`].
impl Truncation for LazyArray<f64> {
    fn window(&self, n: usize) -> Result<Mat<f64>> {
        self.to_mat(n, n)
    }

    fn extent(&self) -> Size {
        let shape = self.shape();
        shape.dims().iter().copied().min().unwrap_or(Size::Finite(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use faer::mat;

    #[test]
    fn test_truncation_for_mat() {
        let matrix: Mat<f64> = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let operator: &dyn Truncation = &matrix;
        assert_eq!(operator.window(2).unwrap(), mat![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(operator.window(0).unwrap().nrows(), 0);
        assert_eq!(operator.extent(), Size::Finite(3));
    }

    #[test]
    fn test_truncation_for_mat_ref_and_mut() {
        let mut matrix: Mat<f64> = mat![[1.0, 2.0], [3.0, 4.0]];
        let expected = matrix.clone();

        let operator_ref: &dyn Truncation = &matrix.as_ref();
        assert_eq!(operator_ref.window(2).unwrap(), expected);

        let operator_mut: &dyn Truncation = &matrix.as_mut();
        assert_eq!(operator_mut.window(2).unwrap(), expected);
    }

    #[test]
    fn test_window_past_the_end_fails() {
        let matrix: Mat<f64> = mat![[1.0, 0.0], [0.0, 1.0]];
        let err = matrix.window(3).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::IndexOutOfRange { bound: 2, .. }
        ));
    }

    #[test]
    fn test_truncation_for_lazy_array() {
        let a = LazyArray::from_fn(Shape::unbounded(2), |idx: &[usize]| {
            1.0 / (1.0 + idx[0].abs_diff(idx[1]) as f64)
        });
        assert_eq!(a.extent(), Size::Unbounded);
        let first = Truncation::window(&a, 6).unwrap();
        let second = Truncation::window(&a, 6).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_ref()[(0, 2)], 1.0 / 3.0);

        let row = LazyArray::<f64>::ones(Shape::unbounded(1));
        assert!(matches!(
            Truncation::window(&row, 2).unwrap_err().kind(),
            ErrorKind::ArityMismatch { .. }
        ));
    }
}
