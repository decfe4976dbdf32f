//! Axis extents and shapes that may be unbounded.
//!
//! An unbounded axis is an explicit enum case, [`Size::Unbounded`], rather than a
//! floating-point infinity, so arithmetic on shapes stays total. Anything that
//! needs a finite count from an unbounded axis fails with
//! [`ErrorKind::NotFinite`]; only windowing may consume such an axis.

use crate::error::{ErrorKind, InfiniteArrayError, Result};
use std::fmt;

/// The extent of a single axis.
///
/// `Finite(n)` orders before `Unbounded`, so `max` over sizes behaves as expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Size {
    /// An axis with `n` entries.
    Finite(usize),
    /// An axis with no finite bound.
    Unbounded,
}

/// Shorthand for [`Size::Unbounded`].
pub const INFINITY: Size = Size::Unbounded;

impl Size {
    /// Returns `true` for [`Size::Unbounded`].
    pub fn is_unbounded(self) -> bool {
        matches!(self, Size::Unbounded)
    }

    /// Returns the finite extent, or `NotFinite` naming `operation`.
    pub fn finite(self, operation: &'static str) -> Result<usize> {
        match self {
            Size::Finite(n) => Ok(n),
            Size::Unbounded => Err(ErrorKind::NotFinite { operation }.into()),
        }
    }

    /// Whether `index` lies on this axis.
    pub fn contains(self, index: usize) -> bool {
        match self {
            Size::Finite(n) => index < n,
            Size::Unbounded => true,
        }
    }

    /// Caps a requested count at this extent.
    pub fn cap(self, n: usize) -> usize {
        match self {
            Size::Finite(bound) => n.min(bound),
            Size::Unbounded => n,
        }
    }
}

impl From<usize> for Size {
    fn from(n: usize) -> Self {
        Size::Finite(n)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Finite(n) => write!(f, "{n}"),
            Size::Unbounded => f.write_str("∞"),
        }
    }
}

/// The shape of a lazy array: one [`Size`] per axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<Size>);

impl Shape {
    pub fn new(dims: impl Into<Vec<Size>>) -> Self {
        Shape(dims.into())
    }

    /// A shape with `ndim` unbounded axes.
    pub fn unbounded(ndim: usize) -> Self {
        Shape(vec![Size::Unbounded; ndim])
    }

    /// A fully finite shape.
    pub fn finite(dims: &[usize]) -> Self {
        Shape(dims.iter().copied().map(Size::Finite).collect())
    }

    pub fn dims(&self) -> &[Size] {
        &self.0
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|s| !s.is_unbounded())
    }

    /// Total number of elements; fails with `NotFinite` on any unbounded axis.
    pub fn len(&self) -> Result<usize> {
        self.0.iter().try_fold(1usize, |acc, size| {
            let n = size.finite("len()")?;
            acc.checked_mul(n).ok_or_else(|| {
                InfiniteArrayError::from(ErrorKind::invalid_size(format!(
                    "element count of shape {self} overflows usize"
                )))
            })
        })
    }

    /// Whether the shape holds no elements (some finite axis is zero).
    pub fn is_empty(&self) -> bool {
        self.0.iter().any(|s| *s == Size::Finite(0))
    }

    /// Validates `index` against this shape.
    ///
    /// The arity must match, and every component on a finite axis must be below
    /// its bound. Unbounded axes accept any non-negative index.
    pub fn check_index(&self, index: &[usize]) -> Result<()> {
        if index.len() != self.ndim() {
            return Err(ErrorKind::ArityMismatch {
                expected: self.ndim(),
                actual: index.len(),
            }
            .into());
        }
        for (axis, (&i, size)) in index.iter().zip(&self.0).enumerate() {
            if !size.contains(i) {
                let bound = size.finite("bound check")?;
                return Err(ErrorKind::IndexOutOfRange {
                    index: i,
                    bound,
                    axis,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Broadcasts two shapes, aligning trailing axes.
    ///
    /// Axes are compatible when equal, when either is `Finite(1)`, or when both are
    /// unbounded. A finite axis longer than one never stretches to an unbounded one.
    pub fn broadcast(&self, other: &Shape) -> Result<Shape> {
        let ndim = self.ndim().max(other.ndim());
        let mut dims = vec![Size::Finite(1); ndim];
        for (k, out) in dims.iter_mut().enumerate() {
            let lhs = axis_from_end(&self.0, ndim - 1 - k);
            let rhs = axis_from_end(&other.0, ndim - 1 - k);
            *out = match (lhs, rhs) {
                (a, b) if a == b => a,
                (Size::Finite(1), b) => b,
                (a, Size::Finite(1)) => a,
                _ => {
                    return Err(ErrorKind::ShapeMismatch {
                        lhs: self.to_string(),
                        rhs: other.to_string(),
                    }
                    .into());
                }
            };
        }
        Ok(Shape(dims))
    }

    /// Maps an index of a broadcast result back onto an operand of this shape.
    ///
    /// Leading axes absent from the operand are dropped and size-one axes are
    /// pinned to zero.
    pub(crate) fn project_index(&self, index: &[usize]) -> Vec<usize> {
        let offset = index.len() - self.ndim();
        index[offset..]
            .iter()
            .zip(&self.0)
            .map(|(&i, size)| if *size == Size::Finite(1) { 0 } else { i })
            .collect()
    }
}

/// The size of the axis `back` positions from the end, or `Finite(1)` when absent.
fn axis_from_end(dims: &[Size], back: usize) -> Size {
    if back < dims.len() {
        dims[dims.len() - 1 - back]
    } else {
        Size::Finite(1)
    }
}

impl From<Vec<Size>> for Shape {
    fn from(dims: Vec<Size>) -> Self {
        Shape(dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (k, size) in self.0.iter().enumerate() {
            if k > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{size}")?;
        }
        if self.0.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}
