//! Lazy arrays whose axes may be unbounded.
//!
//! A [`LazyArray`] never stores its elements in bulk. Each variant answers
//! "what is the value at this index?" on demand:
//!
//! - **Fill**: one value everywhere (`ones`, `zeros`, `fill`).
//! - **Diagonal**: a square matrix built from a [`Sequence`]; off-diagonal entries are
//!   the additive identity.
//! - **Broadcast**: an arbitrary index rule, including element-wise combinations of other
//!   lazy arrays produced by [`LazyArray::combine`], [`LazyArray::zip_with`] and
//!   [`LazyArray::map`].
//! - **Cached**: a [`CachedArray`] overlaying mutable overrides on an inner array.
//!
//! Combination is strictly lazy: it validates shapes and captures its operands, but
//! evaluates nothing. The window methods ([`LazyArray::window`],
//! [`LazyArray::window_2d`], [`LazyArray::to_mat`]) are the only operations whose
//! cost grows with the requested size.
//!
//! ## Example
//!
//! ```
//! use infinite_arrays::{arrays::{BinaryOp, LazyArray}, shape::Shape};
//!
//! let ones = LazyArray::<f64>::ones(Shape::unbounded(1));
//! let squares = LazyArray::from_fn(Shape::unbounded(1), |idx: &[usize]| (idx[0] * idx[0]) as f64);
//! let sum = ones.combine(&squares, BinaryOp::Add).unwrap();
//!
//! assert_eq!(sum.evaluate(&[3]).unwrap(), 10.0);
//! assert_eq!(sum.window(4).unwrap(), vec![1.0, 2.0, 5.0, 10.0]);
//! assert!(sum.len().is_err());
//! ```

use crate::{
    cache::CachedArray,
    error::{ErrorKind, Result},
    ranges::InfRange,
    shape::{Shape, Size},
};
use faer::Mat;
use num_traits::{NumOps, One, Zero};
use std::{fmt, ops, sync::Arc};

/// Number of entries shown by the 1-D preview before eliding the rest.
const PREVIEW_LEN: usize = 12;

/// Number of rows and columns shown by the 2-D preview.
const PREVIEW_SIDE: usize = 8;

/// Element types a lazy array can hold: cloneable, thread-safe, with an additive identity.
pub trait Element: Clone + Zero + Send + Sync + 'static {}

impl<T: Clone + Zero + Send + Sync + 'static> Element for T {}

/// An index rule for the Broadcast variant.
pub type IndexRule<T> = Arc<dyn Fn(&[usize]) -> T + Send + Sync>;

/// A one-dimensional source of values, finite or produced by a rule.
#[derive(Clone)]
pub enum Sequence<T> {
    /// A finite list of values.
    Values(Arc<[T]>),
    /// An unbounded rule `k ↦ value`. Must be pure.
    Rule(Arc<dyn Fn(usize) -> T + Send + Sync>),
}

impl<T: Element> Sequence<T> {
    pub fn from_fn(rule: impl Fn(usize) -> T + Send + Sync + 'static) -> Self {
        Sequence::Rule(Arc::new(rule))
    }

    pub fn from_values(values: impl Into<Vec<T>>) -> Self {
        Sequence::Values(values.into().into())
    }

    /// `Finite(len)` for value lists, `Unbounded` for rules.
    pub fn extent(&self) -> Size {
        match self {
            Sequence::Values(values) => Size::Finite(values.len()),
            Sequence::Rule(_) => Size::Unbounded,
        }
    }

    /// The `k`-th value, or `None` past the end of a finite list.
    pub fn get(&self, k: usize) -> Option<T> {
        match self {
            Sequence::Values(values) => values.get(k).cloned(),
            Sequence::Rule(rule) => Some(rule(k)),
        }
    }

    /// The `k`-th value, padding finite lists with zeros.
    pub fn get_or_zero(&self, k: usize) -> T {
        self.get(k).unwrap_or_else(T::zero)
    }
}

impl<T: Element> From<Vec<T>> for Sequence<T> {
    fn from(values: Vec<T>) -> Self {
        Sequence::from_values(values)
    }
}

impl<T> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Values(values) => write!(f, "Sequence::Values(len = {})", values.len()),
            Sequence::Rule(_) => f.write_str("Sequence::Rule"),
        }
    }
}

/// Element-wise operators for [`LazyArray::combine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn apply<T: NumOps>(self, lhs: T, rhs: T) -> T {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
        }
    }
}

/// An array with possibly unbounded axes whose elements are computed on access.
#[derive(Clone)]
pub enum LazyArray<T> {
    /// A constant value at every index.
    Fill { value: T, shape: Shape },
    /// A square matrix with `diagonal[i]` at `(i, i)` and zero elsewhere.
    Diagonal { diagonal: Sequence<T> },
    /// Values produced by an index rule.
    Broadcast { rule: IndexRule<T>, shape: Shape },
    /// An inner array with a mutable override map.
    Cached(CachedArray<T>),
}

impl<T: Element> LazyArray<T> {
    pub fn fill(value: T, shape: Shape) -> Self {
        LazyArray::Fill { value, shape }
    }

    pub fn zeros(shape: Shape) -> Self {
        LazyArray::fill(T::zero(), shape)
    }

    pub fn ones(shape: Shape) -> Self
    where
        T: One,
    {
        LazyArray::fill(T::one(), shape)
    }

    /// A diagonal matrix; `(∞, ∞)` for a rule, `(n, n)` for `n` values.
    pub fn diagonal(diagonal: Sequence<T>) -> Self {
        LazyArray::Diagonal { diagonal }
    }

    /// An unbounded diagonal matrix with `rule(k)` at `(k, k)`.
    pub fn diagonal_fn(rule: impl Fn(usize) -> T + Send + Sync + 'static) -> Self {
        LazyArray::diagonal(Sequence::from_fn(rule))
    }

    /// A finite `(n, n)` diagonal matrix from `n` values.
    pub fn diagonal_from_values(values: impl Into<Vec<T>>) -> Self {
        LazyArray::diagonal(Sequence::from_values(values))
    }

    /// A Broadcast array defined by an index rule. The rule must be pure.
    pub fn from_fn(shape: Shape, rule: impl Fn(&[usize]) -> T + Send + Sync + 'static) -> Self {
        LazyArray::Broadcast {
            rule: Arc::new(rule),
            shape,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            LazyArray::Fill { shape, .. } | LazyArray::Broadcast { shape, .. } => shape.clone(),
            LazyArray::Diagonal { diagonal } => {
                let side = diagonal.extent();
                Shape::new(vec![side, side])
            }
            LazyArray::Cached(cached) => cached.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            LazyArray::Diagonal { .. } => 2,
            _ => self.shape().ndim(),
        }
    }

    /// Total number of elements; `NotFinite` when any axis is unbounded.
    pub fn len(&self) -> Result<usize> {
        self.shape().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape().is_empty()
    }

    /// The element at `index`, validated against the shape.
    pub fn evaluate(&self, index: &[usize]) -> Result<T> {
        self.shape().check_index(index)?;
        Ok(self.value_at(index))
    }

    /// Evaluation without validation. `index` must already be in range.
    pub(crate) fn value_at(&self, index: &[usize]) -> T {
        match self {
            LazyArray::Fill { value, .. } => value.clone(),
            LazyArray::Diagonal { diagonal } => {
                if index[0] == index[1] {
                    diagonal.get_or_zero(index[0])
                } else {
                    T::zero()
                }
            }
            LazyArray::Broadcast { rule, .. } => rule(index),
            LazyArray::Cached(cached) => cached.value_at(index),
        }
    }

    /// Element-wise combination with broadcasting, evaluated lazily.
    pub fn combine(&self, other: &LazyArray<T>, op: BinaryOp) -> Result<LazyArray<T>>
    where
        T: NumOps,
    {
        self.zip_with(other, move |a, b| op.apply(a, b))
    }

    /// Element-wise combination with an arbitrary pure function.
    ///
    /// The operands are captured by value; later `set` calls on a cached operand do
    /// not leak into the result.
    pub fn zip_with(
        &self,
        other: &LazyArray<T>,
        f: impl Fn(T, T) -> T + Send + Sync + 'static,
    ) -> Result<LazyArray<T>> {
        let lhs_shape = self.shape();
        let rhs_shape = other.shape();
        let shape = lhs_shape.broadcast(&rhs_shape)?;
        let (lhs, rhs) = (self.clone(), other.clone());
        Ok(LazyArray::from_fn(shape, move |index| {
            f(
                lhs.value_at(&lhs_shape.project_index(index)),
                rhs.value_at(&rhs_shape.project_index(index)),
            )
        }))
    }

    /// Applies `f` to every element, lazily.
    pub fn map(&self, f: impl Fn(T) -> T + Send + Sync + 'static) -> LazyArray<T> {
        let inner = self.clone();
        LazyArray::from_fn(self.shape(), move |index| f(inner.value_at(index)))
    }

    /// The first `n` elements of a 1-D array.
    pub fn window(&self, n: usize) -> Result<Vec<T>> {
        self.expect_ndim(1)?;
        (0..n).map(|i| self.evaluate(&[i])).collect()
    }

    /// The leading `n × m` block of a 2-D array, row-major.
    pub fn window_2d(&self, n: usize, m: usize) -> Result<Vec<Vec<T>>> {
        self.expect_ndim(2)?;
        self.check_block(n, m)?;
        Ok((0..n)
            .map(|i| (0..m).map(|j| self.value_at(&[i, j])).collect())
            .collect())
    }

    /// Every element of a finite array in row-major order.
    pub fn to_dense(&self) -> Result<Vec<T>> {
        let shape = self.shape();
        let total = shape.len()?;
        let dims: Vec<usize> = shape
            .dims()
            .iter()
            .map(|size| size.finite("to_dense()"))
            .collect::<Result<_>>()?;
        let mut out = Vec::with_capacity(total);
        let mut index = vec![0usize; dims.len()];
        for _ in 0..total {
            out.push(self.value_at(&index));
            // Odometer increment, last axis fastest.
            for axis in (0..dims.len()).rev() {
                index[axis] += 1;
                if index[axis] < dims[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        Ok(out)
    }

    /// Wraps the array in a mutable override layer.
    pub fn cache(self) -> CachedArray<T> {
        CachedArray::new(self)
    }

    pub fn as_cached(&self) -> Option<&CachedArray<T>> {
        match self {
            LazyArray::Cached(cached) => Some(cached),
            _ => None,
        }
    }

    pub fn as_cached_mut(&mut self) -> Option<&mut CachedArray<T>> {
        match self {
            LazyArray::Cached(cached) => Some(cached),
            _ => None,
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            LazyArray::Fill { .. } => "Fill",
            LazyArray::Diagonal { .. } => "Diagonal",
            LazyArray::Broadcast { .. } => "Broadcast",
            LazyArray::Cached(_) => "Cached",
        }
    }

    fn expect_ndim(&self, ndim: usize) -> Result<()> {
        if self.ndim() != ndim {
            return Err(ErrorKind::ArityMismatch {
                expected: ndim,
                actual: self.ndim(),
            }
            .into());
        }
        Ok(())
    }

    /// Bounds are monotone, so checking the last corner validates the whole block.
    fn check_block(&self, n: usize, m: usize) -> Result<()> {
        if n > 0 && m > 0 {
            self.shape().check_index(&[n - 1, m - 1])?;
        }
        Ok(())
    }
}

impl LazyArray<i64> {
    /// Exposes an infinite range as a 1-D lazy array. Values saturate at the `i64` bounds.
    pub fn from_range(range: InfRange) -> Self {
        LazyArray::from_fn(Shape::unbounded(1), move |index| {
            range.element_at(index[0]).unwrap_or(if range.step() > 0 {
                i64::MAX
            } else {
                i64::MIN
            })
        })
    }
}

impl LazyArray<f64> {
    /// The leading `nrows × ncols` block as a dense [`faer::Mat`].
    pub fn to_mat(&self, nrows: usize, ncols: usize) -> Result<Mat<f64>> {
        self.expect_ndim(2)?;
        self.check_block(nrows, ncols)?;
        if let LazyArray::Diagonal { diagonal } = self {
            // Off-diagonal entries are structural zeros; only the band needs evaluating.
            let mut out = Mat::<f64>::zeros(nrows, ncols);
            for k in 0..nrows.min(ncols) {
                out.as_mut()[(k, k)] = diagonal.get_or_zero(k);
            }
            return Ok(out);
        }
        Ok(Mat::from_fn(nrows, ncols, |i, j| self.value_at(&[i, j])))
    }
}

impl<T> fmt::Debug for LazyArray<T>
where
    T: Element + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyArray::Fill { value, shape } => f
                .debug_struct("Fill")
                .field("value", value)
                .field("shape", &shape.to_string())
                .finish(),
            LazyArray::Diagonal { diagonal } => {
                f.debug_struct("Diagonal").field("diagonal", diagonal).finish()
            }
            LazyArray::Broadcast { shape, .. } => f
                .debug_struct("Broadcast")
                .field("shape", &shape.to_string())
                .finish_non_exhaustive(),
            LazyArray::Cached(cached) => f
                .debug_struct("Cached")
                .field("shape", &cached.shape().to_string())
                .field("overrides", &cached.overrides())
                .finish(),
        }
    }
}

/// A bounded preview. Never walks an axis past the preview count.
impl<T> fmt::Display for LazyArray<T>
where
    T: Element + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = self.shape();
        write!(f, "{}{}:", self.variant_name(), shape)?;
        match shape.dims() {
            [len] => {
                let shown = len.cap(PREVIEW_LEN);
                for i in 0..shown {
                    write!(f, "\n  {}", self.value_at(&[i]))?;
                }
                if !len.contains(shown) {
                    return Ok(());
                }
                f.write_str("\n  ⋮")
            }
            [rows, cols] => {
                let shown_rows = rows.cap(PREVIEW_SIDE);
                let shown_cols = cols.cap(PREVIEW_SIDE);
                let diagonal = matches!(self, LazyArray::Diagonal { .. });
                for i in 0..shown_rows {
                    f.write_str("\n")?;
                    for j in 0..shown_cols {
                        if j > 0 {
                            f.write_str("  ")?;
                        }
                        if diagonal && i != j {
                            f.write_str("⋅")?;
                        } else {
                            write!(f, "{}", self.value_at(&[i, j]))?;
                        }
                    }
                    if cols.contains(shown_cols) {
                        f.write_str("  …")?;
                    }
                }
                if rows.contains(shown_rows) {
                    f.write_str("\n⋮")?;
                }
                Ok(())
            }
            _ => f.write_str(" …"),
        }
    }
}

macro_rules! impl_scalar_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<T: Element + NumOps> ops::$trait<T> for LazyArray<T> {
            type Output = LazyArray<T>;

            fn $method(self, rhs: T) -> LazyArray<T> {
                self.map(move |x| x $op rhs.clone())
            }
        }

        impl<T: Element + NumOps> ops::$trait<T> for &LazyArray<T> {
            type Output = LazyArray<T>;

            fn $method(self, rhs: T) -> LazyArray<T> {
                self.map(move |x| x $op rhs.clone())
            }
        }
    };
}

impl_scalar_op!(Add, add, +);
impl_scalar_op!(Sub, sub, -);
impl_scalar_op!(Mul, mul, *);
impl_scalar_op!(Div, div, /);
