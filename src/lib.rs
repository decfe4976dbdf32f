//! Lazy infinite arrays and the IQR algorithm for spectra of infinite operators.
//!
//! This crate models arrays whose extent along one or more axes is unbounded. Values are
//! produced by rules and only materialized through bounded windows. On top of that model
//! it implements IQR: approximate eigenvalues (and optionally Schur vectors) of an
//! infinite-dimensional operator, computed by truncating it to growing finite windows,
//! diagonalizing each window with shifted QR iterations, and stopping once consecutive
//! spectra agree.
//!
//! Dense kernels come from [`faer`]. Nothing in this crate ever walks an unbounded axis:
//! every finite result goes through [`matrix::Truncation`] or one of the window methods
//! of [`arrays::LazyArray`].
//!
//! ## Modules
//!
//! **Lazy arrays** ([`shape`], [`ranges`], [`arrays`], [`cache`]): explicit
//! `Size::Unbounded` extents, infinite index ranges, the `LazyArray` tagged variants
//! with lazy broadcasting, and a mutable override layer.
//!
//! **Operators** ([`operator`], [`operators`]): rule-based operators with diagonal,
//! tridiagonal or general structure, and a catalogue of examples.
//!
//! **Solver** ([`algorithms`], [`solvers`]): the QR iteration on one window, spectrum
//! matching, and the adaptive growth loop.
//!
//! ## Example Usage
//!
//! The spectrum of `diag(1, 2, 3, …)` truncated at `n = 50` is `{1, …, 50}`. The solver
//! returns it in descending magnitude and reports convergence, because the first size
//! tried is already the budget.
//!
//! ```rust
//! use infinite_arrays::{operator::create_diagonal_operator, solvers::solve};
//!
//! let op = create_diagonal_operator(|k| (k + 1) as f64);
//! let result = solve(&op, 50, Some(50), 1e-10, 1000, false).unwrap();
//!
//! assert!(result.converged);
//! assert_eq!(result.eigenvalues.len(), 50);
//! assert_eq!(result.eigenvalues[0].re, 50.0);
//! ```
//!
//! A lazy array is consumed the same way, through a window:
//!
//! ```rust
//! use infinite_arrays::{arrays::LazyArray, operator::InfiniteOperator, solvers::solve};
//!
//! let toeplitz = LazyArray::from_fn(infinite_arrays::shape::Shape::unbounded(2), |idx: &[usize]| {
//!     1.0 / (1.0 + idx[0].abs_diff(idx[1]) as f64)
//! });
//! let op = InfiniteOperator::from_lazy_array(toeplitz).unwrap();
//! let result = solve(&op, 10, Some(40), 1e-8, 2000, false).unwrap();
//! assert!(result.truncation_size_used <= 40);
//! ```

pub mod algorithms;
pub mod arrays;
pub mod cache;
pub mod error;
pub mod matrix;
pub mod operator;
pub mod operators;
pub mod ranges;
pub mod shape;
pub mod solvers;
pub mod utils;

pub use arrays::LazyArray;
pub use error::{ErrorKind, InfiniteArrayError};
pub use operator::InfiniteOperator;
pub use solvers::{SolverConfig, SpectralResult, adaptive_spectrum, solve, solve_with};
