//! A mutable override layer on top of an immutable lazy array.
//!
//! [`CachedArray`] keeps a finite map from index tuples to values. Reads check the
//! map first and fall back to the inner array; writes only ever touch the map, so
//! the inner array (which may be shared) is never mutated. The map grows with
//! every new index written and only shrinks through an explicit [`CachedArray::clear`].
//!
//! There is no internal synchronization. `set` takes `&mut self`; callers that
//! share one overlay between threads must wrap it in their own lock.

use crate::{
    arrays::{Element, LazyArray},
    error::Result,
    shape::Shape,
};
use std::{collections::HashMap, sync::Arc};

/// A lazy array with a growable map of overridden entries.
#[derive(Clone)]
pub struct CachedArray<T> {
    inner: Arc<LazyArray<T>>,
    overrides: HashMap<Vec<usize>, T>,
}

impl<T: Element> CachedArray<T> {
    pub fn new(inner: LazyArray<T>) -> Self {
        CachedArray {
            inner: Arc::new(inner),
            overrides: HashMap::new(),
        }
    }

    pub fn shape(&self) -> Shape {
        self.inner.shape()
    }

    pub fn inner(&self) -> &LazyArray<T> {
        &self.inner
    }

    /// The override at `index` if present, otherwise the inner array's value.
    pub fn get(&self, index: &[usize]) -> Result<T> {
        self.inner.shape().check_index(index)?;
        Ok(self.value_at(index))
    }

    pub(crate) fn value_at(&self, index: &[usize]) -> T {
        match self.overrides.get(index) {
            Some(value) => value.clone(),
            None => self.inner.value_at(index),
        }
    }

    /// Overrides the entry at `index`, returning the previous override if any.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<Option<T>> {
        self.inner.shape().check_index(index)?;
        Ok(self.overrides.insert(index.to_vec(), value))
    }

    pub fn is_overridden(&self, index: &[usize]) -> bool {
        self.overrides.contains_key(index)
    }

    /// Number of overridden entries.
    pub fn overrides(&self) -> usize {
        self.overrides.len()
    }

    /// Drops every override.
    pub fn clear(&mut self) {
        self.overrides.clear();
    }

    /// Turns the overlay back into a lazy array (the Cached variant).
    pub fn into_lazy(self) -> LazyArray<T> {
        LazyArray::Cached(self)
    }
}

/// Wraps `array` in a [`CachedArray`].
pub fn cache<T: Element>(array: LazyArray<T>) -> CachedArray<T> {
    CachedArray::new(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{arrays::BinaryOp, error::ErrorKind};

    #[test]
    fn test_overrides_are_local() {
        let mut c = cache(LazyArray::<f64>::ones(Shape::unbounded(1)));
        assert_eq!(c.get(&[0]).unwrap(), 1.0);
        assert_eq!(c.set(&[0], 3.0).unwrap(), None);
        assert_eq!(c.get(&[0]).unwrap(), 3.0);
        assert_eq!(c.get(&[1]).unwrap(), 1.0);
        assert_eq!(c.inner().evaluate(&[0]).unwrap(), 1.0);
        assert_eq!(c.set(&[0], 4.0).unwrap(), Some(3.0));
        assert_eq!(c.overrides(), 1);
    }

    #[test]
    fn test_map_only_grows_until_cleared() {
        let mut c = cache(LazyArray::diagonal_fn(|k| k as f64));
        for k in 0..10 {
            c.set(&[k, k + 1], -1.0).unwrap();
            assert_eq!(c.overrides(), k + 1);
        }
        assert!(c.is_overridden(&[3, 4]));
        assert_eq!(c.get(&[3, 3]).unwrap(), 3.0);
        c.clear();
        assert_eq!(c.overrides(), 0);
        assert_eq!(c.get(&[3, 4]).unwrap(), 0.0);
    }

    #[test]
    fn test_set_validates_index() {
        let mut c = cache(LazyArray::fill(0i64, Shape::finite(&[2, 2])));
        assert!(matches!(
            c.set(&[2, 0], 1).unwrap_err().kind(),
            ErrorKind::IndexOutOfRange { .. }
        ));
        assert!(matches!(
            c.get(&[0]).unwrap_err().kind(),
            ErrorKind::ArityMismatch { .. }
        ));
        assert_eq!(c.overrides(), 0);
    }

    #[test]
    fn test_cached_variant_in_combinations() {
        let mut c = cache(LazyArray::<f64>::ones(Shape::unbounded(1)));
        c.set(&[2], 10.0).unwrap();
        let mut lazy = c.into_lazy();
        let doubled = lazy
            .combine(&LazyArray::fill(2.0, Shape::unbounded(1)), BinaryOp::Mul)
            .unwrap();
        assert_eq!(doubled.evaluate(&[2]).unwrap(), 20.0);

        // Later writes do not leak into arrays already built from a snapshot.
        lazy.as_cached_mut().unwrap().set(&[2], 0.0).unwrap();
        assert_eq!(lazy.evaluate(&[2]).unwrap(), 0.0);
        assert_eq!(doubled.evaluate(&[2]).unwrap(), 20.0);
    }
}
