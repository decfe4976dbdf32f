//! Infinite index domains.
//!
//! [`InfRange`] is an arithmetic progression `start, start + step, …` with no end.
//! It answers the questions an unbounded axis needs (membership, position,
//! ordered prefixes) and refuses the one it cannot: its length.

use crate::{
    error::{ErrorKind, Result},
    shape::Shape,
};
use std::fmt;

/// An unbounded arithmetic progression of integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfRange {
    start: i64,
    step: i64,
}

impl InfRange {
    /// `1, 2, 3, …`
    pub fn one_to_inf() -> Self {
        InfRange { start: 1, step: 1 }
    }

    /// `start, start + 1, start + 2, …`
    pub fn unit(start: i64) -> Self {
        InfRange { start, step: 1 }
    }

    /// `start, start + step, start + 2·step, …`; fails for a zero step.
    pub fn stepped(start: i64, step: i64) -> Result<Self> {
        if step == 0 {
            return Err(ErrorKind::invalid_size("an infinite range needs a non-zero step").into());
        }
        Ok(InfRange { start, step })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// The `i`-th member (0-based).
    pub fn element_at(&self, i: usize) -> Result<i64> {
        i64::try_from(i)
            .ok()
            .and_then(|i| i.checked_mul(self.step))
            .and_then(|offset| self.start.checked_add(offset))
            .ok_or_else(|| {
                ErrorKind::IndexOutOfRange {
                    index: i,
                    bound: usize::MAX,
                    axis: 0,
                }
                .into()
            })
    }

    /// The first `n` members in order.
    pub fn prefix(&self, n: usize) -> Result<Vec<i64>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        // Check the last element once so the loop below cannot overflow.
        self.element_at(n - 1).map_err(|_| {
            ErrorKind::invalid_size(format!("a prefix of {n} elements of {self} overflows i64"))
        })?;
        Ok(self.iter().take(n).collect())
    }

    /// Whether `value` is a member of the progression.
    pub fn contains(&self, value: i64) -> bool {
        self.position(value).is_some()
    }

    /// The 0-based position of `value`, if it is a member.
    pub fn position(&self, value: i64) -> Option<usize> {
        let offset = value.checked_sub(self.start)?;
        if offset.checked_rem(self.step)? != 0 {
            return None;
        }
        usize::try_from(offset.checked_div(self.step)?).ok()
    }

    /// Always fails: an infinite range has no length.
    pub fn len(&self) -> Result<usize> {
        Err(ErrorKind::NotFinite {
            operation: "len() of an infinite range",
        }
        .into())
    }

    /// Never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn shape(&self) -> Shape {
        Shape::unbounded(1)
    }

    /// A lazy iterator over all members. Stops only if `i64` would overflow.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        let step = self.step;
        std::iter::successors(Some(self.start), move |&x| x.checked_add(step))
    }
}

impl fmt::Display for InfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.step) {
            (1, 1) => f.write_str("OneToInf()"),
            (start, 1) => write!(f, "InfUnitRange({start})"),
            (start, step) => write!(f, "InfStepRange({start}, {step})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_to_inf() {
        let r = InfRange::one_to_inf();
        assert!(r.contains(1));
        assert!(!r.contains(0));
        assert_eq!(r.element_at(0).unwrap(), 1);
        assert_eq!(r.element_at(5).unwrap(), 6);
        assert_eq!(r.position(6), Some(5));
        assert_eq!(r.to_string(), "OneToInf()");
    }

    #[test]
    fn test_unit_range() {
        let r = InfRange::unit(5);
        assert!(r.contains(5));
        assert!(!r.contains(4));
        assert_eq!(r.prefix(3).unwrap(), vec![5, 6, 7]);
        assert_eq!(r.to_string(), "InfUnitRange(5)");
    }

    #[test]
    fn test_step_range() {
        let r = InfRange::stepped(0, 2).unwrap();
        assert!(r.contains(0));
        assert!(r.contains(2));
        assert!(!r.contains(1));
        assert!(!r.contains(-2));
        assert_eq!(r.element_at(1).unwrap(), 2);

        let down = InfRange::stepped(10, -3).unwrap();
        assert_eq!(down.prefix(4).unwrap(), vec![10, 7, 4, 1]);
        assert!(down.contains(-2));
        assert!(!down.contains(13));
    }

    #[test]
    fn test_len_is_not_finite() {
        let err = InfRange::one_to_inf().len().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotFinite { .. }));
    }

    #[test]
    fn test_zero_step_and_overflowing_prefix() {
        assert!(InfRange::stepped(0, 0).is_err());
        let r = InfRange::stepped(i64::MAX - 2, 1).unwrap();
        assert_eq!(r.prefix(3).unwrap().len(), 3);
        assert!(matches!(
            r.prefix(4).unwrap_err().kind(),
            ErrorKind::InvalidSize(_)
        ));
        assert!(r.prefix(0).unwrap().is_empty());
    }
}
