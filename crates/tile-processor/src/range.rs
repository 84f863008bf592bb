//! Stepped half-open integer ranges and the containment check used to
//! validate read windows against the source.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TileProcessorError};

/// A half-open range `[start, stop)` visiting every `step`-th integer.
///
/// `step` is never zero; a negative step walks downwards from `start`
/// towards (but excluding) `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StridedRange {
    start: i64,
    stop: i64,
    step: i64,
}

impl StridedRange {
    /// A unit-step range.
    pub const fn new(start: i64, stop: i64) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    /// A range with an explicit step.
    pub fn with_step(start: i64, stop: i64, step: i64) -> Result<Self> {
        if step == 0 {
            return Err(TileProcessorError::config("range step must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn stop(&self) -> i64 {
        self.stop
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// Number of elements.
    pub fn len(&self) -> u64 {
        let (lo, hi, step) = if self.step > 0 {
            (self.start, self.stop, self.step)
        } else {
            (self.stop, self.start, -self.step)
        };
        if hi <= lo {
            return 0;
        }
        ((hi - lo - 1) / step + 1) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last element, if any.
    pub fn last(&self) -> Option<i64> {
        match self.len() {
            0 => None,
            n => Some(self.start + (n as i64 - 1) * self.step),
        }
    }

    /// Whether `value` is one of the elements.
    pub fn contains_value(&self, value: i64) -> bool {
        let in_span = if self.step > 0 {
            self.start <= value && value < self.stop
        } else {
            self.stop < value && value <= self.start
        };
        in_span && (value - self.start) % self.step == 0
    }

    /// Whether every element of `self` is an element of `outer`.
    pub fn is_within(&self, outer: &StridedRange) -> bool {
        contains(self, outer)
    }
}

impl fmt::Display for StridedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "[{}, {})", self.start, self.stop)
        } else {
            write!(f, "[{}, {}) step {}", self.start, self.stop, self.step)
        }
    }
}

/// Decide whether `inner` lies entirely within `outer`.
///
/// Only the first and last elements are probed. Ranges of up to two
/// elements are settled by those probes alone; longer ranges additionally
/// need a step that is a multiple of the outer step.
pub fn contains(inner: &StridedRange, outer: &StridedRange) -> bool {
    let len = inner.len();
    if len == 0 {
        return true;
    }
    if !outer.contains_value(inner.start) {
        return false;
    }
    if len == 1 {
        return true;
    }
    match inner.last() {
        Some(last) if outer.contains_value(last) => {}
        _ => return false,
    }
    if len == 2 {
        return true;
    }
    inner.step % outer.step == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stepped(start: i64, stop: i64, step: i64) -> StridedRange {
        StridedRange::with_step(start, stop, step).unwrap()
    }

    #[test]
    fn test_len_and_last() {
        assert_eq!(StridedRange::new(2, 5).len(), 3);
        assert_eq!(StridedRange::new(5, 2).len(), 0);
        assert_eq!(stepped(0, 10, 3).len(), 4);
        assert_eq!(stepped(0, 10, 3).last(), Some(9));
        assert_eq!(stepped(10, 0, -4).len(), 3);
        assert_eq!(stepped(10, 0, -4).last(), Some(2));
        assert_eq!(StridedRange::new(3, 3).last(), None);
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(StridedRange::with_step(0, 10, 0).is_err());
    }

    #[test]
    fn test_contains_nested() {
        assert!(contains(&StridedRange::new(2, 5), &StridedRange::new(0, 10)));
        assert!(contains(&StridedRange::new(0, 10), &StridedRange::new(0, 10)));
    }

    #[test]
    fn test_contains_endpoint_outside() {
        assert!(!contains(&StridedRange::new(8, 12), &StridedRange::new(0, 10)));
        assert!(!contains(&StridedRange::new(-1, 3), &StridedRange::new(0, 10)));
    }

    #[test]
    fn test_empty_always_contained() {
        assert!(contains(&StridedRange::new(50, 50), &StridedRange::new(0, 10)));
        assert!(contains(&StridedRange::new(7, 3), &StridedRange::new(0, 0)));
    }

    #[test]
    fn test_single_and_double_elements_skip_step_rule() {
        let outer = stepped(0, 20, 2);
        assert!(contains(&StridedRange::new(4, 5), &outer));
        assert!(!contains(&StridedRange::new(5, 6), &outer));
        // Two elements are settled by the endpoint probes.
        assert!(contains(&stepped(4, 11, 6), &outer));
    }

    #[test]
    fn test_step_multiple_required_for_longer_ranges() {
        let outer = stepped(0, 30, 2);
        assert!(contains(&stepped(0, 13, 4), &outer));
        assert!(!contains(&stepped(0, 13, 3), &outer));
    }

    #[test]
    fn test_offset_outer_range() {
        let outer = StridedRange::new(-100, 412);
        assert!(contains(&StridedRange::new(-100, -84), &outer));
        assert!(contains(&StridedRange::new(396, 412), &outer));
        assert!(!contains(&StridedRange::new(396, 413), &outer));
    }
}
