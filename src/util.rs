//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use cgmath::num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: Float> Interval<T> {
    /// Linearly interpolates between the bounds; `t = 0` yields `min`.
    pub fn lerp(&self, t: T) -> T {
        self.min + t * (self.max - self.min)
    }

    /// The inverse of [Interval::lerp].
    pub fn inv_lerp(&self, value: T) -> T {
        (value - self.min) / (self.max - self.min)
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

#[cfg(test)]
mod test {
    use super::Interval;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn lerp_round_trip() {
        let range = Interval::new(0.577f64, 0.788);
        assert_approx_eq!(range.lerp(range.inv_lerp(0.6)), 0.6);
        assert_approx_eq!(range.inv_lerp(range.min), 0.0);
        assert_approx_eq!(range.inv_lerp(range.max), 1.0);
    }
}
