//! Core coordinate types for tile processing.
//!
//! The same tuples are used both as sizes (extent per axis) and as chunk
//! coordinates (index per axis); which one is meant depends on context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Names of the tiled axes, in [`Tzyx`] order.
pub const TILED_AXES: [&str; 4] = ["T", "Z", "Y", "X"];

/// Axis order of every [`TileBlock`](crate::block::TileBlock).
pub const BLOCK_AXES: &str = "TCZYX";

/// Values along the time, depth, row and column axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tzyx {
    pub t: u64,
    pub z: u64,
    pub y: u64,
    pub x: u64,
}

impl Tzyx {
    /// Create a new value.
    pub const fn new(t: u64, z: u64, y: u64, x: u64) -> Self {
        Self { t, z, y, x }
    }

    /// Same value on every axis.
    pub const fn splat(v: u64) -> Self {
        Self::new(v, v, v, v)
    }

    /// Values as an array in `[t, z, y, x]` order.
    pub fn to_array(self) -> [u64; 4] {
        [self.t, self.z, self.y, self.x]
    }

    /// Build from an array in `[t, z, y, x]` order.
    pub fn from_array([t, z, y, x]: [u64; 4]) -> Self {
        Self::new(t, z, y, x)
    }

    /// Insert a channel value, producing a [`Tczyx`].
    pub fn with_channel(self, c: u64) -> Tczyx {
        Tczyx::new(self.t, c, self.z, self.y, self.x)
    }

    /// Product of all axis values.
    pub fn volume(self) -> u64 {
        self.t * self.z * self.y * self.x
    }

    /// Apply `f` to each pair of axis values.
    pub fn zip_with(self, other: Tzyx, f: impl Fn(u64, u64) -> u64) -> Self {
        Self::new(
            f(self.t, other.t),
            f(self.z, other.z),
            f(self.y, other.y),
            f(self.x, other.x),
        )
    }
}

impl fmt::Display for Tzyx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.t, self.z, self.y, self.x)
    }
}

/// Values along the time, channel, depth, row and column axes, as in an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tczyx {
    pub t: u64,
    pub c: u64,
    pub z: u64,
    pub y: u64,
    pub x: u64,
}

impl Tczyx {
    /// Create a new value.
    pub const fn new(t: u64, c: u64, z: u64, y: u64, x: u64) -> Self {
        Self { t, c, z, y, x }
    }

    /// Projection onto the tiled axes (channel dropped).
    pub fn tzyx(self) -> Tzyx {
        Tzyx::new(self.t, self.z, self.y, self.x)
    }

    /// Values as an array in `[t, c, z, y, x]` order.
    pub fn to_array(self) -> [u64; 5] {
        [self.t, self.c, self.z, self.y, self.x]
    }

    /// Build from an array in `[t, c, z, y, x]` order.
    pub fn from_array([t, c, z, y, x]: [u64; 5]) -> Self {
        Self::new(t, c, z, y, x)
    }

    /// Build from a slice, e.g. a Zarr shape. Returns `None` unless it has five entries.
    pub fn from_slice(values: &[u64]) -> Option<Self> {
        let array: [u64; 5] = values.try_into().ok()?;
        Some(Self::from_array(array))
    }

    /// Product of all axis values.
    pub fn volume(self) -> u64 {
        self.t * self.c * self.z * self.y * self.x
    }
}

impl fmt::Display for Tczyx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.t, self.c, self.z, self.y, self.x
        )
    }
}

/// Absolute coordinate of the first valid voxel on each tiled axis.
///
/// Time and depth start at zero in practice; rows and columns follow the
/// scene rectangle of the source and may be offset or negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisOrigin {
    pub t: i64,
    pub z: i64,
    pub y: i64,
    pub x: i64,
}

impl AxisOrigin {
    /// Create a new origin.
    pub const fn new(t: i64, z: i64, y: i64, x: i64) -> Self {
        Self { t, z, y, x }
    }

    /// Values as an array in `[t, z, y, x]` order.
    pub fn to_array(self) -> [i64; 4] {
        [self.t, self.z, self.y, self.x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tczyx_projection_drops_channel() {
        let v = Tczyx::new(4, 2, 1, 8, 9);
        assert_eq!(v.tzyx(), Tzyx::new(4, 1, 8, 9));
        assert_eq!(v.tzyx().with_channel(2), v);
    }

    #[test]
    fn test_from_slice() {
        assert_eq!(
            Tczyx::from_slice(&[1, 2, 3, 4, 5]),
            Some(Tczyx::new(1, 2, 3, 4, 5))
        );
        assert_eq!(Tczyx::from_slice(&[1, 2, 3, 4]), None);
    }

    #[test]
    fn test_zip_with_and_display() {
        let a = Tzyx::new(10, 3, 8, 9);
        let b = Tzyx::new(4, 1, 4, 4);
        assert_eq!(a.zip_with(b, |f, c| f.div_ceil(c)), Tzyx::new(3, 3, 2, 3));
        assert_eq!(a.to_string(), "(10, 3, 8, 9)");
        assert_eq!(Tzyx::splat(2).volume(), 16);
    }

    #[test]
    fn test_yaml_shape() {
        let v: Tzyx = serde_yaml::from_str("{t: 17, z: 1501, y: 512, x: 484}").unwrap();
        assert_eq!(v, Tzyx::new(17, 1501, 512, 484));
    }
}
